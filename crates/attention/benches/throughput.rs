//! Throughput benchmark for multi-head attention forward passes.
//! Run with: `cargo bench -p attention throughput`

use attention::{AttentionConfig, AttentionMask, ExecutionContext, MultiHeadAttention};
use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

#[derive(Clone, Copy)]
struct Case {
    batch: usize,
    seq_len: usize,
    model_dim: usize,
    heads: usize,
    causal: bool,
}

fn bench_forward(c: &mut Criterion) {
    let device = Device::Cpu;
    let ctx = ExecutionContext::cpu();
    let mut cases = Vec::new();
    for &seq_len in &[32usize, 128, 512] {
        for &causal in &[false, true] {
            cases.push(Case {
                batch: 2,
                seq_len,
                model_dim: 256,
                heads: 8,
                causal,
            });
        }
    }

    let mut group = c.benchmark_group("multi_head/forward");
    for case in cases {
        let config = AttentionConfig::new(case.model_dim, case.heads).with_causal_mask(case.causal);
        let mha = MultiHeadAttention::new(config, &ctx).expect("module init");
        let x = Tensor::randn(0f32, 1.0, (case.batch, case.seq_len, case.model_dim), &device)
            .expect("input");
        let lengths = AttentionMask::Lengths(vec![case.seq_len / 2, case.seq_len]);
        let tokens = (case.batch * case.seq_len) as u64;
        group.throughput(Throughput::Elements(tokens));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!(
                "seq{}_causal{}",
                case.seq_len, case.causal
            )),
            &(mha, x, lengths),
            |b, (mha, x, mask)| {
                b.iter(|| {
                    let out = mha.forward(black_box(x), x, x, mask).expect("forward");
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_forward);
criterion_main!(benches);
