#![recursion_limit = "256"]

use std::time::{Duration, Instant};

use burn::tensor::backend::{AutodiffBackend, Backend as BackendTrait};
use burn::tensor::{Distribution, Int, Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_tbptt_lm::{Decoder, SoftmaxDecoder, SoftmaxDecoderConfig};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

#[derive(Clone, Copy)]
struct DecoderCase {
    name: &'static str,
    batch: usize,
    time: usize,
    d_input: usize,
    vocab: usize,
}

const DECODER_CASES: &[DecoderCase] = &[
    DecoderCase {
        name: "b8_t35_v1k",
        batch: 8,
        time: 35,
        d_input: 128,
        vocab: 1_000,
    },
    DecoderCase {
        name: "b32_t35_v10k",
        batch: 32,
        time: 35,
        d_input: 256,
        vocab: 10_000,
    },
];

const LABEL_SMOOTHING: &[f32] = &[0.0, 0.1];

fn decoder_bench(c: &mut Criterion) {
    run_train_mode::<Autodiff<NdArray<f32>>>(c, "ndarray");
    run_eval_mode::<NdArray<f32>>(c, "ndarray");
}

fn sample_inputs<B: BackendTrait>(
    case: &DecoderCase,
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 2, Int>) {
    let outputs = Tensor::<B, 3>::random(
        [case.batch, case.time, case.d_input],
        Distribution::Normal(0.0, 1.0),
        device,
    );
    let tokens: Vec<i64> = (0..case.batch * case.time)
        .map(|idx| ((idx * 7919) % case.vocab) as i64)
        .collect();
    let targets =
        Tensor::<B, 2, Int>::from_data(TensorData::new(tokens, [case.batch, case.time]), device);
    (outputs, targets)
}

fn run_train_mode<B>(c: &mut Criterion, backend_name: &'static str)
where
    B: AutodiffBackend,
{
    let device = <B as BackendTrait>::Device::default();
    <B as BackendTrait>::seed(&device, 24);

    let mut group = c.benchmark_group(format!("softmax_decoder_train/{backend_name}"));

    for case in DECODER_CASES {
        let (outputs, targets) = sample_inputs::<B>(case, &device);

        for &smoothing in LABEL_SMOOTHING {
            let decoder = SoftmaxDecoder::<B>::new(
                &SoftmaxDecoderConfig {
                    d_input: case.d_input,
                    vocab_size: case.vocab,
                    label_smoothing: smoothing,
                },
                &device,
            );
            let tokens = (case.batch * case.time) as u64;
            group.throughput(Throughput::Elements(tokens));

            let id = format!("{}/ls{smoothing}", case.name);
            group.bench_with_input(BenchmarkId::new("forward", &id), case, |b, _| {
                b.iter(|| {
                    let (loss, _) = decoder.neg_log_prob(outputs.clone(), targets.clone());
                    loss.into_data()
                });
            });

            group.bench_with_input(BenchmarkId::new("forward_backward", &id), case, |b, _| {
                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let inputs = outputs.clone().detach().require_grad();
                        let start = Instant::now();
                        let (loss, count) = decoder.neg_log_prob(inputs, targets.clone());
                        let _grads = loss.div_scalar(count as f32).backward();
                        total += start.elapsed();
                    }
                    total
                });
            });
        }
    }

    group.finish();
}

fn run_eval_mode<B: BackendTrait>(c: &mut Criterion, backend_name: &'static str) {
    let device = B::Device::default();
    B::seed(&device, 24);

    let mut group = c.benchmark_group(format!("softmax_decoder_eval/{backend_name}"));

    for case in DECODER_CASES {
        let (outputs, targets) = sample_inputs::<B>(case, &device);
        let decoder = SoftmaxDecoder::<B>::new(
            &SoftmaxDecoderConfig {
                d_input: case.d_input,
                vocab_size: case.vocab,
                label_smoothing: 0.1,
            },
            &device,
        )
        .eval();

        group.throughput(Throughput::Elements((case.batch * case.time) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name), case, |b, _| {
            b.iter(|| {
                let (loss, _) = decoder.neg_log_prob(outputs.clone(), targets.clone());
                loss.into_data()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, decoder_bench);
criterion_main!(benches);
