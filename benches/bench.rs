//! Benchmark different configurations.

use std::num::NonZero;

use capa::{Capa, Family};
use criterion::{BenchmarkId, Criterion, Throughput};

/// A flat baseline with a mean-shifted run in the middle, long enough to exercise the pruner
/// over a realistic number of surviving candidates.
fn synthetic_signal(n: usize) -> Vec<f64> {
    let mut signal = vec![0.0; n];
    let shift_start = n / 3;
    let shift_len = (n / 20).max(2);
    for sample in signal.iter_mut().skip(shift_start).take(shift_len) {
        *sample = 6.0;
    }
    signal
}

/// Benchmark the different groups, cost families and signal sizes.
fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("solve");

    for size in [100_usize, 1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(size as u64));
        let signal = synthetic_signal(size);

        for family in [Family::Mean, Family::MeanVar] {
            let parameter = match family {
                Family::Mean => "Mean",
                Family::MeanVar => "MeanVar",
                Family::Poisson => "Poisson",
            };

            group.bench_with_input(
                BenchmarkId::new(parameter, size),
                &signal,
                |benchmark, signal| {
                    benchmark.iter(|| {
                        let result = Capa::new()
                            .with_family(std::hint::black_box(family))
                            .with_penalty_change(std::hint::black_box(4.0))
                            .with_min_seg_length(NonZero::new(2).expect("nonzero"))
                            .solve(std::hint::black_box(signal));
                        let _ = std::hint::black_box(result);
                    });
                },
            );
        }
    }

    group.finish();
}

criterion::criterion_group!(benches, benchmark);
criterion::criterion_main!(benches);
