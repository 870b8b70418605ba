use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use seird::{forecast, AdaptiveOptions, SeirdParams, SolverConfig};

fn one_year() -> SeirdParams {
    SeirdParams::new(59_000_000.0, 709.0, 0.0, 0.0, 2.3, 4.0, 14.0, 0.02, 365).with_inflow(1e-7)
}

fn benchmark_forecast(c: &mut Criterion) {
    let params = one_year();
    let mut group = c.benchmark_group("SEIR-D 365 day forecast");

    group.bench_function("auto (adaptive)", |b| {
        b.iter(|| forecast::run(black_box(&params), &SolverConfig::default()))
    });

    group.bench_function("Rosenbrock (adaptive)", |b| {
        b.iter(|| forecast::run(black_box(&params), &SolverConfig::Rosenbrock(AdaptiveOptions::default())))
    });

    group.bench_function("RK4 dt=0.25", |b| {
        b.iter(|| forecast::run(black_box(&params), &SolverConfig::Rk4 { dt: 0.25 }))
    });

    group.finish();
}

criterion_group!(benches, benchmark_forecast);
criterion_main!(benches);
