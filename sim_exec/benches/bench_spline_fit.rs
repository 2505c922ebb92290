//! Benchmarks for the cubic spline curve fitter.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sim_lib::fit::{CubicSplineFitter, CurveFitter};
use sim_lib::traj::TrajFamily;

fn bench_spline_fit(c: &mut Criterion) {
    let waypoints = TrajFamily::FigureEight.waypoints();
    let x: Vec<f64> = waypoints.iter().map(|p| p[0]).collect();
    let y: Vec<f64> = waypoints.iter().map(|p| p[1]).collect();

    c.bench_function("fit figure_eight at 0.1 m", |b| {
        b.iter(|| {
            CubicSplineFitter
                .fit(black_box(&x), black_box(&y), 0.1)
                .unwrap()
        })
    });

    c.bench_function("fit figure_eight at 1.0 m", |b| {
        b.iter(|| {
            CubicSplineFitter
                .fit(black_box(&x), black_box(&y), 1.0)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_spline_fit);
criterion_main!(benches);
