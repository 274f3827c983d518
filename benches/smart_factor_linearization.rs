//! Smart stereo factor linearization benchmark
//!
//! Measures the cost of one linearization (cameras, triangulation, per-view blocks,
//! Schur elimination, key collapse) as the number of views grows, and the throughput of
//! linearizing many independent factors in parallel.
//!
//! ## Usage
//!
//! ```bash
//! cargo bench --bench smart_factor_linearization
//! ```
//!
//! ## Scenarios
//!
//! - **Views**: one landmark seen from 2 to 64 body poses through one shared extrinsic
//! - **Batch**: 1000 landmarks over a 10-pose, 2-camera trajectory, linearized with rayon

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smart_stereo::camera::{StereoCalibration, StereoCamera, StereoMeasurement};
use smart_stereo::core::noise::IsotropicNoise;
use smart_stereo::manifold::se3::SE3;
use smart_stereo::manifold::LieGroup;
use smart_stereo::{init_logger, linearize_all, Key, SmartStereoFactor, SmartStereoParams, Values};
use std::hint::black_box;
use std::sync::Arc;
use tracing::info;

const PIXEL_NOISE: f64 = 0.5;

fn calibration() -> Arc<StereoCalibration> {
    Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.0, 640.0, 480.0, 0.5))
}

/// Body poses along a gentle arc, `count` of them, with `cameras` extrinsics per body.
fn trajectory(count: usize, cameras: usize) -> Values {
    let mut values = Values::new();
    for i in 0..count {
        let t = i as f64 * 0.2;
        values.insert(
            Key::symbol('x', i as u64),
            SE3::from_translation_euler(t, 0.05 * t.sin(), 0.0, 0.0, 0.0, 0.01 * t),
        );
    }
    for c in 0..cameras {
        values.insert(
            Key::symbol('e', c as u64),
            SE3::from_translation_euler(0.3 * c as f64, 0.0, 0.05, 0.0, -0.02 * c as f64, 0.0),
        );
    }
    values
}

/// Factor observing `landmark` from every body through every extrinsic in `values`.
fn observe_all(
    values: &Values,
    bodies: usize,
    cameras: usize,
    landmark: &Vector3<f64>,
    rng: &mut StdRng,
) -> Option<SmartStereoFactor> {
    let calibration = calibration();
    let noise = Arc::new(IsotropicNoise::new(3, 1.0).ok()?);
    let mut factor = SmartStereoFactor::new(noise, SmartStereoParams::default());

    for i in 0..bodies {
        for c in 0..cameras {
            let body_key = Key::symbol('x', i as u64);
            let extrinsic_key = Key::symbol('e', c as u64);
            let pose = values
                .get(body_key)?
                .compose(values.get(extrinsic_key)?, None, None);
            let pixels = StereoCamera::new(pose, calibration.clone())
                .project(landmark, None, None)
                .ok()?;
            let measurement = StereoMeasurement::stereo(
                pixels.x + rng.random_range(-PIXEL_NOISE..PIXEL_NOISE),
                pixels.y + rng.random_range(-PIXEL_NOISE..PIXEL_NOISE),
                pixels.z + rng.random_range(-PIXEL_NOISE..PIXEL_NOISE),
            );
            factor.add(measurement, body_key, extrinsic_key, calibration.clone());
        }
    }
    Some(factor)
}

fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("smart_factor_views");
    let mut rng = StdRng::seed_from_u64(42);

    for views in [2usize, 4, 8, 16, 32, 64] {
        let values = trajectory(views, 1);
        let Some(factor) = observe_all(&values, views, 1, &Vector3::new(1.0, 0.5, 8.0), &mut rng)
        else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(views), &factor, |b, factor| {
            b.iter(|| black_box(factor.linearize(&values)))
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let values = trajectory(10, 2);

    let factors: Vec<SmartStereoFactor> = (0..1000)
        .filter_map(|_| {
            let landmark = Vector3::new(
                rng.random_range(-2.0..4.0),
                rng.random_range(-2.0..2.0),
                rng.random_range(4.0..12.0),
            );
            observe_all(&values, 10, 2, &landmark, &mut rng)
        })
        .collect();
    info!("Benchmarking batch of {} factors", factors.len());

    c.bench_function("smart_factor_batch_parallel", |b| {
        b.iter(|| black_box(linearize_all(&factors, &values, 0.0)))
    });
    c.bench_function("smart_factor_batch_sequential", |b| {
        b.iter(|| {
            black_box(
                factors
                    .iter()
                    .map(|factor| factor.linearize(&values))
                    .collect::<Result<Vec<_>, _>>(),
            )
        })
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    init_logger();
    bench_views(c);
    bench_batch(c);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
