//! Benchmarks for mesh-depth operations.
//!
//! Run with: cargo bench -p mesh-depth
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-depth -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-depth -- --baseline main

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use image::RgbImage;
use mesh_depth::{
    BackprojectParams, BilateralParams, DepthMap, InputTransform, Intrinsics, backproject,
    bilateral_filter_depth, normalize_depth,
};

// =============================================================================
// Test Map Generation
// =============================================================================

/// Gaussian bump in the middle of a `size x size` map.
fn create_bump(size: u32) -> DepthMap {
    let c = f64::from(size) / 2.0;
    let sigma = f64::from(size) / 6.0;
    DepthMap::from_fn(size, size, |x, y| {
        let dx = f64::from(x) - c;
        let dy = f64::from(y) - c;
        #[allow(clippy::cast_possible_truncation)]
        let d = (0.2 + (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()) as f32;
        d
    })
    .unwrap_or_else(|e| panic!("bump: {e}"))
}

// =============================================================================
// Post-processing Benchmarks
// =============================================================================

fn bench_bilateral(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bilateral");
    group.sample_size(20);

    for size in [128, 384, 768] {
        let depth = normalize_depth(&create_bump(size));
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::new("d9", size), &depth, |b, depth| {
            b.iter(|| bilateral_filter_depth(black_box(depth), &BilateralParams::default()));
        });
    }

    group.finish();
}

// =============================================================================
// Geometry Benchmarks
// =============================================================================

fn bench_backproject(c: &mut Criterion) {
    let mut group = c.benchmark_group("Backproject");

    for size in [384, 768] {
        let depth = normalize_depth(&create_bump(size));
        let k = Intrinsics::infer(size, size, None);
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::new("bump", size), &depth, |b, depth| {
            b.iter(|| backproject(black_box(depth), &k, &BackprojectParams::default()));
        });
    }

    group.finish();
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("InputTransform");
    let image = RgbImage::from_fn(640, 480, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        let p = image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
        p
    });

    for transform in [InputTransform::Dpt, InputTransform::Small] {
        group.bench_function(format!("{transform:?}"), |b| {
            b.iter(|| transform.prepare(black_box(&image)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bilateral, bench_backproject, bench_prepare);
criterion_main!(benches);
