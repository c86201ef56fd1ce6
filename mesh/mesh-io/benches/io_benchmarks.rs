//! Benchmarks for mesh-io operations.
//!
//! Run with: cargo bench -p mesh-io
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-io -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-io -- --baseline main

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use image::RgbImage;
use mesh_io::{encode_glb, export_bundle, load_obj, write_obj_mtl};
use mesh_types::{IndexedMesh, Point3};
use tempfile::tempdir;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Height-field relief of `n x n` quads with projected UVs.
fn create_relief(n: u32) -> IndexedMesh {
    let row = n + 1;
    let mut positions = Vec::with_capacity((row * row) as usize);
    let mut uvs = Vec::with_capacity((row * row) as usize);
    for y in 0..=n {
        for x in 0..=n {
            let u = f64::from(x) / f64::from(n);
            let v = f64::from(y) / f64::from(n);
            positions.push(Point3::new(u - 0.5, v - 0.5, 2.0 + 0.2 * (u * 9.0).sin()));
            #[allow(clippy::cast_possible_truncation)]
            uvs.push((u as f32, v as f32));
        }
    }
    let mut faces = Vec::with_capacity((2 * n * n) as usize);
    for y in 0..n {
        for x in 0..n {
            let i = y * row + x;
            faces.push([i, i + 1, i + row + 1]);
            faces.push([i, i + row + 1, i + row]);
        }
    }
    let mut mesh = IndexedMesh::from_positions(positions, faces);
    let _ = mesh.set_uvs(&uvs);
    mesh
}

// =============================================================================
// Export Benchmarks
// =============================================================================

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("Export");
    let dir = tempdir().expect("temp dir");

    for n in [50, 200] {
        let mesh = create_relief(n);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("glb", n), &mesh, |b, mesh| {
            b.iter(|| encode_glb(black_box(mesh), None));
        });

        let obj = dir.path().join(format!("relief_{n}.obj"));
        let mtl = dir.path().join(format!("relief_{n}.mtl"));
        group.bench_with_input(BenchmarkId::new("obj", n), &mesh, |b, mesh| {
            b.iter(|| write_obj_mtl(black_box(mesh), "texture.png", &obj, &mtl));
        });

        group.bench_with_input(BenchmarkId::new("obj_load", n), &obj, |b, obj| {
            b.iter(|| load_obj(black_box(obj)));
        });
    }

    let mesh = create_relief(100);
    let texture = RgbImage::new(384, 384);
    group.bench_function("bundle", |b| {
        b.iter(|| export_bundle(black_box(&mesh), &texture, dir.path().join("bundle")));
    });

    group.finish();
}

criterion_group!(benches, bench_export);
criterion_main!(benches);
