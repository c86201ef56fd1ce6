//! Benchmarks for mesh-repair operations.
//!
//! Run with: cargo bench -p mesh-repair
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-repair -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-repair -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_repair::{RepairParams, compute_vertex_normals, repair_mesh, smooth_simple};
use mesh_types::{IndexedMesh, Vertex};
use std::collections::HashMap;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Icosphere of radius 1 centred at `(0, 0, 3)`, in front of the camera.
fn create_sphere(subdivisions: u32) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();

    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let a = 1.0;
    let b = 1.0 / phi;

    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];

    for v in &ico_verts {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        mesh.vertices
            .push(Vertex::from_coords(v[0] / len, v[1] / len, v[2] / len));
    }

    mesh.faces.extend_from_slice(&[
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ]);

    for _ in 0..subdivisions {
        mesh = subdivide_sphere(&mesh);
    }

    for v in &mut mesh.vertices {
        v.position.z += 3.0;
    }
    mesh
}

fn subdivide_sphere(mesh: &IndexedMesh) -> IndexedMesh {
    let mut new_mesh = IndexedMesh::new();
    new_mesh.vertices = mesh.vertices.clone();

    let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();

    for face in &mesh.faces {
        let [v0, v1, v2] = *face;

        let m01 = get_midpoint(v0, v1, &mut new_mesh.vertices, &mut edge_midpoints);
        let m12 = get_midpoint(v1, v2, &mut new_mesh.vertices, &mut edge_midpoints);
        let m20 = get_midpoint(v2, v0, &mut new_mesh.vertices, &mut edge_midpoints);

        new_mesh.faces.push([v0, m01, m20]);
        new_mesh.faces.push([v1, m12, m01]);
        new_mesh.faces.push([v2, m20, m12]);
        new_mesh.faces.push([m01, m12, m20]);
    }

    new_mesh
}

fn get_midpoint(
    v1: u32,
    v2: u32,
    vertices: &mut Vec<Vertex>,
    edge_midpoints: &mut HashMap<(u32, u32), u32>,
) -> u32 {
    let key = if v1 < v2 { (v1, v2) } else { (v2, v1) };

    if let Some(&idx) = edge_midpoints.get(&key) {
        return idx;
    }

    let p1 = vertices[v1 as usize].position;
    let p2 = vertices[v2 as usize].position;
    let mid = nalgebra::center(&p1, &p2).coords.normalize();

    let idx = vertices.len() as u32;
    vertices.push(Vertex::from_coords(mid.x, mid.y, mid.z));
    edge_midpoints.insert(key, idx);
    idx
}

/// Give every face its own vertex copies, like unwelded extractor output.
fn unweld(mesh: &IndexedMesh) -> IndexedMesh {
    let mut soup = IndexedMesh::with_capacity(mesh.faces.len() * 3, mesh.faces.len());
    for face in &mesh.faces {
        let base = soup.vertices.len() as u32;
        for &i in face {
            soup.vertices.push(mesh.vertices[i as usize]);
        }
        soup.faces.push([base, base + 1, base + 2]);
    }
    soup
}

// =============================================================================
// Repair Benchmarks
// =============================================================================

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("Repair");

    let test_cases = [
        ("sphere_1280tri", unweld(&create_sphere(3))),
        ("sphere_5120tri", unweld(&create_sphere(4))),
        ("sphere_20480tri", unweld(&create_sphere(5))),
    ];

    for (name, mesh) in &test_cases {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("full_repair", name), mesh, |b, mesh| {
            b.iter(|| {
                let mut m = mesh.clone();
                repair_mesh(black_box(&mut m), &RepairParams::default())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Finishing Benchmarks
// =============================================================================

fn bench_finishing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Finishing");

    for subdivisions in [3, 4, 5] {
        let mesh = create_sphere(subdivisions);
        group.throughput(Throughput::Elements(mesh.vertices.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("smooth_simple", mesh.faces.len()),
            &mesh,
            |b, mesh| {
                b.iter(|| {
                    let mut m = mesh.clone();
                    smooth_simple(black_box(&mut m), 1)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("vertex_normals", mesh.faces.len()),
            &mesh,
            |b, mesh| {
                b.iter(|| {
                    let mut m = mesh.clone();
                    compute_vertex_normals(black_box(&mut m));
                    m
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_repair, bench_finishing);

criterion_main!(benches);
