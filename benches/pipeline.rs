//! Benchmarks for the pipeline stages.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use burnish::algo::normals::{estimate_normals, NormalOptions};
use burnish::algo::outlier::{remove_statistical_outliers, OutlierOptions};
use burnish::algo::reconstruct::{reconstruct, ReconstructOptions};
use burnish::algo::sample::{sample_uniform, SampleOptions};
use burnish::mesh::primitives::icosphere;
use burnish::prelude::*;

/// An icosphere with deterministic radial bumps.
fn bumpy_sphere(level: u32) -> TriangleMesh {
    let sphere = icosphere(1.0, level);
    let positions = sphere
        .positions()
        .iter()
        .enumerate()
        .map(|(i, p)| p * (1.0 + 0.02 * ((i * 7919) % 13) as f64 / 13.0))
        .collect();
    let mut bumpy = sphere;
    bumpy.set_positions(positions).unwrap();
    bumpy
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("taubin_smooth");
    for level in [3, 4] {
        let mesh = bumpy_sphere(level);
        let parallel = SmoothOptions::default();
        let sequential = SmoothOptions::default().sequential();

        group.bench_with_input(BenchmarkId::new("parallel", mesh.num_vertices()), &mesh, |b, mesh| {
            b.iter(|| taubin_smooth(mesh, &parallel).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("sequential", mesh.num_vertices()), &mesh, |b, mesh| {
            b.iter(|| taubin_smooth(mesh, &sequential).unwrap())
        });
    }
    group.finish();
}

fn bench_resampling(c: &mut Criterion) {
    let mesh = bumpy_sphere(4);
    let sample_options = SampleOptions::default().with_count(20_000).with_seed(7);
    let sample = sample_uniform(&mesh, &sample_options).unwrap();

    c.bench_function("sample_uniform_20k", |b| {
        b.iter(|| sample_uniform(&mesh, &sample_options).unwrap())
    });
    c.bench_function("remove_outliers_20k", |b| {
        b.iter(|| remove_statistical_outliers(&sample, &OutlierOptions::default()).unwrap())
    });
    c.bench_function("estimate_normals_20k", |b| {
        let options = NormalOptions::default().with_radius(0.04);
        b.iter(|| estimate_normals(&sample, &options).unwrap())
    });
}

fn bench_reconstruction(c: &mut Criterion) {
    let mesh = icosphere(1.0, 4);
    let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(10_000).with_seed(7)).unwrap();
    let oriented = estimate_normals(&sample, &NormalOptions::default().with_radius(0.05)).unwrap();

    let mut group = c.benchmark_group("reconstruct");
    group.sample_size(10);
    for depth in [5, 6] {
        let options = ReconstructOptions::default().with_depth(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &options, |b, options| {
            b.iter(|| reconstruct(&oriented, options).unwrap())
        });
    }
    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let mesh = icosphere(1.0, 4);
    let mut flipped = mesh.clone();
    for t in (0..flipped.num_triangles()).step_by(5) {
        flipped.flip_triangle(t);
    }
    let options = RepairOptions::default();

    c.bench_function("make_print_ready_clean", |b| {
        b.iter(|| make_print_ready(&mesh, &options).unwrap())
    });
    c.bench_function("make_print_ready_flipped", |b| {
        b.iter(|| make_print_ready(&flipped, &options).unwrap())
    });
    c.bench_function("mesh_status", |b| b.iter(|| mesh_status(&mesh)));
}

criterion_group!(benches, bench_smoothing, bench_resampling, bench_reconstruction, bench_repair);
criterion_main!(benches);
