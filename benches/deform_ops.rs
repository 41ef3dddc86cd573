//! Benchmarks for ARAP deformation.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point3;
use pliant::prelude::*;

fn create_grid_mesh(n: usize) -> TriMesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    TriMesh::new(vertices, faces).unwrap()
}

/// Clamp the left column and lift the right column.
fn bend_constraints(n: usize) -> ConstraintSet {
    (0..=n)
        .flat_map(|j| {
            let left = j * (n + 1);
            let right = left + n;
            [
                (left, Point3::new(0.0, j as f64, 0.0)),
                (right, Point3::new(n as f64 * 0.8, j as f64, n as f64 * 0.4)),
            ]
        })
        .collect()
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    for n in [10, 30] {
        let mesh = create_grid_mesh(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &mesh, |b, mesh| {
            b.iter(|| MeshAnalysis::new(mesh));
        });
    }
    group.finish();
}

fn bench_deform(c: &mut Criterion) {
    let n = 12;
    let deformer = ArapDeformer::new(create_grid_mesh(n));
    let constraints = bend_constraints(n);

    let mut group = c.benchmark_group("deform_grid_12");
    group.sample_size(20);

    group.bench_function("direct_parallel", |b| {
        let options = DeformOptions::default();
        b.iter(|| deformer.deform(&constraints, &options).unwrap());
    });

    group.bench_function("direct_sequential", |b| {
        let options = DeformOptions::default().sequential();
        b.iter(|| deformer.deform(&constraints, &options).unwrap());
    });

    group.bench_function("conjugate_gradient", |b| {
        let options = DeformOptions::default().with_solver(LinearSolver::conjugate_gradient());
        b.iter(|| deformer.deform(&constraints, &options).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_analysis, bench_deform);
criterion_main!(benches);
