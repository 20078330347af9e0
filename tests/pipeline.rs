//! End-to-end pipeline scenarios.

use burnish::io;
use burnish::mesh::primitives::icosphere;
use burnish::pipeline::{PipelineState, RunSummary};
use burnish::prelude::*;
use nalgebra::{Point3, Vector3};
use tempfile::TempDir;

/// Unit icosphere pushed outward by a deterministic per-vertex amount.
fn noisy_sphere(level: u32, amplitude: f64) -> TriangleMesh {
    let sphere = icosphere(1.0, level);
    let positions: Vec<Point3<f64>> = sphere
        .positions()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let bump = (i.wrapping_mul(2_654_435_761) % 1000) as f64 / 1000.0 - 0.5;
            p * (1.0 + amplitude * bump)
        })
        .collect();
    let mut noisy = sphere;
    noisy.set_positions(positions).unwrap();
    noisy
}

fn mean_radius(mesh: &TriangleMesh) -> f64 {
    mesh.positions().iter().map(|p| p.coords.norm()).sum::<f64>() / mesh.num_vertices() as f64
}

fn radius_spread(mesh: &TriangleMesh) -> f64 {
    let mean = mean_radius(mesh);
    mesh.positions()
        .iter()
        .map(|p| (p.coords.norm() - mean).abs())
        .sum::<f64>()
        / mesh.num_vertices() as f64
}

#[test]
fn smooth_only_keeps_topology_and_shape() {
    let input = icosphere(1.0, 3);
    assert_eq!(input.num_vertices(), 642);
    assert_eq!(input.num_triangles(), 1280);

    let output = process(&input, 5, false).unwrap();

    assert_eq!(output.num_vertices(), 642);
    assert_eq!(output.num_triangles(), 1280);
    let displacement: f64 = input
        .positions()
        .iter()
        .zip(output.positions())
        .map(|(a, b)| (a - b).norm())
        .sum::<f64>()
        / 642.0;
    assert!(displacement < 0.05, "average displacement {}", displacement);
    assert!(mesh_status(&output).is_printable());
}

#[test]
fn smoothing_reduces_noise_without_shrinking() {
    let input = noisy_sphere(3, 0.1);
    let output = process(&input, 10, false).unwrap();

    assert!(radius_spread(&output) < 0.5 * radius_spread(&input));
    assert!((mean_radius(&output) - mean_radius(&input)).abs() < 0.02);
}

#[test]
fn full_run_reconstructs_a_manifold_surface() {
    let config = PipelineConfig::default()
        .with_seed(11)
        .with_target_sample_count(8000)
        .with_octree_depth(6);
    let mut pipeline = Pipeline::new(config);
    let output = pipeline.run(&noisy_sphere(3, 0.04)).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    let summary: &RunSummary = &output.summary;
    assert_eq!(summary.sampled_points, Some(8000));
    assert_eq!(summary.reconstruction_depth, Some(6));
    assert!(summary.trimmed_vertices.unwrap() > 0);

    let status = summary.repair.status;
    assert!(status.is_edge_manifold);
    assert!(status.is_oriented);
    assert_eq!(status.vertex_count, output.mesh.num_vertices());
    assert!(output.mesh.has_vertex_normals());
    assert!((mean_radius(&output.mesh) - 1.0).abs() < 0.08);
}

#[test]
fn seeded_runs_are_reproducible() {
    let config = PipelineConfig::default()
        .with_seed(5)
        .with_target_sample_count(4000)
        .with_octree_depth(5);
    let input = noisy_sphere(2, 0.02);

    let a = Pipeline::new(config.clone()).run(&input).unwrap();
    let b = Pipeline::new(config).run(&input).unwrap();
    assert_eq!(a.mesh, b.mesh);
}

#[test]
fn colors_survive_reconstruction() {
    let sphere = icosphere(1.0, 3);
    let colors = vec![Vector3::new(0.2, 0.4, 0.6); sphere.num_vertices()];
    let input = sphere.with_vertex_colors(colors).unwrap();

    let config = PipelineConfig::default()
        .with_seed(3)
        .with_target_sample_count(6000)
        .with_octree_depth(5);
    let output = Pipeline::new(config).run(&input).unwrap();

    let out = output.mesh.vertex_colors().unwrap();
    assert!(out.iter().all(|c| (c - Vector3::new(0.2, 0.4, 0.6)).norm() < 1e-6));
}

#[test]
fn empty_input_reports_stage() {
    let err = process(&TriangleMesh::new(), 5, true).unwrap_err();
    assert_eq!(err.stage, Stage::Smooth);
}

#[test]
fn load_process_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let input_path = dir.path().join("input.glb");
    let output_path = dir.path().join("output.glb");

    io::save(&noisy_sphere(2, 0.05), &input_path).unwrap();
    let loaded = io::load(&input_path).unwrap();
    assert_eq!(loaded.num_vertices(), 162);

    let processed = process(&loaded, 5, false).unwrap();
    io::save(&processed, &output_path).unwrap();

    let reloaded = io::load(&output_path).unwrap();
    assert_eq!(reloaded.num_triangles(), processed.num_triangles());
    assert!(mesh_status(&reloaded).is_watertight);
}

#[test]
fn config_file_drives_a_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("burnish.toml");
    std::fs::write(&path, "iterations = 3\nremove_bumps = false\n").unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    let output = Pipeline::new(config).run(&icosphere(1.0, 2)).unwrap();
    assert_eq!(output.summary.sampled_points, None);
    assert_eq!(output.summary.output_triangles, 320);
}
