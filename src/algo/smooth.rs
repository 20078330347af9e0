//! Shrink-free mesh smoothing.
//!
//! [`taubin_smooth`] alternates a contracting Laplacian step (factor λ) with an
//! inflating one (factor μ = -λ - ε) so that repeated iterations remove
//! high-frequency noise without the volume loss of plain Laplacian smoothing.
//!
//! The Laplacian of a vertex is the mean of `neighbor - vertex` over its
//! one-ring. Vertices without neighbors never move. Topology, texture
//! coordinates and colors are carried over untouched; vertex normals are
//! recomputed from the smoothed positions.
//!
//! # Example
//!
//! ```
//! use burnish::algo::smooth::{taubin_smooth, SmoothOptions};
//! use burnish::mesh::primitives::icosphere;
//!
//! let mesh = icosphere(1.0, 2);
//! let options = SmoothOptions::default().with_iterations(10).with_lambda(0.5);
//! let smoothed = taubin_smooth(&mesh, &options).unwrap();
//!
//! assert_eq!(smoothed.triangles(), mesh.triangles());
//! assert!(smoothed.has_vertex_normals());
//! ```
//!
//! # Reference
//!
//! Taubin, G. (1995). "A signal processing approach to fair surface design."
//! SIGGRAPH '95.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::mesh::{MeshAdjacency, TriangleMesh};

use super::Progress;

/// Options for Taubin smoothing.
#[derive(Debug, Clone)]
pub struct SmoothOptions {
    /// Number of λ|μ iterations (default: 5).
    pub iterations: usize,

    /// Contraction factor λ, strictly between 0 and 1 (default: 0.5).
    pub lambda: f64,

    /// ε in μ = -λ - ε (default: 0.01).
    pub mu_offset: f64,

    /// Keep vertices on boundary edges fixed (default: false).
    pub preserve_boundary: bool,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            iterations: 5,
            lambda: 0.5,
            mu_offset: 0.01,
            preserve_boundary: false,
            parallel: true,
        }
    }
}

impl SmoothOptions {
    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the contraction factor λ.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set ε in μ = -λ - ε.
    pub fn with_mu_offset(mut self, mu_offset: f64) -> Self {
        self.mu_offset = mu_offset;
        self
    }

    /// Set whether boundary vertices stay fixed.
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// The inflation factor μ.
    pub fn mu(&self) -> f64 {
        -self.lambda - self.mu_offset
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(MeshError::invalid_param(
                "lambda",
                self.lambda,
                "must be in (0, 1)",
            ));
        }
        if !(self.mu_offset > 0.0) {
            return Err(MeshError::invalid_param(
                "mu_offset",
                self.mu_offset,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Smooth a mesh with Taubin's λ|μ scheme.
///
/// Returns a new mesh with the same topology and attributes. With zero
/// iterations, or a mesh without triangles, the input is returned unchanged.
///
/// # Errors
///
/// - [`MeshError::EmptyMesh`] if the mesh has no vertices
/// - [`MeshError::InvalidParameter`] if λ or ε is out of range
pub fn taubin_smooth(mesh: &TriangleMesh, options: &SmoothOptions) -> Result<TriangleMesh> {
    taubin_smooth_with_progress(mesh, options, &Progress::none())
}

/// Taubin smoothing with progress reporting.
///
/// Reports once per iteration and once on completion.
pub fn taubin_smooth_with_progress(
    mesh: &TriangleMesh,
    options: &SmoothOptions,
    progress: &Progress,
) -> Result<TriangleMesh> {
    options.validate()?;
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if options.iterations == 0 || mesh.num_triangles() == 0 {
        return Ok(mesh.clone());
    }

    let adjacency = MeshAdjacency::new(mesh);
    let fixed = if options.preserve_boundary {
        adjacency.boundary_vertices()
    } else {
        vec![false; mesh.num_vertices()]
    };
    let mu = options.mu();

    let mut positions = mesh.positions().to_vec();
    for iter in 0..options.iterations {
        progress.report(iter, options.iterations, "Taubin smoothing");

        // Positive step (smoothing)
        positions = laplacian_step(&positions, &adjacency, &fixed, options.lambda, options.parallel);
        // Negative step (inflation)
        positions = laplacian_step(&positions, &adjacency, &fixed, mu, options.parallel);
    }
    progress.report(options.iterations, options.iterations, "Taubin smoothing");

    let mut smoothed = mesh.clone();
    smoothed.set_positions(positions)?;
    smoothed.compute_vertex_normals();

    log::debug!(
        "Taubin smoothing: {} iterations, lambda={}, mu={:.4}",
        options.iterations,
        options.lambda,
        mu
    );
    Ok(smoothed)
}

/// Apply one uniform Laplacian step with the given factor to every vertex.
fn laplacian_step(
    positions: &[Point3<f64>],
    adjacency: &MeshAdjacency,
    fixed: &[bool],
    factor: f64,
    parallel: bool,
) -> Vec<Point3<f64>> {
    let step = |i: usize| {
        if fixed[i] {
            positions[i]
        } else {
            displace(positions, adjacency.neighbors(i), i, factor)
        }
    };

    if parallel {
        (0..positions.len()).into_par_iter().map(step).collect()
    } else {
        (0..positions.len()).map(step).collect()
    }
}

fn displace(positions: &[Point3<f64>], neighbors: &[u32], i: usize, factor: f64) -> Point3<f64> {
    let pos = positions[i];
    if neighbors.is_empty() {
        return pos;
    }

    let mut laplacian = Vector3::zeros();
    for &n in neighbors {
        laplacian += positions[n as usize] - pos;
    }
    laplacian /= neighbors.len() as f64;

    pos + factor * laplacian
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{grid, icosphere};
    use nalgebra::Vector2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noisy_sphere() -> TriangleMesh {
        let mesh = icosphere(1.0, 2);
        let positions: Vec<Point3<f64>> = mesh
            .positions()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let bump = 1.0 + 0.05 * ((i * 7919) % 13) as f64 / 13.0;
                Point3::from(p.coords * bump)
            })
            .collect();
        let mut noisy = mesh.clone();
        noisy.set_positions(positions).unwrap();
        noisy
    }

    fn with_attributes(mesh: TriangleMesh) -> TriangleMesh {
        let uvs = (0..3 * mesh.num_triangles())
            .map(|i| Vector2::new(i as f64, 0.5))
            .collect();
        let colors = (0..mesh.num_vertices())
            .map(|i| Vector3::new(0.1, i as f64 / 1000.0, 0.3))
            .collect();
        mesh.with_triangle_uvs(uvs)
            .unwrap()
            .with_vertex_colors(colors)
            .unwrap()
    }

    #[test]
    fn test_zero_iterations_no_change() {
        let mesh = with_attributes(noisy_sphere());
        let options = SmoothOptions::default().with_iterations(0);
        let smoothed = taubin_smooth(&mesh, &options).unwrap();
        assert_eq!(smoothed, mesh);
    }

    #[test]
    fn test_topology_and_attributes_preserved() {
        let mesh = with_attributes(noisy_sphere());
        let smoothed = taubin_smooth(&mesh, &SmoothOptions::default().with_iterations(7)).unwrap();

        assert_eq!(smoothed.num_vertices(), mesh.num_vertices());
        assert_eq!(smoothed.triangles(), mesh.triangles());
        assert_eq!(smoothed.triangle_uvs(), mesh.triangle_uvs());
        assert_eq!(smoothed.vertex_colors(), mesh.vertex_colors());
        assert_ne!(smoothed.positions(), mesh.positions());
    }

    #[test]
    fn test_normals_recomputed() {
        let mesh = icosphere(1.0, 2);
        let smoothed = taubin_smooth(&mesh, &SmoothOptions::default()).unwrap();
        let normals = smoothed.vertex_normals().unwrap();
        for (p, n) in smoothed.positions().iter().zip(normals) {
            assert!((n.norm() - 1.0).abs() < 1e-9);
            assert!(n.dot(&p.coords) > 0.9 * p.coords.norm());
        }
    }

    #[test]
    fn test_does_not_diverge() {
        let mesh = noisy_sphere();
        let diagonal = mesh.bounding_box_diagonal();
        let smoothed = taubin_smooth(&mesh, &SmoothOptions::default().with_iterations(50)).unwrap();
        let ratio = smoothed.bounding_box_diagonal() / diagonal;
        assert!(ratio > 0.8 && ratio < 1.2, "diagonal ratio {}", ratio);
    }

    #[test]
    fn test_taubin_reduces_shrinkage() {
        let mesh = noisy_sphere();
        let original_volume = mesh.signed_volume();
        let iterations = 20;

        let taubin =
            taubin_smooth(&mesh, &SmoothOptions::default().with_iterations(iterations)).unwrap();

        // Plain Laplacian smoothing with the same λ and twice the steps.
        let adjacency = MeshAdjacency::new(&mesh);
        let fixed = vec![false; mesh.num_vertices()];
        let mut positions = mesh.positions().to_vec();
        for _ in 0..2 * iterations {
            positions = laplacian_step(&positions, &adjacency, &fixed, 0.5, false);
        }
        let mut laplacian = mesh.clone();
        laplacian.set_positions(positions).unwrap();

        let taubin_loss = (original_volume - taubin.signed_volume()).abs() / original_volume;
        let laplacian_loss = (original_volume - laplacian.signed_volume()).abs() / original_volume;
        assert!(
            taubin_loss < laplacian_loss,
            "Taubin should shrink less: Laplacian={:.2}%, Taubin={:.2}%",
            laplacian_loss * 100.0,
            taubin_loss * 100.0
        );
    }

    #[test]
    fn test_isolated_vertex_stays_fixed() {
        let mut positions = icosphere(1.0, 1).positions().to_vec();
        let lonely = Point3::new(5.0, 5.0, 5.0);
        positions.push(lonely);
        let triangles = icosphere(1.0, 1).triangles().to_vec();
        let mesh = TriangleMesh::from_raw(positions, triangles).unwrap();

        let smoothed = taubin_smooth(&mesh, &SmoothOptions::default()).unwrap();
        assert_eq!(*smoothed.position(mesh.num_vertices() - 1), lonely);
    }

    #[test]
    fn test_preserve_boundary() {
        let mut mesh = grid(4);
        let mut positions = mesh.positions().to_vec();
        for (i, p) in positions.iter_mut().enumerate() {
            p.z = 0.1 * (i % 3) as f64;
        }
        mesh.set_positions(positions).unwrap();

        let options = SmoothOptions::default().with_preserve_boundary(true);
        let smoothed = taubin_smooth(&mesh, &options).unwrap();
        let boundary = MeshAdjacency::new(&mesh).boundary_vertices();
        for (i, &on_boundary) in boundary.iter().enumerate() {
            if on_boundary {
                assert_eq!(smoothed.position(i), mesh.position(i));
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = noisy_sphere();
        let parallel = taubin_smooth(&mesh, &SmoothOptions::default()).unwrap();
        let sequential = taubin_smooth(&mesh, &SmoothOptions::default().sequential()).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_no_triangles_unchanged() {
        let mesh = TriangleMesh::from_raw(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)], vec![])
            .unwrap();
        let smoothed = taubin_smooth(&mesh, &SmoothOptions::default()).unwrap();
        assert_eq!(smoothed, mesh);
    }

    #[test]
    fn test_empty_mesh_is_error() {
        let result = taubin_smooth(&TriangleMesh::new(), &SmoothOptions::default());
        assert!(matches!(result, Err(MeshError::EmptyMesh)));
    }

    #[test]
    fn test_invalid_lambda() {
        let mesh = icosphere(1.0, 0);
        for lambda in [0.0, 1.0, -0.2, f64::NAN] {
            let result = taubin_smooth(&mesh, &SmoothOptions::default().with_lambda(lambda));
            assert!(matches!(result, Err(MeshError::InvalidParameter { name: "lambda", .. })));
        }
    }

    #[test]
    fn test_progress_reported_per_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let options = SmoothOptions::default().with_iterations(4);
        taubin_smooth_with_progress(&icosphere(1.0, 1), &options, &progress).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
