//! Poisson-style surface reconstruction from an oriented point sample.
//!
//! The pipeline is:
//!
//! 1. [`Octree`](octree::Octree): adaptive point-count octree over a cube
//!    slightly larger than the sample's bounding box; the deepest level reached
//!    by at least half of the points sets the working depth.
//! 2. Poisson solve: an indicator function whose gradient matches the splatted
//!    normals, solved on the full grid at the base depth and on narrow bands
//!    around the sample at every finer depth.
//! 3. Extraction: marching tetrahedra at the level of the mean indicator
//!    value over the samples.
//! 4. Density: each output vertex gets a Gaussian-weighted count of nearby
//!    samples, low where the surface was extrapolated rather than fitted.
//!
//! [`trim_low_density`] then removes the least-supported vertices.
//!
//! # Example
//!
//! ```no_run
//! use burnish::algo::normals::{estimate_normals, NormalOptions};
//! use burnish::algo::reconstruct::{reconstruct, trim_low_density, ReconstructOptions};
//! use burnish::algo::sample::{sample_uniform, SampleOptions};
//! use burnish::mesh::primitives::icosphere;
//!
//! let sphere = icosphere(1.0, 3);
//! let sample = sample_uniform(&sphere, &SampleOptions::default().with_seed(1)).unwrap();
//! let oriented = estimate_normals(&sample, &NormalOptions::default().with_radius(0.04)).unwrap();
//!
//! let reconstruction = reconstruct(&oriented, &ReconstructOptions::default()).unwrap();
//! let trimmed = trim_low_density(&reconstruction, 0.01).unwrap();
//! println!("{} triangles", trimmed.num_triangles());
//! ```

mod extract;
pub mod octree;
mod poisson;
pub mod sparse;

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;
use crate::points::{PointIndex, PointSample};

use octree::Octree;
use poisson::SolverSettings;

/// Options for surface reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// Maximum octree depth (default: 9).
    pub depth: usize,

    /// Depth of the full-grid solve (default: 5).
    pub base_depth: usize,

    /// Minimum points in a cell for it to be subdivided (default: 8.0).
    pub samples_per_node: f64,

    /// Ratio between the root cube and the sample's largest extent (default: 1.1).
    pub scale: f64,

    /// Cells solved around each occupied cell on fine levels (default: 2).
    pub band: u32,

    /// Conjugate gradient iteration cap per level (default: 1000).
    pub max_solver_iterations: usize,

    /// Relative residual at which a level counts as solved (default: 1e-6).
    pub solver_tolerance: f64,

    /// Fewest sample points accepted (default: 100).
    pub min_points: usize,

    /// Samples contributing to each vertex density (default: 16).
    pub density_neighbors: usize,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            depth: 9,
            base_depth: 5,
            samples_per_node: 8.0,
            scale: 1.1,
            band: 2,
            max_solver_iterations: 1000,
            solver_tolerance: 1e-6,
            min_points: 100,
            density_neighbors: 16,
        }
    }
}

impl ReconstructOptions {
    /// Set the maximum octree depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the full-grid depth.
    pub fn with_base_depth(mut self, base_depth: usize) -> Self {
        self.base_depth = base_depth;
        self
    }

    /// Set the subdivision threshold.
    pub fn with_samples_per_node(mut self, samples: f64) -> Self {
        self.samples_per_node = samples;
        self
    }

    /// Set the minimum number of sample points.
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.depth) {
            return Err(MeshError::invalid_param("depth", self.depth, "must be in 1..=12"));
        }
        if self.base_depth == 0 {
            return Err(MeshError::invalid_param("base_depth", 0, "must be positive"));
        }
        if !(self.samples_per_node > 0.0) {
            return Err(MeshError::invalid_param(
                "samples_per_node",
                self.samples_per_node,
                "must be positive",
            ));
        }
        if !(self.scale >= 1.0) {
            return Err(MeshError::invalid_param("scale", self.scale, "must be at least 1"));
        }
        if self.band == 0 {
            return Err(MeshError::invalid_param("band", 0, "must be positive"));
        }
        if self.density_neighbors == 0 {
            return Err(MeshError::invalid_param("density_neighbors", 0, "must be positive"));
        }
        Ok(())
    }
}

/// A reconstructed mesh with per-vertex sample support.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The extracted surface. Carries colors when the sample did.
    pub mesh: TriangleMesh,

    /// The vertices of `mesh` as points carrying their density.
    pub support: PointSample,

    /// Octree depth the surface was extracted at.
    pub depth: usize,

    /// Indicator value of the extracted level set.
    pub iso_value: f64,
}

impl Reconstruction {
    /// Density of each vertex of `mesh`.
    pub fn densities(&self) -> &[f64] {
        self.support.densities().unwrap_or(&[])
    }
}

/// Reconstruct a surface from an oriented point sample.
///
/// # Errors
///
/// - [`MeshError::MissingNormals`] if the sample has no normals
/// - [`MeshError::InsufficientPoints`] below `min_points` samples
/// - [`MeshError::DegenerateResult`] if no surface, or one of negligible
///   area, comes out
/// - [`MeshError::InvalidParameter`] for out-of-range options
pub fn reconstruct(sample: &PointSample, options: &ReconstructOptions) -> Result<Reconstruction> {
    options.validate()?;
    let normals = sample.normals().ok_or(MeshError::MissingNormals)?;
    let required = options.min_points.max(4);
    if sample.len() < required {
        return Err(MeshError::InsufficientPoints {
            required,
            actual: sample.len(),
        });
    }
    let positions = sample.positions();

    let min_depth = options.base_depth.min(options.depth);
    let octree = Octree::build(
        positions,
        options.depth,
        min_depth,
        options.samples_per_node,
        options.scale,
    )?;
    let depth = octree.effective_depth(min_depth);
    log::debug!(
        "octree: {} levels built, solving to depth {} (base {})",
        octree.max_level() + 1,
        depth,
        min_depth
    );

    let settings = SolverSettings {
        band: options.band,
        max_iterations: options.max_solver_iterations,
        tolerance: options.solver_tolerance,
    };
    let (field, cells) = poisson::solve(&octree, positions, normals, depth, min_depth, settings);

    let at_samples: Vec<f64> = positions.par_iter().map(|p| field.value_at(p)).collect();
    let iso_value = at_samples.iter().sum::<f64>() / positions.len() as f64;
    let (vertices, triangles) = extract::extract(&field, &cells, iso_value);

    let mut mesh = TriangleMesh::from_raw(vertices, triangles)?;
    let diagonal = sample.bounding_box_diagonal();
    let area = mesh.surface_area();
    if mesh.num_triangles() == 0 || area <= 1e-12 * diagonal * diagonal {
        return Err(MeshError::degenerate(format!(
            "reconstruction produced {} triangles with area {:.3e}",
            mesh.num_triangles(),
            area
        )));
    }

    let sigma = field.finest_cell_size();
    let (densities, colors) = vertex_support(&mesh, sample, options.density_neighbors, sigma);
    if let Some(colors) = colors {
        mesh = mesh.with_vertex_colors(colors)?;
    }
    mesh.compute_vertex_normals();
    let support = PointSample::from_positions(mesh.positions().to_vec()).with_densities(densities)?;

    log::info!(
        "reconstructed {} vertices, {} triangles at depth {}",
        mesh.num_vertices(),
        mesh.num_triangles(),
        depth
    );

    Ok(Reconstruction {
        mesh,
        support,
        depth,
        iso_value,
    })
}

/// Gaussian-weighted sample support of every vertex, and colors blended with
/// the same weights when the sample has them.
fn vertex_support(
    mesh: &TriangleMesh,
    sample: &PointSample,
    k: usize,
    sigma: f64,
) -> (Vec<f64>, Option<Vec<Vector3<f64>>>) {
    let index = PointIndex::new(sample.positions());
    let sample_colors = sample.colors();
    let two_sigma_sq = 2.0 * sigma * sigma;

    let support: Vec<(f64, Option<Vector3<f64>>)> = mesh
        .positions()
        .par_iter()
        .map(|p| {
            let neighbors = index.nearest(p, k);
            let weights: Vec<f64> = neighbors
                .iter()
                .map(|n| (-(n.distance * n.distance) / two_sigma_sq).exp())
                .collect();
            let density: f64 = weights.iter().sum();

            let color = sample_colors.map(|colors| {
                if density > f64::MIN_POSITIVE {
                    neighbors
                        .iter()
                        .zip(&weights)
                        .map(|(n, w)| colors[n.index] * *w)
                        .sum::<Vector3<f64>>()
                        / density
                } else {
                    neighbors
                        .first()
                        .map(|n| colors[n.index])
                        .unwrap_or_else(Vector3::zeros)
                }
            });
            (density, color)
        })
        .collect();

    let densities = support.iter().map(|(d, _)| *d).collect();
    let colors = sample_colors.map(|_| {
        support
            .iter()
            .map(|(_, c)| c.unwrap_or_else(Vector3::zeros))
            .collect()
    });
    (densities, colors)
}

/// Remove the vertices whose density is below the `quantile` of all densities.
///
/// The threshold is linearly interpolated between order statistics, and only
/// vertices strictly below it are removed, together with their triangles.
///
/// # Errors
///
/// - [`MeshError::InvalidParameter`] if `quantile` is outside `[0, 1]`
/// - [`MeshError::AttributeMismatch`] if the support has no density for
///   some vertex
/// - [`MeshError::DegenerateResult`] if no triangle survives
pub fn trim_low_density(reconstruction: &Reconstruction, quantile: f64) -> Result<TriangleMesh> {
    if !(0.0..=1.0).contains(&quantile) {
        return Err(MeshError::invalid_param("quantile", quantile, "must be in [0, 1]"));
    }

    let densities = reconstruction.densities();
    if densities.len() != reconstruction.mesh.num_vertices() {
        return Err(MeshError::AttributeMismatch {
            attribute: "densities",
            expected: reconstruction.mesh.num_vertices(),
            actual: densities.len(),
        });
    }

    let threshold = density_quantile(densities, quantile);
    let remove: Vec<bool> = densities
        .iter()
        .map(|&d| d < threshold)
        .collect();

    let mut mesh = reconstruction.mesh.clone();
    let removed = mesh.remove_vertices_by_mask(&remove);
    if mesh.num_triangles() == 0 {
        return Err(MeshError::degenerate("density trimming removed every triangle"));
    }
    mesh.compute_vertex_normals();

    log::info!(
        "density trimming removed {} of {} vertices (threshold {:.4e})",
        removed,
        densities.len(),
        threshold
    );
    Ok(mesh)
}

/// Quantile with linear interpolation between closest ranks.
fn density_quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
