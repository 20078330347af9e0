//! Area-weighted uniform sampling of a mesh surface.
//!
//! Triangles are picked with probability proportional to their area through a
//! binary search over the cumulative area table, and a point inside the
//! picked triangle is drawn with the square-root barycentric mapping, which
//! is uniform over the triangle. When the mesh carries vertex colors, each
//! sample receives the barycentric blend of its triangle's corner colors.

use nalgebra::{Point3, Vector3};
use rand::{Rng, RngCore, SeedableRng};

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;
use crate::points::PointSample;

/// Options for surface sampling.
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Number of points to draw (default: 50 000).
    pub count: usize,

    /// Seed for reproducible sampling. `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            count: 50_000,
            seed: None,
        }
    }
}

impl SampleOptions {
    /// Set the number of points.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Draw points uniformly over the surface of a mesh.
///
/// # Errors
///
/// - [`MeshError::EmptyMesh`] if the mesh has no vertices
/// - [`MeshError::InvalidParameter`] if `count` is zero
/// - [`MeshError::DegenerateResult`] if the mesh has no surface area
///
/// # Example
///
/// ```
/// use burnish::algo::sample::{sample_uniform, SampleOptions};
/// use burnish::mesh::primitives::icosphere;
///
/// let mesh = icosphere(1.0, 2);
/// let options = SampleOptions::default().with_count(1000).with_seed(7);
/// let sample = sample_uniform(&mesh, &options).unwrap();
/// assert_eq!(sample.len(), 1000);
/// ```
pub fn sample_uniform(mesh: &TriangleMesh, options: &SampleOptions) -> Result<PointSample> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if options.count == 0 {
        return Err(MeshError::invalid_param("count", 0, "must be positive"));
    }

    let mut cumulative = Vec::with_capacity(mesh.num_triangles());
    let mut total = 0.0;
    for t in 0..mesh.num_triangles() {
        total += mesh.face_area(t);
        cumulative.push(total);
    }
    if !(total > 0.0) {
        return Err(MeshError::degenerate("mesh has no surface area to sample"));
    }

    let mut rng: Box<dyn RngCore> = match options.seed {
        Some(seed) => Box::new(rand::rngs::StdRng::seed_from_u64(seed)),
        None => Box::new(rand::thread_rng()),
    };

    let colors = mesh.vertex_colors();
    let mut positions = Vec::with_capacity(options.count);
    let mut sampled_colors = colors.map(|_| Vec::with_capacity(options.count));

    for _ in 0..options.count {
        let target = rng.gen::<f64>() * total;
        let t = cumulative
            .partition_point(|&c| c <= target)
            .min(cumulative.len() - 1);

        let r1: f64 = rng.gen::<f64>().sqrt();
        let r2: f64 = rng.gen();
        let weights = [1.0 - r1, r1 * (1.0 - r2), r1 * r2];

        let [p0, p1, p2] = mesh.triangle_positions(t);
        positions.push(Point3::from(
            p0.coords * weights[0] + p1.coords * weights[1] + p2.coords * weights[2],
        ));

        if let (Some(out), Some(colors)) = (&mut sampled_colors, colors) {
            let blended: Vector3<f64> = mesh
                .triangle(t)
                .iter()
                .zip(weights)
                .map(|(&v, w)| colors[v] * w)
                .sum();
            out.push(blended);
        }
    }

    log::debug!(
        "sampled {} points over {} triangles (area {:.6})",
        positions.len(),
        mesh.num_triangles(),
        total
    );

    let sample = PointSample::from_positions(positions);
    match sampled_colors {
        Some(c) => sample.with_colors(c),
        None => Ok(sample),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{cube, grid, icosphere};

    #[test]
    fn test_points_lie_on_surface() {
        let mesh = icosphere(1.0, 0);
        let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(500).with_seed(1))
            .unwrap();
        // Every point is inside the sphere and outside the inscribed sphere.
        let inradius = 0.79;
        for p in sample.positions() {
            let r = p.coords.norm();
            assert!(r <= 1.0 + 1e-12 && r >= inradius, "radius {}", r);
        }
    }

    #[test]
    fn test_area_weighting() {
        // Two unit cells of very different size: [0,1]^2 grid scaled by 3 in x on half.
        let mut mesh = grid(2);
        let positions = mesh
            .positions()
            .iter()
            .map(|p| if p.x > 1.5 { Point3::new(p.x + 3.0, p.y, p.z) } else { *p })
            .collect();
        mesh.set_positions(positions).unwrap();

        let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(20_000).with_seed(3))
            .unwrap();
        let right = sample.positions().iter().filter(|p| p.x > 1.0).count() as f64;
        // Left column area 2, right column area 8.
        let fraction = right / sample.len() as f64;
        assert!((fraction - 0.8).abs() < 0.02, "fraction {}", fraction);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let mesh = cube(Vector3::new(1.0, 1.0, 1.0), true);
        let options = SampleOptions::default().with_count(100).with_seed(42);
        let a = sample_uniform(&mesh, &options).unwrap();
        let b = sample_uniform(&mesh, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_colors_interpolated() {
        let mesh = grid(1);
        let colors = vec![Vector3::new(0.2, 0.4, 0.6); mesh.num_vertices()];
        let mesh = mesh.with_vertex_colors(colors).unwrap();
        let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(50).with_seed(5))
            .unwrap();
        for c in sample.colors().unwrap() {
            assert!((c - Vector3::new(0.2, 0.4, 0.6)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_zero_area_is_degenerate() {
        let mesh = TriangleMesh::from_raw(vec![Point3::origin(); 3], vec![[0, 1, 2]]).unwrap();
        let result = sample_uniform(&mesh, &SampleOptions::default());
        assert!(matches!(result, Err(MeshError::DegenerateResult { .. })));
    }

    #[test]
    fn test_zero_count_rejected() {
        let mesh = icosphere(1.0, 0);
        let result = sample_uniform(&mesh, &SampleOptions::default().with_count(0));
        assert!(matches!(result, Err(MeshError::InvalidParameter { name: "count", .. })));
    }
}
