//! Normal estimation and orientation for point samples.
//!
//! Normals are fitted per point by PCA over a local neighborhood: the
//! eigenvector of the neighborhood covariance with the smallest eigenvalue.
//! The neighborhood is a hybrid search, all points within a radius capped at
//! the closest `max_neighbors`, falling back to the `max_neighbors` nearest
//! points when the radius holds fewer than three.
//!
//! PCA leaves the sign of each normal arbitrary. Orientation is made
//! consistent by propagating along a minimum spanning tree of the k-nearest
//! neighbor graph with edge weight `1 - |n_i · n_j|`, so that the sign is
//! passed first across edges whose normals are nearly parallel. Each
//! connected component is seeded at its highest point with a normal forced
//! to face +z.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::points::{Neighbor, PointIndex, PointSample};

/// Options for normal estimation.
#[derive(Debug, Clone)]
pub struct NormalOptions {
    /// Search radius for the tangent-plane fit. `None` uses nearest
    /// neighbors only.
    pub radius: Option<f64>,

    /// Maximum number of neighbors in the fit (default: 30).
    pub max_neighbors: usize,

    /// Neighbors per point in the orientation graph (default: 10).
    pub orientation_neighbors: usize,
}

impl Default for NormalOptions {
    fn default() -> Self {
        Self {
            radius: None,
            max_neighbors: 30,
            orientation_neighbors: 10,
        }
    }
}

impl NormalOptions {
    /// Set the search radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Set the neighbor cap of the fit.
    pub fn with_max_neighbors(mut self, max_neighbors: usize) -> Self {
        self.max_neighbors = max_neighbors;
        self
    }

    /// Set the neighbor count of the orientation graph.
    pub fn with_orientation_neighbors(mut self, k: usize) -> Self {
        self.orientation_neighbors = k;
        self
    }
}

/// Estimate consistently oriented normals for a point sample.
///
/// Returns a copy of the sample carrying unit normals.
///
/// # Errors
///
/// - [`MeshError::InsufficientPoints`] for fewer than three points
/// - [`MeshError::InvalidParameter`] for a zero neighbor count or a
///   non-positive radius
///
/// # Example
///
/// ```
/// use burnish::algo::normals::{estimate_normals, NormalOptions};
/// use burnish::points::PointSample;
/// use nalgebra::Point3;
///
/// let positions: Vec<_> = (0..400)
///     .map(|i| Point3::new((i % 20) as f64 * 0.1, (i / 20) as f64 * 0.1, 0.0))
///     .collect();
/// let sample = PointSample::from_positions(positions);
///
/// let oriented = estimate_normals(&sample, &NormalOptions::default().with_radius(0.25)).unwrap();
/// assert!(oriented.normals().unwrap().iter().all(|n| n.z > 0.99));
/// ```
pub fn estimate_normals(sample: &PointSample, options: &NormalOptions) -> Result<PointSample> {
    if sample.len() < 3 {
        return Err(MeshError::InsufficientPoints {
            required: 3,
            actual: sample.len(),
        });
    }
    if options.max_neighbors == 0 {
        return Err(MeshError::invalid_param("max_neighbors", 0, "must be positive"));
    }
    if options.orientation_neighbors == 0 {
        return Err(MeshError::invalid_param(
            "orientation_neighbors",
            0,
            "must be positive",
        ));
    }
    if let Some(radius) = options.radius {
        if !(radius > 0.0) {
            return Err(MeshError::invalid_param("radius", radius, "must be positive"));
        }
    }

    let index = PointIndex::new(sample.positions());
    let positions = sample.positions();

    let normals: Vec<Vector3<f64>> = positions
        .par_iter()
        .map(|p| {
            let neighbors = hybrid_neighbors(&index, p, options);
            fit_normal(positions, &neighbors)
        })
        .collect();

    let mut oriented = sample.clone().with_normals(normals)?;
    orient_normals_consistent(&mut oriented, &index, options.orientation_neighbors);
    Ok(oriented)
}

/// Neighbors within the radius capped at `max_neighbors`, or the nearest
/// `max_neighbors` when the radius finds fewer than three.
fn hybrid_neighbors(index: &PointIndex, p: &Point3<f64>, options: &NormalOptions) -> Vec<Neighbor> {
    if let Some(radius) = options.radius {
        let mut found = index.within(p, radius);
        if found.len() >= 3 {
            found.truncate(options.max_neighbors);
            return found;
        }
    }
    index.nearest(p, options.max_neighbors.max(3))
}

/// Unit normal of the least-squares plane through the neighbors.
fn fit_normal(positions: &[Point3<f64>], neighbors: &[Neighbor]) -> Vector3<f64> {
    if neighbors.len() < 3 {
        return Vector3::z();
    }

    let centroid: Vector3<f64> = neighbors
        .iter()
        .map(|n| positions[n.index].coords)
        .sum::<Vector3<f64>>()
        / neighbors.len() as f64;

    let mut cov = Matrix3::zeros();
    for n in neighbors {
        let diff = positions[n.index].coords - centroid;
        cov += diff * diff.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let min_idx = eigen.eigenvalues.imin();
    let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();

    normal.try_normalize(1e-12).unwrap_or_else(Vector3::z)
}

/// Edge of the orientation graph, ordered so that the lightest pops first.
#[derive(Debug, Clone, Copy)]
struct GraphEdge {
    weight: f64,
    from: usize,
    to: usize,
}

impl PartialEq for GraphEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GraphEdge {}

impl PartialOrd for GraphEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GraphEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| other.to.cmp(&self.to))
            .then_with(|| other.from.cmp(&self.from))
    }
}

/// Flip normals so that they agree along a minimum spanning tree of the
/// symmetric k-nearest-neighbor graph.
fn orient_normals_consistent(sample: &mut PointSample, index: &PointIndex, k: usize) {
    let positions = sample.positions();
    let Some(normals) = sample.normals() else {
        return;
    };
    let n = positions.len();

    let knn: Vec<Vec<usize>> = positions
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            index
                .nearest(p, k + 1)
                .into_iter()
                .filter(|nb| nb.index != i)
                .take(k)
                .map(|nb| nb.index)
                .collect()
        })
        .collect();

    let mut graph: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, list) in knn.iter().enumerate() {
        for &j in list {
            graph[i].push(j);
            graph[j].push(i);
        }
    }

    let mut seeds: Vec<usize> = (0..n).collect();
    seeds.sort_by(|&a, &b| positions[b].z.total_cmp(&positions[a].z).then(a.cmp(&b)));

    let mut oriented: Vec<Vector3<f64>> = normals.to_vec();
    let mut visited = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut components = 0usize;

    for &seed in &seeds {
        if visited[seed] {
            continue;
        }
        components += 1;
        visited[seed] = true;
        if oriented[seed].z < 0.0 {
            oriented[seed] = -oriented[seed];
        }
        push_edges(&mut heap, &graph, &oriented, &visited, seed);

        while let Some(edge) = heap.pop() {
            if visited[edge.to] {
                continue;
            }
            visited[edge.to] = true;
            if oriented[edge.to].dot(&oriented[edge.from]) < 0.0 {
                oriented[edge.to] = -oriented[edge.to];
            }
            push_edges(&mut heap, &graph, &oriented, &visited, edge.to);
        }
    }

    let flip: Vec<bool> = normals
        .iter()
        .zip(&oriented)
        .map(|(before, after)| before != after)
        .collect();
    let flipped = flip.iter().filter(|&&f| f).count();
    sample.flip_normals(&flip);

    log::debug!(
        "oriented {} normals in {} components ({} flipped)",
        n,
        components,
        flipped
    );
}

fn push_edges(
    heap: &mut BinaryHeap<GraphEdge>,
    graph: &[Vec<usize>],
    normals: &[Vector3<f64>],
    visited: &[bool],
    from: usize,
) {
    for &to in &graph[from] {
        if !visited[to] {
            heap.push(GraphEdge {
                weight: 1.0 - normals[from].dot(&normals[to]).abs(),
                from,
                to,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::sample::{sample_uniform, SampleOptions};
    use crate::mesh::primitives::icosphere;

    #[test]
    fn test_plane_normals() {
        let positions: Vec<_> = (0..400)
            .map(|i| Point3::new((i % 20) as f64 * 0.1, (i / 20) as f64 * 0.1, 0.0))
            .collect();
        let sample = PointSample::from_positions(positions);
        let oriented = estimate_normals(&sample, &NormalOptions::default()).unwrap();
        for n in oriented.normals().unwrap() {
            assert!((n - Vector3::z()).norm() < 1e-9);
        }
    }

    #[test]
    fn test_sphere_normals_consistent_and_outward() {
        let mesh = icosphere(1.0, 3);
        let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(4000).with_seed(2))
            .unwrap();
        let options = NormalOptions::default().with_radius(0.1);
        let oriented = estimate_normals(&sample, &options).unwrap();

        let normals = oriented.normals().unwrap();
        let aligned = oriented
            .positions()
            .iter()
            .zip(normals)
            .filter(|(p, n)| n.dot(&p.coords.normalize()) > 0.8)
            .count();
        assert!(aligned as f64 > 0.99 * normals.len() as f64, "{} aligned", aligned);
    }

    #[test]
    fn test_separate_components_each_seeded_up() {
        let mut positions = Vec::new();
        for i in 0..100 {
            positions.push(Point3::new((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, 0.0));
            positions.push(Point3::new((i % 10) as f64 * 0.1 + 100.0, (i / 10) as f64 * 0.1, 5.0));
        }
        let sample = PointSample::from_positions(positions);
        let options = NormalOptions::default().with_orientation_neighbors(5);
        let oriented = estimate_normals(&sample, &options).unwrap();
        assert!(oriented.normals().unwrap().iter().all(|n| n.z > 0.99));
    }

    #[test]
    fn test_radius_fallback_to_nearest() {
        let positions: Vec<_> = (0..50)
            .map(|i| Point3::new(i as f64, (i * i % 7) as f64, 0.0))
            .collect();
        let sample = PointSample::from_positions(positions);
        let oriented =
            estimate_normals(&sample, &NormalOptions::default().with_radius(1e-6)).unwrap();
        assert!(oriented.normals().unwrap().iter().all(|n| n.z > 0.99));
    }

    #[test]
    fn test_too_few_points() {
        let sample = PointSample::from_positions(vec![Point3::origin(); 2]);
        let result = estimate_normals(&sample, &NormalOptions::default());
        assert!(matches!(
            result,
            Err(MeshError::InsufficientPoints { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_heap_pops_lightest_edge() {
        let mut heap = BinaryHeap::new();
        heap.push(GraphEdge { weight: 0.5, from: 0, to: 1 });
        heap.push(GraphEdge { weight: 0.1, from: 0, to: 2 });
        heap.push(GraphEdge { weight: 0.9, from: 0, to: 3 });
        assert_eq!(heap.pop().map(|e| e.to), Some(2));
    }
}
