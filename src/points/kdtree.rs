//! Nearest-neighbor queries over point sets.
//!
//! kiddo splits buckets on coordinate values and panics when too many points
//! share one value along the split axis, which surface samples of flat faces
//! routinely do. Keys are therefore offset by a deterministic per-index jitter
//! far below any geometric scale of interest, and every distance returned is
//! recomputed from the untouched positions.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Relative size of the key jitter.
const JITTER: f64 = 1e-9;

/// A neighbor returned by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the indexed set.
    pub index: usize,
    /// Euclidean distance to the query.
    pub distance: f64,
}

/// A k-d tree over a fixed set of points.
pub struct PointIndex {
    tree: KdTree<f64, 3>,
    positions: Vec<Point3<f64>>,
    slack: f64,
}

impl PointIndex {
    /// Index a set of points.
    pub fn new(positions: &[Point3<f64>]) -> Self {
        let scale = positions
            .iter()
            .flat_map(|p| p.iter().map(|c| c.abs()))
            .fold(1.0f64, f64::max);
        let amplitude = JITTER * scale;

        let mut tree: KdTree<f64, 3> = KdTree::with_capacity(positions.len().max(1));
        for (i, p) in positions.iter().enumerate() {
            let key = [
                p.x + amplitude * jitter(i, 0),
                p.y + amplitude * jitter(i, 1),
                p.z + amplitude * jitter(i, 2),
            ];
            tree.add(&key, i as u64);
        }

        Self {
            tree,
            positions: positions.to_vec(),
            slack: 2.0 * amplitude * 3f64.sqrt(),
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if no points are indexed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The `k` nearest points to `query`, closest first.
    ///
    /// A query at an indexed position returns that point first.
    pub fn nearest(&self, query: &Point3<f64>, k: usize) -> Vec<Neighbor> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        let found = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], k);
        self.to_neighbors(query, found.iter().map(|n| n.item as usize))
    }

    /// All points within `radius` of `query`, closest first.
    pub fn within(&self, query: &Point3<f64>, radius: f64) -> Vec<Neighbor> {
        if self.is_empty() || radius < 0.0 {
            return Vec::new();
        }
        let search = radius + self.slack;
        let found = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&[query.x, query.y, query.z], search * search);
        let mut neighbors = self.to_neighbors(query, found.iter().map(|n| n.item as usize));
        neighbors.retain(|n| n.distance <= radius);
        neighbors
    }

    fn to_neighbors(&self, query: &Point3<f64>, items: impl Iterator<Item = usize>) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> = items
            .map(|index| Neighbor {
                index,
                distance: (self.positions[index] - query).norm(),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        neighbors
    }
}

/// Low-discrepancy offset in [-0.5, 0.5) for point `i` along `axis`.
fn jitter(i: usize, axis: usize) -> f64 {
    const STEPS: [f64; 3] = [0.618_033_988_749_895, 0.754_877_666_246_693, 0.569_840_290_998_053];
    ((i as f64 + 1.0) * STEPS[axis]).fract() - 0.5
}
