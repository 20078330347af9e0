//! Hashed linear octree over a point sample.
//!
//! Level `d` divides the root cube into `2^d` cells per axis and stores the
//! number of points per occupied cell, keyed by integer cell coordinates.
//! Subdivision is adaptive: a point descends into level `d` only while the
//! cell holding it at level `d - 1` has at least `samples_per_node` points.
//! The deepest level reached by each point determines how deep the solve
//! needs to go.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::bounding_box;

/// Integer coordinates of a cell or grid node.
pub type CellKey = [u32; 3];

/// A point-count octree.
#[derive(Debug, Clone)]
pub struct Octree {
    origin: Point3<f64>,
    size: f64,
    levels: Vec<HashMap<CellKey, u32>>,
    point_depths: Vec<usize>,
}

impl Octree {
    /// Build the octree.
    ///
    /// The root cube is centred on the bounding box of `points` with an edge
    /// of `scale` times the largest extent. Levels up to `min_depth` are
    /// always built; deeper levels up to `max_depth` only while some point
    /// still descends.
    pub fn build(
        points: &[Point3<f64>],
        max_depth: usize,
        min_depth: usize,
        samples_per_node: f64,
        scale: f64,
    ) -> Result<Self> {
        let (min, max) = bounding_box(points).ok_or(MeshError::InsufficientPoints {
            required: 1,
            actual: 0,
        })?;
        let extent = (max - min).max();
        if !(extent > 0.0 && extent.is_finite()) {
            return Err(MeshError::degenerate(
                "sample has no spatial extent to reconstruct from",
            ));
        }

        let size = extent * scale;
        let center = nalgebra::center(&min, &max);
        let origin = center - Vector3::repeat(size / 2.0);

        let mut octree = Self {
            origin,
            size,
            levels: vec![[([0u32; 3], points.len() as u32)].into_iter().collect()],
            point_depths: vec![0; points.len()],
        };

        let min_depth = min_depth.min(max_depth);
        for d in 1..=max_depth {
            let mut level: HashMap<CellKey, u32> = HashMap::new();
            for p in points {
                *level.entry(octree.cell_of(p, d)).or_insert(0) += 1;
            }

            let parent = &octree.levels[d - 1];
            let mut advanced = 0usize;
            for (p, depth) in points.iter().zip(octree.point_depths.iter_mut()) {
                if *depth + 1 == d {
                    let count = parent.get(&octree_cell(origin, size, p, d - 1)).copied().unwrap_or(0);
                    if f64::from(count) >= samples_per_node {
                        *depth = d;
                        advanced += 1;
                    }
                }
            }

            if advanced == 0 && d > min_depth {
                break;
            }
            octree.levels.push(level);
        }

        Ok(octree)
    }

    /// Minimum corner of the root cube.
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Edge length of the root cube.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Deepest level built.
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Edge length of a cell at level `d`.
    pub fn cell_size(&self, d: usize) -> f64 {
        self.size / (1u64 << d) as f64
    }

    /// Cell containing `p` at level `d`, clamped to the root cube.
    pub fn cell_of(&self, p: &Point3<f64>, d: usize) -> CellKey {
        octree_cell(self.origin, self.size, p, d)
    }

    /// Occupied cells at level `d` with their point counts.
    pub fn occupied(&self, d: usize) -> &HashMap<CellKey, u32> {
        &self.levels[d]
    }

    /// Deepest level reached by at least half of the points, but no
    /// shallower than `min_depth` (capped at the deepest level built).
    pub fn effective_depth(&self, min_depth: usize) -> usize {
        let n = self.point_depths.len();
        let mut reached = vec![0usize; self.levels.len()];
        for &depth in &self.point_depths {
            reached[depth] += 1;
        }

        let mut at_least = 0usize;
        let mut effective = 0;
        for d in (0..self.levels.len()).rev() {
            at_least += reached[d];
            if 2 * at_least >= n {
                effective = d;
                break;
            }
        }

        effective.max(min_depth.min(self.max_level()))
    }
}

fn octree_cell(origin: Point3<f64>, size: f64, p: &Point3<f64>, d: usize) -> CellKey {
    let cells = (1u64 << d) as f64;
    let mut key = [0u32; 3];
    for axis in 0..3 {
        let g = ((p[axis] - origin[axis]) / size * cells).floor();
        key[axis] = g.clamp(0.0, cells - 1.0) as u32;
    }
    key
}
