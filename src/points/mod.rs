//! Point samples drawn from mesh surfaces.
//!
//! A [`PointSample`] is an ordered set of positions with optional per-point
//! normals, colors and densities. Every attribute array that is present has
//! exactly one entry per point; subsetting keeps them aligned.

mod kdtree;

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::bounding_box;

pub use kdtree::{Neighbor, PointIndex};

/// An unstructured, optionally oriented point sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSample {
    positions: Vec<Point3<f64>>,
    normals: Option<Vec<Vector3<f64>>>,
    colors: Option<Vec<Vector3<f64>>>,
    densities: Option<Vec<f64>>,
}

impl PointSample {
    /// Create a sample from positions only.
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    /// Attach per-point normals.
    pub fn with_normals(mut self, normals: Vec<Vector3<f64>>) -> Result<Self> {
        check_len("normals", self.positions.len(), normals.len())?;
        self.normals = Some(normals);
        Ok(self)
    }

    /// Attach per-point colors.
    pub fn with_colors(mut self, colors: Vec<Vector3<f64>>) -> Result<Self> {
        check_len("colors", self.positions.len(), colors.len())?;
        self.colors = Some(colors);
        Ok(self)
    }

    /// Attach per-point densities.
    ///
    /// Reconstruction fills these for its output vertices.
    pub fn with_densities(mut self, densities: Vec<f64>) -> Result<Self> {
        check_len("densities", self.positions.len(), densities.len())?;
        self.densities = Some(densities);
        Ok(self)
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the sample has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Point positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Per-point normals, if present.
    pub fn normals(&self) -> Option<&[Vector3<f64>]> {
        self.normals.as_deref()
    }

    /// Per-point colors, if present.
    pub fn colors(&self) -> Option<&[Vector3<f64>]> {
        self.colors.as_deref()
    }

    /// Per-point densities, if present.
    pub fn densities(&self) -> Option<&[f64]> {
        self.densities.as_deref()
    }

    /// Whether normals are present.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(&self.positions)
    }

    /// Length of the bounding-box diagonal (zero when empty).
    pub fn bounding_box_diagonal(&self) -> f64 {
        self.bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Keep the points whose entry in `keep` is true, with their attributes.
    pub fn select(&self, keep: &[bool]) -> Self {
        debug_assert_eq!(keep.len(), self.len());
        fn pick<T: Clone>(items: &[T], keep: &[bool]) -> Vec<T> {
            items
                .iter()
                .zip(keep)
                .filter_map(|(item, &k)| k.then(|| item.clone()))
                .collect()
        }

        Self {
            positions: pick(&self.positions, keep),
            normals: self.normals.as_deref().map(|n| pick(n, keep)),
            colors: self.colors.as_deref().map(|c| pick(c, keep)),
            densities: self.densities.as_deref().map(|d| pick(d, keep)),
        }
    }

    /// Replace the normals in place, flipping the ones flagged in `flip`.
    pub(crate) fn flip_normals(&mut self, flip: &[bool]) {
        if let Some(normals) = &mut self.normals {
            for (n, &f) in normals.iter_mut().zip(flip) {
                if f {
                    *n = -*n;
                }
            }
        }
    }
}

fn check_len(attribute: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MeshError::AttributeMismatch {
            attribute,
            expected,
            actual,
        });
    }
    Ok(())
}
