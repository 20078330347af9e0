//! Statistical outlier removal for point samples.
//!
//! # Algorithm
//!
//! For each point:
//! 1. Find the k nearest neighbors (excluding the point itself)
//! 2. Compute the mean distance to those neighbors
//!
//! Then compute the global mean μ and sample standard deviation σ of those
//! mean distances and keep the points whose mean distance is at most
//! `μ + std_ratio * σ`.

use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::points::{PointIndex, PointSample};

/// Options for statistical outlier removal.
#[derive(Debug, Clone)]
pub struct OutlierOptions {
    /// Number of neighbors to consider (default: 20).
    pub k_neighbors: usize,

    /// Standard deviation multiplier for the threshold (default: 2.0).
    pub std_ratio: f64,
}

impl Default for OutlierOptions {
    fn default() -> Self {
        Self {
            k_neighbors: 20,
            std_ratio: 2.0,
        }
    }
}

impl OutlierOptions {
    /// Set the number of neighbors.
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Set the standard deviation multiplier.
    pub fn with_std_ratio(mut self, ratio: f64) -> Self {
        self.std_ratio = ratio;
        self
    }
}

/// Result of outlier removal.
#[derive(Debug, Clone)]
pub struct OutlierRemoval {
    /// The filtered sample.
    pub sample: PointSample,

    /// Number of points removed.
    pub removed: usize,

    /// Mean-distance threshold that was applied.
    pub threshold: f64,
}

impl std::fmt::Display for OutlierRemoval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "outlier removal: {} -> {} points (threshold {:.6})",
            self.sample.len() + self.removed,
            self.sample.len(),
            self.threshold
        )
    }
}

/// Remove statistical outliers from a point sample.
///
/// Samples with no more than `k_neighbors` points are returned unchanged.
///
/// # Errors
///
/// Returns [`MeshError::InvalidParameter`] for `k_neighbors == 0` or a
/// non-positive `std_ratio`.
///
/// # Example
///
/// ```
/// use burnish::algo::outlier::{remove_statistical_outliers, OutlierOptions};
/// use burnish::points::PointSample;
/// use nalgebra::Point3;
///
/// let mut positions: Vec<_> = (0..400)
///     .map(|i| Point3::new((i % 20) as f64 * 0.1, (i / 20) as f64 * 0.1, 0.0))
///     .collect();
/// positions.push(Point3::new(1.0, 1.0, 50.0));
///
/// let sample = PointSample::from_positions(positions);
/// let result = remove_statistical_outliers(&sample, &OutlierOptions::default()).unwrap();
/// assert!(result.sample.positions().iter().all(|p| p.z < 1.0));
/// ```
pub fn remove_statistical_outliers(
    sample: &PointSample,
    options: &OutlierOptions,
) -> Result<OutlierRemoval> {
    if options.k_neighbors == 0 {
        return Err(MeshError::invalid_param("k_neighbors", 0, "must be positive"));
    }
    if !(options.std_ratio > 0.0) {
        return Err(MeshError::invalid_param(
            "std_ratio",
            options.std_ratio,
            "must be positive",
        ));
    }

    if sample.len() <= options.k_neighbors {
        return Ok(OutlierRemoval {
            sample: sample.clone(),
            removed: 0,
            threshold: f64::INFINITY,
        });
    }

    let mean_distances = mean_neighbor_distances(sample, options.k_neighbors);
    let threshold = distance_threshold(&mean_distances, options.std_ratio);

    let keep: Vec<bool> = mean_distances.iter().map(|&d| d <= threshold).collect();
    let filtered = sample.select(&keep);
    let removed = sample.len() - filtered.len();

    let result = OutlierRemoval {
        sample: filtered,
        removed,
        threshold,
    };
    log::debug!("{}", result);
    Ok(result)
}

/// Mean distance from every point to its `k` nearest other points.
fn mean_neighbor_distances(sample: &PointSample, k: usize) -> Vec<f64> {
    let index = PointIndex::new(sample.positions());
    sample
        .positions()
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let neighbors = index.nearest(p, k + 1);
            let others: Vec<f64> = neighbors
                .iter()
                .filter(|n| n.index != i)
                .take(k)
                .map(|n| n.distance)
                .collect();
            if others.is_empty() {
                0.0
            } else {
                others.iter().sum::<f64>() / others.len() as f64
            }
        })
        .collect()
}

/// `μ + ratio * σ` with the sample standard deviation.
fn distance_threshold(distances: &[f64], ratio: f64) -> f64 {
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = if distances.len() > 1 {
        distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    ratio.mul_add(variance.sqrt(), mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::sample::{sample_uniform, SampleOptions};
    use crate::mesh::primitives::icosphere;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_injected_outliers_removed() {
        let mesh = icosphere(1.0, 3);
        let sample = sample_uniform(&mesh, &SampleOptions::default().with_count(5000).with_seed(11))
            .unwrap();

        let mut positions = sample.positions().to_vec();
        let inliers = positions.len();
        let outliers = [
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, -5.0, 0.3),
            Point3::new(2.5, 2.5, 2.5),
            Point3::new(-3.0, 1.0, -4.0),
            Point3::new(0.1, 0.2, 6.0),
        ];
        positions.extend_from_slice(&outliers);

        let noisy = PointSample::from_positions(positions);
        let result = remove_statistical_outliers(&noisy, &OutlierOptions::default()).unwrap();

        for p in result.sample.positions() {
            assert!(p.coords.norm() < 1.5, "outlier survived at {:?}", p);
        }
        let inliers_removed = inliers - result.sample.len();
        assert!(
            (inliers_removed as f64) < 0.05 * inliers as f64,
            "removed {} inliers",
            inliers_removed
        );
        assert_eq!(result.removed, inliers_removed + outliers.len());
    }

    #[test]
    fn test_never_grows() {
        let positions: Vec<_> = (0..200)
            .map(|i| Point3::new(i as f64 * 0.1, (i % 7) as f64 * 0.05, (i % 3) as f64 * 0.02))
            .collect();
        let sample = PointSample::from_positions(positions);
        let result = remove_statistical_outliers(&sample, &OutlierOptions::default()).unwrap();
        assert!(result.sample.len() <= sample.len());
    }

    #[test]
    fn test_attributes_follow_points() {
        let mut positions: Vec<_> = (0..100)
            .map(|i| Point3::new((i % 10) as f64, (i / 10) as f64, 0.0))
            .collect();
        positions.push(Point3::new(5.0, 5.0, 100.0));
        let colors: Vec<_> = positions
            .iter()
            .map(|p| Vector3::new(p.z / 100.0, 0.0, 0.0))
            .collect();
        let sample = PointSample::from_positions(positions)
            .with_colors(colors)
            .unwrap();

        let result = remove_statistical_outliers(&sample, &OutlierOptions::default()).unwrap();
        assert_eq!(result.sample.colors().unwrap().len(), result.sample.len());
        assert!(result.sample.colors().unwrap().iter().all(|c| c.x == 0.0));
    }

    #[test]
    fn test_small_sample_unchanged() {
        let sample = PointSample::from_positions(vec![Point3::origin(); 5]);
        let result = remove_statistical_outliers(&sample, &OutlierOptions::default()).unwrap();
        assert_eq!(result.removed, 0);
        assert_eq!(result.sample, sample);
    }

    #[test]
    fn test_invalid_parameters() {
        let sample = PointSample::from_positions(vec![Point3::origin(); 5]);
        let zero_k = OutlierOptions::default().with_k_neighbors(0);
        assert!(remove_statistical_outliers(&sample, &zero_k).is_err());
        let bad_ratio = OutlierOptions::default().with_std_ratio(0.0);
        assert!(remove_statistical_outliers(&sample, &bad_ratio).is_err());
    }

    #[test]
    fn test_threshold_uses_sample_deviation() {
        let threshold = distance_threshold(&[1.0, 2.0, 3.0], 2.0);
        assert!((threshold - 4.0).abs() < 1e-12);
    }
}
