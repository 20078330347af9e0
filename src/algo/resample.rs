//! Resampling: surface sample, outlier filter and oriented normals in one call.
//!
//! [`resample_and_filter`] chains [`sample_uniform`],
//! [`remove_statistical_outliers`] and [`estimate_normals`], producing the
//! oriented sample that reconstruction consumes.

use crate::algo::normals::{estimate_normals, NormalOptions};
use crate::algo::outlier::{remove_statistical_outliers, OutlierOptions};
use crate::algo::sample::{sample_uniform, SampleOptions};
use crate::error::Result;
use crate::mesh::TriangleMesh;
use crate::points::PointSample;

/// Options for the three resampling steps.
#[derive(Debug, Clone, Default)]
pub struct ResampleOptions {
    /// Surface sampling.
    pub sample: SampleOptions,
    /// Outlier removal.
    pub outlier: OutlierOptions,
    /// Normal estimation.
    pub normal: NormalOptions,
}

impl ResampleOptions {
    /// Set the sampling options.
    pub fn with_sample(mut self, sample: SampleOptions) -> Self {
        self.sample = sample;
        self
    }

    /// Set the outlier options.
    pub fn with_outlier(mut self, outlier: OutlierOptions) -> Self {
        self.outlier = outlier;
        self
    }

    /// Set the normal estimation options.
    pub fn with_normal(mut self, normal: NormalOptions) -> Self {
        self.normal = normal;
        self
    }
}

/// An oriented sample and what it took to get there.
#[derive(Debug, Clone)]
pub struct Resampled {
    /// Surviving points, with normals.
    pub sample: PointSample,
    /// Points drawn from the surface.
    pub sampled: usize,
    /// Points dropped as outliers.
    pub outliers_removed: usize,
}

/// Sample `mesh`, drop outliers and estimate oriented normals.
///
/// # Errors
///
/// Whatever the individual steps return: an empty or zero-area mesh, a zero
/// sample count, or out-of-range neighbor parameters.
///
/// # Example
///
/// ```
/// use burnish::algo::normals::NormalOptions;
/// use burnish::algo::resample::{resample_and_filter, ResampleOptions};
/// use burnish::algo::sample::SampleOptions;
/// use burnish::mesh::primitives::icosphere;
///
/// let options = ResampleOptions::default()
///     .with_sample(SampleOptions::default().with_count(2000).with_seed(1))
///     .with_normal(NormalOptions::default().with_radius(0.15));
/// let resampled = resample_and_filter(&icosphere(1.0, 2), &options).unwrap();
/// assert!(resampled.sample.has_normals());
/// ```
pub fn resample_and_filter(mesh: &TriangleMesh, options: &ResampleOptions) -> Result<Resampled> {
    let drawn = sample_uniform(mesh, &options.sample)?;
    let filtered = remove_statistical_outliers(&drawn, &options.outlier)?;
    let sample = estimate_normals(&filtered.sample, &options.normal)?;

    log::info!(
        "sampled {} points, removed {} outliers",
        drawn.len(),
        filtered.removed
    );
    Ok(Resampled {
        sample,
        sampled: drawn.len(),
        outliers_removed: filtered.removed,
    })
}
