//! Mesh processing algorithms.
//!
//! The stages of the print-prep pipeline, usable on their own:
//!
//! - **Smoothing**: Taubin λ|μ smoothing without shrinkage
//! - **Resampling**: area-weighted surface sampling, statistical outlier
//!   removal, normal estimation with consistent orientation
//! - **Reconstruction**: Poisson-style implicit surface fitting with
//!   density-based trimming
//! - **Repair**: degenerate/duplicate/non-manifold cleanup, orientation and
//!   watertightness diagnostics

pub mod normals;
pub mod outlier;
pub mod progress;
pub mod reconstruct;
pub mod repair;
pub mod resample;
pub mod sample;
pub mod smooth;

pub use progress::Progress;
