//! The print-prep pipeline.
//!
//! A run moves through fixed stages:
//!
//! ```text
//! Loaded -> Smoothed -> (Reconstructed | skipped) -> Repaired -> Done
//! ```
//!
//! Reconstruction (resampling, outlier removal, normal estimation and
//! surface reconstruction) only runs when `remove_bumps` is set. The first
//! stage to fail ends the run with a [`ProcessingError`] naming it; no
//! intermediate mesh is returned in its place.
//!
//! # Example
//!
//! ```
//! use burnish::mesh::primitives::icosphere;
//! use burnish::pipeline::process;
//!
//! let mesh = icosphere(1.0, 2);
//! let smoothed = process(&mesh, 5, false).unwrap();
//! assert_eq!(smoothed.num_vertices(), mesh.num_vertices());
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algo::normals::NormalOptions;
use crate::algo::outlier::OutlierOptions;
use crate::algo::progress::Progress;
use crate::algo::reconstruct::{reconstruct, trim_low_density, ReconstructOptions};
use crate::algo::repair::{make_print_ready, RepairOptions, RepairReport};
use crate::algo::resample::{resample_and_filter, ResampleOptions};
use crate::algo::sample::SampleOptions;
use crate::algo::smooth::{taubin_smooth_with_progress, SmoothOptions};
use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;

/// Voxel size as a fraction of the bounding-box diagonal, when not set.
const VOXEL_FRACTION: f64 = 0.01;

/// Pipeline configuration.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```toml
/// iterations = 10
/// remove_bumps = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Taubin iterations (default: 5).
    pub iterations: usize,
    /// Taubin contraction factor in (0, 1) (default: 0.5).
    pub lambda: f64,
    /// Resample and reconstruct the surface (default: true).
    pub remove_bumps: bool,
    /// Points sampled from the smoothed surface (default: 50 000).
    pub target_sample_count: usize,
    /// Neighbors for outlier statistics (default: 20).
    pub k_neighbors: usize,
    /// Outlier threshold in standard deviations (default: 2.0).
    pub std_ratio: f64,
    /// Maximum octree depth (default: 9).
    pub octree_depth: usize,
    /// Voxel size; the normal search radius is twice this. Defaults to 1% of
    /// the mesh's bounding-box diagonal.
    pub voxel_size: Option<f64>,
    /// Neighbor cap for normal estimation (default: 30).
    pub normal_max_neighbors: usize,
    /// Fraction of lowest-density vertices trimmed (default: 0.01).
    pub density_quantile: f64,
    /// Seed for surface sampling; unseeded runs are not reproducible.
    pub seed: Option<u64>,
    /// Relative degenerate-triangle area (default: 1e-12).
    pub area_epsilon: f64,
    /// Turn closed components outward during repair (default: true).
    pub orient_outward: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            lambda: 0.5,
            remove_bumps: true,
            target_sample_count: 50_000,
            k_neighbors: 20,
            std_ratio: 2.0,
            octree_depth: 9,
            voxel_size: None,
            normal_max_neighbors: 30,
            density_quantile: 0.01,
            seed: None,
            area_epsilon: 1e-12,
            orient_outward: true,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MeshError::load(path, e.to_string()))?;
        toml::from_str(&content).map_err(|e| MeshError::load(path, e.to_string()))
    }

    /// Write the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| MeshError::save(path, e.to_string()))?;
        std::fs::write(path, content).map_err(|e| MeshError::save(path, e.to_string()))
    }

    /// Set the smoothing iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable reconstruction.
    pub fn with_remove_bumps(mut self, remove_bumps: bool) -> Self {
        self.remove_bumps = remove_bumps;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the sample count.
    pub fn with_target_sample_count(mut self, count: usize) -> Self {
        self.target_sample_count = count;
        self
    }

    /// Set the maximum octree depth.
    pub fn with_octree_depth(mut self, depth: usize) -> Self {
        self.octree_depth = depth;
        self
    }

    /// Check every parameter up front.
    ///
    /// A run checks each stage's parameters when it reaches that stage; this
    /// catches mistakes in a configuration file before any work is done.
    pub fn validate(&self) -> Result<()> {
        self.smooth_options().validate()?;
        self.reconstruct_options().validate()?;
        self.repair_options().validate()?;
        if self.target_sample_count == 0 {
            return Err(MeshError::invalid_param("target_sample_count", 0, "must be positive"));
        }
        if self.k_neighbors == 0 {
            return Err(MeshError::invalid_param("k_neighbors", 0, "must be positive"));
        }
        if !(self.std_ratio > 0.0) {
            return Err(MeshError::invalid_param("std_ratio", self.std_ratio, "must be positive"));
        }
        if self.normal_max_neighbors == 0 {
            return Err(MeshError::invalid_param("normal_max_neighbors", 0, "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.density_quantile) {
            return Err(MeshError::invalid_param(
                "density_quantile",
                self.density_quantile,
                "must be in [0, 1]",
            ));
        }
        if let Some(voxel) = self.voxel_size {
            if !(voxel > 0.0) {
                return Err(MeshError::invalid_param("voxel_size", voxel, "must be positive"));
            }
        }
        Ok(())
    }

    /// Options of the smoothing stage.
    pub fn smooth_options(&self) -> SmoothOptions {
        SmoothOptions::default()
            .with_iterations(self.iterations)
            .with_lambda(self.lambda)
    }

    /// Options of the surface sampling step.
    pub fn sample_options(&self) -> SampleOptions {
        let options = SampleOptions::default().with_count(self.target_sample_count);
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }

    /// Options of the outlier removal step.
    pub fn outlier_options(&self) -> OutlierOptions {
        OutlierOptions::default()
            .with_k_neighbors(self.k_neighbors)
            .with_std_ratio(self.std_ratio)
    }

    /// Options of normal estimation for a mesh with the given bounding-box
    /// diagonal.
    pub fn normal_options(&self, diagonal: f64) -> NormalOptions {
        let voxel = self.voxel_size.unwrap_or(VOXEL_FRACTION * diagonal);
        NormalOptions::default()
            .with_radius(2.0 * voxel)
            .with_max_neighbors(self.normal_max_neighbors)
    }

    /// Options of the resampling stage for a mesh with the given
    /// bounding-box diagonal.
    pub fn resample_options(&self, diagonal: f64) -> ResampleOptions {
        ResampleOptions::default()
            .with_sample(self.sample_options())
            .with_outlier(self.outlier_options())
            .with_normal(self.normal_options(diagonal))
    }

    /// Options of the reconstruction stage.
    pub fn reconstruct_options(&self) -> ReconstructOptions {
        ReconstructOptions::default().with_depth(self.octree_depth)
    }

    /// Options of the repair stage.
    pub fn repair_options(&self) -> RepairOptions {
        RepairOptions::default()
            .with_area_epsilon(self.area_epsilon)
            .with_orient_outward(self.orient_outward)
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Taubin smoothing.
    Smooth,
    /// Sampling, outlier removal and normal estimation.
    Resample,
    /// Surface reconstruction and density trimming.
    Reconstruct,
    /// Cleanup, orientation and diagnostics.
    Repair,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Smooth => "smooth",
            Stage::Resample => "resample",
            Stage::Reconstruct => "reconstruct",
            Stage::Repair => "repair",
        };
        f.write_str(name)
    }
}

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Input accepted, nothing done yet.
    Loaded,
    /// Smoothing finished.
    Smoothed,
    /// Resampling and reconstruction finished.
    Reconstructed,
    /// Repair finished.
    Repaired,
    /// The run completed.
    Done,
    /// The named stage failed.
    Failed(Stage),
}

/// The single error a pipeline run ends with.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct ProcessingError {
    /// The stage that failed.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub source: MeshError,
}

/// Counts from a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Input vertex count.
    pub input_vertices: usize,
    /// Input triangle count.
    pub input_triangles: usize,
    /// Points sampled from the smoothed surface.
    pub sampled_points: Option<usize>,
    /// Points dropped as outliers.
    pub outliers_removed: Option<usize>,
    /// Octree depth the surface was extracted at.
    pub reconstruction_depth: Option<usize>,
    /// Vertices removed by density trimming.
    pub trimmed_vertices: Option<usize>,
    /// What repair changed and the final status.
    pub repair: RepairReport,
    /// Output vertex count.
    pub output_vertices: usize,
    /// Output triangle count.
    pub output_triangles: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Input:  {} vertices, {} triangles",
            self.input_vertices, self.input_triangles
        )?;
        if let (Some(points), Some(outliers)) = (self.sampled_points, self.outliers_removed) {
            writeln!(f, "Sample: {} points, {} outliers removed", points, outliers)?;
        }
        if let (Some(depth), Some(trimmed)) = (self.reconstruction_depth, self.trimmed_vertices) {
            writeln!(f, "Reconstruction: depth {}, {} vertices trimmed", depth, trimmed)?;
        }
        writeln!(
            f,
            "Output: {} vertices, {} triangles",
            self.output_vertices, self.output_triangles
        )?;
        write!(f, "{}", self.repair.status)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The print-ready mesh.
    pub mesh: TriangleMesh,
    /// Counts and diagnostics.
    pub summary: RunSummary,
}

/// Runs the stages in order on one mesh.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    progress: Progress,
    state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress: Progress::none(),
            state: PipelineState::Loaded,
        }
    }

    /// Report progress through `progress`.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State reached by the last run.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run every stage on `mesh`.
    ///
    /// The input is not modified; each stage produces a new mesh.
    pub fn run(&mut self, mesh: &TriangleMesh) -> std::result::Result<PipelineOutput, ProcessingError> {
        self.state = PipelineState::Loaded;
        let result = self.run_stages(mesh);
        if let Err(err) = &result {
            self.state = PipelineState::Failed(err.stage);
            log::error!("{}", err);
        }
        result
    }

    fn run_stages(&mut self, mesh: &TriangleMesh) -> std::result::Result<PipelineOutput, ProcessingError> {
        let config = self.config.clone();
        let steps = if config.remove_bumps { 4 } else { 2 };
        let mut summary = RunSummary {
            input_vertices: mesh.num_vertices(),
            input_triangles: mesh.num_triangles(),
            ..RunSummary::default()
        };

        // Smooth
        let outer = self.progress.clone();
        let smoothing = Progress::new(move |current, total, message| {
            outer.report_sub(current, total, 0, steps, message);
        });
        let mut current = taubin_smooth_with_progress(mesh, &config.smooth_options(), &smoothing)
            .map_err(at(Stage::Smooth))?;
        self.state = PipelineState::Smoothed;
        log::info!("smoothed with {} iterations", config.iterations);

        if config.remove_bumps {
            // Resample
            self.progress.report(1, steps, "Resampling surface");
            let options = config.resample_options(current.bounding_box_diagonal());
            let resampled = resample_and_filter(&current, &options).map_err(at(Stage::Resample))?;
            summary.sampled_points = Some(resampled.sampled);
            summary.outliers_removed = Some(resampled.outliers_removed);

            // Reconstruct
            self.progress.report(2, steps, "Reconstructing surface");
            let reconstruction = reconstruct(&resampled.sample, &config.reconstruct_options())
                .map_err(at(Stage::Reconstruct))?;
            let trimmed = trim_low_density(&reconstruction, config.density_quantile)
                .map_err(at(Stage::Reconstruct))?;
            summary.reconstruction_depth = Some(reconstruction.depth);
            summary.trimmed_vertices = Some(reconstruction.mesh.num_vertices() - trimmed.num_vertices());
            current = trimmed;
            self.state = PipelineState::Reconstructed;
        }

        // Repair
        self.progress.report(steps - 1, steps, "Repairing");
        let (repaired, report) =
            make_print_ready(&current, &config.repair_options()).map_err(at(Stage::Repair))?;
        if repaired.num_triangles() == 0 {
            return Err(ProcessingError {
                stage: Stage::Repair,
                source: MeshError::degenerate(format!(
                    "repair removed all {} triangles",
                    current.num_triangles()
                )),
            });
        }
        self.state = PipelineState::Repaired;

        summary.repair = report;
        summary.output_vertices = repaired.num_vertices();
        summary.output_triangles = repaired.num_triangles();
        self.progress.report(steps, steps, "Done");
        self.state = PipelineState::Done;
        log::info!(
            "pipeline done: {} vertices, {} triangles, watertight: {}",
            summary.output_vertices,
            summary.output_triangles,
            summary.repair.status.is_watertight
        );

        Ok(PipelineOutput {
            mesh: repaired,
            summary,
        })
    }
}

fn at(stage: Stage) -> impl FnOnce(MeshError) -> ProcessingError {
    move |source| ProcessingError { stage, source }
}

/// Smooth, optionally reconstruct, and repair a mesh with default settings.
///
/// Shorthand for a [`Pipeline`] run with the given iteration count and
/// `remove_bumps` flag.
pub fn process(
    mesh: &TriangleMesh,
    iterations: usize,
    remove_bumps: bool,
) -> std::result::Result<TriangleMesh, ProcessingError> {
    let config = PipelineConfig::default()
        .with_iterations(iterations)
        .with_remove_bumps(remove_bumps);
    Pipeline::new(config).run(mesh).map(|output| output.mesh)
}
