//! # Burnish
//!
//! Smoothing, de-noising and print preparation for triangle meshes.
//!
//! Burnish takes a scanned or generated mesh and turns it into something a
//! slicer will accept: Taubin smoothing without shrinkage, optional
//! resampling and implicit-surface reconstruction to wash out bumps, then
//! cleanup, orientation and a watertightness report.
//!
//! ## Features
//!
//! - **Face-vertex meshes**: flat arrays with optional per-corner texture
//!   coordinates, per-vertex colors and normals kept in sync by every edit
//! - **Smoothing**: Taubin λ|μ smoothing, parallel with rayon
//! - **Resampling**: area-weighted sampling, statistical outlier removal,
//!   PCA normals with minimum-spanning-tree orientation
//! - **Reconstruction**: adaptive octree Poisson solve with density trimming
//! - **Repair**: degenerate, duplicate and non-manifold cleanup, consistent
//!   winding, manifold diagnostics
//! - **File formats**: glTF/GLB, PLY, STL
//!
//! ## Quick Start
//!
//! ```no_run
//! use burnish::prelude::*;
//!
//! let mesh = burnish::io::load("scan.glb").unwrap();
//! let config = PipelineConfig::default().with_iterations(10);
//! let output = Pipeline::new(config).run(&mesh).unwrap();
//!
//! println!("{}", output.summary);
//! burnish::io::save(&output.mesh, "scan_print.glb").unwrap();
//! ```
//!
//! ## Using the stages directly
//!
//! ```
//! use burnish::prelude::*;
//! use burnish::mesh::primitives::icosphere;
//!
//! let mesh = icosphere(1.0, 2);
//! let smoothed = taubin_smooth(&mesh, &SmoothOptions::default()).unwrap();
//! let (ready, report) = make_print_ready(&smoothed, &RepairOptions::default()).unwrap();
//!
//! assert!(report.status.is_watertight);
//! assert_eq!(ready.num_triangles(), mesh.num_triangles());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;
pub mod pipeline;
pub mod points;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use burnish::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::repair::{make_print_ready, mesh_status, MeshStatus, RepairOptions};
    pub use crate::algo::smooth::{taubin_smooth, SmoothOptions};
    pub use crate::algo::Progress;
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{build_from_triangles, to_face_vertex, MeshAdjacency, TriangleMesh};
    pub use crate::pipeline::{process, Pipeline, PipelineConfig, ProcessingError, Stage};
    pub use crate::points::PointSample;
}

// Re-export nalgebra types for convenience
pub use nalgebra;
