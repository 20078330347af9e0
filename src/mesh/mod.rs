//! Core mesh data structures.
//!
//! This module provides the face-vertex triangle mesh used by every stage of
//! the pipeline, along with adjacency queries and construction helpers.
//!
//! # Overview
//!
//! The primary type is [`TriangleMesh`]: flat position and triangle arrays
//! plus optional per-corner texture coordinates, per-vertex colors and
//! per-vertex normals. Connectivity is derived on demand through
//! [`MeshAdjacency`], which tolerates the non-manifold input that repair has
//! to deal with.
//!
//! # Construction
//!
//! ```
//! use burnish::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_triangles(), 1);
//! ```

mod adjacency;
mod builder;
pub mod primitives;
mod triangle_mesh;

pub use adjacency::{normalize_edge, EdgeKey, MeshAdjacency};
pub use builder::{build_from_polygons, build_from_triangles, to_face_vertex};
pub use triangle_mesh::{bounding_box, TriangleMesh};

pub(crate) use triangle_mesh::{coincident_representatives, position_key};
