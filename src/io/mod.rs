//! Mesh file I/O.
//!
//! This module provides functions for loading and saving meshes in various formats.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Attributes |
//! |--------|-----------|------|------|------------|
//! | glTF | `.gltf`, `.glb` | ✓ | ✓ | normals, colors, texture coordinates |
//! | PLY | `.ply` | ✓ | ✓ (ASCII) | colors |
//! | STL | `.stl` | ✓ | ✓ (binary) | none |
//!
//! # Usage
//!
//! ```no_run
//! use burnish::io::{load, save};
//!
//! let mesh = load("scan.glb").unwrap();
//! save(&mesh, "scan.stl").unwrap();
//! ```
//!
//! Loading fails with [`MeshError::LoadError`] for files that decode to no
//! vertices or no triangles.

pub mod gltf;
pub mod ply;
pub mod stl;

use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// STL (stereolithography) format.
    Stl,
    /// PLY (Stanford polygon) format.
    Ply,
    /// glTF format with an external buffer.
    Gltf,
    /// glTF binary format.
    Glb,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            "gltf" => Some(Format::Gltf),
            "glb" => Some(Format::Glb),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    /// Whether the format stores texture coordinates.
    pub fn keeps_uvs(self) -> bool {
        matches!(self, Format::Gltf | Format::Glb)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("(none)")
        .to_string()
}

/// Load a mesh from a file with automatic format detection.
///
/// The format is determined by the file extension.
///
/// # Example
///
/// ```no_run
/// use burnish::io::load;
///
/// let mesh = load("model.glb").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: extension_of(path),
    })?;

    let mesh = match format {
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
        Format::Gltf | Format::Glb => gltf::load(path),
    }?;
    log::info!(
        "loaded {} ({} vertices, {} triangles)",
        path.display(),
        mesh.num_vertices(),
        mesh.num_triangles()
    );
    Ok(mesh)
}

/// Save a mesh to a file with automatic format detection.
///
/// The format is determined by the file extension. Attributes the format
/// cannot store are dropped.
///
/// # Example
///
/// ```no_run
/// use burnish::io::save;
/// use burnish::mesh::primitives::icosphere;
///
/// save(&icosphere(1.0, 3), "sphere.glb").unwrap();
/// ```
pub fn save<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| {
        MeshError::save(path, format!("unsupported output format: {}", extension_of(path)))
    })?;
    if mesh.has_triangle_uvs() && !format.keeps_uvs() {
        log::warn!("{} cannot store texture coordinates; dropping them", path.display());
    }

    match format {
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
        Format::Gltf => gltf::save_gltf(mesh, path),
        Format::Glb => gltf::save_glb(mesh, path),
    }?;
    log::info!("saved {}", path.display());
    Ok(())
}
