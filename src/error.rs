//! Error types for burnish.
//!
//! This module defines the error type shared by every mesh operation. The
//! pipeline wraps it in [`crate::pipeline::ProcessingError`] to identify the
//! stage that failed.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// A triangle references an invalid vertex index.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// An attribute array is not aligned with its parent array.
    #[error("{attribute} has {actual} entries, expected {expected}")]
    AttributeMismatch {
        /// Name of the attribute array.
        attribute: &'static str,
        /// Required length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Not enough points for the requested operation.
    #[error("operation requires at least {required} points, got {actual}")]
    InsufficientPoints {
        /// Minimum number of points.
        required: usize,
        /// Points available.
        actual: usize,
    },

    /// The point sample carries no normals.
    #[error("point sample has no normals")]
    MissingNormals,

    /// An operation produced an empty or degenerate result.
    #[error("degenerate result: {details}")]
    DegenerateResult {
        /// Description of what degenerated.
        details: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a degenerate result error.
    pub fn degenerate(details: impl Into<String>) -> Self {
        MeshError::DegenerateResult {
            details: details.into(),
        }
    }

    /// Create a load error for `path`.
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MeshError::LoadError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a save error for `path`.
    pub fn save(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MeshError::SaveError {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_message() {
        let err = MeshError::invalid_param("lambda", 1.5, "must be in (0, 1)");
        assert_eq!(
            err.to_string(),
            "invalid parameter: lambda = 1.5 (must be in (0, 1))"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MeshError = io.into();
        assert!(matches!(err, MeshError::Io(_)));
    }
}
