//! Mesh construction utilities.
//!
//! This module provides functions for building triangle meshes from
//! face-vertex lists as commonly found in mesh file formats, and for
//! converting back.

use nalgebra::Point3;

use super::triangle_mesh::TriangleMesh;
use crate::error::{MeshError, Result};

/// Build a triangle mesh from vertices and triangle faces.
///
/// Degenerate or duplicated faces are accepted as-is; cleaning them up is the
/// job of [`crate::algo::repair`].
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Example
/// ```
/// use burnish::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
pub fn build_from_triangles(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<TriangleMesh> {
    let mut triangles = Vec::with_capacity(faces.len());
    for (fi, face) in faces.iter().enumerate() {
        triangles.push(to_u32_triangle(fi, face, vertices.len())?);
    }
    TriangleMesh::from_raw(vertices.to_vec(), triangles)
}

/// Build a triangle mesh from polygons of any size by fan triangulation.
///
/// Polygons with fewer than three vertices are skipped.
pub fn build_from_polygons(vertices: &[Point3<f64>], faces: &[Vec<usize>]) -> Result<TriangleMesh> {
    let mut triangles = Vec::with_capacity(faces.len());
    for (fi, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            continue;
        }
        for i in 1..face.len() - 1 {
            triangles.push(to_u32_triangle(fi, &[face[0], face[i], face[i + 1]], vertices.len())?);
        }
    }
    TriangleMesh::from_raw(vertices.to_vec(), triangles)
}

/// Convert a triangle mesh back to a face-vertex representation.
///
/// Returns (vertices, faces) tuple.
pub fn to_face_vertex(mesh: &TriangleMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices = mesh.positions().to_vec();
    let faces = (0..mesh.num_triangles()).map(|t| mesh.triangle(t)).collect();
    (vertices, faces)
}

fn to_u32_triangle(fi: usize, face: &[usize; 3], num_vertices: usize) -> Result<[u32; 3]> {
    let mut tri = [0u32; 3];
    for (slot, &vi) in tri.iter_mut().zip(face) {
        if vi >= num_vertices || vi > u32::MAX as usize {
            return Err(MeshError::InvalidVertexIndex {
                triangle: fi,
                vertex: vi,
            });
        }
        *slot = vi as u32;
    }
    Ok(tri)
}
