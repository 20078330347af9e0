//! Manufacturability diagnostics.

use std::fmt;

use serde::Serialize;

use crate::mesh::{MeshAdjacency, TriangleMesh};

use super::orient::is_consistently_oriented;

/// Topology report of a mesh.
///
/// Diagnostics only: nothing here changes the mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshStatus {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of triangles.
    pub triangle_count: usize,
    /// Number of distinct edges.
    pub edge_count: usize,
    /// Edges with a single adjacent triangle.
    pub boundary_edge_count: usize,
    /// Edges with more than two adjacent triangles.
    pub non_manifold_edge_count: usize,
    /// Vertices whose triangle fan falls apart into several pieces.
    pub non_manifold_vertex_count: usize,

    /// Every edge has exactly two adjacent triangles.
    pub is_watertight: bool,
    /// No edge has more than two adjacent triangles.
    pub is_edge_manifold: bool,
    /// Every vertex has a single connected triangle fan.
    pub is_vertex_manifold: bool,
    /// Triangles sharing an edge traverse it in opposite directions.
    pub is_oriented: bool,
}

impl MeshStatus {
    /// Watertight, manifold and consistently oriented.
    pub fn is_printable(&self) -> bool {
        self.is_watertight && self.is_edge_manifold && self.is_vertex_manifold && self.is_oriented
    }
}

impl fmt::Display for MeshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(
            f,
            "{} vertices, {} triangles, {} edges",
            self.vertex_count, self.triangle_count, self.edge_count
        )?;
        writeln!(f, "  watertight:      {}", yes_no(self.is_watertight))?;
        writeln!(f, "  edge manifold:   {}", yes_no(self.is_edge_manifold))?;
        writeln!(f, "  vertex manifold: {}", yes_no(self.is_vertex_manifold))?;
        write!(f, "  oriented:        {}", yes_no(self.is_oriented))?;
        if self.boundary_edge_count > 0 {
            write!(f, "\n  boundary edges:  {}", self.boundary_edge_count)?;
        }
        if self.non_manifold_edge_count > 0 {
            write!(f, "\n  non-manifold edges: {}", self.non_manifold_edge_count)?;
        }
        if self.non_manifold_vertex_count > 0 {
            write!(f, "\n  non-manifold vertices: {}", self.non_manifold_vertex_count)?;
        }
        Ok(())
    }
}

/// Evaluate watertightness, manifoldness and orientation.
///
/// # Example
///
/// ```
/// use burnish::algo::repair::mesh_status;
/// use burnish::mesh::primitives::icosphere;
///
/// let status = mesh_status(&icosphere(1.0, 2));
/// assert!(status.is_watertight);
/// assert!(status.is_printable());
/// ```
pub fn mesh_status(mesh: &TriangleMesh) -> MeshStatus {
    let adjacency = MeshAdjacency::new(mesh);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();
    let non_manifold_vertex_count = (0..mesh.num_vertices())
        .filter(|&v| !fan_is_connected(mesh, &adjacency, v))
        .count();
    let has_triangles = mesh.num_triangles() > 0;

    MeshStatus {
        vertex_count: mesh.num_vertices(),
        triangle_count: mesh.num_triangles(),
        edge_count: adjacency.edge_count(),
        boundary_edge_count,
        non_manifold_edge_count,
        non_manifold_vertex_count,
        is_watertight: has_triangles && boundary_edge_count == 0 && non_manifold_edge_count == 0,
        is_edge_manifold: non_manifold_edge_count == 0,
        is_vertex_manifold: non_manifold_vertex_count == 0,
        is_oriented: is_consistently_oriented(mesh, &adjacency),
    }
}

/// Whether the triangles around `v` connect through edges incident to `v`.
fn fan_is_connected(mesh: &TriangleMesh, adjacency: &MeshAdjacency, v: usize) -> bool {
    let fan = adjacency.triangles_for_vertex(v);
    if fan.len() <= 1 {
        return true;
    }

    let mut reached = vec![false; fan.len()];
    let mut stack = vec![0usize];
    reached[0] = true;
    let center = v as u32;

    while let Some(i) = stack.pop() {
        for &w in &mesh.triangles()[fan[i]] {
            if w == center {
                continue;
            }
            for &u in adjacency.triangles_for_edge(center, w).unwrap_or(&[]) {
                if let Some(j) = fan.iter().position(|&f| f == u) {
                    if !reached[j] {
                        reached[j] = true;
                        stack.push(j);
                    }
                }
            }
        }
    }
    reached.iter().all(|&r| r)
}
