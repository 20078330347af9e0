//! Mesh adjacency data structures.
//!
//! Face-vertex meshes carry no connectivity, so algorithms that walk the
//! surface build a [`MeshAdjacency`] once and query it. Unlike a half-edge
//! structure it tolerates non-manifold input, which is what repair needs.

use hashbrown::HashMap;

use super::triangle_mesh::TriangleMesh;

/// Undirected edge key with `v0 < v1`.
pub type EdgeKey = (u32, u32);

/// Adjacency information for a triangle mesh.
///
/// Provides lookups for:
/// - Triangles adjacent to an edge
/// - Triangles adjacent to a vertex
/// - One-ring vertex neighbors
/// - Boundary edges (one adjacent triangle) and non-manifold edges (more
///   than two adjacent triangles)
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    edge_to_triangles: HashMap<EdgeKey, Vec<usize>>,
    vertex_to_triangles: Vec<Vec<usize>>,
    neighbors: Vec<Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency for a mesh.
    pub fn new(mesh: &TriangleMesh) -> Self {
        Self::build(mesh.triangles(), mesh.num_vertices())
    }

    /// Build adjacency from raw triangles over `num_vertices` vertices.
    ///
    /// Repeated indices inside a triangle do not produce self-edges.
    ///
    /// # Example
    ///
    /// ```
    /// use burnish::mesh::MeshAdjacency;
    ///
    /// let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 3, 2]], 4);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert_eq!(adj.neighbors(1), &[0, 2, 3]);
    /// ```
    pub fn build(triangles: &[[u32; 3]], num_vertices: usize) -> Self {
        let mut edge_to_triangles: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        let mut vertex_to_triangles = vec![Vec::new(); num_vertices];
        let mut neighbors = vec![Vec::new(); num_vertices];

        for (t, tri) in triangles.iter().enumerate() {
            for (k, &v) in tri.iter().enumerate() {
                let list = &mut vertex_to_triangles[v as usize];
                if list.last() != Some(&t) {
                    list.push(t);
                }

                let w = tri[(k + 1) % 3];
                if v == w {
                    continue;
                }
                let edge = normalize_edge(v, w);
                let faces = edge_to_triangles.entry(edge).or_default();
                if faces.last() != Some(&t) {
                    faces.push(t);
                }
                neighbors[v as usize].push(w);
                neighbors[w as usize].push(v);
            }
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            edge_to_triangles,
            vertex_to_triangles,
            neighbors,
        }
    }

    /// Triangles adjacent to an edge, or `None` if the edge does not exist.
    pub fn triangles_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_triangles
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Triangles incident to a vertex.
    #[inline]
    pub fn triangles_for_vertex(&self, v: usize) -> &[usize] {
        &self.vertex_to_triangles[v]
    }

    /// Sorted one-ring neighbors of a vertex.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[u32] {
        &self.neighbors[v]
    }

    /// Iterate over all edges with their adjacent triangles.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &[usize])> + '_ {
        self.edge_to_triangles
            .iter()
            .map(|(&edge, faces)| (edge, faces.as_slice()))
    }

    /// Iterate over boundary edges.
    pub fn boundary_edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(edge, _)| edge)
    }

    /// Number of boundary edges.
    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    /// Number of edges shared by more than two triangles.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edges().filter(|(_, faces)| faces.len() > 2).count()
    }

    /// Flags for vertices lying on a boundary edge.
    pub fn boundary_vertices(&self) -> Vec<bool> {
        let mut flags = vec![false; self.neighbors.len()];
        for (a, b) in self.boundary_edges() {
            flags[a as usize] = true;
            flags[b as usize] = true;
        }
        flags
    }

    /// Total number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edge_to_triangles.len()
    }
}

/// Normalize edge direction so v0 < v1.
#[inline]
pub fn normalize_edge(v0: u32, v1: u32) -> EdgeKey {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_triangle() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]], 3);
        assert_eq!(adj.edge_count(), 3);
        assert_eq!(adj.boundary_edge_count(), 3);
        assert_eq!(adj.boundary_vertices(), vec![true; 3]);
    }

    #[test]
    fn test_shared_edge() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 3, 2]], 4);
        assert_eq!(adj.triangles_for_edge(2, 1), Some(&[0usize, 1][..]));
        assert_eq!(adj.triangles_for_edge(0, 1).map(<[usize]>::len), Some(1));
        assert!(adj.triangles_for_edge(0, 3).is_none());
        assert_eq!(adj.triangles_for_vertex(2), &[0, 1]);
    }

    #[test]
    fn test_non_manifold_edge() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [0, 1, 3], [0, 1, 4]], 5);
        assert_eq!(adj.non_manifold_edge_count(), 1);
        assert_eq!(adj.neighbors(0), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_repeated_index_has_no_self_edge() {
        let adj = MeshAdjacency::build(&[[0, 0, 1]], 2);
        assert_eq!(adj.edge_count(), 1);
        assert_eq!(adj.neighbors(0), &[1]);
        assert_eq!(adj.triangles_for_vertex(0), &[0]);
    }

    #[test]
    fn test_isolated_vertex() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]], 4);
        assert!(adj.neighbors(3).is_empty());
        assert!(adj.triangles_for_vertex(3).is_empty());
    }
}
