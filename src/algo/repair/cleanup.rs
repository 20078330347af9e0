//! Geometry cleanup passes.
//!
//! Each pass edits the mesh in place and returns how many elements it
//! removed. Per-corner UVs, vertex colors and vertex normals follow the
//! triangles and vertices they belong to.

use hashbrown::{HashMap, HashSet};

use crate::mesh::{coincident_representatives, normalize_edge, EdgeKey, TriangleMesh};

/// Remove triangles with a repeated vertex index or an area of at most
/// `area_epsilon` times the squared bounding-box diagonal.
///
/// # Example
///
/// ```
/// use burnish::algo::repair::remove_degenerate_triangles;
/// use burnish::mesh::TriangleMesh;
/// use nalgebra::Point3;
///
/// let mut mesh = TriangleMesh::from_raw(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(2.0, 0.0, 0.0), // collinear
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2], [0, 1, 3], [0, 0, 3]],
/// )
/// .unwrap();
///
/// assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-12), 2);
/// assert_eq!(mesh.triangles(), &[[0, 1, 3]]);
/// ```
pub fn remove_degenerate_triangles(mesh: &mut TriangleMesh, area_epsilon: f64) -> usize {
    let diagonal = mesh.bounding_box_diagonal();
    let min_area = area_epsilon * diagonal * diagonal;

    let keep: Vec<bool> = (0..mesh.num_triangles())
        .map(|t| {
            let [a, b, c] = mesh.triangles()[t];
            a != b && b != c && a != c && mesh.face_area(t) > min_area
        })
        .collect();
    mesh.retain_triangles_by_mask(&keep)
}

/// Remove triangles that use the same three vertices as an earlier triangle,
/// in any order.
///
/// The first occurrence is kept, so of two oppositely wound copies the
/// earlier winding survives.
pub fn remove_duplicate_triangles(mesh: &mut TriangleMesh) -> usize {
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(mesh.num_triangles());
    mesh.retain_triangles(|_, tri| seen.insert(sorted_triangle(tri)))
}

/// Merge vertices with bit-identical positions into their first occurrence.
///
/// Triangles are remapped onto the surviving vertices; the caller is
/// expected to clean up triangles the merge collapsed or duplicated.
pub fn merge_duplicate_vertices(mesh: &mut TriangleMesh) -> usize {
    let representative = coincident_representatives(mesh.positions());
    if representative.iter().enumerate().all(|(v, &r)| r as usize == v) {
        return 0;
    }
    mesh.merge_vertices(&representative)
}

/// Remove vertices that no triangle references.
pub fn remove_unreferenced_vertices(mesh: &mut TriangleMesh) -> usize {
    let mut unreferenced = vec![true; mesh.num_vertices()];
    for tri in mesh.triangles() {
        for &v in tri {
            unreferenced[v as usize] = false;
        }
    }
    if !unreferenced.contains(&true) {
        return 0;
    }
    mesh.remove_vertices_by_mask(&unreferenced)
}

/// Remove triangles until no edge is shared by more than two triangles.
///
/// Triangles are visited in order and a triangle is dropped when any of its
/// edges already has two kept triangles. This is a greedy rule: it keeps the
/// earliest triangles, not the geometrically best ones.
pub fn remove_non_manifold_edges(mesh: &mut TriangleMesh) -> usize {
    let mut edge_use: HashMap<EdgeKey, u8> = HashMap::with_capacity(mesh.num_triangles() * 2);
    let keep: Vec<bool> = mesh
        .triangles()
        .iter()
        .map(|tri| {
            let edges = triangle_edges(tri);
            let full = edges
                .iter()
                .any(|e| edge_use.get(e).copied().unwrap_or(0) >= 2);
            if full {
                return false;
            }
            for e in edges {
                *edge_use.entry(e).or_insert(0) += 1;
            }
            true
        })
        .collect();
    mesh.retain_triangles_by_mask(&keep)
}

fn sorted_triangle(tri: &[u32; 3]) -> [u32; 3] {
    let mut key = *tri;
    key.sort_unstable();
    key
}

fn triangle_edges(tri: &[u32; 3]) -> [EdgeKey; 3] {
    [
        normalize_edge(tri[0], tri[1]),
        normalize_edge(tri[1], tri[2]),
        normalize_edge(tri[2], tri[0]),
    ]
}
