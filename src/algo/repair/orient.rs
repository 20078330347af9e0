//! Consistent triangle winding.

use std::collections::VecDeque;

use crate::mesh::{MeshAdjacency, TriangleMesh};

/// Make adjacent triangles agree on winding, one connected component at a
/// time.
///
/// Each component is walked breadth-first from its lowest-index triangle,
/// which keeps its winding. A triangle is flipped when it traverses a shared
/// edge in the same direction as the neighbor it was reached from. Edges with
/// more than two triangles and non-orientable components are handled
/// greedily. Returns the number of triangles flipped.
pub fn orient_triangles(mesh: &mut TriangleMesh) -> usize {
    let adjacency = MeshAdjacency::new(mesh);
    let mut triangles = mesh.triangles().to_vec();
    let mut flipped = vec![false; triangles.len()];
    let mut fixed = vec![false; triangles.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();

    for seed in 0..triangles.len() {
        if fixed[seed] {
            continue;
        }
        fixed[seed] = true;
        queue.push_back(seed);

        while let Some(t) = queue.pop_front() {
            let tri = triangles[t];
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                let Some(neighbors) = adjacency.triangles_for_edge(a, b) else {
                    continue;
                };
                for &u in neighbors {
                    if fixed[u] {
                        continue;
                    }
                    fixed[u] = true;
                    if has_directed_edge(&triangles[u], a, b) {
                        triangles[u].swap(1, 2);
                        flipped[u] = true;
                    }
                    queue.push_back(u);
                }
            }
        }
    }

    let mut count = 0;
    for (t, &flip) in flipped.iter().enumerate() {
        if flip {
            mesh.flip_triangle(t);
            count += 1;
        }
    }
    count
}

/// Flip every closed component whose signed volume is negative.
///
/// Components with boundary edges have no inside and are left alone.
/// Returns the number of triangles flipped.
pub fn orient_outward(mesh: &mut TriangleMesh) -> usize {
    let adjacency = MeshAdjacency::new(mesh);
    let components = triangle_components(mesh, &adjacency);
    let mut count = 0;

    for component in components {
        let closed = component.iter().all(|&t| {
            let [a, b, c] = mesh.triangles()[t];
            [(a, b), (b, c), (c, a)].iter().all(|&(v, w)| {
                adjacency
                    .triangles_for_edge(v, w)
                    .map_or(false, |faces| faces.len() == 2)
            })
        });
        if !closed {
            continue;
        }

        let volume: f64 = component
            .iter()
            .map(|&t| {
                let [p0, p1, p2] = mesh.triangle_positions(t);
                p0.coords.dot(&p1.coords.cross(&p2.coords)) / 6.0
            })
            .sum();
        if volume < 0.0 {
            for &t in &component {
                mesh.flip_triangle(t);
            }
            count += component.len();
        }
    }
    count
}

/// Edge-connected components of the triangles, each listed in breadth-first
/// order from its lowest-index triangle.
pub(crate) fn triangle_components(mesh: &TriangleMesh, adjacency: &MeshAdjacency) -> Vec<Vec<usize>> {
    let n = mesh.num_triangles();
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut component = vec![start];
        let mut head = 0;
        while head < component.len() {
            let tri = mesh.triangles()[component[head]];
            head += 1;
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                for &u in adjacency.triangles_for_edge(a, b).unwrap_or(&[]) {
                    if !visited[u] {
                        visited[u] = true;
                        component.push(u);
                    }
                }
            }
        }
        components.push(component);
    }
    components
}

fn has_directed_edge(tri: &[u32; 3], a: u32, b: u32) -> bool {
    (0..3).any(|k| tri[k] == a && tri[(k + 1) % 3] == b)
}

/// Whether every edge shared by two triangles is traversed in opposite
/// directions by them.
pub(crate) fn is_consistently_oriented(mesh: &TriangleMesh, adjacency: &MeshAdjacency) -> bool {
    adjacency.edges().all(|((a, b), faces)| {
        if faces.len() != 2 {
            return true;
        }
        let first = has_directed_edge(&mesh.triangles()[faces[0]], a, b);
        let second = has_directed_edge(&mesh.triangles()[faces[1]], a, b);
        first != second
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{cube, icosphere};
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_consistent_mesh_untouched() {
        let mut mesh = icosphere(1.0, 1);
        let before = mesh.clone();
        assert_eq!(orient_triangles(&mut mesh), 0);
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_flipped_triangles_restored() {
        let mut mesh = icosphere(1.0, 1);
        for t in [3, 17, 40, 41] {
            mesh.flip_triangle(t);
        }
        assert!(!is_consistently_oriented(&mesh, &MeshAdjacency::new(&mesh)));

        assert_eq!(orient_triangles(&mut mesh), 4);
        assert!(is_consistently_oriented(&mesh, &MeshAdjacency::new(&mesh)));
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_seed_winding_wins() {
        let mut mesh = cube(Vector3::new(1.0, 1.0, 1.0), true);
        // Flip all but triangle 0: the walk flips them back.
        for t in 1..mesh.num_triangles() {
            mesh.flip_triangle(t);
        }
        assert_eq!(orient_triangles(&mut mesh), 11);
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_outward_fix() {
        let mut mesh = icosphere(1.0, 1);
        for t in 0..mesh.num_triangles() {
            mesh.flip_triangle(t);
        }
        assert_eq!(orient_triangles(&mut mesh), 0);
        assert!(mesh.signed_volume() < 0.0);

        assert_eq!(orient_outward(&mut mesh), mesh.num_triangles());
        assert!(mesh.signed_volume() > 0.0);
        assert_eq!(orient_outward(&mut mesh), 0);
    }

    #[test]
    fn test_components_independent() {
        let a = icosphere(1.0, 0);
        let offset = Vector3::new(5.0, 0.0, 0.0);
        let mut positions: Vec<Point3<f64>> = a.positions().to_vec();
        positions.extend(a.positions().iter().map(|p| p + offset));
        let n = a.num_vertices() as u32;
        let mut triangles = a.triangles().to_vec();
        triangles.extend(a.triangles().iter().map(|t| [t[0] + n, t[2] + n, t[1] + n]));
        let mut mesh = TriangleMesh::from_raw(positions, triangles).unwrap();

        let adjacency = MeshAdjacency::new(&mesh);
        assert_eq!(triangle_components(&mesh, &adjacency).len(), 2);

        // Each component is consistent on its own, so nothing flips.
        assert_eq!(orient_triangles(&mut mesh), 0);
        assert_eq!(orient_outward(&mut mesh), 20);
        assert!(mesh.signed_volume() > 0.0);
    }
}
