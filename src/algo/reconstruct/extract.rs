//! Iso-surface extraction by marching tetrahedra.
//!
//! Each cell is split into six tetrahedra along its main diagonal (the Kuhn
//! triangulation), which neighboring cells share face for face, so the
//! extracted surface has no cracks. Vertices on grid edges are shared through
//! a map keyed by the edge's end nodes.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

use super::octree::CellKey;
use super::poisson::IndicatorField;

/// Corner paths `0 -> e_a -> e_a + e_b -> 7`; bit 0 is x, bit 1 y, bit 2 z.
const KUHN: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

type EdgeKey = (CellKey, CellKey);

struct Extractor<'a> {
    field: &'a IndicatorField,
    iso: f64,
    positions: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
    edge_vertices: HashMap<EdgeKey, u32>,
}

/// Extract the `iso` level set of the field over the given finest-level cells.
///
/// Triangles are wound so their normals point from the region below `iso`
/// towards the region above it.
pub(super) fn extract(
    field: &IndicatorField,
    cells: &[CellKey],
    iso: f64,
) -> (Vec<Point3<f64>>, Vec<[u32; 3]>) {
    let mut extractor = Extractor {
        field,
        iso,
        positions: Vec::new(),
        triangles: Vec::new(),
        edge_vertices: HashMap::new(),
    };
    let mut values: HashMap<CellKey, f64> = HashMap::with_capacity(cells.len() * 2);

    for cell in cells {
        let mut nodes = [[0u32; 3]; 8];
        let mut corner_values = [0.0f64; 8];
        for (bits, (node, value)) in nodes.iter_mut().zip(corner_values.iter_mut()).enumerate() {
            let bits = bits as u32;
            *node = [
                cell[0] + (bits & 1),
                cell[1] + (bits >> 1 & 1),
                cell[2] + (bits >> 2 & 1),
            ];
            *value = *values
                .entry(*node)
                .or_insert_with(|| field.node_value(node));
        }

        let inside = corner_values.map(|v| v < iso);
        if inside.iter().all(|&b| b) || inside.iter().all(|&b| !b) {
            continue;
        }

        for tet in &KUHN {
            let tet_nodes = tet.map(|c| nodes[c]);
            let tet_values = tet.map(|c| corner_values[c]);
            extractor.polygonize(&tet_nodes, &tet_values);
        }
    }

    log::debug!(
        "extracted {} vertices and {} triangles from {} cells",
        extractor.positions.len(),
        extractor.triangles.len(),
        cells.len()
    );
    (extractor.positions, extractor.triangles)
}

impl Extractor<'_> {
    fn polygonize(&mut self, nodes: &[CellKey; 4], values: &[f64; 4]) {
        let (inside, outside): (Vec<usize>, Vec<usize>) = (0..4).partition(|&i| values[i] < self.iso);

        let direction = centroid(self.field, nodes, &outside) - centroid(self.field, nodes, &inside);

        match inside.len() {
            1 | 3 => {
                let (lone, others) = if inside.len() == 1 {
                    (inside[0], &outside)
                } else {
                    (outside[0], &inside)
                };
                let tri = [
                    self.edge_vertex(nodes, values, lone, others[0]),
                    self.edge_vertex(nodes, values, lone, others[1]),
                    self.edge_vertex(nodes, values, lone, others[2]),
                ];
                self.push_oriented(tri, &direction);
            }
            2 => {
                let (a, b) = (inside[0], inside[1]);
                let (c, d) = (outside[0], outside[1]);
                let ac = self.edge_vertex(nodes, values, a, c);
                let ad = self.edge_vertex(nodes, values, a, d);
                let bd = self.edge_vertex(nodes, values, b, d);
                let bc = self.edge_vertex(nodes, values, b, c);
                self.push_oriented([ac, ad, bd], &direction);
                self.push_oriented([ac, bd, bc], &direction);
            }
            _ => {}
        }
    }

    fn edge_vertex(&mut self, nodes: &[CellKey; 4], values: &[f64; 4], i: usize, j: usize) -> u32 {
        let (a, b, va, vb) = if nodes[i] < nodes[j] {
            (nodes[i], nodes[j], values[i], values[j])
        } else {
            (nodes[j], nodes[i], values[j], values[i])
        };

        if let Some(&v) = self.edge_vertices.get(&(a, b)) {
            return v;
        }

        let t = ((self.iso - va) / (vb - va)).clamp(0.0, 1.0);
        let pa = self.field.node_position(&a);
        let pb = self.field.node_position(&b);
        self.positions.push(pa + (pb - pa) * t);
        let index = (self.positions.len() - 1) as u32;
        self.edge_vertices.insert((a, b), index);
        index
    }

    fn push_oriented(&mut self, tri: [u32; 3], direction: &Vector3<f64>) {
        let [p0, p1, p2] = tri.map(|v| self.positions[v as usize]);
        let normal = (p1 - p0).cross(&(p2 - p0));
        if normal.dot(direction) < 0.0 {
            self.triangles.push([tri[0], tri[2], tri[1]]);
        } else {
            self.triangles.push(tri);
        }
    }
}

fn centroid(field: &IndicatorField, nodes: &[CellKey; 4], which: &[usize]) -> Vector3<f64> {
    let sum: Vector3<f64> = which
        .iter()
        .map(|&i| field.node_position(&nodes[i]).coords)
        .sum();
    sum / which.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kuhn_tets_cover_cube() {
        // Six tetrahedra of volume 1/6 each.
        let corner = |c: usize| Vector3::new((c & 1) as f64, (c >> 1 & 1) as f64, (c >> 2 & 1) as f64);
        let total: f64 = KUHN
            .iter()
            .map(|t| {
                let [a, b, c, d] = t.map(corner);
                ((b - a).cross(&(c - a))).dot(&(d - a)).abs() / 6.0
            })
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kuhn_paths_are_monotone() {
        for tet in &KUHN {
            for w in tet.windows(2) {
                assert_eq!(w[1] & w[0], w[0], "each step adds one axis");
                assert_eq!((w[1] ^ w[0]).count_ones(), 1);
            }
        }
    }
}
