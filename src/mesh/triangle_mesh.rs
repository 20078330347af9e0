//! Face-vertex triangle mesh with optional attributes.
//!
//! [`TriangleMesh`] stores vertex positions and triangles as flat arrays, plus
//! three optional attribute arrays:
//!
//! - per-triangle-corner texture coordinates (`3 * num_triangles` entries,
//!   corner `k` of triangle `t` lives at `3 * t + k`)
//! - per-vertex RGB colors (`num_vertices` entries)
//! - per-vertex normals (`num_vertices` entries, always recomputable)
//!
//! Attribute arrays are private and every operation that removes or reorders
//! vertices or triangles updates them in the same call, so they can never go
//! stale relative to their parent array.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector2, Vector3};

use crate::error::{MeshError, Result};

/// A triangle mesh in face-vertex form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    positions: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
    triangle_uvs: Option<Vec<Vector2<f64>>>,
    vertex_colors: Option<Vec<Vector3<f64>>>,
    vertex_normals: Option<Vec<Vector3<f64>>>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from positions and triangles.
    ///
    /// Every triangle index must be smaller than the number of positions.
    ///
    /// # Example
    ///
    /// ```
    /// use burnish::mesh::TriangleMesh;
    /// use nalgebra::Point3;
    ///
    /// let mesh = TriangleMesh::from_raw(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(1.0, 0.0, 0.0),
    ///         Point3::new(0.0, 1.0, 0.0),
    ///     ],
    ///     vec![[0, 1, 2]],
    /// )
    /// .unwrap();
    /// assert_eq!(mesh.num_triangles(), 1);
    /// ```
    pub fn from_raw(positions: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        for (ti, tri) in triangles.iter().enumerate() {
            for &vi in tri {
                if vi as usize >= positions.len() {
                    return Err(MeshError::InvalidVertexIndex {
                        triangle: ti,
                        vertex: vi as usize,
                    });
                }
            }
        }

        Ok(Self {
            positions,
            triangles,
            triangle_uvs: None,
            vertex_colors: None,
            vertex_normals: None,
        })
    }

    /// Attach per-triangle-corner texture coordinates.
    pub fn with_triangle_uvs(mut self, uvs: Vec<Vector2<f64>>) -> Result<Self> {
        check_len("triangle_uvs", 3 * self.triangles.len(), uvs.len())?;
        self.triangle_uvs = Some(uvs);
        Ok(self)
    }

    /// Attach per-vertex colors.
    pub fn with_vertex_colors(mut self, colors: Vec<Vector3<f64>>) -> Result<Self> {
        check_len("vertex_colors", self.positions.len(), colors.len())?;
        self.vertex_colors = Some(colors);
        Ok(self)
    }

    /// Attach per-vertex normals.
    pub fn with_vertex_normals(mut self, normals: Vec<Vector3<f64>>) -> Result<Self> {
        check_len("vertex_normals", self.positions.len(), normals.len())?;
        self.vertex_normals = Some(normals);
        Ok(self)
    }

    // ==================== Queries ====================

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Returns true if the mesh has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Position of vertex `v`.
    #[inline]
    pub fn position(&self, v: usize) -> &Point3<f64> {
        &self.positions[v]
    }

    /// All triangles.
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Vertex indices of triangle `t`.
    #[inline]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        let [a, b, c] = self.triangles[t];
        [a as usize, b as usize, c as usize]
    }

    /// Per-corner texture coordinates, if present.
    pub fn triangle_uvs(&self) -> Option<&[Vector2<f64>]> {
        self.triangle_uvs.as_deref()
    }

    /// Per-vertex colors, if present.
    pub fn vertex_colors(&self) -> Option<&[Vector3<f64>]> {
        self.vertex_colors.as_deref()
    }

    /// Per-vertex normals, if present.
    pub fn vertex_normals(&self) -> Option<&[Vector3<f64>]> {
        self.vertex_normals.as_deref()
    }

    /// Whether per-corner texture coordinates are present.
    pub fn has_triangle_uvs(&self) -> bool {
        self.triangle_uvs.is_some()
    }

    /// Whether per-vertex colors are present.
    pub fn has_vertex_colors(&self) -> bool {
        self.vertex_colors.is_some()
    }

    /// Whether per-vertex normals are present.
    pub fn has_vertex_normals(&self) -> bool {
        self.vertex_normals.is_some()
    }

    /// Corner positions of triangle `t`.
    #[inline]
    pub fn triangle_positions(&self, t: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangle(t);
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    /// Unit normal of triangle `t` (zero for degenerate triangles).
    pub fn face_normal(&self, t: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_positions(t);
        (p1 - p0)
            .cross(&(p2 - p0))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Area of triangle `t`.
    pub fn face_area(&self, t: usize) -> f64 {
        let [p0, p1, p2] = self.triangle_positions(t);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        (0..self.num_triangles()).map(|t| self.face_area(t)).sum()
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(&self.positions)
    }

    /// Length of the bounding-box diagonal (zero for an empty mesh).
    pub fn bounding_box_diagonal(&self) -> f64 {
        self.bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Signed volume enclosed by the triangles (positive for outward winding).
    pub fn signed_volume(&self) -> f64 {
        (0..self.num_triangles())
            .map(|t| {
                let [p0, p1, p2] = self.triangle_positions(t);
                p0.coords.dot(&p1.coords.cross(&p2.coords)) / 6.0
            })
            .sum()
    }

    // ==================== Geometry updates ====================

    /// Replace all vertex positions, keeping topology and attributes.
    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<()> {
        check_len("positions", self.positions.len(), positions.len())?;
        self.positions = positions;
        Ok(())
    }

    /// Recompute area-weighted per-vertex normals from the current geometry.
    ///
    /// Vertices without incident triangles get a zero normal.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.positions.len()];
        for t in 0..self.triangles.len() {
            let [p0, p1, p2] = self.triangle_positions(t);
            let weighted = (p1 - p0).cross(&(p2 - p0));
            for v in self.triangle(t) {
                normals[v] += weighted;
            }
        }
        for n in &mut normals {
            *n = n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
        }
        self.vertex_normals = Some(normals);
    }

    /// Drop the per-corner texture coordinates.
    pub fn clear_triangle_uvs(&mut self) {
        self.triangle_uvs = None;
    }

    /// Drop the per-vertex colors.
    pub fn clear_vertex_colors(&mut self) {
        self.vertex_colors = None;
    }

    /// Drop the per-vertex normals.
    pub fn clear_vertex_normals(&mut self) {
        self.vertex_normals = None;
    }

    // ==================== Topology updates ====================

    /// Keep only the triangles for which `keep` returns true.
    ///
    /// Texture coordinates of removed triangles are removed with them.
    /// Returns the number of triangles removed.
    pub fn retain_triangles<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize, &[u32; 3]) -> bool,
    {
        let mask: Vec<bool> = self
            .triangles
            .iter()
            .enumerate()
            .map(|(t, tri)| keep(t, tri))
            .collect();
        self.retain_triangles_by_mask(&mask)
    }

    /// Keep only triangles whose entry in `mask` is true.
    pub(crate) fn retain_triangles_by_mask(&mut self, mask: &[bool]) -> usize {
        debug_assert_eq!(mask.len(), self.triangles.len());
        let original = self.triangles.len();

        if let Some(uvs) = &mut self.triangle_uvs {
            let mut kept = Vec::with_capacity(uvs.len());
            for (t, &keep) in mask.iter().enumerate() {
                if keep {
                    kept.extend_from_slice(&uvs[3 * t..3 * t + 3]);
                }
            }
            *uvs = kept;
        }

        let mut idx = 0;
        self.triangles.retain(|_| {
            let keep = mask[idx];
            idx += 1;
            keep
        });

        original - self.triangles.len()
    }

    /// Reverse the winding of triangle `t`.
    pub fn flip_triangle(&mut self, t: usize) {
        self.triangles[t].swap(1, 2);
        if let Some(uvs) = &mut self.triangle_uvs {
            uvs.swap(3 * t + 1, 3 * t + 2);
        }
    }

    /// Merge vertices onto representatives.
    ///
    /// `representative[v]` names the vertex that `v` is merged into and must
    /// satisfy `representative[v] <= v` with `representative[r] == r` for every
    /// representative `r`. Representatives keep their own attributes. Returns
    /// the number of vertices removed.
    pub fn merge_vertices(&mut self, representative: &[u32]) -> usize {
        debug_assert_eq!(representative.len(), self.positions.len());
        let keep: Vec<bool> = representative
            .iter()
            .enumerate()
            .map(|(v, &r)| r as usize == v)
            .collect();
        let remap = self.compact_vertices(&keep);

        for tri in &mut self.triangles {
            for v in tri.iter_mut() {
                let rep = representative[*v as usize] as usize;
                *v = remap[rep].unwrap_or(0);
            }
        }

        keep.iter().filter(|&&k| !k).count()
    }

    /// Remove the vertices flagged in `remove` and every triangle touching them.
    ///
    /// Returns the number of vertices removed.
    ///
    /// # Example
    ///
    /// ```
    /// use burnish::mesh::TriangleMesh;
    /// use nalgebra::Point3;
    ///
    /// let mut mesh = TriangleMesh::from_raw(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(1.0, 0.0, 0.0),
    ///         Point3::new(0.0, 1.0, 0.0),
    ///         Point3::new(1.0, 1.0, 0.0),
    ///     ],
    ///     vec![[0, 1, 2], [1, 3, 2]],
    /// )
    /// .unwrap();
    ///
    /// mesh.remove_vertices_by_mask(&[true, false, false, false]);
    /// assert_eq!(mesh.num_vertices(), 3);
    /// assert_eq!(mesh.triangles(), &[[0, 2, 1]]);
    /// ```
    pub fn remove_vertices_by_mask(&mut self, remove: &[bool]) -> usize {
        debug_assert_eq!(remove.len(), self.positions.len());
        let triangle_mask: Vec<bool> = self
            .triangles
            .iter()
            .map(|tri| tri.iter().all(|&v| !remove[v as usize]))
            .collect();
        self.retain_triangles_by_mask(&triangle_mask);

        let keep: Vec<bool> = remove.iter().map(|&r| !r).collect();
        let remap = self.compact_vertices(&keep);
        for tri in &mut self.triangles {
            for v in tri.iter_mut() {
                *v = remap[*v as usize].unwrap_or(0);
            }
        }

        remove.iter().filter(|&&r| r).count()
    }

    /// Drop vertices not flagged in `keep` from every per-vertex array.
    ///
    /// Returns the old-to-new index map. Triangles are left for the caller
    /// to remap.
    fn compact_vertices(&mut self, keep: &[bool]) -> Vec<Option<u32>> {
        let mut remap = vec![None; keep.len()];
        let mut next = 0u32;
        for (v, &k) in keep.iter().enumerate() {
            if k {
                remap[v] = Some(next);
                next += 1;
            }
        }

        retain_by_mask(&mut self.positions, keep);
        if let Some(colors) = &mut self.vertex_colors {
            retain_by_mask(colors, keep);
        }
        if let Some(normals) = &mut self.vertex_normals {
            retain_by_mask(normals, keep);
        }

        remap
    }
}

/// Bounding box of a set of points.
pub fn bounding_box(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in points {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    Some((min, max))
}

/// Hash key of a position, equal for bit-identical coordinates.
///
/// Negative zero is folded onto positive zero.
pub(crate) fn position_key(p: &Point3<f64>) -> [u64; 3] {
    let bits = |x: f64| if x == 0.0 { 0.0f64.to_bits() } else { x.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Map every position to the first earlier position with identical coordinates.
pub(crate) fn coincident_representatives(positions: &[Point3<f64>]) -> Vec<u32> {
    let mut first_seen: HashMap<[u64; 3], u32> = HashMap::with_capacity(positions.len());
    positions
        .iter()
        .enumerate()
        .map(|(v, p)| *first_seen.entry(position_key(p)).or_insert(v as u32))
        .collect()
}

fn retain_by_mask<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    items.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

fn check_len(attribute: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MeshError::AttributeMismatch {
            attribute,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad_with_attributes() -> TriangleMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let triangles = vec![[0, 1, 2], [1, 3, 2]];
        let uvs = (0..6).map(|i| Vector2::new(i as f64, 0.0)).collect();
        let colors = (0..4).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
        TriangleMesh::from_raw(positions, triangles)
            .unwrap()
            .with_triangle_uvs(uvs)
            .unwrap()
            .with_vertex_colors(colors)
            .unwrap()
    }

    #[test]
    fn test_from_raw_rejects_bad_index() {
        let result = TriangleMesh::from_raw(vec![Point3::origin()], vec![[0, 0, 1]]);
        assert!(matches!(
            result,
            Err(MeshError::InvalidVertexIndex { triangle: 0, vertex: 1 })
        ));
    }

    #[test]
    fn test_attribute_length_checked() {
        let mesh = quad_with_attributes();
        let result = mesh.with_vertex_colors(vec![Vector3::zeros(); 3]);
        assert!(matches!(result, Err(MeshError::AttributeMismatch { .. })));
    }

    #[test]
    fn test_area_and_normal() {
        let mesh = quad_with_attributes();
        assert_relative_eq!(mesh.surface_area(), 1.0);
        assert_relative_eq!(mesh.face_normal(0), Vector3::z());
    }

    #[test]
    fn test_retain_triangles_keeps_uvs_aligned() {
        let mut mesh = quad_with_attributes();
        let removed = mesh.retain_triangles(|t, _| t == 1);
        assert_eq!(removed, 1);
        assert_eq!(mesh.triangles(), &[[1, 3, 2]]);
        let uvs = mesh.triangle_uvs().unwrap();
        assert_eq!(uvs.len(), 3);
        assert_eq!(uvs[0].x, 3.0);
        assert_eq!(uvs[2].x, 5.0);
    }

    #[test]
    fn test_flip_triangle_swaps_uvs() {
        let mut mesh = quad_with_attributes();
        mesh.flip_triangle(0);
        assert_eq!(mesh.triangles()[0], [0, 2, 1]);
        let uvs = mesh.triangle_uvs().unwrap();
        assert_eq!(uvs[1].x, 2.0);
        assert_eq!(uvs[2].x, 1.0);
    }

    #[test]
    fn test_remove_vertices_drops_colors_and_triangles() {
        let mut mesh = quad_with_attributes();
        let removed = mesh.remove_vertices_by_mask(&[false, false, false, true]);
        assert_eq!(removed, 1);
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.triangles(), &[[0, 1, 2]]);
        assert_eq!(mesh.vertex_colors().unwrap().len(), 3);
        assert_eq!(mesh.triangle_uvs().unwrap().len(), 3);
    }

    #[test]
    fn test_merge_vertices_remaps_triangles() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let mut mesh = TriangleMesh::from_raw(positions, vec![[0, 1, 2], [3, 4, 2]]).unwrap();
        let reps = coincident_representatives(mesh.positions());
        assert_eq!(reps, vec![0, 1, 2, 1, 4]);

        let merged = mesh.merge_vertices(&reps);
        assert_eq!(merged, 1);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.triangles(), &[[0, 1, 2], [1, 3, 2]]);
    }

    #[test]
    fn test_compute_vertex_normals() {
        let mut mesh = quad_with_attributes();
        mesh.compute_vertex_normals();
        for n in mesh.vertex_normals().unwrap() {
            assert_relative_eq!(*n, Vector3::z(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_negative_zero_is_coincident() {
        let a = Point3::new(0.0, 1.0, 2.0);
        let b = Point3::new(-0.0, 1.0, 2.0);
        assert_eq!(position_key(&a), position_key(&b));
    }
}
