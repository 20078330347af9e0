//! Print preparation: cleanup, orientation and diagnostics.
//!
//! [`make_print_ready`] runs the cleanup passes in a fixed order, recomputes
//! normals, makes the winding consistent and reports whether the result is
//! watertight and manifold. Repair is best effort: holes are reported, never
//! filled, and a failed check does not fail the call.
//!
//! # Example
//!
//! ```
//! use burnish::algo::repair::{make_print_ready, RepairOptions};
//! use burnish::mesh::primitives::icosphere;
//!
//! let (mesh, report) = make_print_ready(&icosphere(1.0, 2), &RepairOptions::default()).unwrap();
//! assert!(report.status.is_watertight);
//! assert_eq!(report.removed_triangles(), 0);
//! assert!(mesh.has_vertex_normals());
//! ```

mod cleanup;
mod orient;
mod validate;

use std::fmt;

use serde::Serialize;

pub use cleanup::{
    merge_duplicate_vertices, remove_degenerate_triangles, remove_duplicate_triangles,
    remove_non_manifold_edges, remove_unreferenced_vertices,
};
pub use orient::{orient_outward, orient_triangles};
pub use validate::{mesh_status, MeshStatus};

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;

/// Options for [`make_print_ready`].
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Triangles with area at most this fraction of the squared bounding-box
    /// diagonal count as degenerate (default: 1e-12).
    pub area_epsilon: f64,

    /// Flip closed components that come out inside-out (default: true).
    pub orient_outward: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            area_epsilon: 1e-12,
            orient_outward: true,
        }
    }
}

impl RepairOptions {
    /// Set the relative degenerate-area threshold.
    pub fn with_area_epsilon(mut self, epsilon: f64) -> Self {
        self.area_epsilon = epsilon;
        self
    }

    /// Enable or disable the outward orientation fix.
    pub fn with_orient_outward(mut self, enabled: bool) -> Self {
        self.orient_outward = enabled;
        self
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.area_epsilon >= 0.0 && self.area_epsilon.is_finite()) {
            return Err(MeshError::invalid_param(
                "area_epsilon",
                self.area_epsilon,
                "must be a finite non-negative number",
            ));
        }
        Ok(())
    }
}

/// What [`make_print_ready`] changed, and the resulting status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Degenerate triangles removed.
    pub degenerate_triangles: usize,
    /// Duplicate triangles removed.
    pub duplicate_triangles: usize,
    /// Vertices merged into a coincident vertex.
    pub merged_vertices: usize,
    /// Vertices no triangle referenced.
    pub unreferenced_vertices: usize,
    /// Triangles removed to clear non-manifold edges.
    pub non_manifold_triangles: usize,
    /// Triangles flipped to make the winding consistent.
    pub flipped_triangles: usize,
    /// Triangles flipped to turn closed components outward.
    pub outward_flips: usize,
    /// Diagnostics of the repaired mesh.
    pub status: MeshStatus,
}

impl RepairReport {
    /// Total triangles removed.
    pub fn removed_triangles(&self) -> usize {
        self.degenerate_triangles + self.duplicate_triangles + self.non_manifold_triangles
    }

    /// Whether any pass changed the mesh.
    pub fn had_changes(&self) -> bool {
        self.removed_triangles() > 0
            || self.merged_vertices > 0
            || self.unreferenced_vertices > 0
            || self.flipped_triangles > 0
            || self.outward_flips > 0
    }
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Repair: removed {} degenerate, {} duplicate, {} non-manifold triangles; \
             merged {} vertices, dropped {} unreferenced; flipped {} (+{} outward)",
            self.degenerate_triangles,
            self.duplicate_triangles,
            self.non_manifold_triangles,
            self.merged_vertices,
            self.unreferenced_vertices,
            self.flipped_triangles,
            self.outward_flips
        )?;
        write!(f, "{}", self.status)
    }
}

/// Clean up a mesh for printing and report its status.
///
/// Steps, in order:
///
/// 1. Remove degenerate triangles.
/// 2. Remove duplicate triangles.
/// 3. Merge coincident vertices, dropping what the merge collapsed or
///    duplicated.
/// 4. Remove triangles on non-manifold edges, first come first kept, then
///    drop unreferenced vertices.
/// 5. Recompute vertex normals.
/// 6. Orient triangles consistently per component, then optionally outward.
/// 7. Evaluate the status.
///
/// Running it on its own output changes nothing.
///
/// # Errors
///
/// Returns [`MeshError::EmptyMesh`] for a mesh without vertices.
pub fn make_print_ready(mesh: &TriangleMesh, options: &RepairOptions) -> Result<(TriangleMesh, RepairReport)> {
    options.validate()?;
    if mesh.num_vertices() == 0 {
        return Err(MeshError::EmptyMesh);
    }

    let mut mesh = mesh.clone();
    let mut report = RepairReport {
        degenerate_triangles: remove_degenerate_triangles(&mut mesh, options.area_epsilon),
        duplicate_triangles: remove_duplicate_triangles(&mut mesh),
        ..RepairReport::default()
    };

    report.merged_vertices = merge_duplicate_vertices(&mut mesh);
    if report.merged_vertices > 0 {
        report.degenerate_triangles += remove_degenerate_triangles(&mut mesh, options.area_epsilon);
        report.duplicate_triangles += remove_duplicate_triangles(&mut mesh);
    }
    report.non_manifold_triangles = remove_non_manifold_edges(&mut mesh);
    report.unreferenced_vertices = remove_unreferenced_vertices(&mut mesh);

    mesh.compute_vertex_normals();

    report.flipped_triangles = orient_triangles(&mut mesh);
    if options.orient_outward {
        report.outward_flips = orient_outward(&mut mesh);
    }
    if report.flipped_triangles + report.outward_flips > 0 {
        mesh.compute_vertex_normals();
    }

    report.status = mesh_status(&mesh);
    log::info!(
        "repair: -{} degenerate, -{} duplicate, -{} non-manifold triangles, {} vertices merged, {} flipped",
        report.degenerate_triangles,
        report.duplicate_triangles,
        report.non_manifold_triangles,
        report.merged_vertices,
        report.flipped_triangles + report.outward_flips
    );
    if !report.status.is_watertight {
        log::warn!(
            "repaired mesh is not watertight ({} boundary, {} non-manifold edges)",
            report.status.boundary_edge_count,
            report.status.non_manifold_edge_count
        );
    }

    Ok((mesh, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{cube, icosphere};
    use nalgebra::{Point3, Vector2, Vector3};

    /// An icosphere with every kind of defect.
    fn damaged_sphere() -> TriangleMesh {
        let sphere = icosphere(1.0, 2);
        let mut positions = sphere.positions().to_vec();
        let mut triangles = sphere.triangles().to_vec();
        let n = positions.len() as u32;

        // Split triangle 0 off onto its own copies of its vertices.
        let [a, b, c] = triangles[0];
        positions.push(positions[a as usize]);
        positions.push(positions[b as usize]);
        positions.push(positions[c as usize]);
        triangles[0] = [n, n + 1, n + 2];

        // Flipped triangle, a duplicate, a degenerate and a fin.
        triangles[5].swap(1, 2);
        triangles.push(triangles[7]);
        triangles.push([1, 1, 2]);
        let [x, y, _] = triangles[9];
        positions.push(Point3::new(3.0, 3.0, 3.0));
        triangles.push([x, y, n + 3]);

        TriangleMesh::from_raw(positions, triangles).unwrap()
    }

    #[test]
    fn test_clean_mesh_unchanged() {
        let input = icosphere(1.0, 2);
        let (mesh, report) = make_print_ready(&input, &RepairOptions::default()).unwrap();
        assert!(!report.had_changes());
        assert_eq!(mesh.triangles(), input.triangles());
        assert!(report.status.is_printable());
    }

    #[test]
    fn test_damaged_mesh_repaired() {
        let input = damaged_sphere();
        let (mesh, report) = make_print_ready(&input, &RepairOptions::default()).unwrap();

        assert_eq!(report.degenerate_triangles, 1);
        assert_eq!(report.duplicate_triangles, 1);
        assert_eq!(report.merged_vertices, 3);
        assert_eq!(report.non_manifold_triangles, 1);
        assert_eq!(report.unreferenced_vertices, 1);
        assert_eq!(report.flipped_triangles, 1);

        assert_eq!(mesh.num_triangles(), 320);
        assert_eq!(mesh.num_vertices(), 162);
        assert!(report.status.is_printable());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_idempotent() {
        let options = RepairOptions::default();
        let (once, _) = make_print_ready(&damaged_sphere(), &options).unwrap();
        let (twice, report) = make_print_ready(&once, &options).unwrap();
        assert!(!report.had_changes());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_inside_out_fixed() {
        let mut input = cube(Vector3::new(1.0, 1.0, 1.0), true);
        for t in 0..input.num_triangles() {
            input.flip_triangle(t);
        }

        let (mesh, report) = make_print_ready(&input, &RepairOptions::default()).unwrap();
        assert_eq!(report.outward_flips, 12);
        assert!(mesh.signed_volume() > 0.0);

        let keep = RepairOptions::default().with_orient_outward(false);
        let (mesh, report) = make_print_ready(&input, &keep).unwrap();
        assert_eq!(report.outward_flips, 0);
        assert!(mesh.signed_volume() < 0.0);
    }

    #[test]
    fn test_normals_follow_orientation() {
        let (mesh, _) = make_print_ready(&icosphere(1.0, 1), &RepairOptions::default()).unwrap();
        let normals = mesh.vertex_normals().unwrap();
        for (p, n) in mesh.positions().iter().zip(normals) {
            assert!(p.coords.dot(n) > 0.9);
        }
    }

    #[test]
    fn test_uvs_survive() {
        let input = icosphere(1.0, 1);
        let uvs = vec![Vector2::new(0.25, 0.75); 3 * input.num_triangles()];
        let input = input.with_triangle_uvs(uvs).unwrap();
        let (mesh, _) = make_print_ready(&input, &RepairOptions::default()).unwrap();
        assert_eq!(mesh.triangle_uvs().map(<[_]>::len), Some(3 * mesh.num_triangles()));
    }

    #[test]
    fn test_open_mesh_reported_not_failed() {
        let mut input = icosphere(1.0, 1);
        input.retain_triangles(|t, _| t != 0);
        let (_, report) = make_print_ready(&input, &RepairOptions::default()).unwrap();
        assert!(!report.status.is_watertight);
        assert_eq!(report.status.boundary_edge_count, 3);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert!(matches!(
            make_print_ready(&TriangleMesh::new(), &RepairOptions::default()),
            Err(MeshError::EmptyMesh)
        ));
    }
}
