//! Procedural meshes.
//!
//! Closed primitives are wound counter-clockwise seen from outside, so their
//! signed volume is positive.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

use super::triangle_mesh::TriangleMesh;

/// Axis-aligned cube with 8 shared vertices and 12 triangles.
pub fn cube(size: Vector3<f64>, center: bool) -> TriangleMesh {
    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;

    let positions = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    let triangles = vec![
        // z+
        [4, 5, 6],
        [4, 6, 7],
        // z-
        [1, 0, 3],
        [1, 3, 2],
        // x+
        [5, 1, 2],
        [5, 2, 6],
        // x-
        [0, 4, 7],
        [0, 7, 3],
        // y+
        [7, 6, 2],
        [7, 2, 3],
        // y-
        [0, 1, 5],
        [0, 5, 4],
    ];

    from_valid_parts(positions, triangles)
}

/// Icosphere centered at the origin.
///
/// Each subdivision level splits every triangle into four and projects the
/// new vertices back onto the sphere. Level `n` has `10 * 4^n + 2` vertices
/// and `20 * 4^n` triangles.
pub fn icosphere(radius: f64, subdivisions: u32) -> TriangleMesh {
    let t = (1.0 + 5.0f64.sqrt()) / 2.0;
    let mut positions: Vec<Point3<f64>> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Point3::from(Vector3::new(x, y, z).normalize() * radius))
    .collect();

    let mut triangles: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut next = Vec::with_capacity(triangles.len() * 4);

        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Point3<f64>>| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoints.entry(key).or_insert_with(|| {
                let mid = (positions[a as usize].coords + positions[b as usize].coords) / 2.0;
                positions.push(Point3::from(mid.normalize() * radius));
                (positions.len() - 1) as u32
            })
        };

        for &[a, b, c] in &triangles {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        triangles = next;
    }

    from_valid_parts(positions, triangles)
}

/// Open `n x n` grid of unit cells in the z = 0 plane, facing +z.
pub fn grid(n: usize) -> TriangleMesh {
    let mut positions = Vec::with_capacity((n + 1) * (n + 1));
    let mut triangles = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            positions.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = (j * (n + 1) + i) as u32;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1) as u32;
            let v11 = v01 + 1;

            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }

    from_valid_parts(positions, triangles)
}

fn from_valid_parts(positions: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> TriangleMesh {
    // Indices are generated in range above.
    TriangleMesh::from_raw(positions, triangles).unwrap_or_default()
}
