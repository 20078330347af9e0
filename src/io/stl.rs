//! STL (stereolithography) format support.
//!
//! This module provides loading and saving of meshes in the STL format,
//! commonly used for 3D printing. Both binary and ASCII formats are supported.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{position_key, TriangleMesh};

/// Load a mesh from an STL file.
///
/// Automatically detects binary vs ASCII format. STL stores every triangle
/// corner separately, so corners with identical coordinates are welded into
/// one vertex. Triangles that collapse are kept for repair to count.
///
/// # Example
///
/// ```no_run
/// use burnish::io::stl;
///
/// let mesh = stl::load("part.stl").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| MeshError::load(path, e.to_string()))?;

    let stl = stl_io::read_stl(&mut file).map_err(|e| MeshError::load(path, e.to_string()))?;

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut welded: HashMap<[u64; 3], u32> = HashMap::with_capacity(stl.vertices.len());
    let remap: Vec<u32> = stl
        .vertices
        .iter()
        .map(|v| {
            let p = Point3::new(v[0] as f64, v[1] as f64, v[2] as f64);
            *welded.entry(position_key(&p)).or_insert_with(|| {
                vertices.push(p);
                (vertices.len() - 1) as u32
            })
        })
        .collect();

    let triangles: Vec<[u32; 3]> = stl
        .faces
        .iter()
        .map(|face| face.vertices.map(|i| remap[i]))
        .collect();

    if triangles.is_empty() {
        return Err(MeshError::load(path, "STL file contains no triangles"));
    }

    TriangleMesh::from_raw(vertices, triangles)
}

/// Save a mesh to a binary STL file.
///
/// Facet normals are recomputed from the triangle winding.
///
/// # Example
///
/// ```no_run
/// use burnish::io::stl;
/// use burnish::mesh::primitives::icosphere;
///
/// stl::save(&icosphere(1.0, 2), "sphere.stl").unwrap();
/// ```
pub fn save<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| MeshError::save(path, e.to_string()))?;
    let mut writer = BufWriter::new(file);

    let vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<stl_io::Triangle> = (0..mesh.num_triangles())
        .map(|t| {
            let n = mesh.face_normal(t);
            let [p0, p1, p2] = mesh.triangle_positions(t);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [vertex(&p0), vertex(&p1), vertex(&p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| MeshError::save(path, e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{cube, icosphere};
    use nalgebra::Vector3;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_welds_corners() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sphere.stl");
        let sphere = icosphere(1.0, 2);

        save(&sphere, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.num_vertices(), sphere.num_vertices());
        assert_eq!(loaded.num_triangles(), sphere.num_triangles());
        assert!((loaded.signed_volume() - sphere.signed_volume()).abs() < 1e-4);
    }

    #[test]
    fn test_cube_volume() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.stl");
        save(&cube(Vector3::new(2.0, 1.0, 1.0), false), &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.num_vertices(), 8);
        assert!((loaded.signed_volume() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load("/nonexistent/part.stl"),
            Err(MeshError::LoadError { .. })
        ));
    }
}
