//! glTF format support.
//!
//! Loading goes through the `gltf` crate and merges every triangle primitive
//! of every mesh into one [`TriangleMesh`]. Saving writes a single primitive
//! with positions, normals, optional colors and optional texture coordinates,
//! either as a self-contained `.glb` or as a `.gltf` document next to a `.bin`
//! buffer.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector2, Vector3};
use serde_json::json;

use crate::error::{MeshError, Result};
use crate::mesh::{bounding_box, TriangleMesh};

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Load a mesh from a glTF or GLB file.
///
/// All triangle primitives are merged. `TEXCOORD_0` becomes per-corner
/// texture coordinates and `COLOR_0` becomes per-vertex colors, each kept
/// only when every merged primitive provides it. Point and line primitives
/// are skipped.
///
/// # Example
///
/// ```no_run
/// use burnish::io::gltf;
///
/// let mesh = gltf::load("model.glb").unwrap();
/// println!("{} triangles", mesh.num_triangles());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();

    let (document, buffers, _images) =
        ::gltf::import(path).map_err(|e| MeshError::load(path, e.to_string()))?;

    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    let mut vertex_uvs: Option<Vec<Vector2<f64>>> = Some(Vec::new());
    let mut colors: Option<Vec<Vector3<f64>>> = Some(Vec::new());

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let corners = match primitive.mode() {
                ::gltf::mesh::Mode::Triangles
                | ::gltf::mesh::Mode::TriangleStrip
                | ::gltf::mesh::Mode::TriangleFan => primitive.mode(),
                _ => continue,
            };
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let Some(read_positions) = reader.read_positions() else {
                continue;
            };
            let offset = positions.len() as u32;
            positions.extend(read_positions.map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)));
            let count = positions.len() - offset as usize;

            match (&mut vertex_uvs, reader.read_tex_coords(0)) {
                (Some(uvs), Some(read)) => {
                    uvs.extend(read.into_f32().map(|t| Vector2::new(t[0] as f64, t[1] as f64)));
                }
                (slot, _) => *slot = None,
            }
            match (&mut colors, reader.read_colors(0)) {
                (Some(colors), Some(read)) => {
                    colors.extend(read.into_rgb_f32().map(|c| Vector3::new(c[0] as f64, c[1] as f64, c[2] as f64)));
                }
                (slot, _) => *slot = None,
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                None => (0..count as u32).collect(),
            };
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
                return Err(MeshError::load(
                    path,
                    format!("primitive index {bad} out of range for {count} vertices"),
                ));
            }

            let before = triangles.len();
            assemble_triangles(corners, &indices, &mut triangles);
            for tri in &mut triangles[before..] {
                for v in tri.iter_mut() {
                    *v += offset;
                }
            }
        }
    }

    if positions.is_empty() {
        return Err(MeshError::load(path, "glTF file contains no vertices"));
    }
    if triangles.is_empty() {
        return Err(MeshError::load(path, "glTF file contains no triangles"));
    }

    let mut mesh = TriangleMesh::from_raw(positions, triangles)?;
    if let Some(uvs) = vertex_uvs.filter(|uvs| uvs.len() == mesh.num_vertices()) {
        let corner_uvs = mesh
            .triangles()
            .iter()
            .flat_map(|tri| tri.map(|v| uvs[v as usize]))
            .collect();
        mesh = mesh.with_triangle_uvs(corner_uvs)?;
    }
    if let Some(colors) = colors.filter(|c| c.len() == mesh.num_vertices()) {
        mesh = mesh.with_vertex_colors(colors)?;
    }

    log::debug!(
        "loaded {}: {} vertices, {} triangles, uvs: {}, colors: {}",
        path.display(),
        mesh.num_vertices(),
        mesh.num_triangles(),
        mesh.has_triangle_uvs(),
        mesh.has_vertex_colors()
    );
    Ok(mesh)
}

fn assemble_triangles(mode: ::gltf::mesh::Mode, indices: &[u32], out: &mut Vec<[u32; 3]>) {
    match mode {
        ::gltf::mesh::Mode::Triangles => {
            out.extend(indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
        }
        ::gltf::mesh::Mode::TriangleStrip => {
            for i in 0..indices.len().saturating_sub(2) {
                // Odd triangles of a strip have reversed winding.
                if i % 2 == 0 {
                    out.push([indices[i], indices[i + 1], indices[i + 2]]);
                } else {
                    out.push([indices[i], indices[i + 2], indices[i + 1]]);
                }
            }
        }
        ::gltf::mesh::Mode::TriangleFan => {
            for i in 1..indices.len().saturating_sub(1) {
                out.push([indices[0], indices[i], indices[i + 1]]);
            }
        }
        _ => {}
    }
}

/// Save a mesh as binary glTF.
///
/// Vertex normals are written when present and computed otherwise. When the
/// mesh has texture coordinates, every triangle corner becomes its own vertex
/// so that seams survive.
pub fn save_glb<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let (document, buffer) = build_document(mesh, None)?;
    let json = serde_json::to_vec(&document).map_err(|e| MeshError::save(path, e.to_string()))?;

    let json_length = padded(json.len());
    let bin_length = padded(buffer.len());
    let total_length = 12 + 8 + json_length + 8 + bin_length;

    let write = || -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        writer.write_all(b"glTF")?;
        writer.write_all(&2u32.to_le_bytes())?;
        writer.write_all(&(total_length as u32).to_le_bytes())?;

        writer.write_all(&(json_length as u32).to_le_bytes())?;
        writer.write_all(b"JSON")?;
        writer.write_all(&json)?;
        writer.write_all(&vec![b' '; json_length - json.len()])?;

        writer.write_all(&(bin_length as u32).to_le_bytes())?;
        writer.write_all(b"BIN\0")?;
        writer.write_all(&buffer)?;
        writer.write_all(&vec![0u8; bin_length - buffer.len()])?;

        writer.flush()
    };
    write().map_err(|e| MeshError::save(path, e.to_string()))
}

/// Save a mesh as a `.gltf` document with its buffer in a sibling `.bin`
/// file of the same stem.
pub fn save_gltf<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let bin_path = path.with_extension("bin");
    let bin_name = bin_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| MeshError::save(path, "output path has no usable file name"))?;

    let (document, buffer) = build_document(mesh, Some(bin_name))?;
    let json = serde_json::to_string_pretty(&document).map_err(|e| MeshError::save(path, e.to_string()))?;

    std::fs::write(path, json).map_err(|e| MeshError::save(path, e.to_string()))?;
    std::fs::write(&bin_path, buffer).map_err(|e| MeshError::save(&bin_path, e.to_string()))?;
    Ok(())
}

/// Vertex streams ready for the buffer, unwelded per corner when the mesh
/// carries texture coordinates.
struct Streams<'a> {
    positions: Cow<'a, [Point3<f64>]>,
    normals: Cow<'a, [Vector3<f64>]>,
    colors: Option<Cow<'a, [Vector3<f64>]>>,
    uvs: Option<&'a [Vector2<f64>]>,
    indices: Vec<u32>,
}

fn streams<'a>(mesh: &'a TriangleMesh, computed_normals: &'a Option<Vec<Vector3<f64>>>) -> Streams<'a> {
    let normals: &[Vector3<f64>] = match (mesh.vertex_normals(), computed_normals) {
        (Some(normals), _) => normals,
        (None, Some(normals)) => normals.as_slice(),
        (None, None) => &[],
    };

    match mesh.triangle_uvs() {
        None => Streams {
            positions: Cow::Borrowed(mesh.positions()),
            normals: Cow::Borrowed(normals),
            colors: mesh.vertex_colors().map(Cow::Borrowed),
            uvs: None,
            indices: mesh.triangles().iter().flatten().copied().collect(),
        },
        Some(uvs) => {
            let corners: Vec<usize> = mesh.triangles().iter().flatten().map(|&v| v as usize).collect();
            Streams {
                positions: Cow::Owned(corners.iter().map(|&v| mesh.positions()[v]).collect()),
                normals: Cow::Owned(corners.iter().map(|&v| normals[v]).collect()),
                colors: mesh
                    .vertex_colors()
                    .map(|colors| Cow::Owned(corners.iter().map(|&v| colors[v]).collect())),
                uvs: Some(uvs),
                indices: (0..corners.len() as u32).collect(),
            }
        }
    }
}

fn build_document(mesh: &TriangleMesh, uri: Option<&str>) -> Result<(serde_json::Value, Vec<u8>)> {
    if mesh.num_triangles() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    let computed_normals = if mesh.has_vertex_normals() {
        None
    } else {
        let mut with_normals = mesh.clone();
        with_normals.compute_vertex_normals();
        with_normals.vertex_normals().map(<[_]>::to_vec)
    };
    let streams = streams(mesh, &computed_normals);
    let vertex_count = streams.positions.len();

    let mut buffer: Vec<u8> = Vec::new();
    let mut views = Vec::new();
    let mut accessors = Vec::new();
    let mut attributes = serde_json::Map::new();

    let (min, max) = bounding_box(&streams.positions).ok_or(MeshError::EmptyMesh)?;
    let view = push_view(&mut buffer, &mut views, ARRAY_BUFFER, |buf| {
        for p in streams.positions.iter() {
            put_floats(buf, &[p.x, p.y, p.z]);
        }
    });
    attributes.insert("POSITION".into(), accessors.len().into());
    accessors.push(json!({
        "bufferView": view,
        "componentType": FLOAT,
        "count": vertex_count,
        "type": "VEC3",
        "min": [min.x as f32, min.y as f32, min.z as f32],
        "max": [max.x as f32, max.y as f32, max.z as f32]
    }));

    let view = push_view(&mut buffer, &mut views, ARRAY_BUFFER, |buf| {
        for n in streams.normals.iter() {
            put_floats(buf, &[n.x, n.y, n.z]);
        }
    });
    attributes.insert("NORMAL".into(), accessors.len().into());
    accessors.push(json!({ "bufferView": view, "componentType": FLOAT, "count": vertex_count, "type": "VEC3" }));

    if let Some(colors) = &streams.colors {
        let view = push_view(&mut buffer, &mut views, ARRAY_BUFFER, |buf| {
            for c in colors.iter() {
                put_floats(buf, &[c.x, c.y, c.z]);
            }
        });
        attributes.insert("COLOR_0".into(), accessors.len().into());
        accessors.push(json!({ "bufferView": view, "componentType": FLOAT, "count": vertex_count, "type": "VEC3" }));
    }

    if let Some(uvs) = streams.uvs {
        let view = push_view(&mut buffer, &mut views, ARRAY_BUFFER, |buf| {
            for t in uvs {
                put_floats(buf, &[t.x, t.y]);
            }
        });
        attributes.insert("TEXCOORD_0".into(), accessors.len().into());
        accessors.push(json!({ "bufferView": view, "componentType": FLOAT, "count": vertex_count, "type": "VEC2" }));
    }

    let view = push_view(&mut buffer, &mut views, ELEMENT_ARRAY_BUFFER, |buf| {
        for i in &streams.indices {
            buf.extend_from_slice(&i.to_le_bytes());
        }
    });
    let indices = accessors.len();
    accessors.push(json!({
        "bufferView": view,
        "componentType": UNSIGNED_INT,
        "count": streams.indices.len(),
        "type": "SCALAR"
    }));

    let mut buffer_entry = json!({ "byteLength": buffer.len() });
    if let Some(uri) = uri {
        buffer_entry["uri"] = uri.into();
    }

    let document = json!({
        "asset": { "generator": concat!("burnish ", env!("CARGO_PKG_VERSION")), "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{ "attributes": attributes, "indices": indices, "mode": 4 }]
        }],
        "accessors": accessors,
        "bufferViews": views,
        "buffers": [buffer_entry]
    });
    Ok((document, buffer))
}

/// Append one buffer view written by `fill` and return its index.
fn push_view(
    buffer: &mut Vec<u8>,
    views: &mut Vec<serde_json::Value>,
    target: u32,
    fill: impl FnOnce(&mut Vec<u8>),
) -> usize {
    let offset = buffer.len();
    fill(buffer);
    views.push(json!({
        "buffer": 0,
        "byteOffset": offset,
        "byteLength": buffer.len() - offset,
        "target": target
    }));
    views.len() - 1
}

fn put_floats(buffer: &mut Vec<u8>, values: &[f64]) {
    for &v in values {
        buffer.extend_from_slice(&(v as f32).to_le_bytes());
    }
}

fn padded(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{cube, icosphere};
    use tempfile::TempDir;

    #[test]
    fn test_glb_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.glb");
        save_glb(&cube(Vector3::new(1.0, 1.0, 1.0), true), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
        let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(length, bytes.len());
        assert_eq!(length % 4, 0);
    }

    #[test]
    fn test_glb_round_trip_with_colors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sphere.glb");
        let sphere = icosphere(1.0, 1);
        let colors = sphere.positions().iter().map(|p| p.coords.abs()).collect();
        let sphere = sphere.with_vertex_colors(colors).unwrap();

        save_glb(&sphere, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.num_vertices(), sphere.num_vertices());
        assert_eq!(loaded.triangles(), sphere.triangles());
        let (a, b) = (loaded.vertex_colors().unwrap(), sphere.vertex_colors().unwrap());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).norm() < 1e-6);
        }
    }

    #[test]
    fn test_uvs_unweld_corners() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uv.glb");
        let sphere = icosphere(1.0, 1);
        let uvs: Vec<Vector2<f64>> = (0..3 * sphere.num_triangles())
            .map(|c| Vector2::new((c % 3) as f64 * 0.5, (c / 3) as f64 / 240.0))
            .collect();
        let sphere = sphere.with_triangle_uvs(uvs.clone()).unwrap();

        save_glb(&sphere, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.num_vertices(), 3 * sphere.num_triangles());
        assert_eq!(loaded.num_triangles(), sphere.num_triangles());
        for (x, y) in loaded.triangle_uvs().unwrap().iter().zip(&uvs) {
            assert!((x - y).norm() < 1e-6);
        }
    }

    #[test]
    fn test_gltf_writes_sidecar_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mesh.gltf");
        save_gltf(&icosphere(1.0, 0), &path).unwrap();

        assert!(dir.path().join("mesh.bin").exists());
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.num_triangles(), 20);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load("/nonexistent/mesh.glb"),
            Err(MeshError::LoadError { .. })
        ));
    }

    #[test]
    fn test_save_empty_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(save_glb(&TriangleMesh::new(), dir.path().join("empty.glb")).is_err());
    }

    #[test]
    fn test_strip_winding() {
        let mut out = Vec::new();
        assemble_triangles(::gltf::mesh::Mode::TriangleStrip, &[0, 1, 2, 3], &mut out);
        assert_eq!(out, vec![[0, 1, 2], [1, 3, 2]]);
    }
}
