//! PLY (Stanford polygon) format support.
//!
//! This module provides loading and saving of meshes in the PLY format,
//! also known as the Polygon File Format or Stanford Triangle Format.
//! Per-vertex `red`/`green`/`blue` properties are carried as vertex colors.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{MeshError, Result};
use crate::mesh::{build_from_polygons, TriangleMesh};

/// Load a mesh from a PLY file.
///
/// Polygons with more than three vertices are fan-triangulated. Colors are
/// read from `uchar` channels (scaled by 1/255) or from float channels as-is.
///
/// # Example
///
/// ```no_run
/// use burnish::io::ply;
///
/// let mesh = ply::load("scan.ply").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MeshError::load(path, e.to_string()))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| MeshError::load(path, e.to_string()))?;

    let vertex_element = ply
        .payload
        .get("vertex")
        .filter(|vertices| !vertices.is_empty())
        .ok_or_else(|| MeshError::load(path, "PLY file has no vertices"))?;

    let mut vertices: Vec<Point3<f64>> = Vec::with_capacity(vertex_element.len());
    let mut colors: Option<Vec<Vector3<f64>>> = Some(Vec::with_capacity(vertex_element.len()));
    for vertex in vertex_element {
        let coordinate = |name: &str| {
            get_float_property(vertex, name)
                .ok_or_else(|| MeshError::load(path, format!("vertex missing {name} coordinate")))
        };
        vertices.push(Point3::new(coordinate("x")?, coordinate("y")?, coordinate("z")?));

        if let Some(list) = &mut colors {
            match get_color(vertex) {
                Some(color) => list.push(color),
                None => colors = None,
            }
        }
    }

    let face_element = ply
        .payload
        .get("face")
        .ok_or_else(|| MeshError::load(path, "PLY file has no face element"))?;

    let mut faces: Vec<Vec<usize>> = Vec::with_capacity(face_element.len());
    for face in face_element {
        let indices = get_list_property(face, "vertex_indices")
            .or_else(|| get_list_property(face, "vertex_index"))
            .ok_or_else(|| MeshError::load(path, "face missing vertex_indices property"))?;
        faces.push(indices);
    }

    let mesh = build_from_polygons(&vertices, &faces)?;
    if mesh.num_triangles() == 0 {
        return Err(MeshError::load(path, "PLY file contains no triangles"));
    }

    match colors {
        Some(colors) => mesh.with_vertex_colors(colors),
        None => Ok(mesh),
    }
}

fn get_float_property(element: &DefaultElement, name: &str) -> Option<f64> {
    match element.get(name)? {
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(*v as f64),
        Property::UInt(v) => Some(*v as f64),
        Property::Short(v) => Some(*v as f64),
        Property::UShort(v) => Some(*v as f64),
        Property::Char(v) => Some(*v as f64),
        Property::UChar(v) => Some(*v as f64),
        _ => None,
    }
}

/// RGB in [0, 1]; integer channels are 8-bit.
fn get_color(element: &DefaultElement) -> Option<Vector3<f64>> {
    let channel = |name: &str| match element.get(name)? {
        Property::UChar(v) => Some(*v as f64 / 255.0),
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        _ => None,
    };
    Some(Vector3::new(channel("red")?, channel("green")?, channel("blue")?))
}

fn get_list_property(element: &DefaultElement, name: &str) -> Option<Vec<usize>> {
    match element.get(name)? {
        Property::ListInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        _ => None,
    }
}

/// Save a mesh to a PLY file (ASCII format).
///
/// Vertex colors, when present, are written as `uchar` channels.
///
/// # Example
///
/// ```no_run
/// use burnish::io::ply;
/// use burnish::mesh::primitives::icosphere;
///
/// ply::save(&icosphere(1.0, 2), "sphere.ply").unwrap();
/// ```
pub fn save<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    write_ascii(mesh, path).map_err(|e| MeshError::save(path, e.to_string()))
}

fn write_ascii(mesh: &TriangleMesh, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let colors = mesh.vertex_colors();

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment Generated by burnish")?;
    writeln!(writer, "element vertex {}", mesh.num_vertices())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    if colors.is_some() {
        writeln!(writer, "property uchar red")?;
        writeln!(writer, "property uchar green")?;
        writeln!(writer, "property uchar blue")?;
    }
    writeln!(writer, "element face {}", mesh.num_triangles())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for (v, p) in mesh.positions().iter().enumerate() {
        write!(writer, "{} {} {}", p.x, p.y, p.z)?;
        if let Some(colors) = colors {
            let c = colors[v].map(|x| (x.clamp(0.0, 1.0) * 255.0).round() as u8);
            write!(writer, " {} {} {}", c.x, c.y, c.z)?;
        }
        writeln!(writer)?;
    }

    for [a, b, c] in mesh.triangles() {
        writeln!(writer, "3 {a} {b} {c}")?;
    }

    writer.flush()
}
