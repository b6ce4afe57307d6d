use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array2, Axis};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use ply_rs::{parser, ply};

use super::{color_from_u8, color_to_u8};
use crate::error::{Error, Result};
use crate::pointcloud::PointCloud;

struct Vertex {
    point: [f32; 3],
    normal: [f32; 3],
    color: [f32; 3],
}

fn as_f32(property: &ply::Property) -> Option<f32> {
    match *property {
        ply::Property::Float(v) => Some(v),
        ply::Property::Double(v) => Some(v as f32),
        _ => None,
    }
}

// Colors are stored as uchar by most tools, some write them as floats in [0, 1].
fn as_color(property: &ply::Property) -> Option<f32> {
    match *property {
        ply::Property::UChar(v) => Some(color_from_u8(v)),
        ply::Property::Float(v) => Some(v),
        ply::Property::Double(v) => Some(v as f32),
        _ => None,
    }
}

impl ply::PropertyAccess for Vertex {
    fn new() -> Self {
        Vertex {
            point: [0f32; 3],
            normal: [0f32; 3],
            color: [0f32; 3],
        }
    }

    fn set_property(&mut self, key: String, property: ply::Property) {
        let (slot, value) = match key.as_ref() {
            "x" => (&mut self.point[0], as_f32(&property)),
            "y" => (&mut self.point[1], as_f32(&property)),
            "z" => (&mut self.point[2], as_f32(&property)),
            "nx" => (&mut self.normal[0], as_f32(&property)),
            "ny" => (&mut self.normal[1], as_f32(&property)),
            "nz" => (&mut self.normal[2], as_f32(&property)),
            "red" => (&mut self.color[0], as_color(&property)),
            "green" => (&mut self.color[1], as_color(&property)),
            "blue" => (&mut self.color[2], as_color(&property)),
            _ => return,
        };
        if let Some(value) = value {
            *slot = value;
        }
    }
}

/// Reads the vertices of a PLY file as a point cloud. Normals and colors are
/// loaded when the file has them. Other elements, like faces, are skipped.
pub fn read_ply<P>(filepath: P) -> Result<PointCloud>
where
    P: AsRef<Path>,
{
    let filepath = filepath.as_ref();
    let mut f = BufReader::new(File::open(filepath)?);

    let vertex_parser = parser::Parser::<Vertex>::new();
    let header = vertex_parser
        .read_header(&mut f)
        .map_err(|err| Error::parser(format!("{}: {err}", filepath.display())))?;

    let mut cloud = None;
    for (_ignore_key, element) in &header.elements {
        if element.name != "vertex" {
            parser::Parser::<DefaultElement>::new()
                .read_payload_for_element(&mut f, element, &header)
                .map_err(|err| Error::parser(format!("{}: {err}", filepath.display())))?;
            continue;
        }

        let vertex_vec = vertex_parser
            .read_payload_for_element(&mut f, element, &header)
            .map_err(|err| Error::parser(format!("{}: {err}", filepath.display())))?;

        let has = |keys: [&str; 3]| keys.iter().all(|k| element.properties.contains_key(*k));
        if !has(["x", "y", "z"]) {
            return Err(Error::parser(format!(
                "{}: vertex element without x, y, z",
                filepath.display()
            )));
        }

        let len = vertex_vec.len();
        cloud = Some(PointCloud {
            points: Array2::from_shape_fn((len, 3), |(i, c)| vertex_vec[i].point[c]),
            normals: has(["nx", "ny", "nz"])
                .then(|| Array2::from_shape_fn((len, 3), |(i, c)| vertex_vec[i].normal[c])),
            colors: has(["red", "green", "blue"])
                .then(|| Array2::from_shape_fn((len, 3), |(i, c)| vertex_vec[i].color[c])),
        });
    }

    cloud.ok_or_else(|| Error::parser(format!("{}: no vertex element", filepath.display())))
}

/// Writes a point cloud as an ASCII PLY file. Colors are written as uchar.
pub fn write_ply<P>(filepath: P, cloud: &PointCloud) -> Result<()>
where
    P: AsRef<Path>,
{
    cloud.validate()?;

    let mut ply = {
        let mut ply = Ply::<DefaultElement>::new();
        let mut vertex_element = ElementDef::new("vertex".to_string());
        let mut add_properties = |keys: [&str; 3], scalar: ScalarType| {
            keys.iter().for_each(|key| {
                vertex_element.properties.add(PropertyDef::new(
                    key.to_string(),
                    PropertyType::Scalar(scalar.clone()),
                ));
            });
        };

        add_properties(["x", "y", "z"], ScalarType::Float);
        if cloud.normals.is_some() {
            add_properties(["nx", "ny", "nz"], ScalarType::Float);
        }
        if cloud.colors.is_some() {
            add_properties(["red", "green", "blue"], ScalarType::UChar);
        }

        let vertex_array: Vec<DefaultElement> = cloud
            .points
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, point)| {
                let mut elem = DefaultElement::new();
                elem.insert("x".to_string(), Property::Float(point[0]));
                elem.insert("y".to_string(), Property::Float(point[1]));
                elem.insert("z".to_string(), Property::Float(point[2]));
                if let Some(normals) = &cloud.normals {
                    elem.insert("nx".to_string(), Property::Float(normals[[i, 0]]));
                    elem.insert("ny".to_string(), Property::Float(normals[[i, 1]]));
                    elem.insert("nz".to_string(), Property::Float(normals[[i, 2]]));
                }
                if let Some(colors) = &cloud.colors {
                    elem.insert("red".to_string(), Property::UChar(color_to_u8(colors[[i, 0]])));
                    elem.insert("green".to_string(), Property::UChar(color_to_u8(colors[[i, 1]])));
                    elem.insert("blue".to_string(), Property::UChar(color_to_u8(colors[[i, 2]])));
                }
                elem
            })
            .collect();

        ply.header.elements.add(vertex_element);
        ply.payload.insert("vertex".to_string(), vertex_array);
        ply.make_consistent()
            .map_err(|err| Error::parser(format!("inconsistent PLY: {err:?}")))?;
        ply
    };

    ply.header.encoding = Encoding::Ascii;

    let mut buf = BufWriter::new(File::create(filepath)?);
    Writer::new().write_ply(&mut buf, &mut ply)?;

    Ok(())
}
