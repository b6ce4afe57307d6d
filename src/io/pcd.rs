use std::fs;
use std::path::Path;

use ndarray::Array2;

use super::{color_from_u8, color_to_u8};
use crate::error::{Error, Result};
use crate::pointcloud::PointCloud;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    size: usize,
    kind: u8,
    count: usize,
}

impl Field {
    fn byte_len(&self) -> usize {
        self.size * self.count
    }

    /// Decodes one little endian scalar of this field.
    fn decode(&self, bytes: &[u8]) -> Result<f64> {
        let value = match (self.kind, self.size) {
            (b'F', 4) => f32::from_le_bytes(self.exact(bytes)?) as f64,
            (b'F', 8) => f64::from_le_bytes(self.exact(bytes)?),
            (b'U', 1) => u8::from_le_bytes(self.exact(bytes)?) as f64,
            (b'U', 2) => u16::from_le_bytes(self.exact(bytes)?) as f64,
            (b'U', 4) => u32::from_le_bytes(self.exact(bytes)?) as f64,
            (b'I', 1) => i8::from_le_bytes(self.exact(bytes)?) as f64,
            (b'I', 2) => i16::from_le_bytes(self.exact(bytes)?) as f64,
            (b'I', 4) => i32::from_le_bytes(self.exact(bytes)?) as f64,
            (kind, size) => {
                return Err(Error::parser(format!(
                    "unsupported PCD type {}{size} for field {}",
                    kind as char, self.name
                )))
            }
        };
        Ok(value)
    }

    fn exact<const N: usize>(&self, bytes: &[u8]) -> Result<[u8; N]> {
        bytes.try_into().map_err(|_| {
            Error::parser(format!(
                "PCD field {} expects {N} bytes, got {}",
                self.name,
                bytes.len()
            ))
        })
    }
}

struct Header {
    fields: Vec<Field>,
    points: usize,
    format: DataFormat,
    /// Byte offset of the first data byte.
    data_offset: usize,
}

fn parse_header(raw: &[u8]) -> Result<Header> {
    let mut fields: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut kinds: Vec<u8> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width = None;
    let mut height = 1;
    let mut points = None;

    let mut offset = 0;
    while offset < raw.len() {
        let end = raw[offset..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(raw.len(), |pos| offset + pos + 1);
        let line = std::str::from_utf8(&raw[offset..end])
            .map_err(|_| Error::parser("PCD header is not valid UTF-8"))?
            .trim();
        offset = end;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let values: Vec<&str> = parts.collect();
        let parse_usize = |v: &str| {
            v.parse::<usize>()
                .map_err(|err| Error::parser(format!("invalid {key} value `{v}`: {err}")))
        };

        match key {
            "FIELDS" => fields = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => sizes = values.iter().map(|v| parse_usize(*v)).collect::<Result<_>>()?,
            "TYPE" => kinds = values.iter().map(|v| v.as_bytes()[0]).collect(),
            "COUNT" => counts = values.iter().map(|v| parse_usize(*v)).collect::<Result<_>>()?,
            "WIDTH" => width = values.first().map(|v| parse_usize(*v)).transpose()?,
            "HEIGHT" => height = values.first().map(|v| parse_usize(*v)).transpose()?.unwrap_or(1),
            "POINTS" => points = values.first().map(|v| parse_usize(*v)).transpose()?,
            "DATA" => {
                let format = match values.first().copied() {
                    Some("ascii") => DataFormat::Ascii,
                    Some("binary") => DataFormat::Binary,
                    other => {
                        return Err(Error::parser(format!(
                            "unsupported PCD DATA format: {}",
                            other.unwrap_or("<missing>")
                        )))
                    }
                };

                if counts.is_empty() {
                    counts = vec![1; fields.len()];
                }
                if sizes.len() != fields.len() || kinds.len() != fields.len() || counts.len() != fields.len() {
                    return Err(Error::parser(
                        "PCD FIELDS, SIZE, TYPE and COUNT have different lengths",
                    ));
                }

                let fields = itertools::izip!(fields, sizes, kinds, counts)
                    .map(|(name, size, kind, count)| Field {
                        name,
                        size,
                        kind,
                        count,
                    })
                    .collect();
                let points = points
                    .or_else(|| width.map(|width| width * height))
                    .ok_or_else(|| Error::parser("PCD header without POINTS or WIDTH"))?;

                return Ok(Header {
                    fields,
                    points,
                    format,
                    data_offset: offset,
                });
            }
            _ => (),
        }
    }

    Err(Error::parser("PCD file missing DATA line"))
}

/// Where each attribute we care about lives in a record.
struct Layout {
    xyz: [usize; 3],
    rgb: Option<usize>,
    normal: Option<[usize; 3]>,
}

impl Layout {
    fn new(fields: &[Field]) -> Result<Self> {
        let find = |name: &str| fields.iter().position(|f| f.name == name);
        let xyz = match (find("x"), find("y"), find("z")) {
            (Some(x), Some(y), Some(z)) => [x, y, z],
            _ => return Err(Error::parser("PCD file missing x, y, z fields")),
        };
        let normal = match (find("normal_x"), find("normal_y"), find("normal_z")) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        };

        let rgb = find("rgb").or_else(|| find("rgba"));

        let used = xyz.iter().chain(normal.iter().flatten()).chain(rgb.iter());
        if let Some(field) = used.map(|i| &fields[*i]).find(|f| f.count == 0) {
            return Err(Error::parser(format!("PCD field {} has COUNT 0", field.name)));
        }
        if let Some(field) = rgb.map(|rgb| &fields[rgb]) {
            if field.size != 4 {
                return Err(Error::parser(format!(
                    "PCD {} field must be 4 bytes, got {}",
                    field.name, field.size
                )));
            }
        }

        Ok(Self { xyz, rgb, normal })
    }
}

/// Unpacks a PCL packed color (`0x00RRGGBB`).
fn unpack_rgb(packed: u32) -> [f32; 3] {
    [
        color_from_u8(((packed >> 16) & 0xff) as u8),
        color_from_u8(((packed >> 8) & 0xff) as u8),
        color_from_u8((packed & 0xff) as u8),
    ]
}

fn pack_rgb(color: [f32; 3]) -> u32 {
    ((color_to_u8(color[0]) as u32) << 16)
        | ((color_to_u8(color[1]) as u32) << 8)
        | color_to_u8(color[2]) as u32
}

struct Records {
    points: Vec<f32>,
    colors: Vec<f32>,
    normals: Vec<f32>,
}

impl Records {
    fn with_capacity(len: usize) -> Self {
        Self {
            points: Vec::with_capacity(len * 3),
            colors: Vec::new(),
            normals: Vec::new(),
        }
    }

    fn into_point_cloud(self, layout: &Layout) -> Result<PointCloud> {
        let len = self.points.len() / 3;
        Ok(PointCloud {
            points: Array2::from_shape_vec((len, 3), self.points)?,
            colors: layout
                .rgb
                .map(|_| Array2::from_shape_vec((len, 3), self.colors))
                .transpose()?,
            normals: layout
                .normal
                .map(|_| Array2::from_shape_vec((len, 3), self.normals))
                .transpose()?,
        })
    }
}

fn read_ascii(body: &[u8], header: &Header, layout: &Layout) -> Result<PointCloud> {
    let body = std::str::from_utf8(body).map_err(|err| Error::parser(format!("invalid UTF-8: {err}")))?;

    // Token index of the first value of each field.
    let mut first_token = Vec::with_capacity(header.fields.len());
    let mut tokens_per_point = 0;
    for field in &header.fields {
        first_token.push(tokens_per_point);
        tokens_per_point += field.count;
    }

    // A point takes at least two bytes of text, don't trust POINTS beyond that.
    let mut records = Records::with_capacity(header.points.min(body.len() / 2));
    for (line_no, line) in body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .take(header.points)
    {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < tokens_per_point {
            return Err(Error::parser(format!(
                "PCD point {line_no} has {} values, expected {tokens_per_point}",
                tokens.len()
            )));
        }
        let value = |field: usize| -> Result<f32> {
            let token = tokens[first_token[field]];
            token
                .parse::<f32>()
                .map_err(|err| Error::parser(format!("PCD point {line_no}: `{token}`: {err}")))
        };

        for field in layout.xyz {
            records.points.push(value(field)?);
        }
        if let Some(normal) = layout.normal {
            for field in normal {
                records.normals.push(value(field)?);
            }
        }
        if let Some(rgb) = layout.rgb {
            let token = tokens[first_token[rgb]];
            let packed = if header.fields[rgb].kind == b'F' {
                token.parse::<f32>().map(f32::to_bits).ok()
            } else {
                token.parse::<u32>().ok()
            }
            .ok_or_else(|| Error::parser(format!("PCD point {line_no}: invalid color `{token}`")))?;
            records.colors.extend(unpack_rgb(packed));
        }
    }

    if records.points.len() / 3 != header.points {
        return Err(Error::parser(format!(
            "PCD file declares {} points but has {}",
            header.points,
            records.points.len() / 3
        )));
    }
    records.into_point_cloud(layout)
}

fn read_binary(body: &[u8], header: &Header, layout: &Layout) -> Result<PointCloud> {
    let mut field_offsets = Vec::with_capacity(header.fields.len());
    let mut record_len = 0;
    for field in &header.fields {
        field_offsets.push(record_len);
        record_len += field.byte_len();
    }

    let expected = header
        .points
        .checked_mul(record_len)
        .ok_or_else(|| Error::parser(format!("binary PCD declares too many points: {}", header.points)))?;
    if body.len() < expected {
        return Err(Error::parser(format!(
            "binary PCD data too short: have {} bytes, expected {expected}",
            body.len()
        )));
    }

    let mut records = Records::with_capacity(expected / record_len.max(1));
    for record in body[..expected].chunks_exact(record_len.max(1)) {
        let value = |field: usize| -> Result<f32> {
            let f = &header.fields[field];
            let start = field_offsets[field];
            Ok(f.decode(&record[start..start + f.size])? as f32)
        };

        for field in layout.xyz {
            records.points.push(value(field)?);
        }
        if let Some(normal) = layout.normal {
            for field in normal {
                records.normals.push(value(field)?);
            }
        }
        if let Some(rgb) = layout.rgb {
            let start = field_offsets[rgb];
            let bytes: [u8; 4] = record[start..start + 4]
                .try_into()
                .map_err(|_| Error::parser("PCD rgb field must be 4 bytes"))?;
            records.colors.extend(unpack_rgb(u32::from_le_bytes(bytes)));
        }
    }

    records.into_point_cloud(layout)
}

/// Reads a PCD file (ascii or binary data). Loads `x y z`, the packed `rgb`
/// (or `rgba`) color and `normal_x normal_y normal_z` when present.
pub fn read_pcd(path: impl AsRef<Path>) -> Result<PointCloud> {
    let raw = fs::read(path)?;
    let header = parse_header(&raw)?;
    let layout = Layout::new(&header.fields)?;
    let body = &raw[header.data_offset..];

    match header.format {
        DataFormat::Ascii => read_ascii(body, &header, &layout),
        DataFormat::Binary => read_binary(body, &header, &layout),
    }
}

fn header_text(cloud: &PointCloud, format: DataFormat) -> String {
    let mut fields = vec!["x", "y", "z"];
    let mut sizes = vec!["4"; 3];
    let mut types = vec!["F"; 3];
    if cloud.normals.is_some() {
        fields.extend(["normal_x", "normal_y", "normal_z"]);
        sizes.extend(["4"; 3]);
        types.extend(["F"; 3]);
    }
    if cloud.colors.is_some() {
        fields.push("rgb");
        sizes.push("4");
        types.push("U");
    }

    format!(
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS {}\n\
         SIZE {}\n\
         TYPE {}\n\
         COUNT {}\n\
         WIDTH {}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {}\n\
         DATA {}\n",
        fields.join(" "),
        sizes.join(" "),
        types.join(" "),
        vec!["1"; fields.len()].join(" "),
        cloud.len(),
        cloud.len(),
        match format {
            DataFormat::Ascii => "ascii",
            DataFormat::Binary => "binary",
        }
    )
}

fn row(array: &Option<Array2<f32>>, i: usize) -> Option<[f32; 3]> {
    array
        .as_ref()
        .map(|array| [array[[i, 0]], array[[i, 1]], array[[i, 2]]])
}

/// Writes a PCD file in ASCII format.
pub fn write_pcd(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    cloud.validate()?;

    let mut out = header_text(cloud, DataFormat::Ascii);
    for (i, point) in cloud.points.outer_iter().enumerate() {
        out.push_str(&format!("{} {} {}", point[0], point[1], point[2]));
        if let Some(normal) = row(&cloud.normals, i) {
            out.push_str(&format!(" {} {} {}", normal[0], normal[1], normal[2]));
        }
        if let Some(color) = row(&cloud.colors, i) {
            out.push_str(&format!(" {}", pack_rgb(color)));
        }
        out.push('\n');
    }

    Ok(fs::write(path, out)?)
}

/// Writes a PCD file in binary format.
pub fn write_pcd_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    cloud.validate()?;

    let mut buf = header_text(cloud, DataFormat::Binary).into_bytes();
    for (i, point) in cloud.points.outer_iter().enumerate() {
        point.iter().for_each(|v| buf.extend_from_slice(&v.to_le_bytes()));
        if let Some(normal) = row(&cloud.normals, i) {
            normal.iter().for_each(|v| buf.extend_from_slice(&v.to_le_bytes()));
        }
        if let Some(color) = row(&cloud.colors, i) {
            buf.extend_from_slice(&pack_rgb(color).to_le_bytes());
        }
    }

    Ok(fs::write(path, buf)?)
}
