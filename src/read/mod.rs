//! Decoders for each file in a Shapefile bundle.
//!
//! * `shp`: geometry records
//! * `shx`: record offsets
//! * `dbf`: attribute table
//! * `prj`, `cpg`: projection and character-set hints
//! * `shapefile`: reads all of the above, from a directory or a zip archive

mod cursor;
pub mod cpg;
pub mod dbf;
pub mod header;
pub mod prj;
pub mod shapefile;
pub mod shp;
pub mod shx;

pub use self::cursor::{ByteCursor, CursorError};
pub use self::dbf::{Dbf, DbfError, DbfField, DbfFieldType, DbfHeader, DbfReader, DbfRecord, DbfValue, ReadDbfOptions};
pub use self::header::{ShapeType, ShxHeader};
pub use self::shapefile::{Shapefile, ShapefileError, ReadShapefileOptions};
pub use self::shp::{ReadShpOptions, Shp, ShpError, ShpReader, ShpRecord};
pub use self::shx::{Shx, ShxRecord};

/// Builds byte fixtures for the decoders' tests.
#[cfg(test)]
pub(crate) mod test_util {
    use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
    use super::header::ShapeType;

    pub const DEFAULT_BOUNDS: [f64; 8] = [ -1., -2., 3., 4., -5., 6., -7., 8. ];

    pub fn shx_header_with_bounds(shape_type: ShapeType, file_length: usize, bounds: [f64; 8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(100);
        buf.write_u32::<BigEndian>(9994).unwrap();
        buf.extend(&[ 0u8; 20 ]);
        buf.write_u32::<BigEndian>((file_length / 2) as u32).unwrap();
        buf.write_u32::<LittleEndian>(1000).unwrap();
        buf.write_u32::<LittleEndian>(shape_type.as_u32()).unwrap();
        for &b in bounds.iter() {
            buf.write_f64::<LittleEndian>(b).unwrap();
        }
        buf
    }

    pub fn shx_header(shape_type: ShapeType, file_length: usize) -> Vec<u8> {
        shx_header_with_bounds(shape_type, file_length, DEFAULT_BOUNDS)
    }

    /// Rewrites the header's file-length field.
    pub fn set_file_length(data: &mut [u8], file_length: usize) {
        let mut field = Vec::new();
        field.write_u32::<BigEndian>((file_length / 2) as u32).unwrap();
        data[24..28].copy_from_slice(&field);
    }

    pub fn null_content() -> Vec<u8> {
        vec![ 0, 0, 0, 0 ]
    }

    pub fn point_content(shape_type: ShapeType, values: &[f64]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(shape_type.as_u32()).unwrap();
        for &v in values {
            buf.write_f64::<LittleEndian>(v).unwrap();
        }
        buf
    }

    fn range(values: &[f64]) -> (f64, f64) {
        values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| (min.min(v), max.max(v)))
    }

    /// Builds a MultiPoint, PolyLine or Polygon record's content.
    ///
    /// `parts` is ignored for MultiPoint types. `zs` and `ms` are written
    /// only when the shape type's layout has them.
    pub fn multi_content(shape_type: ShapeType, parts: &[u32], points: &[(f64, f64)], zs: &[f64], ms: &[f64]) -> Vec<u8> {
        let layout = shape_type.layout().unwrap();
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let (min_x, max_x) = range(&xs);
        let (min_y, max_y) = range(&ys);

        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(shape_type.as_u32()).unwrap();
        for &v in &[ min_x, min_y, max_x, max_y ] {
            buf.write_f64::<LittleEndian>(v).unwrap();
        }
        let with_parts = match shape_type {
            ShapeType::MultiPoint | ShapeType::MultiPointM | ShapeType::MultiPointZ => false,
            _ => true,
        };
        if with_parts {
            buf.write_u32::<LittleEndian>(parts.len() as u32).unwrap();
        }
        buf.write_u32::<LittleEndian>(points.len() as u32).unwrap();
        if with_parts {
            for &part in parts {
                buf.write_u32::<LittleEndian>(part).unwrap();
            }
        }
        for &(x, y) in points {
            buf.write_f64::<LittleEndian>(x).unwrap();
            buf.write_f64::<LittleEndian>(y).unwrap();
        }

        let mut blocks = Vec::new();
        if layout.z_index().is_some() {
            blocks.push(zs);
        }
        if layout.m_index().is_some() {
            blocks.push(ms);
        }
        for values in blocks {
            let (min, max) = range(values);
            buf.write_f64::<LittleEndian>(min).unwrap();
            buf.write_f64::<LittleEndian>(max).unwrap();
            for &v in values {
                buf.write_f64::<LittleEndian>(v).unwrap();
            }
        }
        buf
    }

    /// Prepends an 8-byte record header.
    pub fn record(number: u32, content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(number).unwrap();
        buf.write_u32::<BigEndian>((content.len() / 2) as u32).unwrap();
        buf.extend(content);
        buf
    }

    pub fn shp_file(shape_type: ShapeType, contents: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            body.extend(record(i as u32 + 1, content));
        }
        let mut buf = shx_header(shape_type, 100 + body.len());
        buf.extend(body);
        buf
    }

    pub fn shx_file(shape_type: ShapeType, content_lengths: &[usize]) -> Vec<u8> {
        let mut buf = shx_header(shape_type, 100 + 8 * content_lengths.len());
        let mut offset = 100;
        for &content_length in content_lengths {
            buf.write_u32::<BigEndian>((offset / 2) as u32).unwrap();
            buf.write_u32::<BigEndian>((content_length / 2) as u32).unwrap();
            offset += 8 + content_length;
        }
        buf
    }

    /// Builds a dBase III ".dbf" file.
    ///
    /// Each field is (name, type, length, decimal count). Each record is its
    /// raw bytes, deletion flag included.
    pub fn dbf_file(fields: &[(&str, u8, u8, u8)], records: &[&[u8]], eof_marker: bool) -> Vec<u8> {
        let record_size: usize = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();
        let header_size = 32 + 32 * fields.len() + 1;

        let mut buf = Vec::new();
        buf.extend(&[ 0x03, 124, 3, 15 ]);
        buf.write_u32::<LittleEndian>(records.len() as u32).unwrap();
        buf.write_u16::<LittleEndian>(header_size as u16).unwrap();
        buf.write_u16::<LittleEndian>(record_size as u16).unwrap();
        buf.extend(&[ 0u8; 20 ]);

        for &(name, field_type, length, decimal_count) in fields {
            let mut descriptor = [ 0u8; 32 ];
            descriptor[..name.len()].copy_from_slice(name.as_bytes());
            descriptor[11] = field_type;
            descriptor[16] = length;
            descriptor[17] = decimal_count;
            buf.extend(&descriptor[..]);
        }
        buf.push(0x0d);

        for &record in records {
            buf.extend(record);
        }
        if eof_marker {
            buf.push(0x1a);
        }
        buf
    }
}
