//! The 100-byte header shared by ".shp" and ".shx" files, as per
//! https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::fmt;
use std::io;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::geo::{Bounds, Layout};
use super::shp::ShpError;

pub const SHX_HEADER_LENGTH: usize = 100;
const SHX_MAGIC_NUMBER: u32 = 9994;
const SHX_VERSION: u32 = 1000;

/// Bounds components at or below this value mean "no data".
const NO_DATA_THRESHOLD: f64 = -1e38;

#[derive(Debug,Copy,Clone,PartialEq,Eq,Hash)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    pub fn with_u32(u: u32) -> Option<ShapeType> {
        match u {
            0  => Some(ShapeType::Null),
            1  => Some(ShapeType::Point),
            3  => Some(ShapeType::PolyLine),
            5  => Some(ShapeType::Polygon),
            8  => Some(ShapeType::MultiPoint),
            11 => Some(ShapeType::PointZ),
            13 => Some(ShapeType::PolyLineZ),
            15 => Some(ShapeType::PolygonZ),
            18 => Some(ShapeType::MultiPointZ),
            21 => Some(ShapeType::PointM),
            23 => Some(ShapeType::PolyLineM),
            25 => Some(ShapeType::PolygonM),
            28 => Some(ShapeType::MultiPointM),
            31 => Some(ShapeType::MultiPatch),
            _ => None,
        }
    }

    /// Parses a shape-type code, rejecting unknown codes and MultiPatch.
    pub fn supported_with_u32(u: u32) -> Result<ShapeType, ShpError> {
        match ShapeType::with_u32(u) {
            None => Err(ShpError::InvalidShapeType(u)),
            Some(ShapeType::MultiPatch) => Err(ShpError::UnsupportedShapeType(ShapeType::MultiPatch)),
            Some(shape_type) => Ok(shape_type),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
        }
    }

    /// The coordinate layout of this shape type, or None for Null.
    ///
    /// The "Z" types store M values too, so they are XYZM.
    pub fn layout(self) -> Option<Layout> {
        match self {
            ShapeType::Null => None,
            ShapeType::Point | ShapeType::MultiPoint | ShapeType::PolyLine | ShapeType::Polygon => Some(Layout::XY),
            ShapeType::PointM | ShapeType::MultiPointM | ShapeType::PolyLineM | ShapeType::PolygonM => Some(Layout::XYM),
            ShapeType::PointZ | ShapeType::MultiPointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ
                | ShapeType::MultiPatch => Some(Layout::XYZM),
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Returns true iff `x` is the "no data" sentinel.
pub fn no_data(x: f64) -> bool {
    x <= NO_DATA_THRESHOLD
}

pub(crate) fn normalize_min(x: f64) -> f64 {
    if no_data(x) { f64::INFINITY } else { x }
}

pub(crate) fn normalize_max(x: f64) -> f64 {
    if no_data(x) { f64::NEG_INFINITY } else { x }
}

#[derive(Debug,Copy,Clone,PartialEq)]
pub struct ShxHeader {
    pub shape_type: ShapeType,
    /// None iff shape_type is Null.
    pub bounds: Option<Bounds>,
}

/// Parses the first 100 bytes of a ".shp" or ".shx" file.
///
/// `file_length` is the total number of bytes in the file; the header must
/// agree with it.
pub fn parse_shx_header(buf: &[u8], file_length: u64) -> Result<ShxHeader, ShpError> {
    if buf.len() != SHX_HEADER_LENGTH {
        return Err(ShpError::ParseError(format!("Header must be {} bytes, found {}", SHX_HEADER_LENGTH, buf.len())));
    }

    let magic_number = BigEndian::read_u32(&buf[0..4]);
    if magic_number != SHX_MAGIC_NUMBER {
        return Err(ShpError::ParseError(format!("File has wrong magic number: found {}, expected {}", magic_number, SHX_MAGIC_NUMBER)));
    }

    let header_length = 2 * BigEndian::read_u32(&buf[24..28]) as u64;
    if header_length != file_length {
        return Err(ShpError::InvalidFileLength { header: header_length, actual: file_length });
    }

    let version = LittleEndian::read_u32(&buf[28..32]);
    if version != SHX_VERSION {
        return Err(ShpError::ParseError(format!("File has wrong version: found {}, expected {}", version, SHX_VERSION)));
    }

    let shape_type = ShapeType::supported_with_u32(LittleEndian::read_u32(&buf[32..36]))?;

    // minX, minY, maxX, maxY, minZ, maxZ, minM, maxM
    let mut raw = [ 0f64; 8 ];
    LittleEndian::read_f64_into(&buf[36..100], &mut raw);

    let (min_x, min_y) = (normalize_min(raw[0]), normalize_min(raw[1]));
    let (max_x, max_y) = (normalize_max(raw[2]), normalize_max(raw[3]));
    let (min_z, max_z) = (normalize_min(raw[4]), normalize_max(raw[5]));
    let (min_m, max_m) = (normalize_min(raw[6]), normalize_max(raw[7]));

    let bounds = shape_type.layout().map(|layout| match layout {
        Layout::XY => Bounds::new(layout, &[ min_x, min_y ], &[ max_x, max_y ]),
        Layout::XYM => Bounds::new(layout, &[ min_x, min_y, min_m ], &[ max_x, max_y, max_m ]),
        Layout::XYZM => Bounds::new(layout, &[ min_x, min_y, min_z, min_m ], &[ max_x, max_y, max_z, max_m ]),
    });

    debug!("header: shape type {}, {} bytes", shape_type, file_length);

    Ok(ShxHeader {
        shape_type: shape_type,
        bounds: bounds,
    })
}

/// Reads the first 100 bytes of the file.
///
/// Side-effect: advances the file cursor 100 bytes.
pub fn read_shx_header<R: io::Read>(file: &mut R, file_length: u64) -> Result<ShxHeader, ShpError> {
    if file_length < SHX_HEADER_LENGTH as u64 {
        return Err(ShpError::ParseError(format!("File too short: {} bytes, but the header alone is {}", file_length, SHX_HEADER_LENGTH)));
    }

    let mut buf = [ 0u8; SHX_HEADER_LENGTH ];
    file.read_exact(&mut buf)?;
    parse_shx_header(&buf, file_length)
}
