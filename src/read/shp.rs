/// Reads ESRI ".shp" Shapefile, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{BigEndian, ByteOrder};

use crate::geo::{self, Bounds, Geometry, Layout, MultiLineString, MultiPoint, MultiPolygon, RingError};
use super::cursor::ByteCursor;
use super::header::{self, ShapeType, ShxHeader, SHX_HEADER_LENGTH};

const SHP_RECORD_HEADER_LENGTH: usize = 8;

#[derive(Debug)]
pub enum ShpError {
    IOError(io::Error),
    /// The input ended in the middle of a header or record.
    UnexpectedEndOfData,
    ParseError(String),
    InvalidFileLength { header: u64, actual: u64 },
    InvalidShapeType(u32),
    UnsupportedShapeType(ShapeType),
    InvalidContentLength { expected: u64, found: u64 },
    /// A configured maximum (parts, points or record size) was exceeded.
    LimitExceeded(String),
    InvalidPart(usize),
    InvalidRing(RingError),
    InvalidRecordNumber { expected: u32, found: u32 },
    /// An error inside the record with this number.
    InRecord(u32, Box<ShpError>),
}

impl error::Error for ShpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShpError::IOError(ref err) => Some(err),
            ShpError::InvalidRing(ref err) => Some(err),
            ShpError::InRecord(_, ref err) => Some(&**err),
            _ => None,
        }
    }
}

impl fmt::Display for ShpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShpError::IOError(ref err) => err.fmt(f),
            ShpError::UnexpectedEndOfData => write!(f, "unexpected end of data"),
            ShpError::ParseError(ref description) => write!(f, "Parse error: {}", description),
            ShpError::InvalidFileLength { header, actual } => write!(f, "invalid file length: header says {} bytes, file has {}", header, actual),
            ShpError::InvalidShapeType(code) => write!(f, "{}: invalid shape type", code),
            ShpError::UnsupportedShapeType(shape_type) => write!(f, "{}: unsupported shape type", shape_type),
            ShpError::InvalidContentLength { expected, found } => write!(f, "invalid content length: expected {} bytes, found {}", expected, found),
            ShpError::LimitExceeded(ref description) => write!(f, "limit exceeded: {}", description),
            ShpError::InvalidPart(part) => write!(f, "{}: invalid part", part),
            ShpError::InvalidRing(ref err) => err.fmt(f),
            ShpError::InvalidRecordNumber { expected, found } => write!(f, "invalid record number: expected {}, found {}", expected, found),
            ShpError::InRecord(number, ref err) => write!(f, "record {}: {}", number, err),
        }
    }
}

impl From<io::Error> for ShpError {
    fn from(err: io::Error) -> ShpError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ShpError::UnexpectedEndOfData
        } else {
            ShpError::IOError(err)
        }
    }
}

impl From<RingError> for ShpError {
    fn from(err: RingError) -> ShpError {
        ShpError::InvalidRing(err)
    }
}

/// Bounds on what a single record may allocate. Zero means unbounded.
#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct ReadShpOptions {
    pub max_parts: usize,
    pub max_points: usize,
    pub max_record_size: usize,
}

#[derive(Debug,Clone,PartialEq)]
pub struct ShpRecord {
    /// 1-based position in the file.
    pub number: u32,
    /// Bytes of content, not counting the 8-byte record header.
    pub content_length: usize,
    pub shape_type: ShapeType,
    /// As stored in the record; None for Null and Point records.
    pub bounds: Option<Bounds>,
    /// None iff shape_type is Null.
    pub geometry: Option<Geometry>,
}

impl fmt::Display for ShpRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.geometry {
            Some(ref geometry) => write!(f, "{}: {}", self.number, geometry),
            None => write!(f, "{}: Null", self.number),
        }
    }
}

fn check_limit(what: &str, n: usize, max: usize) -> Result<(), ShpError> {
    if max != 0 && n > max {
        Err(ShpError::LimitExceeded(format!("{} {}, but at most {} are allowed", n, what, max)))
    } else {
        Ok(())
    }
}

fn check_content_length(expected: u64, found: usize) -> Result<(), ShpError> {
    if expected != found as u64 {
        Err(ShpError::InvalidContentLength { expected: expected, found: found as u64 })
    } else {
        Ok(())
    }
}

/// Number of content bytes a multi-point, polyline or polygon record needs.
fn expected_content_length(layout: Layout, n_parts: Option<usize>, n_points: usize) -> u64 {
    let n_points = n_points as u64;

    // shape type, bounding box, point count
    let mut n = 4 + 32 + 4;
    if let Some(n_parts) = n_parts {
        n += 4 + 4 * n_parts as u64;
    }
    n += 16 * n_points;
    if layout.z_index().is_some() {
        n += 16 + 8 * n_points;
    }
    if layout.m_index().is_some() {
        n += 16 + 8 * n_points;
    }
    n
}

fn has_parts(shape_type: ShapeType) -> bool {
    match shape_type {
        ShapeType::PolyLine | ShapeType::PolyLineM | ShapeType::PolyLineZ
            | ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ => true,
        _ => false,
    }
}

fn read_range(cursor: &mut ByteCursor) -> (f64, f64) {
    let (min, max) = cursor.read_f64_pair();
    (header::normalize_min(min), header::normalize_max(max))
}

/// Reads a record's bounding box: minX, minY, maxX, maxY.
fn read_xy_box(cursor: &mut ByteCursor) -> ((f64, f64), (f64, f64)) {
    let (min_x, min_y) = cursor.read_f64_pair();
    let (max_x, max_y) = cursor.read_f64_pair();
    (
        (header::normalize_min(min_x), header::normalize_min(min_y)),
        (header::normalize_max(max_x), header::normalize_max(max_y)),
    )
}

/// Decodes one record's content: everything after the 8-byte record header.
pub fn parse_record(buf: &[u8], number: u32, options: &ReadShpOptions) -> Result<ShpRecord, ShpError> {
    let mut cursor = ByteCursor::new(buf);
    let shape_type_u32 = cursor.read_u32();
    cursor.check()?;
    let shape_type = ShapeType::supported_with_u32(shape_type_u32)?;

    let layout = match shape_type.layout() {
        None => {
            check_content_length(4, buf.len())?;
            return Ok(ShpRecord {
                number: number,
                content_length: buf.len(),
                shape_type: shape_type,
                bounds: None,
                geometry: None,
            });
        }
        Some(layout) => layout,
    };
    let stride = layout.stride();

    match shape_type {
        ShapeType::Point | ShapeType::PointM | ShapeType::PointZ => {
            check_content_length(4 + 8 * stride as u64, buf.len())?;
            let flat_coords = cursor.read_f64s(stride);
            cursor.check()?;
            return Ok(ShpRecord {
                number: number,
                content_length: buf.len(),
                shape_type: shape_type,
                bounds: None,
                geometry: Some(Geometry::Point(geo::Point {
                    layout: layout,
                    flat_coords: flat_coords.into_boxed_slice(),
                })),
            });
        }
        _ => {}
    }

    let ((min_x, min_y), (max_x, max_y)) = read_xy_box(&mut cursor);

    let n_parts = if has_parts(shape_type) {
        let n_parts = cursor.read_u32() as usize;
        cursor.check()?;
        if n_parts == 0 {
            return Err(ShpError::ParseError(format!("{} record has no parts", shape_type)));
        }
        check_limit("parts", n_parts, options.max_parts)?;
        Some(n_parts)
    } else {
        None
    };

    let n_points = cursor.read_u32() as usize;
    cursor.check()?;
    check_limit("points", n_points, options.max_points)?;

    check_content_length(expected_content_length(layout, n_parts, n_points), buf.len())?;

    let ends = match n_parts {
        Some(n_parts) => cursor.read_ends(stride, n_parts, n_points),
        None => Vec::new(),
    };

    let mut flat_coords = vec![ 0.; stride * n_points ];
    cursor.read_xys(&mut flat_coords, n_points, stride);

    let bounds = match layout {
        Layout::XY => Bounds::new(layout, &[ min_x, min_y ], &[ max_x, max_y ]),
        Layout::XYM => {
            let (min_m, max_m) = read_range(&mut cursor);
            cursor.read_ordinates(&mut flat_coords, n_points, stride, 2);
            Bounds::new(layout, &[ min_x, min_y, min_m ], &[ max_x, max_y, max_m ])
        }
        Layout::XYZM => {
            let (min_z, max_z) = read_range(&mut cursor);
            cursor.read_ordinates(&mut flat_coords, n_points, stride, 2);
            let (min_m, max_m) = read_range(&mut cursor);
            cursor.read_ordinates(&mut flat_coords, n_points, stride, 3);
            Bounds::new(layout, &[ min_x, min_y, min_z, min_m ], &[ max_x, max_y, max_z, max_m ])
        }
    };

    cursor.check()?;

    let flat_coords = flat_coords.into_boxed_slice();
    let geometry = match shape_type {
        ShapeType::MultiPoint | ShapeType::MultiPointM | ShapeType::MultiPointZ => {
            Geometry::MultiPoint(MultiPoint {
                layout: layout,
                flat_coords: flat_coords,
            })
        }
        ShapeType::PolyLine | ShapeType::PolyLineM | ShapeType::PolyLineZ => {
            Geometry::MultiLineString(MultiLineString {
                layout: layout,
                flat_coords: flat_coords,
                ends: ends.into_boxed_slice(),
            })
        }
        ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ => {
            let endss = geo::winding::resolve_endss(layout, &flat_coords, &ends)?;
            Geometry::MultiPolygon(MultiPolygon {
                layout: layout,
                flat_coords: flat_coords,
                endss: endss,
            })
        }
        ShapeType::Null | ShapeType::Point | ShapeType::PointM | ShapeType::PointZ | ShapeType::MultiPatch => {
            return Err(ShpError::ParseError(format!("{} record cannot have parts", shape_type)));
        }
    };

    Ok(ShpRecord {
        number: number,
        content_length: buf.len(),
        shape_type: shape_type,
        bounds: Some(bounds),
        geometry: Some(geometry),
    })
}

/// Fills `buf` unless the input is already at its end.
///
/// Returns Ok(false) if the input ended before the first byte.
fn read_exact_or_eof<R: io::Read>(file: &mut R, buf: &mut [u8]) -> Result<bool, ShpError> {
    let mut n = 0;
    while n < buf.len() {
        match file.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    match n {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        _ => Err(ShpError::UnexpectedEndOfData),
    }
}

/// Reads the next record from the file, and returns the number of bytes that
/// record consumed (including its record header).
///
/// Returns Ok(None) if the file ends cleanly before the record header.
///
/// Side effect: advances the file cursor to the next record.
pub fn read_record<R: io::Read>(file: &mut R, options: &ReadShpOptions) -> Result<Option<(ShpRecord, usize)>, ShpError> {
    let mut header_buf = [ 0u8; SHP_RECORD_HEADER_LENGTH ];
    if !read_exact_or_eof(file, &mut header_buf)? {
        return Ok(None);
    }

    let number = BigEndian::read_u32(&header_buf[0..4]);
    let content_length = 2 * BigEndian::read_u32(&header_buf[4..8]) as usize;
    if content_length < 4 {
        return Err(ShpError::InvalidContentLength { expected: 4, found: content_length as u64 });
    }
    check_limit("content bytes", content_length, options.max_record_size)?;

    // Let the buffer grow as bytes arrive, so a lying length can't allocate.
    let mut buf = Vec::new();
    file.by_ref().take(content_length as u64).read_to_end(&mut buf)?;
    if buf.len() != content_length {
        return Err(ShpError::UnexpectedEndOfData);
    }

    let record = parse_record(&buf, number, options)?;
    trace!("record {}: {}, {} bytes", number, record.shape_type, content_length);
    Ok(Some((record, SHP_RECORD_HEADER_LENGTH + content_length)))
}

/// Iterates over the records of an ESRI ".shp" Shapefile, following
/// instructions at https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// # Example
///
/// ```no_run
/// use shapefile_decode::read::shp;
///
/// let reader = shp::open("countries.shp", shp::ReadShpOptions::default()).unwrap();
///
/// // reader.next(), an Iterator method, returns
/// // Option<Result<shp::ShpRecord, shp::ShpError>>
/// for record in reader {
///     println!("{}", record.unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct ShpReader<R: io::Read> {
    file: R,
    options: ReadShpOptions,
    file_length: u64,
    n_bytes_already_read: u64,
    next_number: u32,
    done: bool,
    pub header: ShxHeader,
}

impl<R: io::Read> ShpReader<R> {
    /// Reads the header. `file_length` is the size of the whole file.
    pub fn new(mut file: R, file_length: u64, options: ReadShpOptions) -> Result<ShpReader<R>, ShpError> {
        let header = header::read_shx_header(&mut file, file_length)?;
        Ok(ShpReader {
            file: file,
            options: options,
            file_length: file_length,
            n_bytes_already_read: SHX_HEADER_LENGTH as u64,
            next_number: 1,
            done: false,
            header: header,
        })
    }
}

impl<R: io::Read> Iterator for ShpReader<R> {
    type Item = Result<ShpRecord, ShpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.n_bytes_already_read >= self.file_length {
            return None;
        }

        let result = match read_record(&mut self.file, &self.options) {
            // The header promised more bytes than the stream holds
            Ok(None) => Err(ShpError::UnexpectedEndOfData),
            Err(err) => Err(ShpError::InRecord(self.next_number, Box::new(err))),
            Ok(Some((record, n_bytes))) => {
                self.n_bytes_already_read += n_bytes as u64;
                if record.number != self.next_number {
                    Err(ShpError::InvalidRecordNumber { expected: self.next_number, found: record.number })
                } else if self.n_bytes_already_read > self.file_length {
                    Err(ShpError::ParseError(format!("The Shapefile header suggests the file is {} bytes long, but it's longer than that.", self.file_length)))
                } else {
                    self.next_number += 1;
                    Ok(record)
                }
            }
        };

        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// A fully-decoded ".shp" file.
#[derive(Debug,Clone,PartialEq)]
pub struct Shp {
    pub header: ShxHeader,
    pub records: Vec<ShpRecord>,
}

impl Shp {
    /// Returns the geometry of the `i`th record (0-based), if it has one.
    pub fn geometry(&self, i: usize) -> Option<&Geometry> {
        self.records.get(i).and_then(|record| record.geometry.as_ref())
    }
}

/// Reads every record of a ".shp" file, stopping at the first error.
pub fn read_shp<R: io::Read>(file: R, file_length: u64, options: ReadShpOptions) -> Result<Shp, ShpError> {
    let mut reader = ShpReader::new(file, file_length, options)?;
    let records = reader.by_ref().collect::<Result<Vec<ShpRecord>, ShpError>>()?;
    debug!("read {} .shp records of type {}", records.len(), reader.header.shape_type);
    Ok(Shp {
        header: reader.header,
        records: records,
    })
}

/// Opens an ESRI ".shp" file from the filesystem.
pub fn open<P: AsRef<Path>>(path: P, options: ReadShpOptions) -> Result<ShpReader<io::BufReader<fs::File>>, ShpError> {
    let f = fs::File::open(path)?;
    let file_length = f.metadata()?.len();
    ShpReader::new(io::BufReader::new(f), file_length, options)
}
