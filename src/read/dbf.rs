/// Reads xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// Only dBase III tables without memo files are supported.

use std::collections::BTreeMap;
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use encoding::{DecoderTrap, EncodingRef};
use regex::Regex;

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_FIELD_TERMINATOR: u8 = 0x0d;
const DBF_END_OF_FILE: u8 = 0x1a;
const DBF_VERSION: u8 = 3;

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
    static ref DATE: Regex = Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})$").unwrap();
}

#[derive(Debug)]
pub enum DbfError {
    IOError(io::Error),
    /// The input ended in the middle of the header or a record.
    UnexpectedEndOfData,
    ParseError(String),
    UnsupportedVersion(u8),
    MemoUnsupported,
    DbtUnsupported,
    /// A configured maximum (header size, record size, record count) was exceeded.
    LimitExceeded(String),
    InvalidFieldType(u8),
    /// The field lengths plus the deletion flag don't add up to the record size.
    RecordSizeMismatch { fields: usize, header: usize },
    InvalidRecordFlag(u8),
    /// A value that doesn't fit its field's type. `record` is 0-based.
    InvalidField { record: usize, name: String, description: String },
    InvalidEndOfFileMarker(u8),
}

impl error::Error for DbfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            DbfError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DbfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DbfError::IOError(ref err) => err.fmt(f),
            DbfError::UnexpectedEndOfData => write!(f, "unexpected end of data"),
            DbfError::ParseError(ref description) => write!(f, "Parse error: {}", description),
            DbfError::UnsupportedVersion(version) => write!(f, "{}: unsupported version", version),
            DbfError::MemoUnsupported => write!(f, "memo files are not supported"),
            DbfError::DbtUnsupported => write!(f, ".DBT files are not supported"),
            DbfError::LimitExceeded(ref description) => write!(f, "limit exceeded: {}", description),
            DbfError::InvalidFieldType(field_type) => write!(f, "{}: invalid field type", field_type),
            DbfError::RecordSizeMismatch { fields, header } => write!(f, "fields need {} bytes per record, but the header says {}", fields, header),
            DbfError::InvalidRecordFlag(flag) => write!(f, "{}: invalid record flag", flag),
            DbfError::InvalidField { record, ref name, ref description } => write!(f, "record {}: field {}: {}", record, name, description),
            DbfError::InvalidEndOfFileMarker(marker) => write!(f, "{}: invalid end of file marker", marker),
        }
    }
}

impl From<io::Error> for DbfError {
    fn from(err: io::Error) -> DbfError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DbfError::UnexpectedEndOfData
        } else {
            DbfError::IOError(err)
        }
    }
}

/// Bounds and policies for reading a ".dbf". Zero means unbounded.
#[derive(Clone,Copy,Default)]
pub struct ReadDbfOptions {
    pub max_header_size: usize,
    pub max_record_size: usize,
    pub max_records: usize,
    /// Store unparseable values as absent instead of failing.
    pub permissive: bool,
    /// How to decode Character fields. Defaults to UTF-8.
    pub charset: Option<EncodingRef>,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for ReadDbfOptions {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ReadDbfOptions")
            .field("max_header_size", &self.max_header_size)
            .field("max_record_size", &self.max_record_size)
            .field("max_records", &self.max_records)
            .field("permissive", &self.permissive)
            .field("charset", &self.charset.map(|e| e.name()))
            .finish()
    }
}

fn check_limit(what: &str, n: usize, max: usize) -> Result<(), DbfError> {
    if max != 0 && n > max {
        Err(DbfError::LimitExceeded(format!("{} is {}, but at most {} is allowed", what, n, max)))
    } else {
        Ok(())
    }
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct DbfHeader {
    pub version: u8,
    pub memo: bool,
    pub dbt: bool,
    /// None when bytes 1-3 are not a calendar date.
    pub last_update: Option<NaiveDate>,
    pub records: usize,
    pub header_size: usize,
    pub record_size: usize,
}

/// Parses the first 32 bytes of the file.
pub fn parse_dbf_header(buf: &[u8]) -> Result<DbfHeader, DbfError> {
    if buf.len() != DBF_HEADER_LENGTH {
        return Err(DbfError::ParseError(format!("Header must be {} bytes, found {}", DBF_HEADER_LENGTH, buf.len())));
    }

    let version = buf[0] & 0x7;
    if version != DBF_VERSION {
        return Err(DbfError::UnsupportedVersion(version));
    }
    let memo = buf[0] & 0x8 == 0x8;
    if memo {
        return Err(DbfError::MemoUnsupported);
    }
    let dbt = buf[0] & 0x80 == 0x80;
    if dbt {
        return Err(DbfError::DbtUnsupported);
    }

    // bytes 1-3 are "YMD", with years counted from 1900. Plenty of writers
    // leave them zeroed, so a bad date is not an error.
    let last_update = NaiveDate::from_ymd_opt(1900 + buf[1] as i32, buf[2] as u32, buf[3] as u32);
    if last_update.is_none() {
        debug!("ignoring invalid last-update date {}-{}-{}", 1900 + buf[1] as i32, buf[2], buf[3]);
    }

    Ok(DbfHeader {
        version: version,
        memo: memo,
        dbt: dbt,
        last_update: last_update,
        records: LittleEndian::read_u32(&buf[4..8]) as usize,
        header_size: LittleEndian::read_u16(&buf[8..10]) as usize,
        record_size: LittleEndian::read_u16(&buf[10..12]) as usize,
    })
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum DbfFieldType {
    Character,
    Date,
    Float,
    Logical,
    Memo,
    Numeric,
}

impl DbfFieldType {
    pub fn with_u8(u: u8) -> Option<DbfFieldType> {
        match u {
            b'C' => Some(DbfFieldType::Character),
            b'D' => Some(DbfFieldType::Date),
            b'F' => Some(DbfFieldType::Float),
            b'L' => Some(DbfFieldType::Logical),
            b'M' => Some(DbfFieldType::Memo),
            b'N' => Some(DbfFieldType::Numeric),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            DbfFieldType::Character => b'C',
            DbfFieldType::Date => b'D',
            DbfFieldType::Float => b'F',
            DbfFieldType::Logical => b'L',
            DbfFieldType::Memo => b'M',
            DbfFieldType::Numeric => b'N',
        }
    }
}

/// One decoded value. Absent values are represented by the enclosing Option.
#[derive(Debug,Clone,PartialEq)]
pub enum DbfValue {
    Character(String),
    Date(NaiveDate),
    Integer(i64),
    Float(f64),
    Logical(bool),
    /// Memo text stored inline, undecoded.
    Memo(Box<[u8]>),
}

impl fmt::Display for DbfValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DbfValue::Character(ref s) => write!(f, "{}", s),
            DbfValue::Date(ref d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DbfValue::Integer(i) => write!(f, "{}", i),
            DbfValue::Float(x) => write!(f, "{}", x),
            DbfValue::Logical(b) => write!(f, "{}", b),
            DbfValue::Memo(ref bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

fn trim_trailing_zeros(data: &[u8]) -> &[u8] {
    match data.iter().rposition(|&b| b != 0) {
        Some(i) => &data[..i + 1],
        None => &[],
    }
}

fn trim_spaces(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &data[start .. end]
}

fn parse_number(data: &[u8]) -> Result<Option<DbfValue>, String> {
    let text = String::from_utf8_lossy(trim_spaces(trim_trailing_zeros(data))).into_owned();
    if text.is_empty() {
        return Ok(None);
    }

    if INTEGER.is_match(&text) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Some(DbfValue::Integer(i)));
        }
    }

    text.parse::<f64>()
        .map(|x| Some(DbfValue::Float(x)))
        .map_err(|err| format!("{:?}: invalid numeric: {}", text, err))
}

fn parse_date(data: &[u8]) -> Result<Option<DbfValue>, String> {
    let text = String::from_utf8_lossy(data);
    let captures = DATE.captures(&text).ok_or_else(|| format!("{:?}: invalid date", text))?;

    // The regex guarantees these are short runs of digits
    let year = captures[1].parse::<i32>().map_err(|err| err.to_string())?;
    let month = captures[2].parse::<u32>().map_err(|err| err.to_string())?;
    let day = captures[3].parse::<u32>().map_err(|err| err.to_string())?;

    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| Some(DbfValue::Date(d)))
        .ok_or_else(|| format!("{:?}: invalid date", text))
}

fn parse_logical(data: &[u8]) -> Result<Option<DbfValue>, String> {
    match trim_spaces(data) {
        b"?" => Ok(None),
        b"Y" | b"y" | b"T" | b"t" => Ok(Some(DbfValue::Logical(true))),
        b"N" | b"n" | b"F" | b"f" => Ok(Some(DbfValue::Logical(false))),
        _ => Err(format!("{:?}: invalid logical", String::from_utf8_lossy(data))),
    }
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct DbfField {
    pub name: String,
    pub field_type: DbfFieldType,
    /// Byte offset within a record, not counting the deletion flag.
    pub offset: usize,
    pub length: usize,
    pub decimal_count: u8,
    pub work_area_id: u8,
    pub set_fields: u8,
}

impl DbfField {
    /// Decodes this field's bytes from one record.
    ///
    /// Returns Ok(None) for an absent value: a blank number or a `?` logical.
    /// On failure, returns a description of the problem.
    pub fn read_value(&self, data: &[u8], encoding: EncodingRef) -> Result<Option<DbfValue>, String> {
        match self.field_type {
            DbfFieldType::Character => {
                let trimmed = trim_spaces(trim_trailing_zeros(data));
                encoding.decode(trimmed, DecoderTrap::Replace)
                    .map(|s| Some(DbfValue::Character(s)))
                    .map_err(|err| err.into_owned())
            }
            DbfFieldType::Date => parse_date(data),
            DbfFieldType::Float | DbfFieldType::Numeric => parse_number(data),
            DbfFieldType::Logical => parse_logical(data),
            DbfFieldType::Memo => {
                let trimmed = trim_spaces(trim_trailing_zeros(data));
                Ok(Some(DbfValue::Memo(trimmed.to_vec().into_boxed_slice())))
            }
        }
    }
}

/// Parses one 32-byte field descriptor.
fn parse_dbf_field(buf: &[u8], offset: usize, encoding: EncodingRef) -> Result<DbfField, DbfError> {
    let name = encoding.decode(trim_trailing_zeros(&buf[0..11]), DecoderTrap::Replace)
        .map_err(|err| DbfError::ParseError(err.into_owned()))?;
    let field_type = DbfFieldType::with_u8(buf[11]).ok_or(DbfError::InvalidFieldType(buf[11]))?;

    Ok(DbfField {
        name: name,
        field_type: field_type,
        offset: offset,
        length: buf[16] as usize,
        decimal_count: buf[17],
        work_area_id: buf[20],
        set_fields: buf[23],
    })
}

/// One record that isn't deleted.
#[derive(Debug,Clone,PartialEq)]
pub struct DbfRecord {
    /// One value per field, in field order. None means absent.
    pub values: Box<[Option<DbfValue>]>,
}

impl DbfRecord {
    pub fn get(&self, i: usize) -> Option<&DbfValue> {
        self.values.get(i).and_then(|v| v.as_ref())
    }
}

/// Everything in a ".dbf" before the first record.
pub struct DbfMeta {
    pub header: DbfHeader,
    pub fields: Box<[DbfField]>,
    encoding: EncodingRef,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for DbfMeta {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DbfMeta")
            .field("header", &self.header)
            .field("fields", &self.fields)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// Reads the header, including field definitions, from a .dbf file.
///
/// Assumes the cursor is at the start of the file.
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_meta<R: io::Read>(file: &mut R, options: &ReadDbfOptions) -> Result<DbfMeta, DbfError> {
    let encoding = options.charset.unwrap_or(encoding::all::UTF_8);

    let mut buf = [ 0u8; DBF_HEADER_LENGTH ];
    file.read_exact(&mut buf)?;
    let header = parse_dbf_header(&buf)?;
    check_limit("header size", header.header_size, options.max_header_size)?;
    check_limit("record size", header.record_size, options.max_record_size)?;
    check_limit("record count", header.records, options.max_records)?;

    let mut fields = Vec::<DbfField>::new();
    let mut n_bytes = DBF_HEADER_LENGTH;
    let mut offset = 0;
    loop {
        let mut descriptor = [ 0u8; DBF_FIELD_DESCRIPTOR_LENGTH ];
        file.read_exact(&mut descriptor[..1])?;
        n_bytes += 1;
        if descriptor[0] == DBF_FIELD_TERMINATOR {
            break;
        }

        n_bytes += DBF_FIELD_DESCRIPTOR_LENGTH - 1;
        if n_bytes >= header.header_size {
            return Err(DbfError::ParseError(format!("Field descriptors run past the {}-byte header", header.header_size)));
        }
        file.read_exact(&mut descriptor[1..])?;

        let field = parse_dbf_field(&descriptor, offset, encoding)?;
        offset += field.length;
        fields.push(field);
    }

    if n_bytes > header.header_size {
        return Err(DbfError::ParseError(format!("Field descriptors run past the {}-byte header", header.header_size)));
    }
    if n_bytes < header.header_size {
        // Some producers pad the header; skip to the first record
        let n_padding = (header.header_size - n_bytes) as u64;
        if io::copy(&mut file.by_ref().take(n_padding), &mut io::sink())? != n_padding {
            return Err(DbfError::UnexpectedEndOfData);
        }
    }

    if offset + 1 != header.record_size {
        return Err(DbfError::RecordSizeMismatch { fields: offset + 1, header: header.record_size });
    }

    debug!("dbf: {} fields, {} records of {} bytes", fields.len(), header.records, header.record_size);

    Ok(DbfMeta {
        header: header,
        fields: fields.into_boxed_slice(),
        encoding: encoding,
    })
}

/// Decodes one record's bytes, deletion flag included.
///
/// Returns Ok(None) for a deleted record.
fn parse_dbf_record(buf: &[u8], index: usize, meta: &DbfMeta, permissive: bool) -> Result<Option<DbfRecord>, DbfError> {
    match buf[0] {
        b' ' => {}
        b'*' => return Ok(None),
        flag => return Err(DbfError::InvalidRecordFlag(flag)),
    }

    let mut values = Vec::with_capacity(meta.fields.len());
    for field in meta.fields.iter() {
        let data = &buf[1 + field.offset .. 1 + field.offset + field.length];
        match field.read_value(data, meta.encoding) {
            Ok(value) => values.push(value),
            Err(description) => {
                if permissive {
                    warn!("record {}: field {}: {}; treating as absent", index, field.name, description);
                    values.push(None);
                } else {
                    return Err(DbfError::InvalidField {
                        record: index,
                        name: field.name.clone(),
                        description: description,
                    });
                }
            }
        }
    }

    Ok(Some(DbfRecord {
        values: values.into_boxed_slice(),
    }))
}

/// Reads one byte, or None at the end of the input.
fn read_byte<R: io::Read>(file: &mut R) -> Result<Option<u8>, DbfError> {
    let mut buf = [ 0u8; 1 ];
    loop {
        match file.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}

/// Iterates over the records of an xBase ".dbf" file, following instructions
/// at https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// Each item is `Ok(None)` for a deleted record.
///
/// # Example
///
/// ```no_run
/// use shapefile_decode::read::dbf;
///
/// let dbf_reader = dbf::open("countries.dbf", dbf::ReadDbfOptions::default()).unwrap();
/// for record in dbf_reader {
///     println!("{:?}", record);
/// }
/// ```
#[derive(Debug)]
pub struct DbfReader<R: io::Read> {
    file: R,
    permissive: bool,
    n_records_already_iterated: usize,
    done: bool,
    meta: DbfMeta,
}

impl<R: io::Read> DbfReader<R> {
    pub fn new(mut file: R, options: ReadDbfOptions) -> Result<DbfReader<R>, DbfError> {
        let meta = read_dbf_meta(&mut file, &options)?;
        Ok(DbfReader {
            file: file,
            permissive: options.permissive,
            n_records_already_iterated: 0,
            done: false,
            meta: meta,
        })
    }

    pub fn header(&self) -> &DbfHeader {
        &self.meta.header
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.meta.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&DbfField> {
        self.meta.fields.iter().find(|f| f.name == name)
    }

    /// Reads the byte after the last record.
    fn read_end_of_file(&mut self) -> Result<(), DbfError> {
        match read_byte(&mut self.file)? {
            Some(DBF_END_OF_FILE) => Ok(()),
            Some(marker) => Err(DbfError::InvalidEndOfFileMarker(marker)),
            None => {
                warn!("dbf has no end-of-file marker");
                Ok(())
            }
        }
    }

    fn read_next(&mut self) -> Result<Option<DbfRecord>, DbfError> {
        let index = self.n_records_already_iterated;
        self.n_records_already_iterated += 1;

        let mut buf = vec![ 0u8; self.meta.header.record_size ];
        self.file.read_exact(&mut buf)?;
        let record = parse_dbf_record(&buf, index, &self.meta, self.permissive)?;
        trace!("dbf record {}: {}", index, if record.is_some() { "present" } else { "deleted" });
        Ok(record)
    }
}

impl<R: io::Read> Iterator for DbfReader<R> {
    type Item = Result<Option<DbfRecord>, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.n_records_already_iterated == self.meta.header.records {
            self.done = true;
            return match self.read_end_of_file() {
                Ok(()) => None,
                Err(err) => Some(Err(err)),
            };
        }

        let ret = self.read_next();
        if ret.is_err() {
            self.done = true;
        }
        Some(ret)
    }
}

/// A fully-decoded ".dbf" file.
#[derive(Debug,Clone,PartialEq)]
pub struct Dbf {
    pub header: DbfHeader,
    pub fields: Box<[DbfField]>,
    /// One entry per record; None for deleted records.
    pub records: Vec<Option<DbfRecord>>,
}

impl Dbf {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the value of field `name` in the `i`th record (0-based).
    pub fn get(&self, i: usize, name: &str) -> Option<&DbfValue> {
        let field_index = self.field_index(name)?;
        self.records.get(i)
            .and_then(|r| r.as_ref())
            .and_then(|r| r.get(field_index))
    }

    /// Returns the `i`th record as a map from field name to value.
    ///
    /// Returns None if there is no such record or it is deleted.
    pub fn record_map(&self, i: usize) -> Option<BTreeMap<&str, Option<&DbfValue>>> {
        let record = self.records.get(i)?.as_ref()?;
        Some(self.fields.iter()
            .zip(record.values.iter())
            .map(|(field, value)| (field.name.as_str(), value.as_ref()))
            .collect())
    }
}

/// Reads a whole ".dbf" file, stopping at the first error.
pub fn read_dbf<R: io::Read>(file: R, options: ReadDbfOptions) -> Result<Dbf, DbfError> {
    let mut reader = DbfReader::new(file, options)?;
    let records = reader.by_ref().collect::<Result<Vec<Option<DbfRecord>>, DbfError>>()?;
    let DbfReader { meta, .. } = reader;
    Ok(Dbf {
        header: meta.header,
        fields: meta.fields,
        records: records,
    })
}

/// Opens an xBase ".dbf" file from the filesystem.
pub fn open<P: AsRef<Path>>(path: P, options: ReadDbfOptions) -> Result<DbfReader<io::BufReader<fs::File>>, DbfError> {
    let f = fs::File::open(path)?;
    DbfReader::new(io::BufReader::new(f), options)
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;
    use crate::read::test_util::dbf_file;
    use super::*;

    const FIELDS: [(&str, u8, u8, u8); 7] = [
        ("NAME", b'C', 10, 0),
        ("POP", b'N', 8, 0),
        ("AREA", b'N', 8, 2),
        ("RATIO", b'F', 6, 3),
        ("ACTIVE", b'L', 1, 0),
        ("FOUNDED", b'D', 8, 0),
        ("NOTES", b'M', 4, 0),
    ];

    const MONTREAL: &[u8] = concat!(" ", "Montreal  ", " 1780000", "  431.50", " 0.125", "T", "17420517", "memo").as_bytes();
    const NOWHERE: &[u8] = concat!(" ", "Nowhere   ", "     -12", "      -3", "  1e-2", "?", "20000101", "abc ").as_bytes();

    fn read(data: &[u8]) -> Result<Dbf, DbfError> {
        read_dbf(data, ReadDbfOptions::default())
    }

    #[test]
    fn header() {
        let data = dbf_file(&FIELDS, &[], true);
        let dbf = read(&data).unwrap();
        assert_eq!(3, dbf.header.version);
        assert_eq!(NaiveDate::from_ymd_opt(2024, 3, 15), dbf.header.last_update);
        assert_eq!(0, dbf.header.records);
        assert_eq!(32 + 32 * 7 + 1, dbf.header.header_size);
        assert_eq!(46, dbf.header.record_size);
    }

    #[test]
    fn fields() {
        let data = dbf_file(&FIELDS, &[], true);
        let dbf = read(&data).unwrap();
        assert_eq!(7, dbf.fields.len());
        assert_eq!("AREA", dbf.fields[2].name);
        assert_eq!(DbfFieldType::Numeric, dbf.fields[2].field_type);
        assert_eq!(18, dbf.fields[2].offset);
        assert_eq!(8, dbf.fields[2].length);
        assert_eq!(2, dbf.fields[2].decimal_count);
        assert_eq!(Some(6), dbf.field_index("NOTES"));
    }

    #[test]
    fn typed_values() {
        let data = dbf_file(&FIELDS, &[ MONTREAL, NOWHERE ], true);
        let dbf = read(&data).unwrap();
        assert_eq!(2, dbf.records.len());

        assert_eq!(Some(&DbfValue::Character("Montreal".to_string())), dbf.get(0, "NAME"));
        assert_eq!(Some(&DbfValue::Integer(1780000)), dbf.get(0, "POP"));
        assert_eq!(Some(&DbfValue::Float(431.5)), dbf.get(0, "AREA"));
        assert_eq!(Some(&DbfValue::Float(0.125)), dbf.get(0, "RATIO"));
        assert_eq!(Some(&DbfValue::Logical(true)), dbf.get(0, "ACTIVE"));
        assert_eq!(Some(&DbfValue::Date(NaiveDate::from_ymd_opt(1742, 5, 17).unwrap())), dbf.get(0, "FOUNDED"));
        assert_eq!(Some(&DbfValue::Memo(b"memo".to_vec().into_boxed_slice())), dbf.get(0, "NOTES"));

        assert_eq!(Some(&DbfValue::Integer(-12)), dbf.get(1, "POP"));
        assert_eq!(Some(&DbfValue::Integer(-3)), dbf.get(1, "AREA"));
        assert_eq!(Some(&DbfValue::Float(0.01)), dbf.get(1, "RATIO"));
        assert_eq!(None, dbf.get(1, "ACTIVE"));
        assert_eq!(Some(&DbfValue::Memo(b"abc".to_vec().into_boxed_slice())), dbf.get(1, "NOTES"));
    }

    #[test]
    fn blank_numeric_is_absent() {
        let fields = [ ("N", b'N', 4, 0) ];
        let dbf = read(&dbf_file(&fields, &[ b"     " ], true)).unwrap();
        assert_eq!(Some(None), dbf.records[0].as_ref().map(|r| r.get(0)));
    }

    #[test]
    fn huge_integer_falls_back_to_float() {
        let fields = [ ("N", b'N', 20, 0) ];
        let dbf = read(&dbf_file(&fields, &[ b" 99999999999999999999" ], true)).unwrap();
        assert_eq!(Some(&DbfValue::Float(1e20)), dbf.get(0, "N"));
    }

    #[test]
    fn logical_letters() {
        let fields = [ ("L", b'L', 1, 0) ];
        let records: [&[u8]; 9] = [ b" Y", b" y", b" T", b" t", b" N", b" n", b" F", b" f", b" ?" ];
        let dbf = read(&dbf_file(&fields, &records, true)).unwrap();
        let values: Vec<Option<&DbfValue>> = (0 .. records.len()).map(|i| dbf.get(i, "L")).collect();
        let t = Some(&DbfValue::Logical(true));
        let f = Some(&DbfValue::Logical(false));
        assert_eq!(vec![ t, t, t, t, f, f, f, f, None ], values);
    }

    #[test]
    fn invalid_logical() {
        let fields = [ ("L", b'L', 1, 0) ];
        let data = dbf_file(&fields, &[ b" X" ], true);
        match read(&data) {
            Err(DbfError::InvalidField { record: 0, ref name, .. }) => assert_eq!("L", name),
            other => panic!("expected invalid field, got {:?}", other),
        }
    }

    #[test]
    fn permissive_marks_bad_values_absent() {
        let fields = [ ("N", b'N', 4, 0), ("D", b'D', 8, 0) ];
        let data = dbf_file(&fields, &[ b" abcd20200230", b"   4219991231" ], true);
        assert!(matches!(read(&data), Err(DbfError::InvalidField { record: 0, .. })));

        let options = ReadDbfOptions { permissive: true, ..Default::default() };
        let dbf = read_dbf(&data[..], options).unwrap();
        assert_eq!(None, dbf.get(0, "N"));
        assert_eq!(None, dbf.get(0, "D"));
        assert_eq!(Some(&DbfValue::Integer(42)), dbf.get(1, "N"));
        assert_eq!(Some(&DbfValue::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())), dbf.get(1, "D"));
    }

    #[test]
    fn blank_date_is_invalid() {
        let fields = [ ("D", b'D', 8, 0) ];
        let data = dbf_file(&fields, &[ b"         " ], true);
        assert!(matches!(read(&data), Err(DbfError::InvalidField { .. })));
    }

    #[test]
    fn deleted_record() {
        let fields = [ ("C", b'C', 2, 0) ];
        let dbf = read(&dbf_file(&fields, &[ b" ab", b"*cd", b" ef" ], true)).unwrap();
        assert_eq!(3, dbf.records.len());
        assert!(dbf.records[1].is_none());
        assert!(dbf.record_map(1).is_none());
        assert_eq!(Some(&DbfValue::Character("ef".to_string())), dbf.get(2, "C"));
    }

    #[test]
    fn record_map() {
        let fields = [ ("A", b'C', 2, 0), ("B", b'N', 2, 0) ];
        let dbf = read(&dbf_file(&fields, &[ b" ab  " ], true)).unwrap();
        let map = dbf.record_map(0).unwrap();
        assert_eq!(2, map.len());
        assert_eq!(Some(&DbfValue::Character("ab".to_string())), map["A"]);
        assert_eq!(None, map["B"]);
    }

    #[test]
    fn invalid_record_flag() {
        let fields = [ ("C", b'C', 2, 0) ];
        assert!(matches!(read(&dbf_file(&fields, &[ b"#ab" ], true)), Err(DbfError::InvalidRecordFlag(b'#'))));
    }

    #[test]
    fn record_size_must_match_fields() {
        let fields = [ ("C", b'C', 2, 0) ];
        let mut data = dbf_file(&fields, &[ b" ab" ], true);
        data[10] = 4;
        assert!(matches!(read(&data), Err(DbfError::RecordSizeMismatch { fields: 3, header: 4 })));
    }

    #[test]
    fn invalid_field_type() {
        let fields = [ ("C", b'X', 2, 0) ];
        assert!(matches!(read(&dbf_file(&fields, &[], true)), Err(DbfError::InvalidFieldType(b'X'))));
    }

    #[test]
    fn unsupported_versions_and_flags() {
        let fields = [ ("C", b'C', 2, 0) ];
        let mut data = dbf_file(&fields, &[], true);
        data[0] = 0x04;
        assert!(matches!(read(&data), Err(DbfError::UnsupportedVersion(4))));
        data[0] = 0x0b;
        assert!(matches!(read(&data), Err(DbfError::MemoUnsupported)));
        data[0] = 0x83;
        assert!(matches!(read(&data), Err(DbfError::DbtUnsupported)));
    }

    #[test]
    fn invalid_last_update_is_ignored() {
        let mut data = dbf_file(&[ ("C", b'C', 2, 0) ], &[ b" ab" ], true);
        data[2] = 13;
        assert_eq!(None, read(&data).unwrap().header.last_update);

        for b in data[1..4].iter_mut() {
            *b = 0;
        }
        let dbf = read(&data).unwrap();
        assert_eq!(None, dbf.header.last_update);
        assert_eq!(1, dbf.records.len());
        assert_eq!(Some(&DbfValue::Character("ab".to_string())), dbf.get(0, "C"));
    }

    #[test]
    fn missing_end_of_file_marker_is_tolerated() {
        let fields = [ ("C", b'C', 2, 0) ];
        let dbf = read(&dbf_file(&fields, &[ b" ab" ], false)).unwrap();
        assert_eq!(1, dbf.records.len());
    }

    #[test]
    fn wrong_end_of_file_marker() {
        let fields = [ ("C", b'C', 2, 0) ];
        let mut data = dbf_file(&fields, &[ b" ab" ], false);
        data.push(b'!');
        assert!(matches!(read(&data), Err(DbfError::InvalidEndOfFileMarker(b'!'))));
    }

    #[test]
    fn truncated_record() {
        let fields = [ ("C", b'C', 2, 0) ];
        let data = dbf_file(&fields, &[ b" ab", b" cd" ], false);
        assert!(matches!(read(&data[..data.len() - 1]), Err(DbfError::UnexpectedEndOfData)));
    }

    #[test]
    fn padded_header_is_skipped() {
        let fields = [ ("C", b'C', 2, 0) ];
        let mut data = dbf_file(&fields, &[ b" ab" ], true);
        let header_size = 32 + 32 + 1;
        data[8] = (header_size + 3) as u8;
        for _ in 0 .. 3 {
            data.insert(header_size, 0);
        }
        assert_eq!(Some(&DbfValue::Character("ab".to_string())), read(&data).unwrap().get(0, "C"));
    }

    #[test]
    fn descriptors_past_header_size() {
        let fields = [ ("A", b'C', 2, 0), ("B", b'C', 2, 0) ];
        let mut data = dbf_file(&fields, &[], true);
        data[8] = 64;
        assert!(matches!(read(&data), Err(DbfError::ParseError(_))));
    }

    #[test]
    fn limits() {
        let fields = [ ("C", b'C', 2, 0) ];
        let data = dbf_file(&fields, &[ b" ab", b" cd" ], true);
        for options in &[
            ReadDbfOptions { max_records: 1, ..Default::default() },
            ReadDbfOptions { max_record_size: 2, ..Default::default() },
            ReadDbfOptions { max_header_size: 64, ..Default::default() },
        ] {
            assert!(matches!(read_dbf(&data[..], *options), Err(DbfError::LimitExceeded(_))));
        }
        let options = ReadDbfOptions { max_records: 2, max_record_size: 3, max_header_size: 65, ..Default::default() };
        assert!(read_dbf(&data[..], options).is_ok());
    }

    #[test]
    fn charset_override() {
        let fields = [ ("C", b'C', 4, 0) ];
        let data = dbf_file(&fields, &[ b" caf\xe9" ], true);
        let options = ReadDbfOptions { charset: Some(encoding::all::WINDOWS_1252), ..Default::default() };
        let dbf = read_dbf(&data[..], options).unwrap();
        assert_eq!(Some(&DbfValue::Character("caf\u{e9}".to_string())), dbf.get(0, "C"));

        // As UTF-8, the lone byte is replaced rather than failing
        let dbf = read(&data).unwrap();
        assert_eq!(Some(&DbfValue::Character("caf\u{fffd}".to_string())), dbf.get(0, "C"));
    }

    #[test]
    fn reader_streams_records() {
        let fields = [ ("C", b'C', 2, 0) ];
        let data = dbf_file(&fields, &[ b" ab", b"*cd" ], true);
        let mut reader = DbfReader::new(&data[..], ReadDbfOptions::default()).unwrap();
        assert_eq!(1, reader.fields().len());
        assert!(reader.get_field("C").is_some());
        assert!(reader.next().unwrap().unwrap().is_some());
        assert!(reader.next().unwrap().unwrap().is_none());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn fuzz_never_panics() {
        let mut rng = StdRng::seed_from_u64(0x4442_4620);
        let mut deleted = NOWHERE.to_vec();
        deleted[0] = b'*';
        let seed = dbf_file(&FIELDS, &[ MONTREAL, &deleted ], true);
        assert!(read(&seed).is_ok());

        let options = ReadDbfOptions {
            max_header_size: 4096,
            max_record_size: 4096,
            max_records: 4096,
            ..Default::default()
        };
        for _ in 0 .. 2000 {
            let mut data = seed.clone();
            match rng.gen_range(0 .. 3) {
                0 => data.truncate(rng.gen_range(0 .. seed.len())),
                1 => {
                    for _ in 0 .. rng.gen_range(1 .. 8) {
                        let i = rng.gen_range(0 .. data.len());
                        data[i] = rng.gen();
                    }
                }
                _ => {
                    let n = rng.gen_range(0 .. 512);
                    data = (0 .. n).map(|_| rng.gen()).collect();
                }
            }
            let _ = read_dbf(&data[..], options);
            let _ = read_dbf(&data[..], ReadDbfOptions { permissive: true, ..options });
        }
    }
}
