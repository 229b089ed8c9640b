/// Reads ESRI ".shx" index files.
///
/// The index repeats the ".shp" header, then stores one 8-byte entry per
/// record: where that record starts in the ".shp" and how long it is.
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{BigEndian, ByteOrder};

use super::header::{self, ShxHeader, SHX_HEADER_LENGTH};
use super::shp::ShpError;

const SHX_RECORD_LENGTH: usize = 8;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct ShxRecord {
    /// Byte offset of the record header within the ".shp" file.
    pub offset: u64,
    /// Bytes of record content, not counting the record header.
    pub content_length: u64,
}

/// Parses one 8-byte index entry.
pub fn parse_shx_record(buf: &[u8; SHX_RECORD_LENGTH]) -> ShxRecord {
    ShxRecord {
        offset: 2 * BigEndian::read_u32(&buf[0..4]) as u64,
        content_length: 2 * BigEndian::read_u32(&buf[4..8]) as u64,
    }
}

#[derive(Debug,Clone,PartialEq)]
pub struct Shx {
    pub header: ShxHeader,
    pub records: Vec<ShxRecord>,
}

/// Reads a whole ".shx" file of `file_length` bytes.
pub fn read_shx<R: io::Read>(mut file: R, file_length: u64) -> Result<Shx, ShpError> {
    let header = header::read_shx_header(&mut file, file_length)?;

    let n_bytes = file_length - SHX_HEADER_LENGTH as u64;
    if n_bytes % SHX_RECORD_LENGTH as u64 != 0 {
        return Err(ShpError::ParseError(format!("Index has {} bytes of entries, which is not a multiple of {}", n_bytes, SHX_RECORD_LENGTH)));
    }

    let mut buf = Vec::new();
    file.take(n_bytes).read_to_end(&mut buf)?;
    if buf.len() as u64 != n_bytes {
        return Err(ShpError::UnexpectedEndOfData);
    }

    let records: Vec<ShxRecord> = buf.chunks_exact(SHX_RECORD_LENGTH)
        .map(|chunk| {
            let mut entry = [ 0u8; SHX_RECORD_LENGTH ];
            entry.copy_from_slice(chunk);
            parse_shx_record(&entry)
        })
        .collect();
    debug!("read {} .shx records", records.len());

    Ok(Shx {
        header: header,
        records: records,
    })
}

/// Opens an ESRI ".shx" file from the filesystem.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Shx, ShpError> {
    let f = fs::File::open(path)?;
    let file_length = f.metadata()?.len();
    read_shx(io::BufReader::new(f), file_length)
}
