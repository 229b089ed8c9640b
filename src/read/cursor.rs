//! A forward-only reader over one ".shp" record's content bytes.
//!
//! Every read that runs out of bytes latches an error. After that, every
//! read returns zeros (or nothing) without touching the buffer, so a decoder
//! can issue a run of reads and check `err()` once at the end. Values read
//! after the first failure are garbage: always check before using them.

use std::error;
use std::fmt;
use byteorder::{ByteOrder, LittleEndian};

use super::shp::ShpError;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum CursorError {
    UnexpectedEndOfData,
    /// A part table entry (a point index) is out of order or out of range.
    InvalidPart(usize),
}

impl error::Error for CursorError {}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CursorError::UnexpectedEndOfData => write!(f, "unexpected end of data"),
            CursorError::InvalidPart(part) => write!(f, "{}: invalid part", part),
        }
    }
}

impl From<CursorError> for ShpError {
    fn from(err: CursorError) -> ShpError {
        match err {
            CursorError::UnexpectedEndOfData => ShpError::UnexpectedEndOfData,
            CursorError::InvalidPart(part) => ShpError::InvalidPart(part),
        }
    }
}

#[derive(Debug)]
pub struct ByteCursor<'a> {
    rest: &'a [u8],
    err: Option<CursorError>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor {
            rest: data,
            err: None,
        }
    }

    /// The first error any read hit, if any.
    pub fn err(&self) -> Option<CursorError> {
        self.err
    }

    /// Fails with the first error any read hit.
    pub fn check(&self) -> Result<(), ShpError> {
        match self.err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn fail(&mut self, err: CursorError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Consumes `n_items * item_size` bytes, or latches an error.
    fn take(&mut self, n_items: usize, item_size: usize) -> Option<&'a [u8]> {
        if self.err.is_some() {
            return None;
        }
        match n_items.checked_mul(item_size) {
            Some(n) if n <= self.rest.len() => {
                let (head, tail) = self.rest.split_at(n);
                self.rest = tail;
                Some(head)
            }
            _ => {
                self.fail(CursorError::UnexpectedEndOfData);
                None
            }
        }
    }

    pub fn read_u32(&mut self) -> u32 {
        match self.take(1, 4) {
            Some(buf) => LittleEndian::read_u32(buf),
            None => 0,
        }
    }

    pub fn read_f64(&mut self) -> f64 {
        match self.take(1, 8) {
            Some(buf) => LittleEndian::read_f64(buf),
            None => 0.,
        }
    }

    pub fn read_f64_pair(&mut self) -> (f64, f64) {
        match self.take(2, 8) {
            Some(buf) => (LittleEndian::read_f64(&buf[0..8]), LittleEndian::read_f64(&buf[8..16])),
            None => (0., 0.),
        }
    }

    pub fn read_f64s(&mut self, n: usize) -> Vec<f64> {
        match self.take(n, 8) {
            Some(buf) => buf.chunks_exact(8).map(LittleEndian::read_f64).collect(),
            None => Vec::new(),
        }
    }

    /// Reads `n` values into component `index` of the first `n` points.
    ///
    /// This is how ".shp" stores Z and M: one trailing array per component.
    pub fn read_ordinates(&mut self, flat_coords: &mut [f64], n: usize, stride: usize, index: usize) {
        if let Some(buf) = self.take(n, 8) {
            for (point, b) in flat_coords.chunks_exact_mut(stride).zip(buf.chunks_exact(8)) {
                point[index] = LittleEndian::read_f64(b);
            }
        }
    }

    /// Reads `n` interleaved X,Y pairs into the first two components of the
    /// first `n` points.
    pub fn read_xys(&mut self, flat_coords: &mut [f64], n: usize, stride: usize) {
        if let Some(buf) = self.take(n, 16) {
            for (point, b) in flat_coords.chunks_exact_mut(stride).zip(buf.chunks_exact(16)) {
                point[0] = LittleEndian::read_f64(&b[0..8]);
                point[1] = LittleEndian::read_f64(&b[8..16]);
            }
        }
    }

    /// Reads a part-start table and returns it as flat-buffer ring ends.
    ///
    /// The first part must start at point 0. Later starts must not decrease
    /// and must not pass `n_points`. The last end is always
    /// `stride * n_points`.
    pub fn read_ends(&mut self, stride: usize, n_parts: usize, n_points: usize) -> Vec<usize> {
        let buf = match self.take(n_parts, 4) {
            Some(buf) => buf,
            None => return Vec::new(),
        };

        let mut starts = buf.chunks_exact(4).map(|b| LittleEndian::read_u32(b) as usize);
        match starts.next() {
            Some(0) => {}
            Some(first) => {
                self.fail(CursorError::InvalidPart(first));
                return Vec::new();
            }
            None => return Vec::new(),
        }

        let mut ends = Vec::with_capacity(n_parts);
        let mut previous = 0;
        for start in starts {
            if start > n_points || start < previous {
                self.fail(CursorError::InvalidPart(start));
                return Vec::new();
            }
            ends.push(stride * start);
            previous = start;
        }
        ends.push(stride * n_points);
        ends
    }
}
