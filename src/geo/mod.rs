//! In-memory geometries decoded from ".shp" records.
//!
//! Every geometry owns a single flat buffer of `f64` components, ordered
//! point by point. Each point occupies `layout.stride()` consecutive values:
//! X and Y first, then Z (XYZM only), then M. Parts and rings are index
//! ranges into that buffer, so nothing is copied into per-ring containers.

use std::fmt;

pub mod winding;

pub use self::winding::{RingError, WindingOrder};

/// The set of components each point carries.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum Layout {
    XY,
    XYM,
    XYZM,
}

impl Layout {
    /// Number of `f64` components per point.
    pub fn stride(self) -> usize {
        match self {
            Layout::XY => 2,
            Layout::XYM => 3,
            Layout::XYZM => 4,
        }
    }

    /// Index of the Z component within a point, if there is one.
    pub fn z_index(self) -> Option<usize> {
        match self {
            Layout::XY | Layout::XYM => None,
            Layout::XYZM => Some(2),
        }
    }

    /// Index of the M component within a point, if there is one.
    pub fn m_index(self) -> Option<usize> {
        match self {
            Layout::XY => None,
            Layout::XYM => Some(2),
            Layout::XYZM => Some(3),
        }
    }
}

/// An axis-aligned bounding box with one min/max pair per component.
///
/// Components are ordered like points: X, Y, then Z, then M.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct Bounds {
    layout: Layout,
    min: [f64; 4],
    max: [f64; 4],
}

impl Bounds {
    /// Builds a Bounds from `layout.stride()` minimums and maximums.
    ///
    /// Extra values are ignored; missing values are zero.
    pub fn new(layout: Layout, min: &[f64], max: &[f64]) -> Bounds {
        let mut ret = Bounds {
            layout: layout,
            min: [ 0.; 4 ],
            max: [ 0.; 4 ],
        };
        let n = layout.stride();
        for (dst, &src) in ret.min[..n].iter_mut().zip(min.iter()) {
            *dst = src;
        }
        for (dst, &src) in ret.max[..n].iter_mut().zip(max.iter()) {
            *dst = src;
        }
        ret
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn min(&self) -> &[f64] {
        &self.min[..self.layout.stride()]
    }

    pub fn max(&self) -> &[f64] {
        &self.max[..self.layout.stride()]
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Bounds(")?;
        write_components(f, self.min())?;
        write!(f, "-")?;
        write_components(f, self.max())?;
        write!(f, ")")
    }
}

fn write_components(f: &mut fmt::Formatter, components: &[f64]) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in components.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}

fn write_points(f: &mut fmt::Formatter, flat_coords: &[f64], stride: usize) -> fmt::Result {
    write!(f, "[")?;
    for (i, point) in flat_coords.chunks(stride).enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write_components(f, point)?;
    }
    write!(f, "]")
}

/// A single position.
#[derive(Debug,Clone,PartialEq)]
pub struct Point {
    pub layout: Layout,
    pub flat_coords: Box<[f64]>,
}

impl Point {
    pub fn x(&self) -> f64 { self.flat_coords[0] }
    pub fn y(&self) -> f64 { self.flat_coords[1] }
    pub fn z(&self) -> Option<f64> { self.layout.z_index().map(|i| self.flat_coords[i]) }
    pub fn m(&self) -> Option<f64> { self.layout.m_index().map(|i| self.flat_coords[i]) }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_components(f, &self.flat_coords)
    }
}

/// An unordered set of positions.
#[derive(Debug,Clone,PartialEq)]
pub struct MultiPoint {
    pub layout: Layout,
    pub flat_coords: Box<[f64]>,
}

impl MultiPoint {
    pub fn num_points(&self) -> usize {
        self.flat_coords.len() / self.layout.stride()
    }

    /// Returns the components of the `i`th point.
    pub fn point(&self, i: usize) -> &[f64] {
        let stride = self.layout.stride();
        &self.flat_coords[i * stride .. (i + 1) * stride]
    }
}

impl fmt::Display for MultiPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_points(f, &self.flat_coords, self.layout.stride())
    }
}

/// Several line strings sharing one buffer.
///
/// `ends[i]` is the flat-buffer index one past the last component of line
/// string `i`. Line string 0 starts at 0; line string `i` starts at
/// `ends[i - 1]`.
#[derive(Debug,Clone,PartialEq)]
pub struct MultiLineString {
    pub layout: Layout,
    pub flat_coords: Box<[f64]>,
    pub ends: Box<[usize]>,
}

impl MultiLineString {
    pub fn num_line_strings(&self) -> usize {
        self.ends.len()
    }

    /// Returns the flat components of the `i`th line string.
    pub fn line_string(&self, i: usize) -> &[f64] {
        let start = if i == 0 { 0 } else { self.ends[i - 1] };
        &self.flat_coords[start .. self.ends[i]]
    }

    pub fn line_strings<'a>(&'a self) -> impl Iterator<Item=&'a [f64]> + 'a {
        (0 .. self.ends.len()).map(move |i| self.line_string(i))
    }
}

impl fmt::Display for MultiLineString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stride = self.layout.stride();
        write!(f, "[")?;
        for (i, line_string) in self.line_strings().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_points(f, line_string, stride)?;
        }
        write!(f, "]")
    }
}

/// Several polygons sharing one buffer.
///
/// `endss[i]` holds the ring ends of polygon `i`: its outer ring first, then
/// its holes. Ring ends are flat-buffer indexes, and each ring starts where
/// the previous ring (in the whole geometry, not just in its polygon) ended.
#[derive(Debug,Clone,PartialEq)]
pub struct MultiPolygon {
    pub layout: Layout,
    pub flat_coords: Box<[f64]>,
    pub endss: Box<[Box<[usize]>]>,
}

impl MultiPolygon {
    pub fn num_polygons(&self) -> usize {
        self.endss.len()
    }

    /// Returns the rings of the `i`th polygon, outer ring first.
    pub fn polygon(&self, i: usize) -> Vec<&[f64]> {
        let mut start = self.polygon_start(i);
        let mut rings = Vec::with_capacity(self.endss[i].len());
        for &end in self.endss[i].iter() {
            rings.push(&self.flat_coords[start .. end]);
            start = end;
        }
        rings
    }

    fn polygon_start(&self, i: usize) -> usize {
        self.endss[..i].iter().rev()
            .filter_map(|ends| ends.last())
            .next()
            .cloned()
            .unwrap_or(0)
    }
}

impl fmt::Display for MultiPolygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stride = self.layout.stride();
        write!(f, "[")?;
        for i in 0 .. self.num_polygons() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for (j, ring) in self.polygon(i).into_iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write_points(f, ring, stride)?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

/// Any geometry a ".shp" record can hold.
#[derive(Debug,Clone,PartialEq)]
pub enum Geometry {
    Point(Point),
    MultiPoint(MultiPoint),
    MultiLineString(MultiLineString),
    MultiPolygon(MultiPolygon),
}

impl Geometry {
    pub fn layout(&self) -> Layout {
        match self {
            &Geometry::Point(ref g) => g.layout,
            &Geometry::MultiPoint(ref g) => g.layout,
            &Geometry::MultiLineString(ref g) => g.layout,
            &Geometry::MultiPolygon(ref g) => g.layout,
        }
    }

    pub fn flat_coords(&self) -> &[f64] {
        match self {
            &Geometry::Point(ref g) => &g.flat_coords,
            &Geometry::MultiPoint(ref g) => &g.flat_coords,
            &Geometry::MultiLineString(ref g) => &g.flat_coords,
            &Geometry::MultiPolygon(ref g) => &g.flat_coords,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Geometry::Point(ref g) => write!(f, "Point{}", g),
            &Geometry::MultiPoint(ref g) => write!(f, "MultiPoint{}", g),
            &Geometry::MultiLineString(ref g) => write!(f, "MultiLineString{}", g),
            &Geometry::MultiPolygon(ref g) => write!(f, "MultiPolygon{}", g),
        }
    }
}
