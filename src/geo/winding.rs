//! Groups polygon rings into outer rings and holes.
//!
//! A ".shp" Polygon record is a flat list of rings. Nothing marks a ring as a
//! hole: clockwise rings are outer boundaries and counter-clockwise rings are
//! holes in the most recent outer boundary.

use std::error;
use std::fmt;
use itertools::Itertools;

use super::Layout;

/// Minimum number of points in a closed ring: a triangle plus its closing point.
const MIN_RING_POINTS: usize = 4;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum RingError {
    /// The ring has this many points, fewer than four.
    TooShort(usize),
    /// The ring encloses no area.
    ZeroArea,
    /// A ring end lies before the previous end or past the end of the buffer.
    InvalidEnd(usize),
}

impl error::Error for RingError {}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RingError::TooShort(n) => write!(f, "ring has {} points, but a ring needs at least {}", n, MIN_RING_POINTS),
            RingError::ZeroArea => write!(f, "zero area ring"),
            RingError::InvalidEnd(end) => write!(f, "{}: invalid ring end", end),
        }
    }
}

/// Returns 2*area of a ring, negative iff the ring is clockwise.
///
/// Only X and Y count; Z and M are ignored. North is positive Y, as in every
/// projection a Shapefile uses.
///
/// Does not assume the ring is closed: an unclosed ring is summed as given.
pub fn signed_area2(flat_coords: &[f64], stride: usize) -> f64 {
    // https://en.wikipedia.org/wiki/Shoelace_formula
    let mut a = 0.;

    for (p1, p2) in flat_coords.chunks(stride).tuple_windows() {
        a += p1[0] * p2[1] - p2[0] * p1[1];
    }

    a
}

/// Returns the winding order of a ring, or an error if it is degenerate.
pub fn winding_order(flat_coords: &[f64], stride: usize) -> Result<WindingOrder, RingError> {
    let n_points = flat_coords.len() / stride;
    if n_points < MIN_RING_POINTS {
        return Err(RingError::TooShort(n_points));
    }

    let a = signed_area2(flat_coords, stride);
    if a == 0. {
        Err(RingError::ZeroArea)
    } else if a < 0. {
        Ok(WindingOrder::Clockwise)
    } else {
        Ok(WindingOrder::CounterClockwise)
    }
}

/// Splits a polygon record's ring ends into one group per polygon.
///
/// `ends` are flat-buffer indexes, ascending. The first ring always opens a
/// polygon. After that, each clockwise ring opens a new polygon and each
/// counter-clockwise ring becomes a hole in the current one.
///
/// Each returned group holds the ends of one polygon's rings, outer ring
/// first.
pub fn resolve_endss(layout: Layout, flat_coords: &[f64], ends: &[usize]) -> Result<Box<[Box<[usize]>]>, RingError> {
    let stride = layout.stride();
    let mut endss = Vec::<Box<[usize]>>::new();
    let mut current = Vec::<usize>::new();
    let mut start = 0;

    for &end in ends {
        let ring = flat_coords.get(start .. end).ok_or(RingError::InvalidEnd(end))?;
        let order = winding_order(ring, stride)?;

        if !current.is_empty() && order == WindingOrder::Clockwise {
            endss.push(current.into_boxed_slice());
            current = Vec::new();
        }
        current.push(end);
        start = end;
    }

    if !current.is_empty() {
        endss.push(current.into_boxed_slice());
    }

    Ok(endss.into_boxed_slice())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::Layout;

    fn flat(points: &[(f64, f64)]) -> Vec<f64> {
        points.iter().flat_map(|&(x, y)| vec![ x, y ]).collect()
    }

    const SQUARE_CW: [(f64, f64); 5] = [ (0., 0.), (0., 4.), (4., 4.), (4., 0.), (0., 0.) ];
    const TRIANGLE_CCW: [(f64, f64); 4] = [ (1., 1.), (3., 1.), (2., 3.), (1., 1.) ];
    const TRIANGLE_CW: [(f64, f64); 4] = [ (1., 1.), (2., 3.), (3., 1.), (1., 1.) ];

    #[test]
    fn clockwise_square_has_negative_area() {
        assert_eq!(-32., signed_area2(&flat(&SQUARE_CW), 2));
        assert_eq!(Ok(WindingOrder::Clockwise), winding_order(&flat(&SQUARE_CW), 2));
    }

    #[test]
    fn area_ignores_z_and_m() {
        let coords = vec![
            0., 0., 9., 9.,
            0., 4., 8., 8.,
            4., 4., 7., 7.,
            4., 0., 6., 6.,
            0., 0., 5., 5.,
        ];
        assert_eq!(-32., signed_area2(&coords, 4));
    }

    #[test]
    fn outer_ring_with_hole() {
        let mut coords = flat(&SQUARE_CW);
        coords.extend(flat(&TRIANGLE_CCW));
        let endss = resolve_endss(Layout::XY, &coords, &[ 10, 18 ]).unwrap();
        assert_eq!(1, endss.len());
        assert_eq!(&[ 10, 18 ], &*endss[0]);
    }

    #[test]
    fn reversed_inner_ring_starts_new_polygon() {
        let mut coords = flat(&SQUARE_CW);
        coords.extend(flat(&TRIANGLE_CW));
        let endss = resolve_endss(Layout::XY, &coords, &[ 10, 18 ]).unwrap();
        assert_eq!(2, endss.len());
        assert_eq!(&[ 10 ], &*endss[0]);
        assert_eq!(&[ 18 ], &*endss[1]);
    }

    #[test]
    fn first_ring_opens_polygon_regardless_of_winding() {
        let coords = flat(&TRIANGLE_CCW);
        let endss = resolve_endss(Layout::XY, &coords, &[ 8 ]).unwrap();
        assert_eq!(1, endss.len());
        assert_eq!(&[ 8 ], &*endss[0]);
    }

    #[test]
    fn zero_area_ring() {
        let coords = flat(&[ (0., 0.), (1., 1.), (2., 2.), (0., 0.) ]);
        assert_eq!(Err(RingError::ZeroArea), resolve_endss(Layout::XY, &coords, &[ 8 ]));
    }

    #[test]
    fn short_ring() {
        let coords = flat(&[ (0., 0.), (1., 0.), (0., 0.) ]);
        assert_eq!(Err(RingError::TooShort(3)), resolve_endss(Layout::XY, &coords, &[ 6 ]));
    }

    #[test]
    fn unclosed_ring_is_kept_as_is() {
        let coords = flat(&[ (0., 0.), (0., 4.), (4., 4.), (4., 0.) ]);
        let endss = resolve_endss(Layout::XY, &coords, &[ 8 ]).unwrap();
        assert_eq!(&[ 8 ], &*endss[0]);
    }

    #[test]
    fn end_past_buffer() {
        let coords = flat(&SQUARE_CW);
        assert_eq!(Err(RingError::InvalidEnd(12)), resolve_endss(Layout::XY, &coords, &[ 12 ]));
    }

    #[test]
    fn empty_ring_list() {
        assert_eq!(0, resolve_endss(Layout::XY, &[], &[]).unwrap().len());
    }
}
