//! Decodes ESRI Shapefiles: ".shp" geometry, ".shx" offsets, ".dbf"
//! attributes and the ".prj" and ".cpg" hints that travel with them.
//!
//! Every decoder treats its input as untrusted. Lengths and counts read from
//! a file are checked against the bytes actually present before anything is
//! allocated, and `ReadShpOptions` / `ReadDbfOptions` can cap them further.
//!
//! # Example
//!
//! ```no_run
//! use shapefile_decode::read::shapefile;
//!
//! let shapefile = shapefile::read_zip("roads.zip", shapefile::ReadShapefileOptions::default()).unwrap();
//! println!("{} records", shapefile.num_records());
//! ```

#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;

pub mod geo;
pub mod read;
