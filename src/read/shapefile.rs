use std::collections::BTreeMap;
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use itertools::Itertools;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::geo::Geometry;
use super::cpg::{self, Cpg};
use super::dbf::{self, Dbf, DbfError, DbfReader, DbfRecord, DbfValue, ReadDbfOptions};
use super::prj::{self, Prj};
use super::shp::{self, ReadShpOptions, Shp, ShpError, ShpReader, ShpRecord};
use super::shx::{self, Shx};

#[derive(Debug)]
pub enum ShapefileError {
    /// A ".shp" or ".shx" problem.
    ShpError(ShpError),
    DbfError(DbfError),
    IOError(io::Error),
    ZipError(ZipError),
    CpgError(String),
    /// The files don't belong together, or there are too many of them.
    JoinError(String),
}

impl error::Error for ShapefileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShapefileError::ShpError(ref err) => Some(err),
            ShapefileError::DbfError(ref err) => Some(err),
            ShapefileError::IOError(ref err) => Some(err),
            ShapefileError::ZipError(ref err) => Some(err),
            ShapefileError::CpgError(_) => None,
            ShapefileError::JoinError(_) => None,
        }
    }
}

impl fmt::Display for ShapefileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShapefileError::ShpError(ref err) => err.fmt(f),
            ShapefileError::DbfError(ref err) => err.fmt(f),
            ShapefileError::IOError(ref err) => err.fmt(f),
            ShapefileError::ZipError(ref err) => err.fmt(f),
            ShapefileError::CpgError(ref description) => write!(f, "Parse error: {}", description),
            ShapefileError::JoinError(ref description) => write!(f, "Parse error: {}", description),
        }
    }
}

impl From<ShpError> for ShapefileError {
    fn from(err: ShpError) -> ShapefileError {
        ShapefileError::ShpError(err)
    }
}

impl From<DbfError> for ShapefileError {
    fn from(err: DbfError) -> ShapefileError {
        ShapefileError::DbfError(err)
    }
}

impl From<io::Error> for ShapefileError {
    fn from(err: io::Error) -> ShapefileError {
        ShapefileError::IOError(err)
    }
}

impl From<ZipError> for ShapefileError {
    fn from(err: ZipError) -> ShapefileError {
        ShapefileError::ZipError(err)
    }
}

#[derive(Debug,Clone,Copy,Default)]
pub struct ReadShapefileOptions {
    pub shp: ReadShpOptions,
    /// When `dbf.charset` is None, the ".cpg" (if any) picks the charset.
    pub dbf: ReadDbfOptions,
}

/// One file of a Shapefile bundle, named by its extension.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum Component {
    Cpg,
    Dbf,
    Prj,
    Shp,
    Shx,
}

/// Decoding order: ".cpg" comes before ".dbf" so it can pick the charset.
const COMPONENTS: [Component; 5] = [
    Component::Cpg,
    Component::Prj,
    Component::Shp,
    Component::Shx,
    Component::Dbf,
];

impl Component {
    fn with_path(path: &Path) -> Option<Component> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "cpg" => Some(Component::Cpg),
            "dbf" => Some(Component::Dbf),
            "prj" => Some(Component::Prj),
            "shp" => Some(Component::Shp),
            "shx" => Some(Component::Shx),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Component::Cpg => "cpg",
            Component::Dbf => "dbf",
            Component::Prj => "prj",
            Component::Shp => "shp",
            Component::Shx => "shx",
        }
    }
}

/// Remembers at most one source per component.
fn add_source<T>(sources: &mut Vec<(Component, T)>, component: Component, source: T) -> Result<(), ShapefileError> {
    if sources.iter().any(|&(c, _)| c == component) {
        return Err(ShapefileError::JoinError(format!("too many .{} files", component.extension())));
    }
    sources.push((component, source));
    Ok(())
}

/// Every file of a Shapefile bundle. Each is optional.
#[derive(Debug)]
pub struct Shapefile {
    pub cpg: Option<Cpg>,
    pub dbf: Option<Dbf>,
    pub prj: Option<Prj>,
    pub shp: Option<Shp>,
    pub shx: Option<Shx>,
}

impl Shapefile {
    fn empty() -> Shapefile {
        Shapefile {
            cpg: None,
            dbf: None,
            prj: None,
            shp: None,
            shx: None,
        }
    }

    /// Decodes one file into the matching slot.
    fn decode<R: io::Read>(&mut self, component: Component, mut file: R, file_length: u64, options: &ReadShapefileOptions) -> Result<(), ShapefileError> {
        debug!("decoding .{} ({} bytes)", component.extension(), file_length);
        match component {
            Component::Cpg => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                self.cpg = Some(cpg::parse_cpg(&buf).map_err(ShapefileError::CpgError)?);
            }
            Component::Dbf => {
                let mut dbf_options = options.dbf;
                if dbf_options.charset.is_none() {
                    dbf_options.charset = self.cpg.as_ref().map(|cpg| cpg.encoding);
                }
                self.dbf = Some(dbf::read_dbf(file, dbf_options)?);
            }
            Component::Prj => self.prj = Some(prj::read_prj(file)?),
            Component::Shp => self.shp = Some(shp::read_shp(file, file_length, options.shp)?),
            Component::Shx => self.shx = Some(shx::read_shx(file, file_length)?),
        }
        Ok(())
    }

    fn check_record_counts(&self) -> Result<(), ShapefileError> {
        let counts = [
            ("shp", self.shp.as_ref().map(|shp| shp.records.len())),
            ("shx", self.shx.as_ref().map(|shx| shx.records.len())),
            ("dbf", self.dbf.as_ref().map(|dbf| dbf.records.len())),
        ];

        for ((a, n_a), (b, n_b)) in counts.iter().filter_map(|&(ext, n)| n.map(|n| (ext, n))).tuple_windows() {
            if n_a != n_b {
                return Err(ShapefileError::JoinError(format!("inconsistent number of records: .{} has {}, .{} has {}", a, n_a, b, n_b)));
            }
        }
        Ok(())
    }

    /// The number of records, from whichever file is present.
    pub fn num_records(&self) -> usize {
        if let Some(ref dbf) = self.dbf {
            dbf.records.len()
        } else if let Some(ref shp) = self.shp {
            shp.records.len()
        } else if let Some(ref shx) = self.shx {
            shx.records.len()
        } else {
            0
        }
    }

    /// Returns the `i`th record's attributes and geometry.
    ///
    /// Attributes are None when there is no ".dbf" or the record is deleted.
    /// Geometry is None when there is no ".shp" or the record is Null.
    pub fn record(&self, i: usize) -> (Option<BTreeMap<&str, Option<&DbfValue>>>, Option<&Geometry>) {
        let attributes = self.dbf.as_ref().and_then(|dbf| dbf.record_map(i));
        let geometry = self.shp.as_ref().and_then(|shp| shp.geometry(i));
        (attributes, geometry)
    }
}

/// Reads a Shapefile from the files next to `path`.
///
/// `path` may name the ".shp" or be a bare basename. Siblings match when
/// their stem is the same and their extension matches without regard to
/// case, so "roads.SHP" and "roads.dbf" belong together.
///
/// # Example
///
/// ```no_run
/// use shapefile_decode::read::shapefile;
///
/// let shapefile = shapefile::open("data/roads.shp", shapefile::ReadShapefileOptions::default()).unwrap();
/// for i in 0 .. shapefile.num_records() {
///     let (attributes, geometry) = shapefile.record(i);
///     println!("{:?} {:?}", attributes, geometry);
/// }
/// ```
pub fn open<P: AsRef<Path>>(path: P, options: ReadShapefileOptions) -> Result<Shapefile, ShapefileError> {
    let path = path.as_ref();
    let stem = match Component::with_path(path) {
        Some(_) => path.file_stem(),
        None => path.file_name(),
    }.ok_or_else(|| ShapefileError::JoinError(format!("{}: not a file name", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut sources: Vec<(Component, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let sibling = entry?.path();
        if sibling.file_stem() != Some(stem) {
            continue;
        }
        if let Some(component) = Component::with_path(&sibling) {
            add_source(&mut sources, component, sibling)?;
        }
    }

    let mut shapefile = Shapefile::empty();
    for &component in COMPONENTS.iter() {
        if let Some((_, sibling)) = sources.iter().find(|&&(c, _)| c == component) {
            let f = fs::File::open(sibling)?;
            let file_length = f.metadata()?.len();
            shapefile.decode(component, io::BufReader::new(f), file_length, &options)?;
        }
    }
    shapefile.check_record_counts()?;
    Ok(shapefile)
}

/// True when a zip entry lives under a "__MACOSX" resource-fork directory.
pub fn is_macosx_path(name: &str) -> bool {
    name.split(|c| c == '/' || c == '\\').any(|part| part == "__MACOSX")
}

/// Reads a Shapefile from a zip archive holding one of each file.
pub fn read_zip_archive<R: io::Read + io::Seek>(reader: R, options: ReadShapefileOptions) -> Result<Shapefile, ShapefileError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut sources: Vec<(Component, usize)> = Vec::new();
    for i in 0 .. archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() || is_macosx_path(entry.name()) {
            continue;
        }
        if let Some(component) = Component::with_path(Path::new(entry.name())) {
            add_source(&mut sources, component, i)?;
        }
    }

    let mut shapefile = Shapefile::empty();
    for &component in COMPONENTS.iter() {
        if let Some(&(_, i)) = sources.iter().find(|&&(c, _)| c == component) {
            let entry = archive.by_index(i)?;
            let file_length = entry.size();
            shapefile.decode(component, entry, file_length, &options)?;
        }
    }
    shapefile.check_record_counts()?;
    Ok(shapefile)
}

/// Reads a Shapefile from a ".zip" file on the filesystem.
pub fn read_zip<P: AsRef<Path>>(path: P, options: ReadShapefileOptions) -> Result<Shapefile, ShapefileError> {
    let f = fs::File::open(path)?;
    read_zip_archive(io::BufReader::new(f), options)
}

/// One ".shp" record and the ".dbf" row with the same index.
#[derive(Debug,Clone,PartialEq)]
pub struct ShapefileRecord {
    pub shp: ShpRecord,
    /// None when the row is deleted.
    pub dbf: Option<DbfRecord>,
}

/// Iterates over ".shp" and ".dbf" records simultaneously.
///
/// Unlike `open`, this never holds more than one record in memory.
#[derive(Debug)]
pub struct ShapefileReader<R: io::Read, S: io::Read> {
    shp_reader: ShpReader<R>,
    dbf_reader: DbfReader<S>,
    done: bool,
}

impl<R: io::Read, S: io::Read> ShapefileReader<R, S> {
    pub fn new(shp_reader: ShpReader<R>, dbf_reader: DbfReader<S>) -> ShapefileReader<R, S> {
        ShapefileReader {
            shp_reader: shp_reader,
            dbf_reader: dbf_reader,
            done: false,
        }
    }

    pub fn dbf_reader(&self) -> &DbfReader<S> {
        &self.dbf_reader
    }
}

impl<R: io::Read, S: io::Read> Iterator for ShapefileReader<R, S> {
    type Item = Result<ShapefileRecord, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let ret = match (self.shp_reader.next(), self.dbf_reader.next()) {
            // check for errors first: an error can arrive in place of the
            // end of one file
            (Some(Err(err)), _) => Err(ShapefileError::ShpError(err)),
            (_, Some(Err(err))) => Err(ShapefileError::DbfError(err)),

            // check for end of files
            (None, None) => {
                self.done = true;
                return None;
            }
            (Some(_), None) => Err(ShapefileError::JoinError("'.shp' file has more records than '.dbf' file".to_string())),
            (None, Some(_)) => Err(ShapefileError::JoinError("'.dbf' file has more records than '.shp' file".to_string())),

            // we have records!
            (Some(Ok(shp)), Some(Ok(dbf))) => Ok(ShapefileRecord {
                shp: shp,
                dbf: dbf,
            }),
        };

        if ret.is_err() {
            self.done = true;
        }
        Some(ret)
    }
}

/// Streams the ".shp" at `shp_path` alongside the ".dbf" with the same stem.
pub fn open_reader<P: AsRef<Path>>(shp_path: P, options: ReadShapefileOptions) -> Result<ShapefileReader<io::BufReader<fs::File>, io::BufReader<fs::File>>, ShapefileError> {
    let shp_reader = shp::open(shp_path.as_ref(), options.shp)?;
    let dbf_path = shp_path.as_ref().with_extension("dbf");
    let dbf_reader = dbf::open(dbf_path, options.dbf)?;
    Ok(ShapefileReader::new(shp_reader, dbf_reader))
}
