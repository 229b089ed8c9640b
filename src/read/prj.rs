/// Reads ".prj" files: the layer's coordinate system as WKT text.
use std::io;

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct Prj {
    /// The file's text, verbatim.
    pub projection: String,
}

pub fn parse_prj(buf: &[u8]) -> Prj {
    Prj {
        projection: String::from_utf8_lossy(buf).into_owned(),
    }
}

/// Reads a whole ".prj" file.
pub fn read_prj<R: io::Read>(mut file: R) -> io::Result<Prj> {
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(parse_prj(&buf))
}
