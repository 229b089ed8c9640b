use std::env;
use std::path::PathBuf;
use std::process;
use shapefile_decode::read::shapefile::{self, ReadShapefileOptions, Shapefile, ShapefileError};

fn read(path: &PathBuf) -> Result<Shapefile, ShapefileError> {
    let is_zip = path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));

    if is_zip {
        shapefile::read_zip(path, ReadShapefileOptions::default())
    } else {
        shapefile::open(path, ReadShapefileOptions::default())
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <SHP_OR_ZIP_PATH>", args[0]);
        process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let shapefile = match read(&path) {
        Ok(shapefile) => shapefile,
        Err(err) => {
            eprintln!("{}: {}", path.display(), err);
            process::exit(1);
        }
    };

    if let Some(ref shp) = shapefile.shp {
        println!("{}", shp.header.shape_type);
    }
    if let Some(ref prj) = shapefile.prj {
        println!("{}", prj.projection.trim());
    }

    for i in 0 .. shapefile.num_records() {
        let (attributes, geometry) = shapefile.record(i);
        let geometry = geometry.map_or("null".to_string(), |g| g.to_string());
        match attributes {
            Some(attributes) => {
                let fields: Vec<String> = attributes.iter()
                    .map(|(name, value)| format!("{}={}", name, value.map_or(String::new(), |v| v.to_string())))
                    .collect();
                println!("{}\t{}\t{}", i + 1, geometry, fields.join("; "));
            }
            None => println!("{}\t{}", i + 1, geometry),
        }
    }

    println!("Read {} records", shapefile.num_records());
}
