//! Writes the OpenAPI document for the HTTP API.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{env, fs, io, path::PathBuf, process};

use utoipa::OpenApi;
use vrm_monitor::api::handlers::ApiDoc;

fn output_path() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--output" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn main() {
    let json = match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialise OpenAPI document: {e}");
            process::exit(1);
        }
    };

    let written = match output_path() {
        Some(path) => fs::write(&path, &json).map(|()| {
            eprintln!("OpenAPI document written to {}", path.display());
        }),
        None => io::Write::write_all(&mut io::stdout(), json.as_bytes()),
    };

    if let Err(e) = written {
        eprintln!("Failed to write OpenAPI document: {e}");
        process::exit(1);
    }
}
