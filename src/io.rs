//! Netlist and pattern file formats
//!
//! The engines never read files themselves; these frontends produce the
//! abstract [`crate::network::ParsedNetlist`] that the builder consumes.

mod bench;
mod blif;
mod patterns;

use std::fs::File;
use std::path::Path;

use thiserror::Error;

pub use bench::{parse_bench, write_bench};
pub use blif::parse_blif;
pub use patterns::{read_patterns, write_patterns};

use crate::network::ParsedNetlist;

/// File reading and parsing failures
#[derive(Debug, Error)]
pub enum IoError {
    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Malformed input
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
    /// The file extension does not name a known format
    #[error("unknown netlist format {0}")]
    UnknownFormat(String),
}

/// Parse a netlist file, choosing the format from the extension
///
/// `.bench` and `.blif` are supported.
pub fn parse_netlist_file(path: &Path) -> Result<ParsedNetlist, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let file = File::open(path)?;
    let mut parsed = match ext.as_str() {
        "bench" => parse_bench(file)?,
        "blif" => parse_blif(file)?,
        other => return Err(IoError::UnknownFormat(other.to_string())),
    };
    if parsed.name == "bench" {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            parsed.name = stem.to_string();
        }
    }
    Ok(parsed)
}
