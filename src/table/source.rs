//! Delimited text sources and their record stream.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::PathBuf;

use tracing::debug;

use super::delimiter::{Delimiter, DelimiterSpec};
use crate::error::{GatewayError, Result};

/// Where delimited text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// A file on disk, read once, lazily.
    Path(PathBuf),
    /// Text supplied directly by the caller.
    Inline(String),
}

impl TableSource {
    /// Identifier used in logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Inline(text) => format!("<inline, {} bytes>", text.len()),
        }
    }
}

/// Lazy sequence of records, one `Vec<String>` per line of input.
pub struct Records {
    inner: csv::ByteRecordsIntoIter<Box<dyn Read + Send>>,
}

impl Iterator for Records {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|record| {
            record
                .map(|fields| {
                    fields
                        .iter()
                        .map(|field| String::from_utf8_lossy(field).into_owned())
                        .collect()
                })
                .map_err(map_csv_error)
        })
    }
}

/// Opens the source, resolves the delimiter and returns the record stream.
///
/// Unreadable sources fail here, before any schema work.
pub fn open_records(source: &TableSource, spec: DelimiterSpec) -> Result<(Delimiter, Records)> {
    let (delimiter, reader): (Delimiter, Box<dyn Read + Send>) = match source {
        TableSource::Path(path) => {
            if path.as_os_str().is_empty() {
                return Err(GatewayError::source_unavailable("No file path given"));
            }
            let file = File::open(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    GatewayError::source_unavailable(format!("File not found: {}", path.display()))
                }
                _ => GatewayError::source_unavailable(format!(
                    "Unable to open {}: {e}",
                    path.display()
                )),
            })?;
            let is_file = file.metadata().map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                return Err(GatewayError::source_unavailable(format!(
                    "Not a regular file: {}",
                    path.display()
                )));
            }

            let mut reader = BufReader::new(file);
            let delimiter = spec.resolve(&mut reader)?;
            reader.rewind().map_err(|e| {
                GatewayError::source_unavailable(format!("Unable to read {}: {e}", path.display()))
            })?;
            (delimiter, Box::new(reader))
        }
        TableSource::Inline(text) => {
            let mut reader = Cursor::new(text.clone().into_bytes());
            let delimiter = spec.resolve(&mut reader)?;
            reader.set_position(0);
            (delimiter, Box::new(reader))
        }
    };

    debug!("Reading {} with delimiter {:?}", source.describe(), delimiter.to_string());

    let inner = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_byte_records();

    Ok((delimiter, Records { inner }))
}

fn map_csv_error(error: csv::Error) -> GatewayError {
    if error.is_io_error() {
        GatewayError::source_unavailable(format!("Unable to read source: {error}"))
    } else {
        GatewayError::malformed(format!("Unreadable record: {error}"))
    }
}
