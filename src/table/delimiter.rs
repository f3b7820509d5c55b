//! Field separator selection for delimited text.

use std::fmt;
use std::io::BufRead;

use crate::error::{GatewayError, Result};

/// Candidates for auto-detection, in tie-break priority order.
const CANDIDATES: [u8; 3] = [b',', b'\t', b';'];

/// A resolved single-byte field separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(u8);

impl Delimiter {
    pub const COMMA: Self = Self(b',');
    pub const TAB: Self = Self(b'\t');
    pub const SEMICOLON: Self = Self(b';');

    /// Returns the raw separator byte.
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::COMMA
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// What the caller asked for: a fixed separator or detection from the first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimiterSpec {
    #[default]
    Auto,
    Explicit(Delimiter),
}

impl DelimiterSpec {
    /// Parses a delimiter token: `auto`, `comma`/`csv`, `tab`/`tsv`,
    /// `semicolon`, or a literal single ASCII character.
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "auto" => return Ok(Self::Auto),
            "comma" | "csv" => return Ok(Self::Explicit(Delimiter::COMMA)),
            "tab" | "tsv" | "\\t" => return Ok(Self::Explicit(Delimiter::TAB)),
            "semicolon" => return Ok(Self::Explicit(Delimiter::SEMICOLON)),
            _ => {}
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => {
                Ok(Self::Explicit(Delimiter(c as u8)))
            }
            _ => Err(GatewayError::malformed(format!(
                "Invalid delimiter '{token}'. Expected auto, comma, tab, semicolon, or a single ASCII character"
            ))),
        }
    }

    /// Resolves the spec against the first line of the source.
    ///
    /// Explicit separators are returned unchanged and the reader is not touched.
    pub fn resolve<R: BufRead>(self, reader: &mut R) -> Result<Delimiter> {
        match self {
            Self::Explicit(delimiter) => Ok(delimiter),
            Self::Auto => {
                let mut first_line = Vec::new();
                reader.read_until(b'\n', &mut first_line).map_err(|e| {
                    GatewayError::source_unavailable(format!("Unable to read source: {e}"))
                })?;
                Ok(detect(&first_line))
            }
        }
    }
}

impl std::str::FromStr for DelimiterSpec {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Picks the most frequent candidate in `line`.
///
/// Ties go to the earlier candidate (comma, then tab, then semicolon); a line
/// with none of them falls back to comma.
pub fn detect(line: &[u8]) -> Delimiter {
    let line = line.split(|&b| b == b'\n').next().unwrap_or_default();

    let mut best = Delimiter::COMMA;
    let mut best_count = 0;
    for candidate in CANDIDATES {
        let count = line.iter().filter(|&&b| b == candidate).count();
        if count > best_count {
            best = Delimiter(candidate);
            best_count = count;
        }
    }
    best
}
