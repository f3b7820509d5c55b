//! Ephemeral relations built from delimited text.
//!
//! source → delimiter detection → identifier sanitization → load.

pub mod delimiter;
pub mod loader;
pub mod sanitize;
pub mod source;

pub use delimiter::{detect, Delimiter, DelimiterSpec};
pub use loader::{
    load_relation, EphemeralRelation, LoadOptions, RelationColumn, DEFAULT_MAX_ROWS,
    DEFAULT_TABLE_NAME,
};
pub use sanitize::{positional_identifiers, sanitize_identifier};
pub use source::{open_records, Records, TableSource};
