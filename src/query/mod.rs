//! Query execution and result shaping.
//!
//! Both gateway paths converge here: the ephemeral relation and every
//! external client collect their rows through the same capped shaper.

pub mod executor;

pub use executor::{collect_capped, column_names, execute_on_relation, QuerySpec};
