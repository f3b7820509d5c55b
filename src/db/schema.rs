//! Schema description types returned by inspection.

use serde::{Deserialize, Serialize};

/// A column of a table in an external store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type as the store reports it.
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the column accepts NULL.
    pub nullable: bool,

    /// Default value expression, if any.
    pub default: Option<String>,

    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

/// A secondary index on a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A foreign key constraint owned by a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name (SQLite does not name them).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Referencing columns on this table.
    pub columns: Vec<String>,

    /// Referenced table.
    pub references_table: String,

    /// Referenced columns, positionally aligned with `columns`.
    pub references_columns: Vec<String>,
}

/// Groups `(key, value)` pairs into per-key lists, preserving first-seen order.
pub(crate) fn group_ordered<K, V>(rows: impl IntoIterator<Item = (K, V)>) -> Vec<(K, Vec<V>)>
where
    K: PartialEq,
{
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    for (key, value) in rows {
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => values.push(value),
            None => groups.push((key, vec![value])),
        }
    }
    groups
}
