//! Render-safe result types.
//!
//! Raw engine values are collapsed into a small set of shapes that a page or
//! JSON client can show without further decisions: NULL stays NULL, binary
//! payloads become a marker, structured values become their serialized text.

use crate::db::{QueryResult, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Placeholder shown instead of binary payloads.
pub const BLOB_MARKER: &str = "[BLOB]";

/// A single cell value that is always safe to display.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderValue {
    /// SQL NULL.
    Null,
    /// Signed integer, passed through.
    Int(i64),
    /// Unsigned integer, passed through.
    UInt(u64),
    /// Floating point number, passed through.
    Float(f64),
    /// Text, including serialized structured values.
    Text(String),
    /// Binary payload that is not rendered.
    Blob,
}

impl RenderValue {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<Value> for RenderValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Int(i) => Self::Int(i),
            Value::UInt(u) => Self::UInt(u),
            Value::Float(f) => Self::Float(f),
            Value::Text(s) => Self::Text(s),
            Value::Bytes(_) => Self::Blob,
            Value::Json(v) => Self::Text(v.to_string()),
        }
    }
}

impl fmt::Display for RenderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob => f.write_str(BLOB_MARKER),
        }
    }
}

impl Serialize for RenderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Blob => serializer.serialize_str(BLOB_MARKER),
        }
    }
}

/// A result row keyed by column name.
///
/// When several columns share a name the row keeps one entry, at the first
/// position, holding the last column's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderRow {
    cells: Vec<(String, RenderValue)>,
}

impl RenderRow {
    /// Builds a row from column names and values in server order.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (String, RenderValue)>,
    {
        let mut row = Self::default();
        for (name, value) in cells {
            match row.cells.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = value,
                None => row.cells.push((name, value)),
            }
        }
        row
    }

    /// Looks up a value by column name.
    pub fn get(&self, column: &str) -> Option<&RenderValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RenderValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of distinct column names in the row.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for RenderRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Render-safe result of a query.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ResultSet {
    /// Field names in server order.
    pub columns: Vec<String>,

    /// Rows keyed by field name.
    pub rows: Vec<RenderRow>,

    /// Number of rows the engine returned.
    pub row_count: usize,
}

impl ResultSet {
    /// Returns true if no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<QueryResult> for ResultSet {
    fn from(result: QueryResult) -> Self {
        let columns: Vec<String> = result.columns.into_iter().map(|c| c.name).collect();
        let rows: Vec<RenderRow> = result
            .rows
            .into_iter()
            .map(|row| {
                RenderRow::from_cells(
                    columns
                        .iter()
                        .cloned()
                        .zip(row.into_iter().map(RenderValue::from)),
                )
            })
            .collect();
        let row_count = rows.len();

        Self {
            columns,
            rows,
            row_count,
        }
    }
}
