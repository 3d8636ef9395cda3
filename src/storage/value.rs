//! Typed cells for raw query results and parameters

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single SQLite value, tagged with its storage class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a command-line parameter: integers and reals are recognised,
    /// `NULL` maps to null, anything else is text
    pub fn parse_param(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            SqlValue::Null
        } else if let Ok(i) = raw.parse::<i64>() {
            SqlValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            SqlValue::Real(f)
        } else {
            SqlValue::Text(raw.to_string())
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for SqlValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        })
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// Rows returned by a raw query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows changed by a statement without result columns
    pub affected: usize,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the column called `column`
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Row as (column, value) pairs in column order
    pub fn record(&self, row: usize) -> Option<Vec<(&str, &SqlValue)>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(SqlValue::parse_param("42"), SqlValue::Integer(42));
        assert_eq!(SqlValue::parse_param("1.5"), SqlValue::Real(1.5));
        assert_eq!(SqlValue::parse_param("null"), SqlValue::Null);
        assert_eq!(SqlValue::parse_param("O'Brien"), SqlValue::Text("O'Brien".into()));
    }

    #[test]
    fn test_tagged_json() {
        let json = serde_json::to_value(SqlValue::Integer(7)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "integer", "value": 7}));
    }

    #[test]
    fn test_record_lookup() {
        let rows = QueryRows {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![SqlValue::Integer(1), SqlValue::Text("Dr. A".into())]],
            affected: 0,
        };
        assert_eq!(rows.get(0, "name").and_then(SqlValue::as_str), Some("Dr. A"));
        assert!(rows.get(0, "missing").is_none());
        assert_eq!(rows.record(0).unwrap()[0], ("id", &SqlValue::Integer(1)));
    }
}
