// SPDX-License-Identifier: Apache-2.0

//! Tabular cursor abstraction consumed and produced by the metadata cache

use std::sync::Arc;

/// JDBC-style column type code (`java.sql.Types`)
pub type ColumnTypeCode = i32;

/// Common column type codes
pub mod types {
    use super::ColumnTypeCode;

    pub const BIT: ColumnTypeCode = -7;
    pub const BIGINT: ColumnTypeCode = -5;
    pub const VARBINARY: ColumnTypeCode = -3;
    pub const NUMERIC: ColumnTypeCode = 2;
    pub const INTEGER: ColumnTypeCode = 4;
    pub const SMALLINT: ColumnTypeCode = 5;
    pub const DOUBLE: ColumnTypeCode = 8;
    pub const VARCHAR: ColumnTypeCode = 12;
    pub const BOOLEAN: ColumnTypeCode = 16;
    pub const DATE: ColumnTypeCode = 91;
    pub const TIMESTAMP: ColumnTypeCode = 93;
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

pub type Row = Vec<Value>;

/// Single-pass, stateful view over tabular data.
///
/// Rows can be read once; a drained cursor keeps returning `None`.
pub trait RowCursor: Send {
    fn column_names(&self) -> &[String];

    fn column_types(&self) -> &[ColumnTypeCode];

    /// Advance and return the next row
    fn next_row(&mut self) -> Option<Row>;
}

/// Column metadata and rows copied out of a cursor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    pub column_names: Vec<String>,
    pub column_types: Vec<ColumnTypeCode>,
    pub rows: Vec<Row>,
}

impl TableData {
    /// Copy the column metadata and drain every remaining row from `cursor`
    pub fn drain(cursor: &mut dyn RowCursor) -> Self {
        let column_names = cursor.column_names().to_vec();
        let column_types = cursor.column_types().to_vec();
        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row() {
            rows.push(row);
        }
        Self {
            column_names,
            column_types,
            rows,
        }
    }

    /// Check that names, types and every row agree on the column count
    pub fn validate(&self) -> Result<(), String> {
        let arity = self.column_names.len();
        if self.column_types.len() != arity {
            return Err(format!(
                "{} column names but {} column types",
                arity,
                self.column_types.len()
            ));
        }
        if let Some((index, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != arity)
        {
            return Err(format!(
                "row {} has {} values, expected {}",
                index,
                row.len(),
                arity
            ));
        }
        Ok(())
    }
}

/// Cursor over shared, immutable in-memory data.
///
/// Each instance keeps its own position, so any number of cursors may read
/// the same data independently.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    data: Arc<TableData>,
    position: usize,
}

impl MemoryCursor {
    pub fn new(
        column_names: Vec<String>,
        column_types: Vec<ColumnTypeCode>,
        rows: Vec<Row>,
    ) -> Self {
        Self::from_shared(Arc::new(TableData {
            column_names,
            column_types,
            rows,
        }))
    }

    pub fn from_shared(data: Arc<TableData>) -> Self {
        Self { data, position: 0 }
    }

    /// Number of rows not yet read
    pub fn remaining(&self) -> usize {
        self.data.rows.len() - self.position
    }

    /// Read every remaining row
    pub fn collect_rows(&mut self) -> Vec<Row> {
        let mut rows = Vec::with_capacity(self.remaining());
        while let Some(row) = self.next_row() {
            rows.push(row);
        }
        rows
    }
}

impl RowCursor for MemoryCursor {
    fn column_names(&self) -> &[String] {
        &self.data.column_names
    }

    fn column_types(&self) -> &[ColumnTypeCode] {
        &self.data.column_types
    }

    fn next_row(&mut self) -> Option<Row> {
        let row = self.data.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryCursor {
        MemoryCursor::new(
            vec!["TABLE_NAME".to_string(), "ROW_COUNT".to_string()],
            vec![types::VARCHAR, types::BIGINT],
            vec![
                vec!["orders".into(), 10i64.into()],
                vec!["users".into(), Value::Null],
            ],
        )
    }

    #[test]
    fn test_cursor_is_single_pass() {
        let mut cursor = sample();
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.collect_rows().len(), 2);
        assert_eq!(cursor.next_row(), None);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_drain_copies_everything() {
        let mut cursor = sample();
        cursor.next_row();

        let data = TableData::drain(&mut cursor);
        assert_eq!(data.column_names, vec!["TABLE_NAME", "ROW_COUNT"]);
        assert_eq!(data.column_types, vec![types::VARCHAR, types::BIGINT]);
        assert_eq!(data.rows, vec![vec![Value::from("users"), Value::Null]]);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_validate_ragged_rows() {
        let data = TableData {
            column_names: vec!["A".to_string()],
            column_types: vec![types::VARCHAR],
            rows: vec![vec!["x".into()], vec!["y".into(), "z".into()]],
        };
        assert_eq!(data.validate().unwrap_err(), "row 1 has 2 values, expected 1");

        let data = TableData {
            column_names: vec!["A".to_string(), "B".to_string()],
            column_types: vec![types::VARCHAR],
            rows: vec![],
        };
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(Some("a")), Value::String("a".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(true), Value::Bool(true));
    }
}
