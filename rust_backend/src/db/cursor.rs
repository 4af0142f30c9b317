//! Rows and positionable row cursors.
//!
//! This is the narrow surface the codecs and the aggregation resolver read
//! through. A cursor starts positioned before the first row; `move_to_next`
//! must be called once before the first row can be read. Rows are
//! materialized, so `peek_next` can inspect the following row without
//! moving the cursor.

use serde::{Deserialize, Serialize};

use super::repository::{RepositoryError, RepositoryResult};
use super::schema::StorageKind;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    TextList(Vec<String>),
}

impl SqlValue {
    /// Storage class of the value; `None` for SQL NULL.
    pub fn storage_kind(&self) -> Option<StorageKind> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(_) => Some(StorageKind::Integer),
            SqlValue::Real(_) => Some(StorageKind::Real),
            SqlValue::Text(_) | SqlValue::TextList(_) => Some(StorageKind::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            SqlValue::Integer(v) => Some(v as f64),
            SqlValue::Real(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

fn type_error(column: &str, expected: &str, found: &SqlValue) -> RepositoryError {
    RepositoryError::SchemaMismatch {
        column: column.to_string(),
        detail: format!("expected {expected}, found {found:?}"),
    }
}

/// An ordered set of named cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a cell, replacing an existing value in place.
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy every cell of `other` into this row, overwriting shared names.
    pub fn merge(&mut self, other: &Row) {
        for (name, value) in &other.cells {
            self.set(name, value.clone());
        }
    }

    /// Cell value, or `SchemaMismatch` when the column is missing.
    pub fn value(&self, column: &str) -> RepositoryResult<&SqlValue> {
        self.get(column)
            .ok_or_else(|| RepositoryError::missing_column(column))
    }

    /// Integer reader. Real cells are truncated toward zero, as relational
    /// engines do when an integer is read from a floating result column.
    pub fn get_long(&self, column: &str) -> RepositoryResult<i64> {
        self.get_optional_long(column)?
            .ok_or_else(|| type_error(column, "INTEGER", &SqlValue::Null))
    }

    pub fn get_optional_long(&self, column: &str) -> RepositoryResult<Option<i64>> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(v) => Ok(Some(*v)),
            SqlValue::Real(v) => Ok(Some(v.trunc() as i64)),
            other => Err(type_error(column, "INTEGER", other)),
        }
    }

    pub fn get_int(&self, column: &str) -> RepositoryResult<i32> {
        let value = self.get_long(column)?;
        i32::try_from(value).map_err(|_| type_error(column, "32-bit INTEGER", &SqlValue::Integer(value)))
    }

    pub fn get_optional_int(&self, column: &str) -> RepositoryResult<Option<i32>> {
        match self.get_optional_long(column)? {
            None => Ok(None),
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| type_error(column, "32-bit INTEGER", &SqlValue::Integer(value))),
        }
    }

    pub fn get_double(&self, column: &str) -> RepositoryResult<f64> {
        self.get_optional_double(column)?
            .ok_or_else(|| type_error(column, "REAL", &SqlValue::Null))
    }

    pub fn get_optional_double(&self, column: &str) -> RepositoryResult<Option<f64>> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            other => other
                .as_f64()
                .map(Some)
                .ok_or_else(|| type_error(column, "REAL", other)),
        }
    }

    pub fn get_string(&self, column: &str) -> RepositoryResult<&str> {
        match self.value(column)? {
            SqlValue::Text(v) => Ok(v.as_str()),
            other => Err(type_error(column, "TEXT", other)),
        }
    }

    /// List reader. NULL reads as an empty list.
    pub fn get_string_list(&self, column: &str) -> RepositoryResult<Vec<String>> {
        match self.value(column)? {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::TextList(v) => Ok(v.clone()),
            SqlValue::Text(v) => Ok(vec![v.clone()]),
            other => Err(type_error(column, "TEXT list", other)),
        }
    }
}

/// Forward-iterable, positionable view over a query result.
pub trait RowCursor {
    /// Total number of rows in the result.
    fn count(&self) -> usize;

    /// Index of the current row. `None` before the first row; equal to
    /// `count()` once moved past the last row.
    fn position(&self) -> Option<usize>;

    /// Advance one row; `false` once the cursor has moved past the end.
    fn move_to_next(&mut self) -> bool;

    /// Step back one row; `false` once the cursor is before the first row.
    fn move_to_previous(&mut self) -> bool;

    /// Row under the cursor, if positioned on one.
    fn current(&self) -> Option<&Row>;

    /// Row after the current one, without moving.
    fn peek_next(&self) -> Option<&Row>;

    fn is_after_last(&self) -> bool {
        self.position() == Some(self.count())
    }

    /// Row under the cursor, or an error when not positioned on a row.
    fn row(&self) -> RepositoryResult<&Row> {
        self.current().ok_or_else(|| {
            RepositoryError::QueryError("cursor is not positioned on a row".to_string())
        })
    }

    fn get_int(&self, column: &str) -> RepositoryResult<i32> {
        self.row()?.get_int(column)
    }

    fn get_long(&self, column: &str) -> RepositoryResult<i64> {
        self.row()?.get_long(column)
    }

    fn get_double(&self, column: &str) -> RepositoryResult<f64> {
        self.row()?.get_double(column)
    }

    fn get_string(&self, column: &str) -> RepositoryResult<&str> {
        self.row()?.get_string(column)
    }

    fn get_string_list(&self, column: &str) -> RepositoryResult<Vec<String>> {
        self.row()?.get_string_list(column)
    }
}

/// Cursor over an in-memory, already materialized result set.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    rows: Vec<Row>,
    // -1 before the first row, rows.len() after the last.
    index: isize,
}

impl MemoryCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, index: -1 }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn row_at(&self, index: isize) -> Option<&Row> {
        usize::try_from(index).ok().and_then(|i| self.rows.get(i))
    }
}

impl Default for MemoryCursor {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RowCursor for MemoryCursor {
    fn count(&self) -> usize {
        self.rows.len()
    }

    fn position(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }

    fn move_to_next(&mut self) -> bool {
        let len = self.rows.len() as isize;
        if self.index < len {
            self.index += 1;
        }
        self.index < len
    }

    fn move_to_previous(&mut self) -> bool {
        if self.index >= 0 {
            self.index -= 1;
        }
        self.index >= 0
    }

    fn current(&self) -> Option<&Row> {
        self.row_at(self.index)
    }

    fn peek_next(&self) -> Option<&Row> {
        self.row_at(self.index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("id", i)).collect()
    }

    #[test]
    fn test_cursor_starts_before_first_row() {
        let mut cursor = MemoryCursor::new(rows(2));
        assert_eq!(cursor.position(), None);
        assert!(cursor.current().is_none());
        assert_eq!(cursor.peek_next().unwrap().get_long("id").unwrap(), 0);

        assert!(cursor.move_to_next());
        assert_eq!(cursor.get_long("id").unwrap(), 0);
        assert!(cursor.move_to_next());
        assert!(!cursor.move_to_next());
        assert!(cursor.is_after_last());
        assert!(!cursor.move_to_next());
        assert_eq!(cursor.position(), Some(2));
    }

    #[test]
    fn test_cursor_moves_back() {
        let mut cursor = MemoryCursor::new(rows(2));
        while cursor.move_to_next() {}
        assert!(cursor.move_to_previous());
        assert_eq!(cursor.get_long("id").unwrap(), 1);
        assert!(cursor.move_to_previous());
        assert!(!cursor.move_to_previous());
        assert_eq!(cursor.position(), None);
    }

    #[test]
    fn test_empty_cursor() {
        let mut cursor = MemoryCursor::new(vec![]);
        assert!(!cursor.move_to_next());
        assert!(cursor.is_after_last());
        assert!(cursor.row().is_err());
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let row = Row::new().with("a", 1i64);
        let err = row.get_long("b").unwrap_err();
        assert!(matches!(err, RepositoryError::SchemaMismatch { ref column, .. } if column == "b"));
    }

    #[test]
    fn test_typed_readers() {
        let row = Row::new()
            .with("int", 7i64)
            .with("real", 2.5f64)
            .with("text", "pkg")
            .with("none", None::<i64>)
            .with("list", SqlValue::TextList(vec!["a".into(), "b".into()]));

        assert_eq!(row.get_int("int").unwrap(), 7);
        assert_eq!(row.get_double("int").unwrap(), 7.0);
        assert_eq!(row.get_long("real").unwrap(), 2);
        assert_eq!(row.get_string("text").unwrap(), "pkg");
        assert_eq!(row.get_optional_long("none").unwrap(), None);
        assert!(row.get_long("none").is_err());
        assert!(row.get_string("int").is_err());
        assert_eq!(row.get_string_list("list").unwrap(), vec!["a", "b"]);
        assert!(row.get_string_list("none").unwrap().is_empty());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut row = Row::new().with("a", 1i64).with("b", 2i64);
        row.set("a", 3i64);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(row.get_long("a").unwrap(), 3);
    }
}
