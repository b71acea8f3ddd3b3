//! Execution seam between compiled statements and a database driver.

use std::future::Future;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::value::{FromSqlValue, SqlValue};

/// A database handle able to run compiled statements.
///
/// `bindings` always matches the placeholders of `sql` one to one.
pub trait Connection: Send + Sync {
    /// Runs a statement returning rows.
    fn fetch_all(
        &self,
        sql: &str,
        bindings: &[SqlValue],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Runs a statement without result rows.
    fn execute(
        &self,
        sql: &str,
        bindings: &[SqlValue],
    ) -> impl Future<Output = Result<ExecResult>> + Send;
}

/// Runs a row-returning statement, logging it first.
pub(crate) async fn fetch_rows<C: Connection>(
    conn: &C,
    sql: &str,
    bindings: &[SqlValue],
) -> Result<Vec<Row>> {
    debug!(sql = %sql, bindings = bindings.len(), "Executing query");
    conn.fetch_all(sql, bindings).await
}

/// Runs a statement without result rows, logging it first.
pub(crate) async fn execute_statement<C: Connection>(
    conn: &C,
    sql: &str,
    bindings: &[SqlValue],
) -> Result<ExecResult> {
    debug!(sql = %sql, bindings = bindings.len(), "Executing statement");
    conn.execute(sql, bindings).await
}

/// Outcome of [`Connection::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted, as the driver counts them.
    pub rows_affected: u64,
    /// Id generated by the statement, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// A result row: ordered column names and values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row. `columns` and `values` must have the same length.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row has no column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a column. Falls back to a case-insensitive match.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        let position = self
            .columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))?;
        self.values.get(position)
    }

    /// Value at a position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Text value of a column; `None` for NULL or non-text values.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Converts a column value.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ColumnNotFound`] or [`QueryError::Decode`].
    pub fn try_get<T: FromSqlValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))?;
        T::from_sql_value(value).ok_or_else(|| QueryError::Decode {
            column: column.to_string(),
            message: format!("unexpected value {value:?}"),
        })
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        let (columns, values) = iter.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self { columns, values }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
