//! Error types for query execution and schema operations.

use std::fmt;

/// Errors returned by execution-triggering calls.
///
/// Construction mistakes (an unknown operator, an operation a dialect cannot
/// express) are programmer errors and panic instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Error reported by the database driver.
    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An aggregate query returned no row.
    #[error("aggregate {function} get nothing")]
    EmptyAggregate {
        /// Aggregate function name (`count`, `sum`, ...).
        function: String,
    },

    /// No grammar is registered under the requested driver name.
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// The driver is known but cannot be connected to by this backend.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// The table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// The column does not exist in the result row or table.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A value could not be converted to the requested type.
    #[error("Failed to decode column '{column}': {message}")]
    Decode {
        /// Column name.
        column: String,
        /// What went wrong.
        message: String,
    },

    /// Metadata rows could not be turned into a table model.
    #[error("Failed to introspect table '{table}': {message}")]
    Introspection {
        /// Table name.
        table: String,
        /// What went wrong.
        message: String,
    },

    /// A `CREATE TABLE` batch failed. Nothing was reconciled.
    #[error("Failed to create table '{table}': {source}")]
    CreateTable {
        /// Table name.
        table: String,
        /// Underlying error.
        #[source]
        source: Box<QueryError>,
    },

    /// One or more alter commands failed or were skipped.
    #[error(
        "Failed to alter table '{table}':\n{}",
        .failures.iter().map(|f| format!("  - {f}")).collect::<Vec<_>>().join("\n")
    )]
    Alter {
        /// Table name.
        table: String,
        /// Every command that did not apply, in recorded order.
        failures: Vec<CommandFailure>,
    },

    /// The configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl QueryError {
    /// Wraps a driver error.
    pub fn database<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database(Box::new(error))
    }
}

/// A schema command that did not apply during `alter_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Human readable command description, e.g. `drop column name`.
    pub command: String,
    /// Driver message, or `skipped` when an earlier command failed.
    pub reason: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.command, self.reason)
    }
}

/// Result type for query and schema operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregate_message() {
        let err = QueryError::EmptyAggregate {
            function: String::from("count"),
        };
        assert_eq!(err.to_string(), "aggregate count get nothing");
    }

    #[test]
    fn test_alter_lists_every_failure() {
        let err = QueryError::Alter {
            table: String::from("users"),
            failures: vec![
                CommandFailure {
                    command: String::from("drop column name"),
                    reason: String::from("no such column"),
                },
                CommandFailure {
                    command: String::from("rename column a to b"),
                    reason: String::from("skipped"),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Failed to alter table 'users':\n  - drop column name: no such column\n  - rename column a to b: skipped"
        );
    }
}
