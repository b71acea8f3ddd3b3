//! Connection configuration and the grammar registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::grammar::{Grammar, MySqlGrammar, PostgresGrammar, SqlGrammar, SqliteGrammar};

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grammar name: `sql`, `mysql`, `postgres`, `pgsql`, `sqlite3`, `sqlite`.
    pub driver: String,
    /// Driver connection string.
    pub dsn: String,
    /// Open the database read-only.
    pub read_only: bool,
    /// Logical connection name.
    pub name: String,
}

impl Config {
    /// Creates a config for a driver and DSN.
    #[must_use]
    pub fn new(driver: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options the builder consults when naming tables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Prepended to every unprefixed table name.
    pub prefix: String,
    /// Default collation for created tables (MySQL).
    pub collation: Option<String>,
    /// Default character set for created tables (MySQL).
    pub charset: Option<String>,
}

impl ConnectionOptions {
    /// Options with a table prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Maps driver names to grammars.
///
/// Built once at startup and handed to whatever creates builders.
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    grammars: HashMap<String, Arc<dyn Grammar>>,
}

impl GrammarRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in dialect.
    #[must_use]
    pub fn with_defaults() -> Self {
        let postgres: Arc<dyn Grammar> = Arc::new(PostgresGrammar::new());
        let sqlite: Arc<dyn Grammar> = Arc::new(SqliteGrammar::new());
        let mut registry = Self::new();
        registry.register("sql", Arc::new(SqlGrammar::new()));
        registry.register("mysql", Arc::new(MySqlGrammar::new()));
        registry.register("postgres", Arc::clone(&postgres));
        registry.register("pgsql", postgres);
        registry.register("sqlite3", Arc::clone(&sqlite));
        registry.register("sqlite", sqlite);
        registry
    }

    /// Registers or replaces a grammar.
    pub fn register(&mut self, driver: impl Into<String>, grammar: Arc<dyn Grammar>) {
        self.grammars.insert(driver.into(), grammar);
    }

    /// Looks up a grammar.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownDriver`] when nothing is registered.
    pub fn get(&self, driver: &str) -> Result<Arc<dyn Grammar>> {
        self.grammars
            .get(driver)
            .cloned()
            .ok_or_else(|| QueryError::UnknownDriver(driver.to_string()))
    }

    /// Registered driver names, sorted.
    #[must_use]
    pub fn drivers(&self) -> Vec<&str> {
        let mut drivers: Vec<&str> = self.grammars.keys().map(String::as_str).collect();
        drivers.sort_unstable();
        drivers
    }
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Dialect;

    #[test]
    fn test_default_registry() {
        let registry = GrammarRegistry::with_defaults();
        assert_eq!(
            registry.drivers(),
            vec!["mysql", "pgsql", "postgres", "sql", "sqlite", "sqlite3"]
        );
        assert_eq!(registry.get("pgsql").map(|g| g.name()).ok(), Some("postgres"));
        assert_eq!(registry.get("sqlite").map(|g| g.name()).ok(), Some("sqlite3"));
        assert!(matches!(
            registry.get("oracle"),
            Err(QueryError::UnknownDriver(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = Config::from_json(
            r#"{"driver": "sqlite3", "dsn": "sqlite::memory:", "read_only": true}"#,
        )
        .unwrap();
        assert_eq!(config.driver, "sqlite3");
        assert!(config.read_only);
        assert!(config.name.is_empty());

        let options = ConnectionOptions::from_json(r#"{"prefix": "xn_", "charset": "utf8mb4"}"#).unwrap();
        assert_eq!(options.prefix, "xn_");
        assert_eq!(options.charset.as_deref(), Some("utf8mb4"));
        assert!(matches!(Config::from_json("{"), Err(QueryError::Config(_))));
    }
}
