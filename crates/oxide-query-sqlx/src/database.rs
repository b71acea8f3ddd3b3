//! A connection pool paired with the grammar of its driver.

use std::fmt;
use std::sync::Arc;

use oxide_query::{
    Builder, Config, Connection, ConnectionOptions, Dialect, ExecResult, Grammar, GrammarRegistry,
    Result, Row, Schema, SqlValue,
};

use crate::connection::SqlxConnection;

/// Entry point for running queries against a configured database.
///
/// ```rust,no_run
/// # async fn run() -> oxide_query::Result<()> {
/// use oxide_query::{Config, ConnectionOptions};
/// use oxide_query_sqlx::Database;
///
/// let db = Database::connect(&Config::new("sqlite", "sqlite::memory:"), ConnectionOptions::default()).await?;
/// let users = db.table("users").where_("vote", (">", 10)).get(&db).await?;
/// # let _ = users;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    connection: SqlxConnection,
    grammar: Arc<dyn Grammar>,
    options: Arc<ConnectionOptions>,
}

impl Database {
    /// Opens a pool and resolves the grammar from the default registry.
    pub async fn connect(config: &Config, options: ConnectionOptions) -> Result<Self> {
        Self::connect_with(&GrammarRegistry::with_defaults(), config, options).await
    }

    /// Like [`Database::connect`], resolving the grammar from `registry`.
    pub async fn connect_with(
        registry: &GrammarRegistry,
        config: &Config,
        options: ConnectionOptions,
    ) -> Result<Self> {
        let grammar = registry.get(&config.driver)?;
        let connection = SqlxConnection::connect(config).await?;
        Ok(Self {
            connection,
            grammar,
            options: Arc::new(options),
        })
    }

    /// A builder with no table set.
    pub fn query(&self) -> Builder {
        Builder::new(Arc::clone(&self.grammar), Arc::clone(&self.options))
    }

    /// A builder over `table`, which may carry an alias.
    pub fn table(&self, table: &str) -> Builder {
        self.query().table(table)
    }

    /// A schema builder for this database.
    pub fn schema(&self) -> Schema {
        Schema::new(Arc::clone(&self.grammar), Arc::clone(&self.options))
    }

    /// The underlying pool.
    pub const fn connection(&self) -> &SqlxConnection {
        &self.connection
    }

    /// The grammar resolved for the configured driver.
    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    /// Table prefix, charset and collation applied by builders.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Closes the pool. See [`SqlxConnection::close`].
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("connection", &self.connection)
            .field("grammar", &self.grammar.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Connection for Database {
    async fn fetch_all(&self, sql: &str, bindings: &[SqlValue]) -> Result<Vec<Row>> {
        self.connection.fetch_all(sql, bindings).await
    }

    async fn execute(&self, sql: &str, bindings: &[SqlValue]) -> Result<ExecResult> {
        self.connection.execute(sql, bindings).await
    }
}
