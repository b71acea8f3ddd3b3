//! Schema builder: create, alter, drop and introspect tables.
//!
//! A blueprint records [`Command`]s against a [`Table`] model. The model
//! changes only after the DDL carrying a command has run successfully, so
//! after a failed `alter_table` the database and the model returned by
//! [`Schema::get_table`] still agree.

mod column;
mod table;

pub use column::{decode_comment, encode_comment, Column, ColumnType, DefaultValue};
pub use table::{Command, Index, Primary, Table};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::{execute_statement, fetch_rows, Connection, Row};
use crate::error::{CommandFailure, QueryError, Result};
use crate::grammar::{Dialect, Grammar, IndexRow, SchemaGrammar};
use crate::registry::{Config, ConnectionOptions, GrammarRegistry};

/// What happened to one recorded command during `alter_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The DDL ran and the model was updated.
    Applied,
    /// The DDL failed with this message.
    Failed(String),
    /// Not attempted because an earlier command failed.
    Skipped,
}

/// Schema operations for one grammar and connection options.
#[derive(Clone)]
pub struct Schema {
    grammar: Arc<dyn Grammar>,
    options: Arc<ConnectionOptions>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("grammar", &self.grammar.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Schema {
    /// Creates a schema builder.
    #[must_use]
    pub fn new(grammar: Arc<dyn Grammar>, options: impl Into<Arc<ConnectionOptions>>) -> Self {
        Self {
            grammar,
            options: options.into(),
        }
    }

    /// Creates a schema builder for the grammar registered under
    /// `config.driver`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownDriver`] when no grammar matches.
    pub fn connect(
        registry: &GrammarRegistry,
        config: &Config,
        options: impl Into<Arc<ConnectionOptions>>,
    ) -> Result<Self> {
        Ok(Self::new(registry.get(&config.driver)?, options))
    }

    /// The grammar.
    #[must_use]
    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    fn blueprint(&self, name: &str) -> Table {
        let mut table = Table::new(name).with_prefix(self.options.prefix.clone());
        table.charset.clone_from(&self.options.charset);
        table.collation.clone_from(&self.options.collation);
        table
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}{name}", self.options.prefix)
    }

    /// Table names without the connection prefix. Tables outside the
    /// prefix are left out.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn get_tables<C: Connection>(&self, conn: &C) -> Result<Vec<String>> {
        let (sql, bindings) = self.grammar.compile_table_listing();
        let rows = fetch_rows(conn, &sql, &bindings).await?;
        let prefix = self.options.prefix.as_str();
        Ok(rows
            .iter()
            .filter_map(|row| row.get_str("name"))
            .filter_map(|name| name.strip_prefix(prefix))
            .map(str::to_string)
            .collect())
    }

    /// True when the table exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn table_exists<C: Connection>(&self, conn: &C, name: &str) -> Result<bool> {
        let (sql, bindings) = self.grammar.compile_table_exists(&self.full_name(name));
        let rows = fetch_rows(conn, &sql, &bindings).await?;
        match rows.first() {
            Some(row) => Ok(row.try_get::<i64>("aggregate")? > 0),
            None => Ok(false),
        }
    }

    /// Reads a table model from the database.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TableNotFound`], the driver error, or
    /// [`QueryError::Introspection`] when the metadata cannot be parsed.
    pub async fn get_table<C: Connection>(&self, conn: &C, name: &str) -> Result<Table> {
        if !self.table_exists(conn, name).await? {
            return Err(QueryError::TableNotFound(name.to_string()));
        }
        let full_name = self.full_name(name);
        let mut table = Table::new(name).with_prefix(self.options.prefix.clone());

        let (sql, bindings) = self.grammar.compile_column_listing(&full_name);
        for (position, row) in fetch_rows(conn, &sql, &bindings).await?.iter().enumerate() {
            let mut column = self.grammar.parse_column(row)?;
            column.position = position;
            if column.is_enum() && column.options.is_empty() {
                if let Some((sql, bindings)) = self.grammar.compile_enum_options(&column) {
                    let rows = fetch_rows(conn, &sql, &bindings).await?;
                    column.options = self.grammar.parse_enum_options(&rows);
                }
            }
            table.columns.push(column);
        }

        let (sql, bindings) = self.grammar.compile_index_listing(&full_name);
        let rows = fetch_rows(conn, &sql, &bindings).await?;
        let index_rows = self.grammar.parse_index_rows(&rows)?;
        apply_index_rows(&mut table, index_rows);

        if let Some((sql, bindings)) = self.grammar.compile_table_definition(&full_name) {
            let rows = fetch_rows(conn, &sql, &bindings).await?;
            if let Some(definition) = rows.first().and_then(definition_text) {
                self.grammar.apply_table_definition(&mut table, &definition);
            }
        }

        debug!(table = %name, columns = table.columns.len(), indexes = table.indexes.len(), "Loaded table");
        Ok(table)
    }

    /// Creates a table from the blueprint filled by `define`.
    ///
    /// Every statement of the batch must succeed; the returned model is the
    /// blueprint with all its commands applied.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CreateTable`] wrapping the first failure.
    pub async fn create_table<C, F>(&self, conn: &C, name: &str, define: F) -> Result<Table>
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        self.create(conn, name, define, false).await
    }

    /// [`Schema::create_table`] that leaves an existing table alone.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CreateTable`] wrapping the first failure.
    pub async fn create_table_if_not_exists<C, F>(&self, conn: &C, name: &str, define: F) -> Result<Table>
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        self.create(conn, name, define, true).await
    }

    async fn create<C, F>(&self, conn: &C, name: &str, define: F, if_not_exists: bool) -> Result<Table>
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        let mut table = self.blueprint(name);
        define(&mut table);
        table.finish();
        let model = table.preview();

        info!(table = %name, columns = model.columns.len(), "Creating table");
        let statements = self.grammar.compile_create_table(&model, if_not_exists);
        run_statements(conn, &statements)
            .await
            .map_err(|source| QueryError::CreateTable {
                table: name.to_string(),
                source: Box::new(source),
            })?;
        Ok(model)
    }

    /// Alters a table with the commands recorded by `define`.
    ///
    /// Commands run in order. After the first failure the rest are
    /// skipped; commands that already ran are not undone.
    ///
    /// # Errors
    ///
    /// Returns the introspection error, or [`QueryError::Alter`] listing
    /// every failed and skipped command.
    pub async fn alter_table<C, F>(&self, conn: &C, name: &str, define: F) -> Result<Table>
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        let mut table = self.get_table(conn, name).await?;
        define(&mut table);
        table.finish();

        info!(table = %name, commands = table.commands.len(), "Altering table");
        let outcomes = self.apply_commands(conn, &mut table).await;
        let failures: Vec<CommandFailure> = outcomes
            .into_iter()
            .filter_map(|(command, outcome)| {
                let reason = match outcome {
                    CommandOutcome::Applied => return None,
                    CommandOutcome::Failed(message) => message,
                    CommandOutcome::Skipped => String::from("skipped"),
                };
                Some(CommandFailure {
                    command: command.to_string(),
                    reason,
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(table)
        } else {
            Err(QueryError::Alter {
                table: name.to_string(),
                failures,
            })
        }
    }

    /// Runs the commands recorded on `table` in order, applying each one to
    /// the model once its DDL has succeeded. Drains `table.commands`.
    pub async fn apply_commands<C: Connection>(
        &self,
        conn: &C,
        table: &mut Table,
    ) -> Vec<(Command, CommandOutcome)> {
        let commands = std::mem::take(&mut table.commands);
        let mut outcomes = Vec::with_capacity(commands.len());
        let mut failed = false;

        for command in commands {
            if failed {
                warn!(table = %table.name, command = %command, "Skipping command after earlier failure");
                outcomes.push((command, CommandOutcome::Skipped));
                continue;
            }
            let statements = self.grammar.compile_command(table, &command);
            match run_statements(conn, &statements).await {
                Ok(()) => {
                    table.apply(&command);
                    outcomes.push((command, CommandOutcome::Applied));
                }
                Err(e) => {
                    warn!(table = %table.name, command = %command, error = %e, "Command failed");
                    failed = true;
                    outcomes.push((command, CommandOutcome::Failed(e.to_string())));
                }
            }
        }
        outcomes
    }

    /// Drops a table.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn drop_table<C: Connection>(&self, conn: &C, name: &str) -> Result<()> {
        info!(table = %name, "Dropping table");
        let sql = self.grammar.compile_drop_table(&self.full_name(name), false);
        execute_statement(conn, &sql, &[]).await?;
        Ok(())
    }

    /// Drops a table if it exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn drop_table_if_exists<C: Connection>(&self, conn: &C, name: &str) -> Result<()> {
        info!(table = %name, "Dropping table if exists");
        let sql = self.grammar.compile_drop_table(&self.full_name(name), true);
        execute_statement(conn, &sql, &[]).await?;
        Ok(())
    }

    /// Renames a table.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn rename_table<C: Connection>(&self, conn: &C, from: &str, to: &str) -> Result<()> {
        info!(from = %from, to = %to, "Renaming table");
        let sql = self
            .grammar
            .compile_rename_table(&self.full_name(from), &self.full_name(to));
        execute_statement(conn, &sql, &[]).await?;
        Ok(())
    }

    /// Server version string.
    ///
    /// # Errors
    ///
    /// Returns the driver error, or [`QueryError::Decode`] on an empty
    /// answer.
    pub async fn get_version<C: Connection>(&self, conn: &C) -> Result<String> {
        let sql = self.grammar.compile_version();
        let rows = fetch_rows(conn, &sql, &[]).await?;
        match rows.first() {
            Some(row) => row.try_get::<String>("version"),
            None => Err(QueryError::Decode {
                column: String::from("version"),
                message: String::from("no row returned"),
            }),
        }
    }

    /// [`Schema::create_table`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the table cannot be created.
    pub async fn must_create_table<C, F>(&self, conn: &C, name: &str, define: F) -> Table
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        self.create_table(conn, name, define)
            .await
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Schema::alter_table`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when any command fails.
    pub async fn must_alter_table<C, F>(&self, conn: &C, name: &str, define: F) -> Table
    where
        C: Connection,
        F: FnOnce(&mut Table),
    {
        self.alter_table(conn, name, define)
            .await
            .unwrap_or_else(|e| panic!("{e}"))
    }
}

async fn run_statements<C: Connection>(conn: &C, statements: &[String]) -> Result<()> {
    for sql in statements {
        execute_statement(conn, sql, &[]).await?;
    }
    Ok(())
}

fn definition_text(row: &Row) -> Option<String> {
    row.get_index(0).and_then(|value| value.get::<String>())
}

/// Groups `(index, column)` rows into the primary key and indexes, and
/// fills the back-references on the columns.
fn apply_index_rows(table: &mut Table, rows: Vec<IndexRow>) {
    let mut primary: Option<Primary> = None;
    let mut indexes: Vec<Index> = Vec::new();

    for row in rows {
        if row.primary {
            primary
                .get_or_insert_with(|| Primary {
                    name: row.name.clone(),
                    columns: Vec::new(),
                })
                .columns
                .push(row.column);
            continue;
        }
        match indexes.iter_mut().find(|i| i.name == row.name) {
            Some(index) => index.columns.push(row.column),
            None => indexes.push(Index {
                name: row.name,
                columns: vec![row.column],
                unique: row.unique,
            }),
        }
    }

    if primary.is_none() {
        let columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect();
        if !columns.is_empty() {
            primary = Some(Primary {
                name: table.primary_name(),
                columns,
            });
        }
    }

    if let Some(primary) = &primary {
        for column in &mut table.columns {
            column.primary = primary.columns.contains(&column.name);
        }
    }
    for index in &indexes {
        for name in &index.columns {
            if let Some(column) = table.get_column_mut(name) {
                column.indexes.push(index.name.clone());
            }
        }
    }
    table.primary = primary;
    table.indexes = indexes;
}
