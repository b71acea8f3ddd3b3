#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use oxide_query::{
    Builder, Connection, ConnectionOptions, ExecResult, MySqlGrammar, PostgresGrammar, QueryError,
    Result, Row, Schema, SqlGrammar, SqlValue, SqliteGrammar,
};

pub fn sql() -> Builder {
    Builder::new(Arc::new(SqlGrammar::new()), ConnectionOptions::default())
}

pub fn mysql() -> Builder {
    Builder::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::default())
}

pub fn postgres() -> Builder {
    Builder::new(Arc::new(PostgresGrammar::new()), ConnectionOptions::default())
}

pub fn sqlite() -> Builder {
    Builder::new(Arc::new(SqliteGrammar::new()), ConnectionOptions::default())
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

/// Counts `?` and `$N` placeholders outside single-quoted literals.
pub fn count_placeholders(sql: &str) -> usize {
    let mut quoted = false;
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => quoted = !quoted,
            '?' if !quoted => count += 1,
            '$' if !quoted && chars.peek().is_some_and(char::is_ascii_digit) => count += 1,
            _ => {}
        }
    }
    count
}

/// Asserts that the builder's bookkeeping agrees with the compiled statement.
pub fn assert_bindings_consistent(builder: &Builder) {
    let (sql, bindings) = builder.compile();
    assert_eq!(builder.get_bindings(), bindings, "bindings differ for {sql}");
    assert_eq!(count_placeholders(&sql), bindings.len(), "placeholders differ for {sql}");
}

/// One statement seen by [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub bindings: Vec<SqlValue>,
}

#[derive(Debug, Default)]
struct State {
    recorded: Vec<Recorded>,
    rows: VecDeque<Vec<Row>>,
    fail_on: Option<usize>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

/// Records statements and answers with queued rows.
#[derive(Debug, Default, Clone)]
pub struct MockConnection {
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the rows returned by the next `fetch_all`.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.state.lock().unwrap().rows.push_back(rows);
        self
    }

    /// Makes the statement with this zero-based index fail.
    pub fn fail_on(&self, index: usize) -> &Self {
        self.state.lock().unwrap().fail_on = Some(index);
        self
    }

    pub fn set_rows_affected(&self, n: u64) -> &Self {
        self.state.lock().unwrap().rows_affected = n;
        self
    }

    pub fn set_last_insert_id(&self, id: Option<i64>) -> &Self {
        self.state.lock().unwrap().last_insert_id = id;
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().recorded.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.recorded().into_iter().map(|r| r.sql).collect()
    }

    fn record(&self, sql: &str, bindings: &[SqlValue]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.recorded.len();
        state.recorded.push(Recorded {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        if state.fail_on == Some(index) {
            return Err(QueryError::database(std::io::Error::other(format!(
                "statement {index} rejected"
            ))));
        }
        Ok(())
    }
}

impl Connection for MockConnection {
    async fn fetch_all(&self, sql: &str, bindings: &[SqlValue]) -> Result<Vec<Row>> {
        self.record(sql, bindings)?;
        Ok(self.state.lock().unwrap().rows.pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, bindings: &[SqlValue]) -> Result<ExecResult> {
        self.record(sql, bindings)?;
        let state = self.state.lock().unwrap();
        Ok(ExecResult {
            rows_affected: state.rows_affected,
            last_insert_id: state.last_insert_id,
        })
    }
}

pub fn mysql_schema() -> Schema {
    Schema::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::default())
}

pub fn postgres_schema() -> Schema {
    Schema::new(Arc::new(PostgresGrammar::new()), ConnectionOptions::default())
}

pub fn sqlite_schema() -> Schema {
    Schema::new(Arc::new(SqliteGrammar::new()), ConnectionOptions::default())
}
