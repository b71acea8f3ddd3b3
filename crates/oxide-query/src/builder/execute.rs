//! Statement execution over a [`Connection`].

use crate::ast::{Aggregate, BindingCategory};
use crate::connection::{execute_statement, fetch_rows, Connection, Row};
use crate::error::{QueryError, Result};
use crate::grammar::{Dialect, QueryGrammar};
use crate::paginator::{normalize, Paginator};
use crate::value::{Expression, IntoOperand, Record, SqlValue};

use super::{Builder, IntoSubquery};

impl Builder {
    /// Runs the select.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn get<C: Connection>(&self, conn: &C) -> Result<Vec<Row>> {
        let (sql, bindings) = self.compile();
        fetch_rows(conn, &sql, &bindings).await
    }

    /// First row, if any.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn first<C: Connection>(&self, conn: &C) -> Result<Option<Row>> {
        let rows = self.clone().take(1).get(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// Row whose `id` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn find<C: Connection>(&self, conn: &C, id: impl IntoOperand) -> Result<Option<Row>> {
        self.clone().where_("id", id.into_operand()).first(conn).await
    }

    /// One column of the first row.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn value<C: Connection>(&self, conn: &C, column: &str) -> Result<Option<SqlValue>> {
        let row = self.clone().select(&[column]).first(conn).await?;
        Ok(row.and_then(|row| row.into_values().into_iter().next()))
    }

    /// One column of every row.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn pluck<C: Connection>(&self, conn: &C, column: &str) -> Result<Vec<SqlValue>> {
        let rows = self.clone().select(&[column]).get(conn).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_values().into_iter().next())
            .collect())
    }

    /// True when the select matches at least one row.
    ///
    /// # Errors
    ///
    /// Returns the driver error, or [`QueryError::Decode`] when the
    /// `exists` column is not boolean.
    pub async fn exists<C: Connection>(&self, conn: &C) -> Result<bool> {
        let mut ctx = self.context();
        let sql = self.grammar.compile_exists(&mut ctx, &self.query);
        let rows = fetch_rows(conn, &sql, ctx.bindings()).await?;
        match rows.first() {
            Some(row) => row.try_get::<bool>("exists"),
            None => Ok(false),
        }
    }

    /// Negation of [`Builder::exists`].
    ///
    /// # Errors
    ///
    /// See [`Builder::exists`].
    pub async fn doesnt_exist<C: Connection>(&self, conn: &C) -> Result<bool> {
        Ok(!self.exists(conn).await?)
    }

    /// Runs `function(columns)` over the select and returns the
    /// `aggregate` column.
    ///
    /// # Errors
    ///
    /// Returns the driver error, or [`QueryError::EmptyAggregate`] when no
    /// row comes back.
    pub async fn aggregate<C: Connection>(
        &self,
        conn: &C,
        function: &str,
        columns: &[&str],
    ) -> Result<SqlValue> {
        let mut query = self.clone();
        if query.query.unions.is_empty() {
            query.query.columns.clear();
            query.query.bindings.clear(BindingCategory::Select);
            query.query.orders.clear();
            query.query.bindings.clear(BindingCategory::Order);
        }
        query.query.aggregate = Some(Aggregate {
            function: function.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        });
        let rows = query.get(conn).await?;
        rows.into_iter()
            .next()
            .and_then(|row| row.get("aggregate").cloned())
            .ok_or_else(|| QueryError::EmptyAggregate {
                function: function.to_string(),
            })
    }

    /// `count(*)`.
    ///
    /// # Errors
    ///
    /// See [`Builder::aggregate`].
    pub async fn count<C: Connection>(&self, conn: &C) -> Result<i64> {
        let value = self.aggregate(conn, "count", &["*"]).await?;
        value.get::<i64>().ok_or_else(|| decode_error("count", &value))
    }

    /// `min(column)`; NULL when nothing matches.
    ///
    /// # Errors
    ///
    /// See [`Builder::aggregate`].
    pub async fn min<C: Connection>(&self, conn: &C, column: &str) -> Result<SqlValue> {
        self.aggregate(conn, "min", &[column]).await
    }

    /// `max(column)`; NULL when nothing matches.
    ///
    /// # Errors
    ///
    /// See [`Builder::aggregate`].
    pub async fn max<C: Connection>(&self, conn: &C, column: &str) -> Result<SqlValue> {
        self.aggregate(conn, "max", &[column]).await
    }

    /// `sum(column)`; 0 when nothing matches.
    ///
    /// # Errors
    ///
    /// See [`Builder::aggregate`].
    pub async fn sum<C: Connection>(&self, conn: &C, column: &str) -> Result<f64> {
        let value = self.aggregate(conn, "sum", &[column]).await?;
        numeric_aggregate("sum", &value)
    }

    /// `avg(column)`; 0 when nothing matches.
    ///
    /// # Errors
    ///
    /// See [`Builder::aggregate`].
    pub async fn avg<C: Connection>(&self, conn: &C, column: &str) -> Result<f64> {
        let value = self.aggregate(conn, "avg", &[column]).await?;
        numeric_aggregate("avg", &value)
    }

    /// One page of the select plus the total row count.
    ///
    /// Grouped queries are counted over `(...) as aggregate_table`; others
    /// are counted without their orders, limits and offsets.
    ///
    /// # Errors
    ///
    /// Returns the driver error of either statement.
    pub async fn paginate<C: Connection>(&self, conn: &C, per_page: u64, page: u64) -> Result<Paginator> {
        let (per_page, page) = normalize(per_page, page);

        let mut counter = self.clone().reorder();
        counter.query.limit = None;
        counter.query.offset = None;
        counter.query.union_limit = None;
        counter.query.union_offset = None;
        let total = if counter.query.groups.is_empty() && counter.query.havings.is_empty() {
            counter.count(conn).await?
        } else {
            counter
                .new_query()
                .from_sub(counter, "aggregate_table")
                .count(conn)
                .await?
        };
        let total = u64::try_from(total).unwrap_or_default();

        let items = if total == 0 {
            Vec::new()
        } else {
            self.clone().for_page(page, per_page).get(conn).await?
        };
        Ok(Paginator::new(total, per_page, page, items))
    }

    /// Inserts `records`, returning the affected row count. An empty slice
    /// runs nothing.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    ///
    /// # Panics
    ///
    /// Panics when the records do not set the same columns.
    pub async fn insert<C: Connection>(&self, conn: &C, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let (sql, bindings) = self.compile_insert(records);
        Ok(execute_statement(conn, &sql, &bindings).await?.rows_affected)
    }

    /// Inserts one record and returns the generated key.
    ///
    /// `sequence` names the key column, `id` by default.
    ///
    /// # Errors
    ///
    /// Returns the driver error, or [`QueryError::Decode`] when no id is
    /// reported.
    pub async fn insert_get_id<C: Connection>(
        &self,
        conn: &C,
        record: &Record,
        sequence: Option<&str>,
    ) -> Result<i64> {
        let sequence = sequence.unwrap_or("id");
        let mut ctx = self.context();
        let sql = self
            .grammar
            .compile_insert_get_id(&mut ctx, &self.query, record, sequence);

        if self.grammar.returns_inserted_id() {
            let rows = fetch_rows(conn, &sql, ctx.bindings()).await?;
            let value = rows
                .into_iter()
                .next()
                .and_then(|row| row.into_values().into_iter().next())
                .unwrap_or(SqlValue::Null);
            return value.get::<i64>().ok_or_else(|| decode_error(sequence, &value));
        }

        execute_statement(conn, &sql, ctx.bindings())
            .await?
            .last_insert_id
            .ok_or_else(|| QueryError::Decode {
                column: sequence.to_string(),
                message: format!("{} reported no inserted id", self.grammar.name()),
            })
    }

    /// Inserts `records`, skipping those that violate a unique key.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    ///
    /// # Panics
    ///
    /// Panics on grammars without insert-or-ignore.
    pub async fn insert_or_ignore<C: Connection>(&self, conn: &C, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let (sql, bindings) = self.compile_insert_or_ignore(records);
        Ok(execute_statement(conn, &sql, &bindings).await?.rows_affected)
    }

    /// `insert into table (columns) select ...`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn insert_using<C: Connection>(
        &self,
        conn: &C,
        columns: &[&str],
        source: impl IntoSubquery,
    ) -> Result<u64> {
        let source = source.into_subquery(self);
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        let mut ctx = self.context();
        let sql = self
            .grammar
            .compile_insert_using(&mut ctx, &self.query, &columns, &source.query);
        Ok(execute_statement(conn, &sql, ctx.bindings()).await?.rows_affected)
    }

    /// Inserts `records`, updating `update` columns of rows that collide
    /// on `unique_by`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    ///
    /// # Panics
    ///
    /// Panics on grammars without upsert.
    pub async fn upsert<C: Connection>(
        &self,
        conn: &C,
        records: &[Record],
        unique_by: &[&str],
        update: &[&str],
    ) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let (sql, bindings) = self.compile_upsert(records, unique_by, update);
        Ok(execute_statement(conn, &sql, &bindings).await?.rows_affected)
    }

    /// Updates matching rows.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn update<C: Connection>(&self, conn: &C, values: &Record) -> Result<u64> {
        let (sql, bindings) = self.compile_update(values);
        Ok(execute_statement(conn, &sql, &bindings).await?.rows_affected)
    }

    /// `column = column + amount`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn increment<C: Connection>(&self, conn: &C, column: &str, amount: i64) -> Result<u64> {
        self.step(conn, column, "+", amount).await
    }

    /// `column = column - amount`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn decrement<C: Connection>(&self, conn: &C, column: &str, amount: i64) -> Result<u64> {
        self.step(conn, column, "-", amount).await
    }

    async fn step<C: Connection>(&self, conn: &C, column: &str, sign: &str, amount: i64) -> Result<u64> {
        let wrapped = self.grammar.wrap(&self.context(), column);
        let values = Record::new().set(column, Expression::new(format!("{wrapped} {sign} {amount}")));
        self.update(conn, &values).await
    }

    /// Deletes matching rows.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn delete<C: Connection>(&self, conn: &C) -> Result<u64> {
        let (sql, bindings) = self.compile_delete();
        Ok(execute_statement(conn, &sql, &bindings).await?.rows_affected)
    }

    /// Empties the table.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn truncate<C: Connection>(&self, conn: &C) -> Result<()> {
        let mut ctx = self.context();
        let sql = self.grammar.compile_truncate(&mut ctx, &self.query);
        execute_statement(conn, &sql, ctx.bindings()).await?;
        Ok(())
    }

    /// [`Builder::get`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_get<C: Connection>(&self, conn: &C) -> Vec<Row> {
        self.get(conn).await.unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Builder::first`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_first<C: Connection>(&self, conn: &C) -> Option<Row> {
        self.first(conn).await.unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Builder::count`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_count<C: Connection>(&self, conn: &C) -> i64 {
        self.count(conn).await.unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Builder::insert`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_insert<C: Connection>(&self, conn: &C, records: &[Record]) -> u64 {
        self.insert(conn, records).await.unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Builder::update`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_update<C: Connection>(&self, conn: &C, values: &Record) -> u64 {
        self.update(conn, values).await.unwrap_or_else(|e| panic!("{e}"))
    }

    /// [`Builder::delete`], panicking on error.
    ///
    /// # Panics
    ///
    /// Panics when the statement fails.
    pub async fn must_delete<C: Connection>(&self, conn: &C) -> u64 {
        self.delete(conn).await.unwrap_or_else(|e| panic!("{e}"))
    }
}

fn decode_error(column: &str, value: &SqlValue) -> QueryError {
    QueryError::Decode {
        column: column.to_string(),
        message: format!("unexpected value {value:?}"),
    }
}

fn numeric_aggregate(function: &str, value: &SqlValue) -> Result<f64> {
    if value.is_null() {
        return Ok(0.0);
    }
    value.get::<f64>().ok_or_else(|| decode_error(function, value))
}
