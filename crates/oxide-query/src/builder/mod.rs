//! Fluent query builder.
//!
//! A [`Builder`] owns a [`Query`] AST and mutates it through consuming,
//! chainable methods. It never produces SQL text itself: compilation is
//! delegated to the [`Grammar`] it was created with.
//!
//! ```
//! use oxide_query::{Builder, ConnectionOptions, PostgresGrammar};
//! use std::sync::Arc;
//!
//! let (sql, bindings) = Builder::new(Arc::new(PostgresGrammar::new()), ConnectionOptions::default())
//!     .table("users")
//!     .where_("email", ("like", "%@x.com"))
//!     .where_nested(|q| q.where_("vote", (">", 10)).where_("name", "Ken"))
//!     .compile();
//! assert_eq!(
//!     sql,
//!     r#"select * from "users" where "email" like $1 and ("vote" > $2 and "name" = $3)"#
//! );
//! assert_eq!(bindings.len(), 3);
//! ```

mod args;
mod execute;
mod join;
mod wheres;

pub use args::{is_operator, prepare_args, IntoArgs, Resolved, OPERATORS};

use std::fmt;
use std::sync::Arc;

use crate::ast::{
    BindingCategory, Direction, Distinct, FromClause, Group, Lock, Name, Order, Query, Selection,
    Union,
};
use crate::error::Result;
use crate::grammar::{Context, Dialect, Grammar, QueryGrammar};
use crate::registry::{Config, ConnectionOptions, GrammarRegistry};
use crate::value::{Operand, Record, SqlValue};

/// A sub-select: another builder, or a closure filling a fresh one.
pub trait IntoSubquery {
    /// Builds the sub-select from a fresh query of `parent`.
    fn into_subquery(self, parent: &Builder) -> Builder;
}

impl IntoSubquery for Builder {
    fn into_subquery(self, _parent: &Builder) -> Builder {
        self
    }
}

impl<F> IntoSubquery for F
where
    F: FnOnce(Builder) -> Builder,
{
    fn into_subquery(self, parent: &Builder) -> Builder {
        self(parent.new_query())
    }
}

/// Chainable statement builder bound to one grammar.
#[derive(Clone)]
pub struct Builder {
    grammar: Arc<dyn Grammar>,
    options: Arc<ConnectionOptions>,
    query: Query,
    join_clause: bool,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("grammar", &self.grammar.name())
            .field("options", &self.options)
            .field("query", &self.query)
            .field("join_clause", &self.join_clause)
            .finish()
    }
}

impl Builder {
    /// Creates a builder for a grammar.
    #[must_use]
    pub fn new(grammar: Arc<dyn Grammar>, options: impl Into<Arc<ConnectionOptions>>) -> Self {
        Self {
            grammar,
            options: options.into(),
            query: Query::new(),
            join_clause: false,
        }
    }

    /// Creates a builder for the grammar registered under `config.driver`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueryError::UnknownDriver`] when no grammar matches.
    pub fn connect(
        registry: &GrammarRegistry,
        config: &Config,
        options: impl Into<Arc<ConnectionOptions>>,
    ) -> Result<Self> {
        Ok(Self::new(registry.get(&config.driver)?, options))
    }

    /// A builder with a fresh AST and the same grammar and options.
    ///
    /// Use [`Clone`] instead for a variant of the same statement.
    #[must_use]
    pub fn new_query(&self) -> Self {
        Self::new(Arc::clone(&self.grammar), Arc::clone(&self.options))
    }

    /// The grammar.
    #[must_use]
    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    /// The connection options.
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The AST built so far.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Consumes the builder, returning its AST.
    #[must_use]
    pub fn into_query(self) -> Query {
        self.query
    }

    // Sources.

    /// Starts a new statement on `table` (`"users"` or `"users as u"`).
    #[must_use]
    pub fn table(mut self, table: &str) -> Self {
        self.query = Query::new();
        self.query.from = Some(FromClause::Table(Name::parse(table)));
        self
    }

    /// Sets the source table, keeping the rest of the statement.
    #[must_use]
    pub fn from(mut self, table: &str) -> Self {
        self.query.bindings.clear(BindingCategory::From);
        self.query.from = Some(FromClause::Table(Name::parse(table)));
        self
    }

    /// Raw `from` fragment; `?` placeholders are bound to `bindings`.
    #[must_use]
    pub fn from_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.query.bindings.clear(BindingCategory::From);
        self.query
            .bindings
            .extend(BindingCategory::From, bindings.iter().cloned());
        self.query.from = Some(FromClause::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Selects from a sub-select: `from (...) as alias`.
    #[must_use]
    pub fn from_sub(mut self, sub: impl IntoSubquery, alias: &str) -> Self {
        let sub = sub.into_subquery(&self);
        self.query.bindings.clear(BindingCategory::From);
        self.query
            .bindings
            .extend(BindingCategory::From, sub.get_bindings());
        self.query.from = Some(FromClause::Sub {
            query: Box::new(sub.query),
            alias: alias.to_string(),
        });
        self
    }

    // Projection.

    /// Replaces the selected columns.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.query.bindings.clear(BindingCategory::Select);
        self.query.columns = columns
            .iter()
            .map(|c| Selection::Column((*c).to_string()))
            .collect();
        self
    }

    /// Adds selected columns.
    #[must_use]
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        self.query
            .columns
            .extend(columns.iter().map(|c| Selection::Column((*c).to_string())));
        self
    }

    /// Adds a raw selected expression.
    #[must_use]
    pub fn select_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.query
            .bindings
            .extend(BindingCategory::Select, bindings.iter().cloned());
        self.query.columns.push(Selection::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Adds a scalar sub-select: `(...) as alias`.
    #[must_use]
    pub fn select_sub(mut self, sub: impl IntoSubquery, alias: &str) -> Self {
        let sub = sub.into_subquery(&self);
        self.query
            .bindings
            .extend(BindingCategory::Select, sub.get_bindings());
        self.query.columns.push(Selection::Sub {
            query: Box::new(sub.query),
            alias: alias.to_string(),
        });
        self
    }

    /// `select distinct`.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.query.distinct = Distinct::Rows;
        self
    }

    /// `select distinct on (...)` where supported, plain distinct elsewhere.
    #[must_use]
    pub fn distinct_on(mut self, columns: &[&str]) -> Self {
        self.query.distinct = Distinct::On(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    // Grouping.

    /// `group by`.
    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.query
            .groups
            .extend(columns.iter().map(|c| Group::Column((*c).to_string())));
        self
    }

    /// Raw `group by` fragment.
    #[must_use]
    pub fn group_by_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.query
            .bindings
            .extend(BindingCategory::GroupBy, bindings.iter().cloned());
        self.query.groups.push(Group::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    // Ordering. After a union these apply to the whole union.

    fn push_order(&mut self, order: Order, bindings: Vec<SqlValue>) {
        if self.query.unions.is_empty() {
            self.query.bindings.extend(BindingCategory::Order, bindings);
            self.query.orders.push(order);
        } else {
            self.query.bindings.extend(BindingCategory::UnionOrder, bindings);
            self.query.union_orders.push(order);
        }
    }

    /// `order by column asc`.
    #[must_use]
    pub fn order_by(self, column: &str) -> Self {
        self.order_by_direction(column, Direction::Asc)
    }

    /// `order by column desc`.
    #[must_use]
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by_direction(column, Direction::Desc)
    }

    /// `order by column <direction>`.
    #[must_use]
    pub fn order_by_direction(mut self, column: &str, direction: Direction) -> Self {
        self.push_order(
            Order::Column {
                column: column.to_string(),
                direction,
            },
            Vec::new(),
        );
        self
    }

    /// Raw `order by` fragment.
    #[must_use]
    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.push_order(
            Order::Raw {
                sql: sql.to_string(),
                bindings: bindings.clone(),
            },
            bindings,
        );
        self
    }

    /// Orders by a scalar sub-select.
    #[must_use]
    pub fn order_by_sub(mut self, sub: impl IntoSubquery, direction: Direction) -> Self {
        let sub = sub.into_subquery(&self);
        let bindings = sub.get_bindings();
        self.push_order(
            Order::Sub {
                query: Box::new(sub.query),
                direction,
            },
            bindings,
        );
        self
    }

    /// Newest first.
    #[must_use]
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    /// Oldest first.
    #[must_use]
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column)
    }

    /// Random order.
    #[must_use]
    pub fn in_random_order(self) -> Self {
        let random = self.grammar.compile_random();
        self.order_by_raw(&random, Vec::new())
    }

    /// Drops every ordering.
    #[must_use]
    pub fn reorder(mut self) -> Self {
        self.query.orders.clear();
        self.query.union_orders.clear();
        self.query.bindings.clear(BindingCategory::Order);
        self.query.bindings.clear(BindingCategory::UnionOrder);
        self
    }

    // Limits.

    /// `limit n`.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        if self.query.unions.is_empty() {
            self.query.limit = Some(limit);
        } else {
            self.query.union_limit = Some(limit);
        }
        self
    }

    /// Alias of [`Builder::limit`].
    #[must_use]
    pub fn take(self, limit: u64) -> Self {
        self.limit(limit)
    }

    /// `offset n`.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        if self.query.unions.is_empty() {
            self.query.offset = Some(offset);
        } else {
            self.query.union_offset = Some(offset);
        }
        self
    }

    /// Alias of [`Builder::offset`].
    #[must_use]
    pub fn skip(self, offset: u64) -> Self {
        self.offset(offset)
    }

    /// One page: `offset (page - 1) * per_page limit per_page`. The offset
    /// saturates at `u64::MAX`.
    #[must_use]
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.offset(page.saturating_sub(1).saturating_mul(per_page))
            .limit(per_page)
    }

    // Locks.

    /// Shared row lock.
    #[must_use]
    pub fn shared_lock(mut self) -> Self {
        self.query.lock = Some(Lock::Share);
        self
    }

    /// Exclusive row lock.
    #[must_use]
    pub fn lock_for_update(mut self) -> Self {
        self.query.lock = Some(Lock::Update);
        self
    }

    // Unions.

    fn push_union(mut self, sub: impl IntoSubquery, all: bool) -> Self {
        let sub = sub.into_subquery(&self);
        self.query
            .bindings
            .extend(BindingCategory::Union, sub.get_bindings());
        self.query.unions.push(Union {
            query: Box::new(sub.query),
            all,
        });
        self
    }

    /// `union`.
    #[must_use]
    pub fn union(self, sub: impl IntoSubquery) -> Self {
        self.push_union(sub, false)
    }

    /// `union all`.
    #[must_use]
    pub fn union_all(self, sub: impl IntoSubquery) -> Self {
        self.push_union(sub, true)
    }

    // Compilation.

    /// A fresh compilation context for this builder.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::new(self.grammar.placeholder(), self.options.prefix.clone())
    }

    /// The select statement.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.compile().0
    }

    /// Bindings of the select statement, in placeholder order.
    #[must_use]
    pub fn get_bindings(&self) -> Vec<SqlValue> {
        self.query.bindings.flatten()
    }

    /// The select statement and its bindings.
    #[must_use]
    pub fn compile(&self) -> (String, Vec<SqlValue>) {
        let mut ctx = self.context();
        let sql = self.grammar.compile_select(&mut ctx, &self.query);
        (sql, ctx.into_bindings())
    }

    /// The `insert` statement for `records`.
    #[must_use]
    pub fn compile_insert(&self, records: &[Record]) -> (String, Vec<SqlValue>) {
        let mut ctx = self.context();
        let sql = self.grammar.compile_insert(&mut ctx, &self.query, records);
        (sql, ctx.into_bindings())
    }

    /// The insert statement that skips conflicting rows.
    #[must_use]
    pub fn compile_insert_or_ignore(&self, records: &[Record]) -> (String, Vec<SqlValue>) {
        let mut ctx = self.context();
        let sql = self
            .grammar
            .compile_insert_or_ignore(&mut ctx, &self.query, records);
        (sql, ctx.into_bindings())
    }

    /// The upsert statement.
    #[must_use]
    pub fn compile_upsert(
        &self,
        records: &[Record],
        unique_by: &[&str],
        update: &[&str],
    ) -> (String, Vec<SqlValue>) {
        let unique_by: Vec<String> = unique_by.iter().map(|c| (*c).to_string()).collect();
        let update: Vec<String> = update.iter().map(|c| (*c).to_string()).collect();
        let mut ctx = self.context();
        let sql = self
            .grammar
            .compile_upsert(&mut ctx, &self.query, records, &unique_by, &update);
        (sql, ctx.into_bindings())
    }

    /// The `update` statement.
    #[must_use]
    pub fn compile_update(&self, values: &Record) -> (String, Vec<SqlValue>) {
        let mut ctx = self.context();
        let sql = self.grammar.compile_update(&mut ctx, &self.query, values);
        (sql, ctx.into_bindings())
    }

    /// The `delete` statement.
    #[must_use]
    pub fn compile_delete(&self) -> (String, Vec<SqlValue>) {
        let mut ctx = self.context();
        let sql = self.grammar.compile_delete(&mut ctx, &self.query);
        (sql, ctx.into_bindings())
    }

    fn push_operand(&mut self, category: BindingCategory, operand: &Operand) {
        if let Operand::Value(value) = operand {
            self.query.bindings.push(category, value.clone());
        }
    }
}
