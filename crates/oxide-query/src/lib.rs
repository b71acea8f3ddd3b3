//! # oxide-query
//!
//! A fluent, database-agnostic query and schema builder.
//!
//! This crate provides:
//! - A chainable [`Builder`] producing a statement AST
//! - Grammars compiling that AST to MySQL, PostgreSQL, SQLite or generic SQL
//! - A [`Schema`] builder that creates, alters and introspects tables
//! - Async execution over any [`Connection`] implementation
//!
//! ## Building queries
//!
//! Every value becomes a bound parameter, numbered the way the dialect
//! expects:
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_query::{Builder, ConnectionOptions, SqlValue, SqliteGrammar};
//!
//! let (sql, bindings) = Builder::new(Arc::new(SqliteGrammar::new()), ConnectionOptions::default())
//!     .table("users")
//!     .select(&["id", "name"])
//!     .where_("name", "'; DROP TABLE users; --")
//!     .order_by_desc("id")
//!     .take(10)
//!     .compile();
//!
//! assert_eq!(sql, "select `id`, `name` from `users` where `name` = ? order by `id` desc limit 10");
//! assert_eq!(bindings, vec![SqlValue::Text(String::from("'; DROP TABLE users; --"))]);
//! ```
//!
//! ## Choosing a dialect at runtime
//!
//! ```rust
//! use oxide_query::{Builder, Config, ConnectionOptions, GrammarRegistry};
//!
//! let registry = GrammarRegistry::with_defaults();
//! let config = Config::from_json(r#"{"driver": "pgsql", "dsn": "postgres://localhost/app"}"#).unwrap();
//! let builder = Builder::connect(&registry, &config, ConnectionOptions::with_prefix("app_")).unwrap();
//! assert_eq!(builder.table("users").where_("id", 1).to_sql(), r#"select * from "app_users" where "id" = $1"#);
//! ```

pub mod ast;
pub mod builder;
pub mod connection;
pub mod error;
pub mod grammar;
pub mod paginator;
pub mod registry;
pub mod schema;
pub mod value;

pub use builder::{Builder, IntoArgs, IntoSubquery};
pub use connection::{Connection, ExecResult, Row};
pub use error::{CommandFailure, QueryError, Result};
pub use grammar::{
    Context, Dialect, Grammar, MySqlGrammar, Placeholder, PostgresGrammar, QueryGrammar,
    SchemaGrammar, SqlGrammar, SqliteGrammar,
};
pub use paginator::Paginator;
pub use registry::{Config, ConnectionOptions, GrammarRegistry};
pub use schema::{Column, ColumnType, Command, CommandOutcome, Schema, Table};
pub use value::{raw, Expression, FromSqlValue, IntoOperand, Operand, Record, SqlValue, ToSqlValue};
