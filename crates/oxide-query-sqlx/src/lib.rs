//! # oxide-query-sqlx
//!
//! Runs [`oxide_query`] statements over [`sqlx`] pools for SQLite,
//! PostgreSQL and MySQL.
//!
//! ```rust,no_run
//! # async fn run() -> oxide_query::Result<()> {
//! use oxide_query::{Config, ConnectionOptions, Record};
//! use oxide_query_sqlx::Database;
//!
//! let db = Database::connect(&Config::new("sqlite", "sqlite::memory:"), ConnectionOptions::default()).await?;
//! db.schema()
//!     .create_table(&db, "users", |t| {
//!         t.id();
//!         t.string("email").unique();
//!     })
//!     .await?;
//! let id = db
//!     .table("users")
//!     .insert_get_id(&db, &Record::new().set("email", "ken@example.com"), None)
//!     .await?;
//! assert_eq!(id, 1);
//! # Ok(())
//! # }
//! ```

mod connection;
mod database;
mod decode;

pub use connection::{connect, SqlxConnection};
pub use database::Database;
