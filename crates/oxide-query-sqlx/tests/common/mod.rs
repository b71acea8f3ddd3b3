#![allow(dead_code)]

use oxide_query::{Config, ConnectionOptions, Record};
use oxide_query_sqlx::Database;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A fresh in-memory SQLite database.
pub async fn memory_db() -> Database {
    init_tracing();
    Database::connect(
        &Config::new("sqlite", "sqlite::memory:"),
        ConnectionOptions::default(),
    )
    .await
    .unwrap()
}

/// Creates `users` and inserts Ken (vote 1), Max (vote 5) and Ann (vote 9).
pub async fn seeded_users(db: &Database) {
    db.schema()
        .create_table(db, "users", |t| {
            t.id();
            t.string("name");
            t.string("email").unique();
            t.integer("vote").default(0);
            t.timestamp("created_at").nullable();
        })
        .await
        .unwrap();

    let records = [
        ("Ken", "ken@example.com", 1, "2024-03-05 10:00:00"),
        ("Max", "max@example.com", 5, "2024-04-05 11:30:00"),
        ("Ann", "ann@example.com", 9, "2023-03-17 08:15:00"),
    ]
    .into_iter()
    .map(|(name, email, vote, created_at)| {
        Record::new()
            .set("name", name)
            .set("email", email)
            .set("vote", vote)
            .set("created_at", created_at)
    })
    .collect::<Vec<_>>();
    db.table("users").insert(db, &records).await.unwrap();
}
