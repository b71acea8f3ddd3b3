mod common;

use std::sync::Arc;

use common::{mysql_schema, postgres_schema, row, sqlite_schema, text, MockConnection};
use oxide_query::{
    ColumnType, Command, CommandOutcome, ConnectionOptions, MySqlGrammar, QueryError, Schema,
    SqlValue, Table,
};

fn mysql_users(conn: &MockConnection) {
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(1))])]);
    conn.push_rows(vec![
        row(&[
            ("name", text("id")),
            ("native_type", text("bigint unsigned")),
            ("nullable", text("NO")),
            ("default_value", SqlValue::Null),
            ("length", SqlValue::Null),
            ("extra", text("auto_increment")),
            ("comment", text("")),
        ]),
        row(&[
            ("name", text("name")),
            ("native_type", text("varchar(255)")),
            ("nullable", text("NO")),
            ("default_value", SqlValue::Null),
            ("length", SqlValue::Int(255)),
            ("extra", text("")),
            ("comment", text("")),
        ]),
        row(&[
            ("name", text("last_ip")),
            ("native_type", text("varchar(45)")),
            ("nullable", text("YES")),
            ("default_value", SqlValue::Null),
            ("length", SqlValue::Int(45)),
            ("extra", text("")),
            ("comment", text("T:ipAddress|login")),
        ]),
    ]);
    conn.push_rows(vec![
        row(&[
            ("index_name", text("PRIMARY")),
            ("column_name", text("id")),
            ("non_unique", SqlValue::Int(0)),
        ]),
        row(&[
            ("index_name", text("users_name_unique")),
            ("column_name", text("name")),
            ("non_unique", SqlValue::Int(0)),
        ]),
    ]);
}

#[tokio::test]
async fn test_get_table_reads_columns_and_indexes() {
    let conn = MockConnection::new();
    mysql_users(&conn);

    let table = mysql_schema().get_table(&conn, "users").await.unwrap();

    assert_eq!(table.column_names(), vec!["id", "name", "last_ip"]);
    let id = table.get_column("id").unwrap();
    assert!(id.auto_increment && id.unsigned && id.primary);
    assert_eq!(id.column_type, ColumnType::BigInteger);

    let name = table.get_column("name").unwrap();
    assert_eq!(name.length, Some(255));
    assert_eq!(name.indexes, vec![String::from("users_name_unique")]);
    assert_eq!(name.position, 1);

    let last_ip = table.get_column("last_ip").unwrap();
    assert_eq!(last_ip.column_type, ColumnType::IpAddress);
    assert_eq!(last_ip.comment.as_deref(), Some("login"));
    assert!(last_ip.nullable);

    let primary = table.primary.as_ref().unwrap();
    assert_eq!(primary.columns, vec![String::from("id")]);
    assert!(table.get_index("users_name_unique").unwrap().unique);
}

#[tokio::test]
async fn test_get_missing_table() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(0))])]);
    let err = mysql_schema().get_table(&conn, "ghosts").await.unwrap_err();
    assert!(matches!(err, QueryError::TableNotFound(ref name) if name == "ghosts"));
    assert_eq!(conn.recorded().len(), 1);
}

#[tokio::test]
async fn test_postgres_enum_options_are_fetched() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(1))])]);
    conn.push_rows(vec![row(&[
        ("name", text("status")),
        ("native_type", text("USER-DEFINED")),
        ("udt_name", text("enum_0123456789abcdef")),
        ("nullable", text("NO")),
        ("default_value", SqlValue::Null),
        ("extra", text("")),
        ("comment", SqlValue::Null),
    ])]);
    conn.push_rows(vec![
        row(&[("option", text("draft"))]),
        row(&[("option", text("live"))]),
    ]);

    let table = postgres_schema().get_table(&conn, "posts").await.unwrap();

    let status = table.get_column("status").unwrap();
    assert_eq!(status.column_type, ColumnType::Enum);
    assert_eq!(status.options, vec![String::from("draft"), String::from("live")]);
    assert_eq!(
        conn.statements()[2],
        r#"select unnest(enum_range(null::"enum_0123456789abcdef"))::text as option"#
    );
}

#[tokio::test]
async fn test_alter_skips_commands_after_a_failure() {
    let conn = MockConnection::new();
    mysql_users(&conn);
    conn.fail_on(4);

    let err = mysql_schema()
        .alter_table(&conn, "users", |t| {
            t.string("email").nullable();
            t.drop_column("legacy");
            t.rename_column("name", "full_name");
        })
        .await
        .unwrap_err();

    let QueryError::Alter { table, failures } = err else {
        panic!("expected an alter error");
    };
    assert_eq!(table, "users");
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].command, "drop column legacy");
    assert_eq!(failures[0].reason, "Database error: statement 4 rejected");
    assert_eq!(failures[1].command, "rename column name to full_name");
    assert_eq!(failures[1].reason, "skipped");

    let statements = conn.statements();
    assert_eq!(statements.len(), 5);
    assert_eq!(
        statements[3],
        "ALTER TABLE `users` ADD COLUMN `email` VARCHAR(255) NULL"
    );
    assert_eq!(statements[4], "ALTER TABLE `users` DROP COLUMN `legacy`");
}

#[tokio::test]
async fn test_alter_reconciles_the_model() {
    let conn = MockConnection::new();
    mysql_users(&conn);

    let table = mysql_schema()
        .alter_table(&conn, "users", |t| {
            t.rename_column("name", "full_name");
            t.string("email").unique();
        })
        .await
        .unwrap();

    assert_eq!(table.column_names(), vec!["id", "full_name", "last_ip", "email"]);
    assert!(table.commands.is_empty());
    assert_eq!(
        table.get_index("users_name_unique").unwrap().columns,
        vec![String::from("full_name")]
    );
    assert!(table.has_index("users_email_unique"));
    assert_eq!(
        conn.statements()[5],
        "CREATE UNIQUE INDEX `users_email_unique` ON `users` (`email`)"
    );
}

#[tokio::test]
async fn test_apply_commands_reports_each_outcome() {
    let mut table = Table::new("users");
    table.id();
    table.string("name");
    table.finish();
    let mut table = table.preview();

    table.string("email");
    table.drop_column("name");
    table.index(&["email"]);
    table.finish();

    let conn = MockConnection::new();
    conn.fail_on(1);
    let outcomes = sqlite_schema().apply_commands(&conn, &mut table).await;

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0], (Command::AddColumn(_), CommandOutcome::Applied)));
    assert!(matches!(outcomes[1].1, CommandOutcome::Failed(_)));
    assert_eq!(outcomes[2].1, CommandOutcome::Skipped);
    assert_eq!(table.column_names(), vec!["id", "name", "email"]);
    assert!(!table.has_index("users_email_index"));
}

#[tokio::test]
async fn test_create_table_runs_every_statement() {
    let conn = MockConnection::new();
    let table = sqlite_schema()
        .create_table(&conn, "users", |t| {
            t.id();
            t.string("email").unique();
        })
        .await
        .unwrap();

    assert_eq!(table.column_names(), vec!["id", "email"]);
    assert!(table.has_index("users_email_unique"));
    assert_eq!(
        conn.statements(),
        vec![
            String::from(
                "CREATE TABLE `users` (`id` INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, `email` VARCHAR(255) NOT NULL)"
            ),
            String::from("CREATE UNIQUE INDEX `users_email_unique` ON `users` (`email`)"),
        ]
    );
}

#[tokio::test]
async fn test_create_table_failure_names_the_table() {
    let conn = MockConnection::new();
    conn.fail_on(0);
    let err = sqlite_schema()
        .create_table_if_not_exists(&conn, "users", |t| {
            t.id();
        })
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::CreateTable { ref table, .. } if table == "users"));
    assert!(conn.statements()[0].starts_with("CREATE TABLE IF NOT EXISTS `users`"));
}

#[tokio::test]
async fn test_prefixed_table_operations() {
    let schema = Schema::new(
        Arc::new(MySqlGrammar::new()),
        ConnectionOptions::with_prefix("app_"),
    );
    let conn = MockConnection::new();
    conn.push_rows(vec![
        row(&[("name", text("app_posts"))]),
        row(&[("name", text("other"))]),
        row(&[("name", text("app_users"))]),
    ]);

    assert_eq!(
        schema.get_tables(&conn).await.unwrap(),
        vec![String::from("posts"), String::from("users")]
    );
    schema.rename_table(&conn, "old", "new").await.unwrap();
    schema.drop_table_if_exists(&conn, "new").await.unwrap();

    let statements = conn.statements();
    assert_eq!(statements[1], "ALTER TABLE `app_old` RENAME TO `app_new`");
    assert_eq!(statements[2], "DROP TABLE IF EXISTS `app_new`");
}

#[tokio::test]
async fn test_get_version() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("version", text("3.45.1"))])]);
    assert_eq!(sqlite_schema().get_version(&conn).await.unwrap(), "3.45.1");
    assert_eq!(conn.statements()[0], "select sqlite_version() as version");

    let err = sqlite_schema().get_version(&conn).await.unwrap_err();
    assert!(matches!(err, QueryError::Decode { .. }));
}
