mod common;

use common::{mysql, postgres, row, sqlite, text, MockConnection};
use oxide_query::{QueryError, Record, SqlValue};

#[tokio::test]
async fn test_count_strips_columns_and_orders() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(4))])]);

    let total = mysql()
        .table("users")
        .select(&["name"])
        .where_("vote", (">", 1))
        .order_by("name")
        .count(&conn)
        .await
        .unwrap();

    assert_eq!(total, 4);
    let recorded = conn.recorded();
    assert_eq!(
        recorded[0].sql,
        "select count(*) as aggregate from `users` where `vote` > ?"
    );
    assert_eq!(recorded[0].bindings, vec![SqlValue::Int(1)]);
}

#[tokio::test]
async fn test_aggregate_without_rows_is_an_error() {
    let conn = MockConnection::new();
    let err = sqlite().table("users").max(&conn, "vote").await.unwrap_err();
    assert!(matches!(err, QueryError::EmptyAggregate { ref function } if function == "max"));
    assert_eq!(err.to_string(), "aggregate max get nothing");
}

#[tokio::test]
async fn test_sum_of_nothing_is_zero() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Null)])]);
    let sum = postgres().table("orders").sum(&conn, "price").await.unwrap();
    assert!(sum.abs() < f64::EPSILON);
    assert_eq!(
        conn.statements()[0],
        r#"select sum("price")::float8 as aggregate from "orders""#
    );
}

#[tokio::test]
async fn test_union_count_wraps_the_union() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(3))])]);

    let base = mysql();
    let total = base
        .clone()
        .table("a")
        .union(base.new_query().table("b"))
        .count(&conn)
        .await
        .unwrap();

    assert_eq!(total, 3);
    assert_eq!(
        conn.statements()[0],
        "select count(*) as aggregate from ((select * from `a`) union (select * from `b`)) as `temp_table`"
    );
}

#[tokio::test]
async fn test_paginate_counts_then_fetches_page() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(2))])]);
    conn.push_rows(vec![row(&[("id", SqlValue::Int(2))])]);

    let page = sqlite()
        .table("users")
        .order_by("id")
        .paginate(&conn, 1, 2)
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page, 2);
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(1));
    assert_eq!(page.items.len(), 1);
    assert_eq!(
        conn.statements(),
        vec![
            String::from("select count(*) as aggregate from `users`"),
            String::from("select * from `users` order by `id` asc limit 1 offset 1"),
        ]
    );
}

#[tokio::test]
async fn test_paginate_grouped_query_counts_groups() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(0))])]);

    let page = mysql()
        .table("orders")
        .select(&["user_id"])
        .group_by(&["user_id"])
        .paginate(&conn, 0, 0)
        .await
        .unwrap();

    assert_eq!(page.per_page, 15);
    assert_eq!(page.current_page, 1);
    assert!(page.is_empty());
    assert_eq!(
        conn.statements(),
        vec![String::from(
            "select count(*) as aggregate from (select `user_id` from `orders` group by `user_id`) as `aggregate_table`"
        )]
    );
}

#[tokio::test]
async fn test_paginate_far_page_saturates() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", SqlValue::Int(4))])]);

    let page = mysql().table("users").paginate(&conn, 10, u64::MAX).await.unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.last_page, 1);
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(u64::MAX - 1));
    assert_eq!(
        conn.statements()[1],
        format!("select * from `users` limit 10 offset {}", u64::MAX)
    );
}

#[tokio::test]
async fn test_insert_get_id_reads_returning_row() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("id", SqlValue::Int(42))])]);

    let id = postgres()
        .table("users")
        .insert_get_id(&conn, &Record::new().set("email", "a@x.com"), None)
        .await
        .unwrap();

    assert_eq!(id, 42);
    assert_eq!(
        conn.statements()[0],
        r#"insert into "users" ("email") values ($1) returning "id""#
    );
}

#[tokio::test]
async fn test_insert_get_id_uses_driver_id() {
    let conn = MockConnection::new();
    conn.set_last_insert_id(Some(9));
    let record = Record::new().set("email", "a@x.com");

    let id = mysql().table("users").insert_get_id(&conn, &record, None).await.unwrap();
    assert_eq!(id, 9);

    conn.set_last_insert_id(None);
    let err = mysql()
        .table("users")
        .insert_get_id(&conn, &record, Some("uid"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Decode { ref column, .. } if column == "uid"));
}

#[tokio::test]
async fn test_insert_nothing_runs_nothing() {
    let conn = MockConnection::new();
    let affected = mysql().table("users").insert(&conn, &[]).await.unwrap();
    assert_eq!(affected, 0);
    assert!(conn.recorded().is_empty());
}

#[tokio::test]
async fn test_increment_and_decrement() {
    let conn = MockConnection::new();
    conn.set_rows_affected(1);

    let builder = mysql().table("users").where_("id", 5);
    assert_eq!(builder.increment(&conn, "vote", 2).await.unwrap(), 1);
    builder.decrement(&conn, "vote", 1).await.unwrap();

    let recorded = conn.recorded();
    assert_eq!(recorded[0].sql, "update `users` set `vote` = `vote` + 2 where `id` = ?");
    assert_eq!(recorded[0].bindings, vec![SqlValue::Int(5)]);
    assert_eq!(recorded[1].sql, "update `users` set `vote` = `vote` - 1 where `id` = ?");
}

#[tokio::test]
async fn test_insert_using_binds_source() {
    let conn = MockConnection::new();
    let base = postgres();
    base.clone()
        .table("archive")
        .insert_using(
            &conn,
            &["id", "email"],
            base.new_query()
                .table("users")
                .select(&["id", "email"])
                .where_("vote", ("<", 0)),
        )
        .await
        .unwrap();

    let recorded = conn.recorded();
    assert_eq!(
        recorded[0].sql,
        r#"insert into "archive" ("id", "email") select "id", "email" from "users" where "vote" < $1"#
    );
    assert_eq!(recorded[0].bindings, vec![SqlValue::Int(0)]);
}

#[tokio::test]
async fn test_truncate_per_dialect() {
    let conn = MockConnection::new();
    mysql().table("users").truncate(&conn).await.unwrap();
    postgres().table("users").truncate(&conn).await.unwrap();
    sqlite().table("users").truncate(&conn).await.unwrap();
    assert_eq!(
        conn.statements(),
        vec![
            String::from("truncate table `users`"),
            String::from(r#"truncate "users" restart identity cascade"#),
            String::from("delete from `users`"),
        ]
    );
}

#[tokio::test]
async fn test_exists_and_first() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("exists", SqlValue::Int(1))])]);
    conn.push_rows(vec![row(&[("id", SqlValue::Int(1)), ("name", text("Ken"))])]);

    let users = sqlite().table("users").where_("name", "Ken");
    assert!(users.exists(&conn).await.unwrap());
    let first = users.first(&conn).await.unwrap().unwrap();
    assert_eq!(first.get_str("name"), Some("Ken"));
    assert!(users.doesnt_exist(&conn).await.unwrap());

    assert_eq!(
        conn.statements(),
        vec![
            String::from("select exists(select * from `users` where `name` = ?) as `exists`"),
            String::from("select * from `users` where `name` = ? limit 1"),
            String::from("select exists(select * from `users` where `name` = ?) as `exists`"),
        ]
    );
}

#[tokio::test]
async fn test_driver_errors_propagate() {
    let conn = MockConnection::new();
    conn.fail_on(0);
    let err = mysql().table("users").get(&conn).await.unwrap_err();
    assert!(matches!(err, QueryError::Database(_)));
    assert_eq!(err.to_string(), "Database error: statement 0 rejected");
}

#[tokio::test]
#[should_panic(expected = "statement 0 rejected")]
async fn test_must_get_panics_on_error() {
    let conn = MockConnection::new();
    conn.fail_on(0);
    mysql().table("users").must_get(&conn).await;
}
