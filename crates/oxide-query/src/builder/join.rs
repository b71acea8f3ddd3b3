//! Joins.

use crate::ast::{BindingCategory, Boolean, Join, JoinKind, JoinTarget, Name, Query, WhereKind};
use crate::value::SqlValue;

use super::{is_operator, Builder, IntoSubquery};

impl Builder {
    fn join_clause(&self) -> Self {
        let mut clause = self.new_query();
        clause.join_clause = true;
        clause
    }

    fn push_join(
        mut self,
        kind: JoinKind,
        target: JoinTarget,
        target_bindings: Vec<SqlValue>,
        clause: Option<Self>,
    ) -> Self {
        self.query
            .bindings
            .extend(BindingCategory::Join, target_bindings);
        let clauses = match clause {
            Some(clause) => {
                let Query {
                    wheres, bindings, ..
                } = clause.query;
                self.query.bindings.extend(
                    BindingCategory::Join,
                    bindings.get(BindingCategory::Where).iter().cloned(),
                );
                wheres
            }
            None => Vec::new(),
        };
        self.query.joins.push(Join {
            kind,
            target,
            clauses,
        });
        self
    }

    fn simple_join(self, kind: JoinKind, table: &str, first: &str, operator: &str, second: &str) -> Self {
        let clause = self.join_clause().on(first, operator, second);
        self.push_join(kind, JoinTarget::Table(Name::parse(table)), Vec::new(), Some(clause))
    }

    /// `inner join table on first op second`.
    #[must_use]
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.simple_join(JoinKind::Inner, table, first, operator, second)
    }

    /// `left join table on first op second`.
    #[must_use]
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.simple_join(JoinKind::Left, table, first, operator, second)
    }

    /// `right join table on first op second`.
    #[must_use]
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.simple_join(JoinKind::Right, table, first, operator, second)
    }

    /// `cross join table`.
    #[must_use]
    pub fn cross_join(self, table: &str) -> Self {
        self.push_join(JoinKind::Cross, JoinTarget::Table(Name::parse(table)), Vec::new(), None)
    }

    fn clause_join<F>(self, kind: JoinKind, table: &str, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let clause = f(self.join_clause());
        self.push_join(kind, JoinTarget::Table(Name::parse(table)), Vec::new(), Some(clause))
    }

    /// Inner join whose conditions are built by `f` with
    /// [`Builder::on`], [`Builder::or_on`] and the where methods.
    ///
    /// ```
    /// # use oxide_query::{Builder, ConnectionOptions, SqliteGrammar};
    /// # use std::sync::Arc;
    /// # let q = Builder::new(Arc::new(SqliteGrammar::new()), ConnectionOptions::default());
    /// let sql = q
    ///     .table("users")
    ///     .join_with("contacts", |j| j.on("users.id", "=", "contacts.user_id").where_("contacts.kind", "email"))
    ///     .to_sql();
    /// assert_eq!(
    ///     sql,
    ///     "select * from `users` inner join `contacts` on `users`.`id` = `contacts`.`user_id` and `contacts`.`kind` = ?"
    /// );
    /// ```
    #[must_use]
    pub fn join_with<F>(self, table: &str, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.clause_join(JoinKind::Inner, table, f)
    }

    /// Left join with conditions built by `f`.
    #[must_use]
    pub fn left_join_with<F>(self, table: &str, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.clause_join(JoinKind::Left, table, f)
    }

    fn sub_join(
        self,
        kind: JoinKind,
        sub: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        let sub = sub.into_subquery(&self);
        let bindings = sub.get_bindings();
        let clause = self.join_clause().on(first, operator, second);
        let target = JoinTarget::Sub {
            query: Box::new(sub.query),
            alias: alias.to_string(),
        };
        self.push_join(kind, target, bindings, Some(clause))
    }

    /// `inner join (sub-select) as alias on first op second`.
    #[must_use]
    pub fn join_sub(
        self,
        sub: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.sub_join(JoinKind::Inner, sub, alias, first, operator, second)
    }

    /// `left join (sub-select) as alias on first op second`.
    #[must_use]
    pub fn left_join_sub(
        self,
        sub: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.sub_join(JoinKind::Left, sub, alias, first, operator, second)
    }

    /// `right join (sub-select) as alias on first op second`.
    #[must_use]
    pub fn right_join_sub(
        self,
        sub: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.sub_join(JoinKind::Right, sub, alias, first, operator, second)
    }

    fn on_clause(mut self, first: &str, operator: &str, second: &str, boolean: Boolean) -> Self {
        assert!(self.join_clause, "`on` is only available inside a join clause");
        assert!(is_operator(operator), "invalid operator: {operator}");
        self.push_where(
            boolean,
            WhereKind::Column {
                first: first.to_string(),
                operator: operator.trim().to_ascii_lowercase(),
                second: second.to_string(),
            },
        );
        self
    }

    /// Join condition comparing two columns.
    ///
    /// # Panics
    ///
    /// Panics outside a join clause or on an unknown operator.
    #[must_use]
    pub fn on(self, first: &str, operator: &str, second: &str) -> Self {
        self.on_clause(first, operator, second, Boolean::And)
    }

    /// [`Builder::on`] joined with `or`.
    ///
    /// # Panics
    ///
    /// Panics outside a join clause or on an unknown operator.
    #[must_use]
    pub fn or_on(self, first: &str, operator: &str, second: &str) -> Self {
        self.on_clause(first, operator, second, Boolean::Or)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::grammar::{MySqlGrammar, PostgresGrammar};
    use crate::registry::ConnectionOptions;
    use crate::value::SqlValue;
    use crate::Builder;

    fn my() -> Builder {
        Builder::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::default())
    }

    #[test]
    fn test_join_kinds() {
        let sql = my()
            .table("users")
            .join("contacts", "users.id", "=", "contacts.user_id")
            .left_join("orders", "users.id", "=", "orders.user_id")
            .right_join("teams", "users.team_id", "=", "teams.id")
            .cross_join("sizes")
            .select(&["users.*", "contacts.phone"])
            .to_sql();
        assert_eq!(
            sql,
            "select `users`.*, `contacts`.`phone` from `users` inner join `contacts` on `users`.`id` = `contacts`.`user_id` left join `orders` on `users`.`id` = `orders`.`user_id` right join `teams` on `users`.`team_id` = `teams`.`id` cross join `sizes`"
        );
    }

    #[test]
    fn test_join_with_or_on_and_bound_where() {
        let (sql, bindings) = my()
            .table("users")
            .left_join_with("contacts", |j| {
                j.on("users.id", "=", "contacts.user_id")
                    .or_on("users.email", "=", "contacts.email")
                    .where_("contacts.active", true)
            })
            .where_("users.id", 5)
            .compile();
        assert_eq!(
            sql,
            "select * from `users` left join `contacts` on `users`.`id` = `contacts`.`user_id` or `users`.`email` = `contacts`.`email` and `contacts`.`active` = ? where `users`.`id` = ?"
        );
        assert_eq!(bindings, vec![SqlValue::Bool(true), SqlValue::Int(5)]);
    }

    #[test]
    fn test_join_sub_binds_before_wheres() {
        let builder = Builder::new(Arc::new(PostgresGrammar::new()), ConnectionOptions::default());
        let (sql, bindings) = builder
            .table("users")
            .where_("users.active", true)
            .join_sub(
                |q: Builder| {
                    q.table("posts")
                        .select_raw("user_id, max(created_at) as last_post", vec![])
                        .where_("published", 1)
                        .group_by(&["user_id"])
                },
                "latest",
                "users.id",
                "=",
                "latest.user_id",
            )
            .compile();
        assert_eq!(
            sql,
            r#"select * from "users" inner join (select user_id, max(created_at) as last_post from "posts" where "published" = $1 group by "user_id") as "latest" on "users"."id" = "latest"."user_id" where "users"."active" = $2"#
        );
        assert_eq!(bindings, vec![SqlValue::Int(1), SqlValue::Bool(true)]);
    }

    #[test]
    fn test_prefixed_join_alias() {
        let builder = Builder::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::with_prefix("xn_"));
        let sql = builder
            .table("users as u")
            .join("posts as p", "u.id", "=", "p.user_id")
            .to_sql();
        assert_eq!(
            sql,
            "select * from `xn_users` as `xn_u` inner join `xn_posts` as `xn_p` on `xn_u`.`id` = `xn_p`.`user_id`"
        );
    }

    #[test]
    #[should_panic(expected = "only available inside a join clause")]
    fn test_on_outside_join_panics() {
        let _ = my().table("users").on("a", "=", "b");
    }
}
