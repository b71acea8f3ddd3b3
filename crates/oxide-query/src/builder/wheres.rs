//! Where and having clauses.

use crate::ast::{BindingCategory, Boolean, DatePart, Having, HavingKind, Where, WhereKind};
use crate::value::{IntoOperand, Operand, SqlValue};

use super::args::{pad_date_part, prepare_args};
use super::{Builder, IntoArgs, IntoSubquery};

impl Builder {
    pub(super) fn push_where(&mut self, boolean: Boolean, kind: WhereKind) {
        self.query.wheres.push(Where { boolean, kind });
    }

    fn basic_where(mut self, column: &str, args: impl IntoArgs, boolean: Boolean) -> Self {
        let resolved = prepare_args(args.into_args(), boolean);
        if resolved.value == Operand::Value(SqlValue::Null) {
            match resolved.operator.as_str() {
                "=" => return self.null_where(column, false, resolved.boolean),
                "!=" | "<>" => return self.null_where(column, true, resolved.boolean),
                _ => {}
            }
        }
        self.push_operand(BindingCategory::Where, &resolved.value);
        self.push_where(
            resolved.boolean,
            WhereKind::Basic {
                column: column.to_string(),
                operator: resolved.operator,
                value: resolved.value,
            },
        );
        self
    }

    /// `column = value`, `column op value`, with an optional trailing
    /// boolean. A NULL value with `=` becomes `is null`.
    ///
    /// ```
    /// # use oxide_query::{Builder, ConnectionOptions, MySqlGrammar};
    /// # use std::sync::Arc;
    /// # let q = Builder::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::default());
    /// let sql = q.table("users").where_("votes", (">", 100)).where_("name", ("Ken", "or")).to_sql();
    /// assert_eq!(sql, "select * from `users` where `votes` > ? or `name` = ?");
    /// ```
    #[must_use]
    pub fn where_(self, column: &str, args: impl IntoArgs) -> Self {
        self.basic_where(column, args, Boolean::And)
    }

    /// [`Builder::where_`] joined with `or`.
    #[must_use]
    pub fn or_where(self, column: &str, args: impl IntoArgs) -> Self {
        self.basic_where(column, args, Boolean::Or)
    }

    /// Several `and`-ed comparisons, grouped in parentheses.
    #[must_use]
    pub fn where_columns<S, A, I>(self, conditions: I) -> Self
    where
        S: AsRef<str>,
        A: IntoArgs,
        I: IntoIterator<Item = (S, A)>,
    {
        self.where_nested(|mut q| {
            for (column, args) in conditions {
                q = q.where_(column.as_ref(), args);
            }
            q
        })
    }

    fn nested_where<F>(mut self, f: F, boolean: Boolean) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let mut child = self.new_query();
        child.query.from = self.query.from.clone();
        let child = f(child);
        if child.query.wheres.is_empty() {
            return self;
        }
        self.query.bindings.extend(
            BindingCategory::Where,
            child.query.bindings.get(BindingCategory::Where).iter().cloned(),
        );
        self.push_where(boolean, WhereKind::Nested(Box::new(child.query)));
        self
    }

    /// `(...)` around the wheres added by `f`. Adds nothing when `f` adds
    /// no where.
    #[must_use]
    pub fn where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.nested_where(f, Boolean::And)
    }

    /// [`Builder::where_nested`] joined with `or`.
    #[must_use]
    pub fn or_where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.nested_where(f, Boolean::Or)
    }

    fn raw_where(mut self, sql: &str, bindings: Vec<SqlValue>, boolean: Boolean) -> Self {
        self.query
            .bindings
            .extend(BindingCategory::Where, bindings.iter().cloned());
        self.push_where(
            boolean,
            WhereKind::Raw {
                sql: sql.to_string(),
                bindings,
            },
        );
        self
    }

    /// Raw where fragment with `?` placeholders.
    #[must_use]
    pub fn where_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.raw_where(sql, bindings, Boolean::And)
    }

    /// [`Builder::where_raw`] joined with `or`.
    #[must_use]
    pub fn or_where_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.raw_where(sql, bindings, Boolean::Or)
    }

    fn between_where(
        mut self,
        column: &str,
        low: Operand,
        high: Operand,
        not: bool,
        boolean: Boolean,
    ) -> Self {
        self.push_operand(BindingCategory::Where, &low);
        self.push_operand(BindingCategory::Where, &high);
        self.push_where(
            boolean,
            WhereKind::Between {
                column: column.to_string(),
                values: [low, high],
                not,
            },
        );
        self
    }

    /// `column between low and high`.
    #[must_use]
    pub fn where_between(self, column: &str, low: impl IntoOperand, high: impl IntoOperand) -> Self {
        self.between_where(column, low.into_operand(), high.into_operand(), false, Boolean::And)
    }

    /// `column not between low and high`.
    #[must_use]
    pub fn where_not_between(self, column: &str, low: impl IntoOperand, high: impl IntoOperand) -> Self {
        self.between_where(column, low.into_operand(), high.into_operand(), true, Boolean::And)
    }

    /// [`Builder::where_between`] joined with `or`.
    #[must_use]
    pub fn or_where_between(self, column: &str, low: impl IntoOperand, high: impl IntoOperand) -> Self {
        self.between_where(column, low.into_operand(), high.into_operand(), false, Boolean::Or)
    }

    /// [`Builder::where_not_between`] joined with `or`.
    #[must_use]
    pub fn or_where_not_between(
        self,
        column: &str,
        low: impl IntoOperand,
        high: impl IntoOperand,
    ) -> Self {
        self.between_where(column, low.into_operand(), high.into_operand(), true, Boolean::Or)
    }

    fn in_where<V, I>(mut self, column: &str, values: I, not: bool, boolean: Boolean) -> Self
    where
        V: IntoOperand,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<Operand> = values.into_iter().map(IntoOperand::into_operand).collect();
        for value in &values {
            self.push_operand(BindingCategory::Where, value);
        }
        self.push_where(
            boolean,
            WhereKind::In {
                column: column.to_string(),
                values,
                not,
            },
        );
        self
    }

    /// `column in (...)`. An empty list matches nothing.
    #[must_use]
    pub fn where_in<V, I>(self, column: &str, values: I) -> Self
    where
        V: IntoOperand,
        I: IntoIterator<Item = V>,
    {
        self.in_where(column, values, false, Boolean::And)
    }

    /// `column not in (...)`. An empty list matches everything.
    #[must_use]
    pub fn where_not_in<V, I>(self, column: &str, values: I) -> Self
    where
        V: IntoOperand,
        I: IntoIterator<Item = V>,
    {
        self.in_where(column, values, true, Boolean::And)
    }

    /// [`Builder::where_in`] joined with `or`.
    #[must_use]
    pub fn or_where_in<V, I>(self, column: &str, values: I) -> Self
    where
        V: IntoOperand,
        I: IntoIterator<Item = V>,
    {
        self.in_where(column, values, false, Boolean::Or)
    }

    /// [`Builder::where_not_in`] joined with `or`.
    #[must_use]
    pub fn or_where_not_in<V, I>(self, column: &str, values: I) -> Self
    where
        V: IntoOperand,
        I: IntoIterator<Item = V>,
    {
        self.in_where(column, values, true, Boolean::Or)
    }

    fn in_sub_where(mut self, column: &str, sub: impl IntoSubquery, not: bool) -> Self {
        let sub = sub.into_subquery(&self);
        self.query
            .bindings
            .extend(BindingCategory::Where, sub.get_bindings());
        self.push_where(
            Boolean::And,
            WhereKind::InSub {
                column: column.to_string(),
                query: Box::new(sub.query),
                not,
            },
        );
        self
    }

    /// `column in (sub-select)`.
    #[must_use]
    pub fn where_in_sub(self, column: &str, sub: impl IntoSubquery) -> Self {
        self.in_sub_where(column, sub, false)
    }

    /// `column not in (sub-select)`.
    #[must_use]
    pub fn where_not_in_sub(self, column: &str, sub: impl IntoSubquery) -> Self {
        self.in_sub_where(column, sub, true)
    }

    fn null_where(mut self, column: &str, not: bool, boolean: Boolean) -> Self {
        self.push_where(
            boolean,
            WhereKind::Null {
                column: column.to_string(),
                not,
            },
        );
        self
    }

    /// `column is null`.
    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        self.null_where(column, false, Boolean::And)
    }

    /// `column is not null`.
    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        self.null_where(column, true, Boolean::And)
    }

    /// [`Builder::where_null`] joined with `or`.
    #[must_use]
    pub fn or_where_null(self, column: &str) -> Self {
        self.null_where(column, false, Boolean::Or)
    }

    /// [`Builder::where_not_null`] joined with `or`.
    #[must_use]
    pub fn or_where_not_null(self, column: &str) -> Self {
        self.null_where(column, true, Boolean::Or)
    }

    pub(super) fn column_where(mut self, first: &str, args: impl IntoArgs, boolean: Boolean) -> Self {
        let resolved = prepare_args(args.into_args(), boolean);
        let Some(second) = resolved.value.as_text().map(str::to_string) else {
            panic!("column comparisons take a column name, got {:?}", resolved.value);
        };
        self.push_where(
            resolved.boolean,
            WhereKind::Column {
                first: first.to_string(),
                operator: resolved.operator,
                second,
            },
        );
        self
    }

    /// Compares two columns: `first = second` or `first op second`.
    #[must_use]
    pub fn where_column(self, first: &str, args: impl IntoArgs) -> Self {
        self.column_where(first, args, Boolean::And)
    }

    /// [`Builder::where_column`] joined with `or`.
    #[must_use]
    pub fn or_where_column(self, first: &str, args: impl IntoArgs) -> Self {
        self.column_where(first, args, Boolean::Or)
    }

    fn exists_where(mut self, sub: impl IntoSubquery, not: bool, boolean: Boolean) -> Self {
        let sub = sub.into_subquery(&self);
        self.query
            .bindings
            .extend(BindingCategory::Where, sub.get_bindings());
        self.push_where(
            boolean,
            WhereKind::Exists {
                query: Box::new(sub.query),
                not,
            },
        );
        self
    }

    /// `exists (sub-select)`.
    #[must_use]
    pub fn where_exists(self, sub: impl IntoSubquery) -> Self {
        self.exists_where(sub, false, Boolean::And)
    }

    /// `not exists (sub-select)`.
    #[must_use]
    pub fn where_not_exists(self, sub: impl IntoSubquery) -> Self {
        self.exists_where(sub, true, Boolean::And)
    }

    /// [`Builder::where_exists`] joined with `or`.
    #[must_use]
    pub fn or_where_exists(self, sub: impl IntoSubquery) -> Self {
        self.exists_where(sub, false, Boolean::Or)
    }

    /// [`Builder::where_not_exists`] joined with `or`.
    #[must_use]
    pub fn or_where_not_exists(self, sub: impl IntoSubquery) -> Self {
        self.exists_where(sub, true, Boolean::Or)
    }

    /// `column op (scalar sub-select)`.
    ///
    /// # Panics
    ///
    /// Panics on an unknown operator.
    #[must_use]
    pub fn where_sub(mut self, column: &str, operator: &str, sub: impl IntoSubquery) -> Self {
        assert!(super::is_operator(operator), "invalid operator: {operator}");
        let sub = sub.into_subquery(&self);
        self.query
            .bindings
            .extend(BindingCategory::Where, sub.get_bindings());
        self.push_where(
            Boolean::And,
            WhereKind::Sub {
                column: column.to_string(),
                operator: operator.trim().to_ascii_lowercase(),
                query: Box::new(sub.query),
            },
        );
        self
    }

    fn date_where(mut self, part: DatePart, column: &str, args: impl IntoArgs, boolean: Boolean) -> Self {
        let mut resolved = prepare_args(args.into_args(), boolean);
        if matches!(part, DatePart::Day | DatePart::Month) {
            resolved.value = pad_date_part(resolved.value);
        }
        self.push_operand(BindingCategory::Where, &resolved.value);
        self.push_where(
            resolved.boolean,
            WhereKind::Date {
                part,
                column: column.to_string(),
                operator: resolved.operator,
                value: resolved.value,
            },
        );
        self
    }

    /// Compares the date part of a datetime column.
    #[must_use]
    pub fn where_date(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Date, column, args, Boolean::And)
    }

    /// [`Builder::where_date`] joined with `or`.
    #[must_use]
    pub fn or_where_date(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Date, column, args, Boolean::Or)
    }

    /// Compares the time of day.
    #[must_use]
    pub fn where_time(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Time, column, args, Boolean::And)
    }

    /// Compares the day of month; numbers are zero-padded.
    #[must_use]
    pub fn where_day(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Day, column, args, Boolean::And)
    }

    /// Compares the month; numbers are zero-padded.
    #[must_use]
    pub fn where_month(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Month, column, args, Boolean::And)
    }

    /// Compares the year.
    #[must_use]
    pub fn where_year(self, column: &str, args: impl IntoArgs) -> Self {
        self.date_where(DatePart::Year, column, args, Boolean::And)
    }

    // Having.

    fn push_having(&mut self, boolean: Boolean, kind: HavingKind) {
        self.query.havings.push(Having { boolean, kind });
    }

    fn basic_having(mut self, column: &str, args: impl IntoArgs, boolean: Boolean) -> Self {
        let resolved = prepare_args(args.into_args(), boolean);
        self.push_operand(BindingCategory::Having, &resolved.value);
        self.push_having(
            resolved.boolean,
            HavingKind::Basic {
                column: column.to_string(),
                operator: resolved.operator,
                value: resolved.value,
            },
        );
        self
    }

    /// `having column op value`.
    #[must_use]
    pub fn having(self, column: &str, args: impl IntoArgs) -> Self {
        self.basic_having(column, args, Boolean::And)
    }

    /// [`Builder::having`] joined with `or`.
    #[must_use]
    pub fn or_having(self, column: &str, args: impl IntoArgs) -> Self {
        self.basic_having(column, args, Boolean::Or)
    }

    fn raw_having(mut self, sql: &str, bindings: Vec<SqlValue>, boolean: Boolean) -> Self {
        self.query
            .bindings
            .extend(BindingCategory::Having, bindings.iter().cloned());
        self.push_having(
            boolean,
            HavingKind::Raw {
                sql: sql.to_string(),
                bindings,
            },
        );
        self
    }

    /// Raw having fragment.
    #[must_use]
    pub fn having_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.raw_having(sql, bindings, Boolean::And)
    }

    /// [`Builder::having_raw`] joined with `or`.
    #[must_use]
    pub fn or_having_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.raw_having(sql, bindings, Boolean::Or)
    }

    /// `having column between low and high`.
    #[must_use]
    pub fn having_between(mut self, column: &str, low: impl IntoOperand, high: impl IntoOperand) -> Self {
        let values = [low.into_operand(), high.into_operand()];
        for value in &values {
            self.push_operand(BindingCategory::Having, value);
        }
        self.push_having(
            Boolean::And,
            HavingKind::Between {
                column: column.to_string(),
                values,
                not: false,
            },
        );
        self
    }

    /// `having column is null`.
    #[must_use]
    pub fn having_null(mut self, column: &str) -> Self {
        self.push_having(
            Boolean::And,
            HavingKind::Null {
                column: column.to_string(),
                not: false,
            },
        );
        self
    }

    /// `having column is not null`.
    #[must_use]
    pub fn having_not_null(mut self, column: &str) -> Self {
        self.push_having(
            Boolean::And,
            HavingKind::Null {
                column: column.to_string(),
                not: true,
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::grammar::{MySqlGrammar, PostgresGrammar, SqliteGrammar};
    use crate::registry::ConnectionOptions;
    use crate::value::{raw, SqlValue};
    use crate::Builder;

    fn pg() -> Builder {
        Builder::new(Arc::new(PostgresGrammar::new()), ConnectionOptions::default())
    }

    fn my() -> Builder {
        Builder::new(Arc::new(MySqlGrammar::new()), ConnectionOptions::default())
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_nested_where() {
        let (sql, bindings) = pg()
            .table("users")
            .where_("email", ("like", "%@x.com"))
            .where_nested(|q| q.where_("vote", (">", 10)).where_("name", "Ken"))
            .compile();
        assert_eq!(
            sql,
            r#"select * from "users" where "email" like $1 and ("vote" > $2 and "name" = $3)"#
        );
        assert_eq!(
            bindings,
            vec![text("%@x.com"), SqlValue::Int(10), text("Ken")]
        );
    }

    #[test]
    fn test_empty_nested_where_is_dropped() {
        let builder = my().table("users").where_nested(|q| q).or_where_nested(|q| q);
        assert_eq!(builder.to_sql(), "select * from `users`");
    }

    #[test]
    fn test_or_where_and_trailing_boolean() {
        let sql = my()
            .table("users")
            .where_("votes", (">", 100))
            .or_where("name", "John")
            .where_("age", ("<", 30, "or"))
            .to_sql();
        assert_eq!(
            sql,
            "select * from `users` where `votes` > ? or `name` = ? or `age` < ?"
        );
    }

    #[test]
    fn test_null_value_becomes_null_check() {
        let sql = my()
            .table("users")
            .where_("deleted_at", SqlValue::Null)
            .where_("name", ("!=", None::<&str>))
            .to_sql();
        assert_eq!(
            sql,
            "select * from `users` where `deleted_at` is null and `name` is not null"
        );
    }

    #[test]
    fn test_where_columns_groups_conditions() {
        let (sql, bindings) = my()
            .table("users")
            .where_columns([("status", 1), ("type", 2)])
            .compile();
        assert_eq!(sql, "select * from `users` where (`status` = ? and `type` = ?)");
        assert_eq!(bindings, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_between_in_and_null() {
        let (sql, bindings) = my()
            .table("users")
            .where_between("votes", 1, 100)
            .or_where_not_between("age", 18, 65)
            .where_in("id", [1, 2])
            .where_not_in("role", Vec::<&str>::new())
            .or_where_null("updated_at")
            .compile();
        assert_eq!(
            sql,
            "select * from `users` where `votes` between ? and ? or `age` not between ? and ? and `id` in (?, ?) and 1 = 1 or `updated_at` is null"
        );
        assert_eq!(bindings.len(), 6);
    }

    #[test]
    fn test_empty_where_in_matches_nothing() {
        let sql = my().table("users").where_in("id", Vec::<i64>::new()).to_sql();
        assert_eq!(sql, "select * from `users` where 0 = 1");
    }

    #[test]
    fn test_where_column() {
        let sql = my()
            .table("users")
            .where_column("first_name", "last_name")
            .or_where_column("updated_at", (">", "created_at"))
            .to_sql();
        assert_eq!(
            sql,
            "select * from `users` where `first_name` = `last_name` or `updated_at` > `created_at`"
        );
    }

    #[test]
    fn test_where_exists_and_in_sub() {
        let (sql, bindings) = pg()
            .table("users")
            .where_exists(|q: Builder| {
                q.table("orders")
                    .select_raw("1", vec![])
                    .where_column("orders.user_id", "users.id")
            })
            .where_in_sub("id", |q: Builder| q.table("bans").select(&["user_id"]).where_("active", true))
            .where_sub("score", ">", |q: Builder| q.table("scores").select_raw("avg(score)", vec![]))
            .compile();
        assert_eq!(
            sql,
            r#"select * from "users" where exists (select 1 from "orders" where "orders"."user_id" = "users"."id") and "id" in (select "user_id" from "bans" where "active" = $1) and "score" > (select avg(score) from "scores")"#
        );
        assert_eq!(bindings, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_where_raw_renumbers_placeholders() {
        let (sql, bindings) = pg()
            .table("users")
            .where_("id", 1)
            .or_where_raw("lower(name) = ? and age > ?", vec![text("ken"), SqlValue::Int(3)])
            .compile();
        assert_eq!(
            sql,
            r#"select * from "users" where "id" = $1 or lower(name) = $2 and age > $3"#
        );
        assert_eq!(bindings.len(), 3);
    }

    #[test]
    fn test_expression_value_is_inlined() {
        let (sql, bindings) = pg()
            .table("events")
            .where_("starts_at", ("<", raw("now()")))
            .compile();
        assert_eq!(sql, r#"select * from "events" where "starts_at" < now()"#);
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_date_wheres_pad_day_and_month() {
        let (sql, bindings) = my()
            .table("users")
            .where_date("created_at", "2024-01-05")
            .where_day("created_at", 5)
            .where_month("created_at", ("<", 12))
            .where_year("created_at", 2024)
            .compile();
        assert_eq!(
            sql,
            "select * from `users` where date(`created_at`) = ? and day(`created_at`) = ? and month(`created_at`) < ? and year(`created_at`) = ?"
        );
        assert_eq!(
            bindings,
            vec![text("2024-01-05"), text("05"), text("12"), SqlValue::Int(2024)]
        );
    }

    #[test]
    fn test_sqlite_date_where() {
        let builder = Builder::new(Arc::new(SqliteGrammar::new()), ConnectionOptions::default());
        let sql = builder.table("users").where_month("created_at", 3).to_sql();
        assert_eq!(
            sql,
            "select * from `users` where strftime('%m', `created_at`) = cast(? as text)"
        );
    }

    #[test]
    fn test_having() {
        let (sql, bindings) = my()
            .table("orders")
            .select_raw("user_id, sum(total) as spent", vec![])
            .group_by(&["user_id"])
            .having("spent", (">", 100))
            .or_having_raw("count(*) > ?", vec![SqlValue::Int(5)])
            .having_between("user_id", 1, 9)
            .having_not_null("user_id")
            .compile();
        assert_eq!(
            sql,
            "select user_id, sum(total) as spent from `orders` group by `user_id` having `spent` > ? or count(*) > ? and `user_id` between ? and ? and `user_id` is not null"
        );
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    #[should_panic(expected = "invalid operator")]
    fn test_where_sub_rejects_unknown_operator() {
        let _ = my().table("users").where_sub("id", "=>", |q: Builder| q.table("t"));
    }
}
