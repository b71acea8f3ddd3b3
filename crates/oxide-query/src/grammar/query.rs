//! Query compilation.

use crate::ast::{
    Aggregate, DatePart, Distinct, FromClause, Group, Having, HavingKind, Join, JoinTarget, Lock,
    Order, Query, Selection, Union, Where, WhereKind,
};
use crate::value::{Operand, Record};

use super::{join_segments, Context, Dialect};

/// Compiles statements. Default methods implement the generic dialect.
pub trait QueryGrammar: Dialect {
    /// Compiles a select, including unions and aggregates.
    ///
    /// Segments are emitted in the order `aggregate, columns, from, joins,
    /// wheres, groups, havings, orders, limit, offset, lock`; bindings are
    /// collected in the same order.
    fn compile_select(&self, ctx: &mut Context, query: &Query) -> String {
        if query.aggregate.is_some() && !query.unions.is_empty() {
            return self.compile_union_aggregate(ctx, query);
        }

        let mut segments = Vec::new();
        segments.push(match &query.aggregate {
            Some(aggregate) => self.compile_aggregate(ctx, aggregate, &query.distinct),
            None => self.compile_columns(ctx, query),
        });
        if let Some(from) = &query.from {
            segments.push(self.compile_from(ctx, from));
        }
        if !query.joins.is_empty() {
            segments.push(self.compile_joins(ctx, &query.joins));
        }
        if !query.wheres.is_empty() {
            segments.push(self.compile_wheres(ctx, &query.wheres));
        }
        if !query.groups.is_empty() {
            segments.push(self.compile_groups(ctx, &query.groups));
        }
        if !query.havings.is_empty() {
            segments.push(self.compile_havings(ctx, &query.havings));
        }
        if !query.orders.is_empty() {
            segments.push(self.compile_orders(ctx, &query.orders));
        }
        segments.push(self.compile_limit_offset(query.limit, query.offset));
        if let Some(lock) = query.lock {
            segments.push(self.compile_lock(lock));
        }
        let sql = join_segments(segments);

        if query.unions.is_empty() {
            return sql;
        }
        format!("{} {}", self.wrap_union(&sql), self.compile_unions(ctx, query))
    }

    /// `select function(columns) as aggregate`.
    fn compile_aggregate(&self, ctx: &mut Context, aggregate: &Aggregate, distinct: &Distinct) -> String {
        let mut column = self.columnize(ctx, &aggregate.columns);
        if *distinct != Distinct::Off && column != "*" {
            column = format!("distinct {column}");
        }
        format!("select {}({column}) as aggregate", aggregate.function)
    }

    /// Aggregates over the whole union: `... from (union) as temp_table`.
    fn compile_union_aggregate(&self, ctx: &mut Context, query: &Query) -> String {
        let Some(aggregate) = &query.aggregate else {
            return self.compile_select(ctx, query);
        };
        let head = self.compile_aggregate(ctx, aggregate, &Distinct::Off);
        let mut inner = query.clone();
        inner.aggregate = None;
        let body = self.compile_select(ctx, &inner);
        format!("{head} from ({body}) as {}", self.wrap_table(ctx, "temp_table"))
    }

    /// `select [distinct]`.
    fn compile_distinct(&self, _ctx: &mut Context, distinct: &Distinct) -> String {
        match distinct {
            Distinct::Off => String::from("select"),
            Distinct::Rows | Distinct::On(_) => String::from("select distinct"),
        }
    }

    /// The projection, `*` when no column was selected.
    fn compile_columns(&self, ctx: &mut Context, query: &Query) -> String {
        let select = self.compile_distinct(ctx, &query.distinct);
        if query.columns.is_empty() {
            return format!("{select} *");
        }
        let mut columns = Vec::with_capacity(query.columns.len());
        for selection in &query.columns {
            columns.push(self.compile_selection(ctx, selection));
        }
        format!("{select} {}", columns.join(", "))
    }

    /// One selected column.
    fn compile_selection(&self, ctx: &mut Context, selection: &Selection) -> String {
        match selection {
            Selection::Column(column) => self.wrap(ctx, column),
            Selection::Raw { sql, bindings } => ctx.raw(sql, bindings),
            Selection::Sub { query, alias } => {
                let sql = self.compile_select(ctx, query);
                format!("({sql}) as {}", self.quote_identifier(alias))
            }
        }
    }

    /// `from ...`.
    fn compile_from(&self, ctx: &mut Context, from: &FromClause) -> String {
        match from {
            FromClause::Table(name) => format!("from {}", self.wrap_name(ctx, name)),
            FromClause::Sub { query, alias } => {
                let sql = self.compile_select(ctx, query);
                format!("from ({sql}) as {}", self.wrap_table(ctx, alias))
            }
            FromClause::Raw { sql, bindings } => format!("from {}", ctx.raw(sql, bindings)),
        }
    }

    /// All joins, space separated.
    fn compile_joins(&self, ctx: &mut Context, joins: &[Join]) -> String {
        let mut out = Vec::with_capacity(joins.len());
        for join in joins {
            out.push(self.compile_join(ctx, join));
        }
        out.join(" ")
    }

    /// `kind join target on ...`.
    fn compile_join(&self, ctx: &mut Context, join: &Join) -> String {
        let target = match &join.target {
            JoinTarget::Table(name) => self.wrap_name(ctx, name),
            JoinTarget::Sub { query, alias } => {
                let sql = self.compile_select(ctx, query);
                format!("({sql}) as {}", self.wrap_table(ctx, alias))
            }
        };
        let mut sql = format!("{} join {target}", join.kind.as_str());
        if !join.clauses.is_empty() {
            sql.push_str(" on ");
            sql.push_str(&self.compile_where_list(ctx, &join.clauses));
        }
        sql
    }

    /// `where ...`.
    fn compile_wheres(&self, ctx: &mut Context, wheres: &[Where]) -> String {
        format!("where {}", self.compile_where_list(ctx, wheres))
    }

    /// Clauses joined by their connectors, leading connector removed.
    fn compile_where_list(&self, ctx: &mut Context, wheres: &[Where]) -> String {
        let mut parts = Vec::with_capacity(wheres.len());
        for (i, clause) in wheres.iter().enumerate() {
            let sql = self.compile_where(ctx, clause);
            if i == 0 {
                parts.push(sql);
            } else {
                parts.push(format!("{} {sql}", clause.boolean));
            }
        }
        parts.join(" ")
    }

    /// One where clause without its connector.
    fn compile_where(&self, ctx: &mut Context, clause: &Where) -> String {
        match &clause.kind {
            WhereKind::Basic {
                column,
                operator,
                value,
            } => {
                let column = self.wrap(ctx, column);
                format!("{column} {operator} {}", ctx.parameter(value))
            }
            WhereKind::Sub {
                column,
                operator,
                query,
            } => {
                let column = self.wrap(ctx, column);
                format!("{column} {operator} ({})", self.compile_select(ctx, query))
            }
            WhereKind::Nested(query) => {
                format!("({})", self.compile_where_list(ctx, &query.wheres))
            }
            WhereKind::Raw { sql, bindings } => ctx.raw(sql, bindings),
            WhereKind::Between { column, values, not } => {
                let column = self.wrap(ctx, column);
                let low = ctx.parameter(&values[0]);
                let high = ctx.parameter(&values[1]);
                format!("{column} {}between {low} and {high}", not_keyword(*not))
            }
            WhereKind::In { column, values, not } => {
                if values.is_empty() {
                    return String::from(if *not { "1 = 1" } else { "0 = 1" });
                }
                let column = self.wrap(ctx, column);
                format!("{column} {}in ({})", not_keyword(*not), ctx.parameters(values))
            }
            WhereKind::InSub { column, query, not } => {
                let column = self.wrap(ctx, column);
                format!(
                    "{column} {}in ({})",
                    not_keyword(*not),
                    self.compile_select(ctx, query)
                )
            }
            WhereKind::Null { column, not } => {
                format!("{} is {}null", self.wrap(ctx, column), not_keyword(*not))
            }
            WhereKind::Column {
                first,
                operator,
                second,
            } => format!(
                "{} {operator} {}",
                self.wrap(ctx, first),
                self.wrap(ctx, second)
            ),
            WhereKind::Exists { query, not } => {
                format!("{}exists ({})", not_keyword(*not), self.compile_select(ctx, query))
            }
            WhereKind::Date {
                part,
                column,
                operator,
                value,
            } => self.compile_where_date(ctx, *part, column, operator, value),
        }
    }

    /// Date-part comparison: `day(column) = ?`.
    fn compile_where_date(
        &self,
        ctx: &mut Context,
        part: DatePart,
        column: &str,
        operator: &str,
        value: &Operand,
    ) -> String {
        let column = self.wrap(ctx, column);
        format!("{}({column}) {operator} {}", part.as_str(), ctx.parameter(value))
    }

    /// `group by ...`.
    fn compile_groups(&self, ctx: &mut Context, groups: &[Group]) -> String {
        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            out.push(match group {
                Group::Column(column) => self.wrap(ctx, column),
                Group::Raw { sql, bindings } => ctx.raw(sql, bindings),
            });
        }
        format!("group by {}", out.join(", "))
    }

    /// `having ...`.
    fn compile_havings(&self, ctx: &mut Context, havings: &[Having]) -> String {
        let mut parts = Vec::with_capacity(havings.len());
        for (i, having) in havings.iter().enumerate() {
            let sql = self.compile_having(ctx, having);
            if i == 0 {
                parts.push(sql);
            } else {
                parts.push(format!("{} {sql}", having.boolean));
            }
        }
        format!("having {}", parts.join(" "))
    }

    /// One having clause without its connector.
    fn compile_having(&self, ctx: &mut Context, having: &Having) -> String {
        match &having.kind {
            HavingKind::Basic {
                column,
                operator,
                value,
            } => {
                let column = self.wrap(ctx, column);
                format!("{column} {operator} {}", ctx.parameter(value))
            }
            HavingKind::Raw { sql, bindings } => ctx.raw(sql, bindings),
            HavingKind::Between { column, values, not } => {
                let column = self.wrap(ctx, column);
                let low = ctx.parameter(&values[0]);
                let high = ctx.parameter(&values[1]);
                format!("{column} {}between {low} and {high}", not_keyword(*not))
            }
            HavingKind::Null { column, not } => {
                format!("{} is {}null", self.wrap(ctx, column), not_keyword(*not))
            }
        }
    }

    /// `order by ...`.
    fn compile_orders(&self, ctx: &mut Context, orders: &[Order]) -> String {
        let mut out = Vec::with_capacity(orders.len());
        for order in orders {
            out.push(match order {
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrap(ctx, column), direction.as_str())
                }
                Order::Raw { sql, bindings } => ctx.raw(sql, bindings),
                Order::Sub { query, direction } => {
                    format!("({}) {}", self.compile_select(ctx, query), direction.as_str())
                }
            });
        }
        format!("order by {}", out.join(", "))
    }

    /// `limit n offset m`; empty when neither is set.
    fn compile_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("limit {limit} offset {offset}"),
            (Some(limit), None) => format!("limit {limit}"),
            (None, Some(offset)) => self.compile_offset_without_limit(offset),
            (None, None) => String::new(),
        }
    }

    /// Offset without a limit; the generic dialect needs a limit first.
    fn compile_offset_without_limit(&self, offset: u64) -> String {
        format!("limit 18446744073709551615 offset {offset}")
    }

    /// Row lock clause.
    fn compile_lock(&self, lock: Lock) -> String {
        match lock {
            Lock::Update => String::from("for update"),
            Lock::Share => String::from("lock in share mode"),
        }
    }

    /// Wraps the body of a union.
    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    /// Union branches, then the union-wide order, limit and offset.
    fn compile_unions(&self, ctx: &mut Context, query: &Query) -> String {
        let mut segments = Vec::with_capacity(query.unions.len() + 2);
        for union in &query.unions {
            segments.push(self.compile_union(ctx, union));
        }
        if !query.union_orders.is_empty() {
            segments.push(self.compile_orders(ctx, &query.union_orders));
        }
        segments.push(self.compile_limit_offset(query.union_limit, query.union_offset));
        join_segments(segments)
    }

    /// `union [all] (branch)`.
    fn compile_union(&self, ctx: &mut Context, union: &Union) -> String {
        let keyword = if union.all { "union all" } else { "union" };
        format!("{keyword} ({})", self.compile_select(ctx, &union.query))
    }

    /// Random ordering function.
    fn compile_random(&self) -> String {
        String::from("RANDOM()")
    }

    /// `select exists(...) as "exists"`.
    fn compile_exists(&self, ctx: &mut Context, query: &Query) -> String {
        let sql = self.compile_select(ctx, query);
        format!("select exists({sql}) as {}", self.quote_identifier("exists"))
    }

    /// The target table of an insert, update or delete.
    ///
    /// # Panics
    ///
    /// Panics when the query has no table source.
    fn compile_dml_table(&self, ctx: &mut Context, query: &Query) -> String {
        match &query.from {
            Some(FromClause::Table(name)) => self.wrap_name(ctx, name),
            Some(FromClause::Raw { sql, bindings }) => ctx.raw(sql, bindings),
            _ => panic!("insert, update and delete statements require a table"),
        }
    }

    /// `insert into t (cols) values (...), (...)`.
    ///
    /// # Panics
    ///
    /// Panics when the records do not all set the same columns.
    fn compile_insert(&self, ctx: &mut Context, query: &Query, records: &[Record]) -> String {
        let table = self.compile_dml_table(ctx, query);
        let Some(first) = records.first().filter(|r| !r.is_empty()) else {
            return self.compile_insert_default_values(&table);
        };
        let columns: Vec<String> = first.columns().map(str::to_string).collect();
        let columns_sql = self.columnize(ctx, &columns);

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            assert_eq!(
                record.len(),
                columns.len(),
                "every inserted record must set the same columns"
            );
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = record
                    .get(column)
                    .unwrap_or_else(|| panic!("inserted record is missing column `{column}`"));
                values.push(ctx.parameter(value));
            }
            rows.push(format!("({})", values.join(", ")));
        }
        format!("insert into {table} ({columns_sql}) values {}", rows.join(", "))
    }

    /// Insert of a row made of column defaults.
    fn compile_insert_default_values(&self, table: &str) -> String {
        format!("insert into {table} default values")
    }

    /// Insert that skips rows violating a unique constraint.
    ///
    /// # Panics
    ///
    /// The generic dialect cannot express it.
    fn compile_insert_or_ignore(&self, _ctx: &mut Context, _query: &Query, _records: &[Record]) -> String {
        panic!("insert or ignore is not supported by the {} grammar", self.name())
    }

    /// Insert whose result carries the new id.
    fn compile_insert_get_id(
        &self,
        ctx: &mut Context,
        query: &Query,
        record: &Record,
        _sequence: &str,
    ) -> String {
        self.compile_insert(ctx, query, std::slice::from_ref(record))
    }

    /// True when [`QueryGrammar::compile_insert_get_id`] returns a row.
    fn returns_inserted_id(&self) -> bool {
        false
    }

    /// `insert into t (cols) select ...`.
    fn compile_insert_using(
        &self,
        ctx: &mut Context,
        query: &Query,
        columns: &[String],
        source: &Query,
    ) -> String {
        let table = self.compile_dml_table(ctx, query);
        let select = self.compile_select(ctx, source);
        if columns.is_empty() {
            format!("insert into {table} {select}")
        } else {
            format!("insert into {table} ({}) {select}", self.columnize(ctx, columns))
        }
    }

    /// Insert or update on unique conflict.
    ///
    /// # Panics
    ///
    /// The generic dialect cannot express it.
    fn compile_upsert(
        &self,
        _ctx: &mut Context,
        _query: &Query,
        _records: &[Record],
        _unique_by: &[String],
        _update: &[String],
    ) -> String {
        panic!("upsert is not supported by the {} grammar", self.name())
    }

    /// `update t [joins] set ... [where] [order] [limit]`.
    fn compile_update(&self, ctx: &mut Context, query: &Query, values: &Record) -> String {
        let table = self.compile_dml_table(ctx, query);
        let mut segments = vec![format!("update {table}")];
        if !query.joins.is_empty() {
            segments.push(self.compile_joins(ctx, &query.joins));
        }
        segments.push(format!("set {}", self.compile_update_columns(ctx, values)));
        if !query.wheres.is_empty() {
            segments.push(self.compile_wheres(ctx, &query.wheres));
        }
        if query.joins.is_empty() {
            if !query.orders.is_empty() {
                segments.push(self.compile_orders(ctx, &query.orders));
            }
            if let Some(limit) = query.limit {
                segments.push(format!("limit {limit}"));
            }
        }
        join_segments(segments)
    }

    /// `a = ?, b = ?`.
    fn compile_update_columns(&self, ctx: &mut Context, values: &Record) -> String {
        let mut out = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            let column = self.wrap(ctx, column);
            out.push(format!("{column} = {}", ctx.parameter(value)));
        }
        out.join(", ")
    }

    /// `delete from t ...`, or `delete alias from t joins ...` when joined.
    fn compile_delete(&self, ctx: &mut Context, query: &Query) -> String {
        let table = self.compile_dml_table(ctx, query);
        if query.joins.is_empty() {
            let mut segments = vec![format!("delete from {table}")];
            if !query.wheres.is_empty() {
                segments.push(self.compile_wheres(ctx, &query.wheres));
            }
            if !query.orders.is_empty() {
                segments.push(self.compile_orders(ctx, &query.orders));
            }
            if let Some(limit) = query.limit {
                segments.push(format!("limit {limit}"));
            }
            return join_segments(segments);
        }

        let alias = query.table().map_or_else(String::new, |name| {
            let prefix = name.prefix.as_deref().unwrap_or(ctx.prefix());
            self.wrap_prefixed(prefix, name.reference())
        });
        let mut segments = vec![format!("delete {alias} from {table}")];
        segments.push(self.compile_joins(ctx, &query.joins));
        if !query.wheres.is_empty() {
            segments.push(self.compile_wheres(ctx, &query.wheres));
        }
        join_segments(segments)
    }

    /// Empties the table.
    fn compile_truncate(&self, ctx: &mut Context, query: &Query) -> String {
        format!("truncate table {}", self.compile_dml_table(ctx, query))
    }
}

/// `select alias.key from ...` reproducing the joins and filters, for
/// dialects that rewrite joined or limited updates and deletes.
pub(crate) fn compile_key_subselect<G: QueryGrammar + ?Sized>(
    grammar: &G,
    ctx: &mut Context,
    query: &Query,
    key: &str,
) -> String {
    let reference = query
        .table()
        .map_or_else(|| String::from(key), |name| format!("{}.{key}", name.reference()));
    let mut select = query.clone();
    select.columns = vec![Selection::Column(reference)];
    select.aggregate = None;
    select.distinct = Distinct::Off;
    select.lock = None;
    select.unions.clear();
    grammar.compile_select(ctx, &select)
}

/// Strips the table qualifier of update targets.
pub(crate) fn unqualified(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, c)| c)
}

const fn not_keyword(not: bool) -> &'static str {
    if not {
        "not "
    } else {
        ""
    }
}
