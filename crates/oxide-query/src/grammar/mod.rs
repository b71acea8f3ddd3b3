//! SQL grammars.
//!
//! A grammar turns a [`Query`](crate::ast::Query) or a
//! [`Table`](crate::schema::Table) into dialect-specific SQL. The default
//! methods of [`QueryGrammar`] and [`SchemaGrammar`] form the generic `sql`
//! base; each dialect overrides what it does differently.

mod generic;
mod mysql;
mod postgres;
mod query;
mod schema;
mod sqlite;

pub use generic::SqlGrammar;
pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use query::QueryGrammar;
pub use schema::{IndexRow, SchemaGrammar};
pub use sqlite::SqliteGrammar;

use crate::ast::{split_alias, Name};
use crate::value::{Operand, SqlValue};

/// Parameter placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Numbered,
}

/// State threaded through one compilation.
///
/// Holds the running placeholder counter and collects bindings in the
/// order their placeholders are emitted. Every compile starts from a fresh
/// context, so compiling the same query twice yields identical output.
#[derive(Debug, Clone)]
pub struct Context {
    placeholder: Placeholder,
    next: usize,
    prefix: String,
    bindings: Vec<SqlValue>,
}

impl Context {
    /// Creates a context for a dialect and table prefix.
    #[must_use]
    pub fn new(placeholder: Placeholder, prefix: impl Into<String>) -> Self {
        Self {
            placeholder,
            next: 1,
            prefix: prefix.into(),
            bindings: Vec::new(),
        }
    }

    /// Table prefix applied to unprefixed names.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Binds a value and returns its placeholder.
    pub fn push(&mut self, value: SqlValue) -> String {
        self.bindings.push(value);
        self.next_placeholder()
    }

    /// Binds a value, or inlines an expression without consuming a slot.
    pub fn parameter(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Value(value) => self.push(value.clone()),
            Operand::Expression(expr) => expr.as_str().to_string(),
        }
    }

    /// Comma-separated [`Context::parameter`] for each operand.
    pub fn parameters(&mut self, operands: &[Operand]) -> String {
        let mut out = Vec::with_capacity(operands.len());
        for operand in operands {
            out.push(self.parameter(operand));
        }
        out.join(", ")
    }

    /// Splices a raw fragment, renumbering its `?` for the dialect.
    ///
    /// `?` inside single-quoted literals is left alone.
    pub fn raw(&mut self, sql: &str, bindings: &[SqlValue]) -> String {
        self.bindings.extend_from_slice(bindings);
        if self.placeholder == Placeholder::Question {
            self.next += sql_question_marks(sql);
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut quoted = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    quoted = !quoted;
                    out.push(ch);
                }
                '?' if !quoted => out.push_str(&self.next_placeholder()),
                _ => out.push(ch),
            }
        }
        out
    }

    /// Bindings collected so far.
    #[must_use]
    pub fn bindings(&self) -> &[SqlValue] {
        &self.bindings
    }

    /// Consumes the context, returning its bindings.
    #[must_use]
    pub fn into_bindings(self) -> Vec<SqlValue> {
        self.bindings
    }

    fn next_placeholder(&mut self) -> String {
        let index = self.next;
        self.next += 1;
        match self.placeholder {
            Placeholder::Question => String::from("?"),
            Placeholder::Numbered => format!("${index}"),
        }
    }
}

fn sql_question_marks(sql: &str) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => quoted = !quoted,
            '?' if !quoted => count += 1,
            _ => {}
        }
    }
    count
}

/// Identifier quoting and placeholder style of a dialect.
pub trait Dialect: Send + Sync {
    /// Registry name of the dialect.
    fn name(&self) -> &'static str;

    /// Identifier quote character.
    fn identifier_quote(&self) -> char {
        '`'
    }

    /// Placeholder style.
    fn placeholder(&self) -> Placeholder {
        Placeholder::Question
    }

    /// Quotes one identifier segment. `*` is left bare.
    fn quote_identifier(&self, identifier: &str) -> String {
        if identifier == "*" {
            return String::from("*");
        }
        let quote = self.identifier_quote();
        let escaped = identifier.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Quotes a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Wraps `column`, `table.column` or `table.column as alias`.
    ///
    /// The table segment receives the connection prefix.
    fn wrap(&self, ctx: &Context, value: &str) -> String {
        let (column, alias) = split_alias(value);
        let wrapped = match column.rsplit_once('.') {
            Some((table, column)) => format!(
                "{}.{}",
                self.wrap_prefixed(ctx.prefix(), table),
                self.quote_identifier(column)
            ),
            None => self.quote_identifier(column),
        };
        match alias {
            Some(alias) => format!("{wrapped} as {}", self.quote_identifier(alias)),
            None => wrapped,
        }
    }

    /// Wraps a table reference given as text (`"users as u"`).
    fn wrap_table(&self, ctx: &Context, table: &str) -> String {
        self.wrap_name(ctx, &Name::parse(table))
    }

    /// Wraps a parsed table name, applying its prefix to name and alias.
    fn wrap_name(&self, ctx: &Context, name: &Name) -> String {
        let prefix = name.prefix.as_deref().unwrap_or(ctx.prefix());
        let wrapped = self.wrap_prefixed(prefix, &name.name);
        match &name.alias {
            Some(alias) => format!("{wrapped} as {}", self.quote_identifier(&format!("{prefix}{alias}"))),
            None => wrapped,
        }
    }

    /// Wraps `table` or `schema.table`, prefixing the table segment.
    fn wrap_prefixed(&self, prefix: &str, table: &str) -> String {
        match table.rsplit_once('.') {
            Some((schema, table)) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&format!("{prefix}{table}"))
            ),
            None => self.quote_identifier(&format!("{prefix}{table}")),
        }
    }

    /// Comma-separated [`Dialect::wrap`] of each column.
    fn columnize(&self, ctx: &Context, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(ctx, c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A complete dialect: query and schema compilation.
pub trait Grammar: QueryGrammar + SchemaGrammar {}

impl<T: QueryGrammar + SchemaGrammar> Grammar for T {}

/// Joins non-empty segments with single spaces.
pub(crate) fn join_segments(segments: Vec<String>) -> String {
    segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders_continue_across_raw() {
        let mut ctx = Context::new(Placeholder::Numbered, "");
        assert_eq!(ctx.push(SqlValue::Int(1)), "$1");
        assert_eq!(
            ctx.raw("a = ? and b = '?' and c = ?", &[SqlValue::Int(2), SqlValue::Int(3)]),
            "a = $2 and b = '?' and c = $3"
        );
        assert_eq!(ctx.push(SqlValue::Int(4)), "$4");
        assert_eq!(ctx.bindings().len(), 4);
    }

    #[test]
    fn test_expression_does_not_consume_a_slot() {
        let mut ctx = Context::new(Placeholder::Numbered, "");
        let expr = Operand::Expression(crate::value::Expression::new("now()"));
        assert_eq!(ctx.parameter(&expr), "now()");
        assert_eq!(ctx.parameter(&Operand::Value(SqlValue::Int(1))), "$1");
        assert_eq!(ctx.into_bindings(), vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_wrap_with_prefix() {
        let grammar = PostgresGrammar::new();
        let ctx = Context::new(Placeholder::Numbered, "xn_");
        assert_eq!(grammar.wrap(&ctx, "name"), "\"name\"");
        assert_eq!(grammar.wrap(&ctx, "u.name as n"), "\"xn_u\".\"name\" as \"n\"");
        assert_eq!(grammar.wrap(&ctx, "users.*"), "\"xn_users\".*");
        assert_eq!(grammar.wrap_table(&ctx, "users as u"), "\"xn_users\" as \"xn_u\"");
        assert_eq!(
            grammar.wrap_table(&ctx, "public.users"),
            "\"public\".\"xn_users\""
        );
    }

    #[test]
    fn test_quote_escapes_quote_char() {
        let grammar = MySqlGrammar::new();
        assert_eq!(grammar.quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(grammar.quote_string("it's"), "'it''s'");
    }
}
