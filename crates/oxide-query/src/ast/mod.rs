//! Statement AST.
//!
//! Pure data: a [`Query`] is mutated by the builder and read by the grammar.
//! Compiling never changes it, so one AST can be compiled any number of times.

mod bindings;

pub use bindings::{BindingCategory, Bindings};

use std::fmt;

use crate::value::{Operand, SqlValue};

/// Splits `"expr as alias"` (case-insensitive `as`).
#[must_use]
pub fn split_alias(value: &str) -> (&str, Option<&str>) {
    let lower = value.to_ascii_lowercase();
    match lower.rfind(" as ") {
        Some(pos) => (value[..pos].trim(), Some(value[pos + 4..].trim())),
        None => (value.trim(), None),
    }
}

/// A table reference, parsed once from `"table as alias"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    /// Explicit prefix. `None` uses the connection prefix at compile time.
    pub prefix: Option<String>,
    /// Table name, possibly schema qualified.
    pub name: String,
    /// Alias, if any.
    pub alias: Option<String>,
}

impl Name {
    /// Parses `"users"` or `"users as u"`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (name, alias) = split_alias(value);
        Self {
            prefix: None,
            name: name.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    /// Pins the prefix, ignoring the connection option.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The name columns are qualified with: the alias, else the table.
    #[must_use]
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Connector between two clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    /// `and`
    #[default]
    And,
    /// `or`
    Or,
}

impl Boolean {
    /// Parses `"and"` / `"or"` (any case).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    /// SQL keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// SQL keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Part of a temporal column compared by a date where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Day of month.
    Day,
    /// Month.
    Month,
    /// Year.
    Year,
}

impl DatePart {
    /// Lower-case name, also the MySQL function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// The `from` source of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    /// A table.
    Table(Name),
    /// `(sub-select) as alias`.
    Sub {
        /// The sub-select.
        query: Box<Query>,
        /// Its alias.
        alias: String,
    },
    /// Raw SQL with its own `?` bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
}

/// A selected column.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// A column, possibly `table.column as alias` or `table.*`.
    Column(String),
    /// Raw SQL with bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
    /// `(sub-select) as alias`.
    Sub {
        /// The sub-select.
        query: Box<Query>,
        /// Its alias.
        alias: String,
    },
}

/// A where (or join `on`) clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    /// Connector to the previous clause.
    pub boolean: Boolean,
    /// The condition.
    pub kind: WhereKind,
}

/// Condition variants.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereKind {
    /// `column operator value`.
    Basic {
        /// Column.
        column: String,
        /// Comparison operator.
        operator: String,
        /// Right-hand side.
        value: Operand,
    },
    /// `column operator (sub-select)`.
    Sub {
        /// Column.
        column: String,
        /// Comparison operator.
        operator: String,
        /// Scalar sub-select.
        query: Box<Query>,
    },
    /// `(...)` around every where of the child query.
    Nested(Box<Query>),
    /// Raw SQL with bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
    /// `column [not] between a and b`.
    Between {
        /// Column.
        column: String,
        /// Lower and upper bounds.
        values: [Operand; 2],
        /// Negated.
        not: bool,
    },
    /// `column [not] in (...)`.
    In {
        /// Column.
        column: String,
        /// List members.
        values: Vec<Operand>,
        /// Negated.
        not: bool,
    },
    /// `column [not] in (sub-select)`.
    InSub {
        /// Column.
        column: String,
        /// The sub-select.
        query: Box<Query>,
        /// Negated.
        not: bool,
    },
    /// `column is [not] null`.
    Null {
        /// Column.
        column: String,
        /// Negated.
        not: bool,
    },
    /// `first operator second`, both columns.
    Column {
        /// Left column.
        first: String,
        /// Comparison operator.
        operator: String,
        /// Right column.
        second: String,
    },
    /// `[not] exists (sub-select)`.
    Exists {
        /// The sub-select.
        query: Box<Query>,
        /// Negated.
        not: bool,
    },
    /// Date-part comparison.
    Date {
        /// Part extracted from the column.
        part: DatePart,
        /// Column.
        column: String,
        /// Comparison operator.
        operator: String,
        /// Right-hand side.
        value: Operand,
    },
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `inner join`
    Inner,
    /// `left join`
    Left,
    /// `right join`
    Right,
    /// `cross join`
    Cross,
}

impl JoinKind {
    /// SQL keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
            Self::Cross => "cross",
        }
    }
}

/// What a join attaches.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    /// A table.
    Table(Name),
    /// `(sub-select) as alias`.
    Sub {
        /// The sub-select.
        query: Box<Query>,
        /// Its alias.
        alias: String,
    },
}

/// A join and its `on` conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinKind,
    /// Joined table or sub-select.
    pub target: JoinTarget,
    /// `on` conditions, compiled like wheres.
    pub clauses: Vec<Where>,
}

/// A group-by entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Group {
    /// Column.
    Column(String),
    /// Raw SQL with bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
}

/// A having clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    /// Connector to the previous clause.
    pub boolean: Boolean,
    /// The condition.
    pub kind: HavingKind,
}

/// Having variants.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingKind {
    /// `column operator value`.
    Basic {
        /// Column or aggregate expression.
        column: String,
        /// Comparison operator.
        operator: String,
        /// Right-hand side.
        value: Operand,
    },
    /// Raw SQL with bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
    /// `column [not] between a and b`.
    Between {
        /// Column.
        column: String,
        /// Lower and upper bounds.
        values: [Operand; 2],
        /// Negated.
        not: bool,
    },
    /// `column is [not] null`.
    Null {
        /// Column.
        column: String,
        /// Negated.
        not: bool,
    },
}

/// An order-by entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// `column asc|desc`.
    Column {
        /// Column.
        column: String,
        /// Direction.
        direction: Direction,
    },
    /// Raw SQL with bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings for the `?` in `sql`.
        bindings: Vec<SqlValue>,
    },
    /// `(sub-select) asc|desc`.
    Sub {
        /// The sub-select.
        query: Box<Query>,
        /// Direction.
        direction: Direction,
    },
}

/// A union branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    /// Branch statement.
    pub query: Box<Query>,
    /// `union all`.
    pub all: bool,
}

/// An aggregate projection: `function(columns) as aggregate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function name.
    pub function: String,
    /// Target columns.
    pub columns: Vec<String>,
}

/// Row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    /// Shared lock.
    Share,
    /// Exclusive lock.
    Update,
}

/// Distinct mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Distinct {
    /// No distinct.
    #[default]
    Off,
    /// `select distinct`.
    Rows,
    /// `select distinct on (...)` (PostgreSQL), plain distinct elsewhere.
    On(Vec<String>),
}

/// One logical statement, root or nested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// Source.
    pub from: Option<FromClause>,
    /// Projection; empty means `*`.
    pub columns: Vec<Selection>,
    /// Where clauses.
    pub wheres: Vec<Where>,
    /// Joins.
    pub joins: Vec<Join>,
    /// Group-by entries.
    pub groups: Vec<Group>,
    /// Having clauses.
    pub havings: Vec<Having>,
    /// Orders of this statement.
    pub orders: Vec<Order>,
    /// Union branches.
    pub unions: Vec<Union>,
    /// Orders applied to the whole union.
    pub union_orders: Vec<Order>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Row offset.
    pub offset: Option<u64>,
    /// Limit applied to the whole union.
    pub union_limit: Option<u64>,
    /// Offset applied to the whole union.
    pub union_offset: Option<u64>,
    /// Aggregate projection, replacing `columns`.
    pub aggregate: Option<Aggregate>,
    /// Row lock.
    pub lock: Option<Lock>,
    /// Distinct mode.
    pub distinct: Distinct,
    /// Bound values per clause category.
    pub bindings: Bindings,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `from` table, if the source is a table.
    #[must_use]
    pub const fn table(&self) -> Option<&Name> {
        match &self.from {
            Some(FromClause::Table(name)) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parse() {
        let name = Name::parse("users as u");
        assert_eq!(name.name, "users");
        assert_eq!(name.alias.as_deref(), Some("u"));
        assert_eq!(name.reference(), "u");

        let name = Name::parse("users");
        assert_eq!(name.alias, None);
        assert_eq!(name.reference(), "users");
    }

    #[test]
    fn test_split_alias_case_insensitive() {
        assert_eq!(split_alias("count(id) AS total"), ("count(id)", Some("total")));
        assert_eq!(split_alias("name"), ("name", None));
    }

    #[test]
    fn test_boolean_parse() {
        assert_eq!(Boolean::parse("OR"), Some(Boolean::Or));
        assert_eq!(Boolean::parse("and"), Some(Boolean::And));
        assert_eq!(Boolean::parse("xor"), None);
    }
}
