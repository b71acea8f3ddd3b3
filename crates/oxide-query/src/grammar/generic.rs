//! Generic SQL grammar.

use super::{Dialect, QueryGrammar, SchemaGrammar};

/// The generic `sql` grammar: backtick identifiers and `?` placeholders.
///
/// Every method is a trait default; the dialect grammars override it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGrammar;

impl SqlGrammar {
    /// Creates the grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqlGrammar {
    fn name(&self) -> &'static str {
        "sql"
    }
}

impl QueryGrammar for SqlGrammar {}

impl SchemaGrammar for SqlGrammar {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Name, Query};
    use crate::grammar::{Context, Placeholder};

    #[test]
    fn test_generic_select() {
        let grammar = SqlGrammar::new();
        let mut query = Query::new();
        query.from = Some(crate::ast::FromClause::Table(Name::parse("users")));
        query.offset = Some(10);
        let mut ctx = Context::new(Placeholder::Question, "");
        assert_eq!(
            grammar.compile_select(&mut ctx, &query),
            "select * from `users` limit 18446744073709551615 offset 10"
        );
    }

    #[test]
    #[should_panic(expected = "upsert is not supported by the sql grammar")]
    fn test_generic_upsert_panics() {
        let grammar = SqlGrammar::new();
        let mut ctx = Context::new(Placeholder::Question, "");
        grammar.compile_upsert(&mut ctx, &Query::new(), &[], &[], &[]);
    }
}
