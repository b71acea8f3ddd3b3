//! Arity-based argument resolution for `where`/`having` style calls.

use crate::ast::Boolean;
use crate::value::{IntoOperand, Operand, SqlValue};

/// Operators accepted as the first of two or three arguments.
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "like", "like binary", "not like", "ilike",
    "not ilike", "&", "|", "^", "<<", ">>", "&~", "rlike", "not rlike", "regexp", "not regexp",
    "~", "~*", "!~", "!~*", "~~*", "!~~*", "similar to", "not similar to",
];

/// True when `value` is a known comparison operator (any case).
#[must_use]
pub fn is_operator(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    OPERATORS.contains(&lower.as_str())
}

/// Positional arguments of a comparison: `value`, `(operator, value)`,
/// `(value, boolean)` or `(operator, value, boolean)`.
pub trait IntoArgs {
    /// The arguments in call order.
    fn into_args(self) -> Vec<Operand>;
}

impl<T: IntoOperand> IntoArgs for T {
    fn into_args(self) -> Vec<Operand> {
        vec![self.into_operand()]
    }
}

impl<A: IntoOperand, B: IntoOperand> IntoArgs for (A, B) {
    fn into_args(self) -> Vec<Operand> {
        vec![self.0.into_operand(), self.1.into_operand()]
    }
}

impl<A: IntoOperand, B: IntoOperand, C: IntoOperand> IntoArgs for (A, B, C) {
    fn into_args(self) -> Vec<Operand> {
        vec![
            self.0.into_operand(),
            self.1.into_operand(),
            self.2.into_operand(),
        ]
    }
}

/// Arguments after default resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Comparison operator, lower case.
    pub operator: String,
    /// Right-hand side.
    pub value: Operand,
    /// Connector to the previous clause.
    pub boolean: Boolean,
}

/// Resolves positional arguments.
///
/// One argument compares with `=`. With two, a leading known operator is
/// taken as the operator; otherwise the second argument is the boolean.
/// Three arguments are operator, value and boolean.
///
/// # Panics
///
/// Panics on an unknown operator, an unknown boolean, or an argument count
/// other than one to three.
#[must_use]
pub fn prepare_args(args: Vec<Operand>, boolean: Boolean) -> Resolved {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next(), args.next()) {
        (Some(value), None, None, None) => Resolved {
            operator: String::from("="),
            value,
            boolean,
        },
        (Some(first), Some(second), None, None) => match first.as_text() {
            Some(operator) if is_operator(operator) => Resolved {
                operator: operator.trim().to_ascii_lowercase(),
                value: second,
                boolean,
            },
            _ => Resolved {
                operator: String::from("="),
                value: first,
                boolean: parse_boolean(&second),
            },
        },
        (Some(operator), Some(value), Some(connector), None) => Resolved {
            operator: parse_operator(&operator),
            value,
            boolean: parse_boolean(&connector),
        },
        _ => panic!("expected one to three arguments"),
    }
}

fn parse_operator(operand: &Operand) -> String {
    match operand.as_text() {
        Some(operator) if is_operator(operator) => operator.trim().to_ascii_lowercase(),
        _ => panic!("invalid operator: {operand:?}"),
    }
}

fn parse_boolean(operand: &Operand) -> Boolean {
    operand
        .as_text()
        .and_then(Boolean::parse)
        .unwrap_or_else(|| panic!("invalid boolean: {operand:?}"))
}

/// Zero-pads day and month numbers so they compare as text.
pub(crate) fn pad_date_part(value: Operand) -> Operand {
    match value {
        Operand::Value(SqlValue::Int(n)) => Operand::Value(SqlValue::Text(format!("{n:02}"))),
        Operand::Value(SqlValue::Text(s)) if s.len() == 1 && s.chars().all(|c| c.is_ascii_digit()) => {
            Operand::Value(SqlValue::Text(format!("0{s}")))
        }
        other => other,
    }
}
