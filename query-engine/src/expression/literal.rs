//! Literals, operands and SQL text quoting.

use super::{Expression, SqlType};
use std::borrow::Cow;
use std::fmt;

/// A raw value appearing on one side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Literal {
    /// Coerces the literal to `target`, or returns `None` if it cannot be
    /// represented without loss.
    ///
    /// Integers widen to reals and integral reals narrow to integers. Text
    /// only ever matches text, and nothing coerces to a boolean.
    pub fn coerce(&self, target: SqlType) -> Option<Literal> {
        match (self, target) {
            (Literal::Integer(i), SqlType::Integer) => Some(Literal::Integer(*i)),
            (Literal::Real(r), SqlType::Integer)
                if r.is_finite() && r.fract() == 0.0 && r.abs() < i64::MAX as f64 =>
            {
                Some(Literal::Integer(*r as i64))
            }
            (Literal::Integer(i), SqlType::Real) => Some(Literal::Real(*i as f64)),
            (Literal::Real(r), SqlType::Real) if r.is_finite() => Some(Literal::Real(*r)),
            (Literal::Text(s), SqlType::Text) => Some(Literal::Text(s.clone())),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "INTEGER",
            Literal::Real(_) => "REAL",
            Literal::Text(_) => "TEXT",
        }
    }
}

/// Renders the literal as SQL text. Text is single-quoted with embedded
/// quotes doubled.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            // `{:?}` keeps the decimal point on integral values ("2.0").
            Literal::Real(r) => write!(f, "{:?}", r),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value as i64)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Real(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

/// One side of a binary operator: either an expression or a raw literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Expr(Expression),
    Literal(Literal),
}

impl From<Expression> for Operand {
    fn from(expr: Expression) -> Self {
        Operand::Expr(expr)
    }
}

impl From<&Expression> for Operand {
    fn from(expr: &Expression) -> Self {
        Operand::Expr(expr.clone())
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Literal(literal)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Literal(value.into())
    }
}

const KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CHECK", "COLLATE",
    "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "FOREIGN", "FROM", "FULL", "GLOB", "GROUP",
    "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LEFT", "LIKE", "LIMIT", "MATCH", "NATURAL", "NOT", "NOTNULL", "NULL", "OFFSET",
    "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "REGEXP", "RIGHT", "ROWID", "SELECT",
    "SET", "TABLE", "THEN", "TO", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "VIEW",
    "WHEN", "WHERE", "WITH",
];

/// Quotes an identifier for SQL.
///
/// Plain identifiers that are not keywords are emitted as-is; anything else
/// is double-quoted with embedded quotes doubled.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    let reserved = KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name));
    if plain && !reserved {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}
