//! Expression system for building projections and predicates as SQL.
//!
//! Provides a fluent API for building expressions like `price.mul(2)?.gt(10)?`.
//! Every combination is type-checked when it is built, so an expression that
//! exists always renders to a well-typed SQL fragment.

mod literal;

pub use literal::{quote_identifier, Literal, Operand};

use crate::{QueryError, Result};
use common::TypeTag;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The type of an expression.
///
/// `Boolean` is never the type of a base column: it only results from
/// comparison and logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl SqlType {
    /// The column type used to persist values of this type.
    pub fn storage_tag(self) -> TypeTag {
        match self {
            SqlType::Integer | SqlType::Boolean => TypeTag::Integer,
            SqlType::Real => TypeTag::Real,
            SqlType::Text => TypeTag::Text,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, SqlType::Integer | SqlType::Real)
    }
}

impl From<TypeTag> for SqlType {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Integer => SqlType::Integer,
            TypeTag::Real => SqlType::Real,
            TypeTag::Text => SqlType::Text,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Boolean => f.write_str("BOOLEAN"),
            other => f.write_str(other.storage_tag().sql_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorClass {
    Arithmetic,
    Comparison,
    Logical,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Concat => "||",
            Eq => "=",
            NotEq => "!=",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            And => "AND",
            Or => "OR",
        }
    }

    fn class(self) -> OperatorClass {
        use BinaryOperator::*;
        match self {
            Add | Subtract | Multiply | Divide | Concat => OperatorClass::Arithmetic,
            Eq | NotEq | Lt | LtEq | Gt | GtEq => OperatorClass::Comparison,
            And | Or => OperatorClass::Logical,
        }
    }
}

/// An aggregate function that can be applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Sum,
    Count,
    Max,
    Min,
    Avg,
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
            Aggregate::Avg => "AVG",
        }
    }
}

impl FromStr for Aggregate {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SUM" => Ok(Aggregate::Sum),
            "COUNT" => Ok(Aggregate::Count),
            "MAX" => Ok(Aggregate::Max),
            "MIN" => Ok(Aggregate::Min),
            "AVG" => Ok(Aggregate::Avg),
            _ => Err(QueryError::InvalidArgument(format!(
                "unknown aggregate function: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Column(String),
    Literal(Literal),
    Binary {
        left: Box<Node>,
        op: BinaryOperator,
        right: Box<Node>,
    },
    Aggregate {
        func: Aggregate,
        arg: Box<Node>,
    },
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Column(name) => f.write_str(&quote_identifier(name)),
            Node::Literal(literal) => write!(f, "{}", literal),
            Node::Binary { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Node::Aggregate { func, arg } => write!(f, "{}({})", func.name(), arg),
        }
    }
}

impl Node {
    fn contains_aggregate(&self) -> bool {
        match self {
            Node::Aggregate { .. } => true,
            Node::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Node::Column(_) | Node::Literal(_) => false,
        }
    }
}

/// A typed SQL expression valid against one base relation.
///
/// Expressions are immutable: every operator returns a new expression and
/// leaves its operands untouched. Rendering is available through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    node: Node,
    relation: Arc<str>,
    sql_type: SqlType,
}

/// Which side of the operator the literal sits on.
#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Expression {
    /// Creates a reference to a column of `relation`.
    pub fn reference(relation: impl Into<Arc<str>>, name: &str, type_tag: TypeTag) -> Self {
        Self {
            node: Node::Column(name.to_string()),
            relation: relation.into(),
            sql_type: type_tag.into(),
        }
    }

    /// The base relation this expression is valid against.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_boolean(&self) -> bool {
        self.sql_type == SqlType::Boolean
    }

    /// The column name if this expression is a bare column reference.
    pub fn column_name(&self) -> Option<&str> {
        match &self.node {
            Node::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Whether an aggregate function appears anywhere in the expression.
    pub fn is_aggregate(&self) -> bool {
        self.node.contains_aggregate()
    }

    /// The rendered SQL fragment.
    pub fn sql(&self) -> String {
        self.node.to_string()
    }

    pub(crate) fn same_relation(&self, other: &Expression) -> bool {
        self.relation == other.relation
    }

    /// Wraps the expression in an aggregate function: `AGG(expr)`.
    ///
    /// The type is preserved, except `COUNT` which always yields an integer.
    pub fn apply(&self, func: Aggregate) -> Expression {
        let sql_type = match func {
            Aggregate::Count => SqlType::Integer,
            _ => self.sql_type,
        };
        Expression {
            node: Node::Aggregate {
                func,
                arg: Box::new(self.node.clone()),
            },
            relation: self.relation.clone(),
            sql_type,
        }
    }

    // ===== Builder Methods for Fluent API =====

    /// `self + rhs`; concatenation (`||`) when both sides are text.
    pub fn add(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Add)
    }

    /// `self - rhs`
    pub fn sub(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Subtract)
    }

    /// `lhs - self`
    pub fn subtract_from(&self, lhs: impl Into<Operand>) -> Result<Expression> {
        combine(lhs.into(), self.into(), BinaryOperator::Subtract)
    }

    /// `self * rhs`
    pub fn mul(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Multiply)
    }

    /// `self / rhs`
    pub fn div(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Divide)
    }

    /// `lhs / self`
    pub fn divide_into(&self, lhs: impl Into<Operand>) -> Result<Expression> {
        combine(lhs.into(), self.into(), BinaryOperator::Divide)
    }

    /// Creates an equality comparison: `self = rhs`
    pub fn eq(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Eq)
    }

    /// Creates an inequality comparison: `self != rhs`
    pub fn not_eq(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::NotEq)
    }

    /// Creates a less-than comparison: `self < rhs`
    pub fn lt(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Lt)
    }

    /// Creates a less-than-or-equal comparison: `self <= rhs`
    pub fn lt_eq(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::LtEq)
    }

    /// Creates a greater-than comparison: `self > rhs`
    pub fn gt(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Gt)
    }

    /// Creates a greater-than-or-equal comparison: `self >= rhs`
    pub fn gt_eq(&self, rhs: impl Into<Operand>) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::GtEq)
    }

    /// Creates an AND logical operation. Both sides must be boolean.
    pub fn and(&self, rhs: &Expression) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::And)
    }

    /// Creates an OR logical operation. Both sides must be boolean.
    pub fn or(&self, rhs: &Expression) -> Result<Expression> {
        combine(self.into(), rhs.into(), BinaryOperator::Or)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

/// Combines two operands with `op`, enforcing ownership and type rules.
///
/// At least one operand must be an expression.
pub fn combine(left: Operand, right: Operand, op: BinaryOperator) -> Result<Expression> {
    match (left, right) {
        (Operand::Expr(l), Operand::Expr(r)) => combine_expressions(l, r, op),
        (Operand::Expr(e), Operand::Literal(lit)) => combine_literal(e, lit, op, Side::Right),
        (Operand::Literal(lit), Operand::Expr(e)) => combine_literal(e, lit, op, Side::Left),
        (Operand::Literal(l), Operand::Literal(r)) => Err(QueryError::TypeMismatch(format!(
            "cannot combine two literals ({} {} {}) without a column",
            l,
            op.symbol(),
            r
        ))),
    }
}

fn combine_expressions(left: Expression, right: Expression, op: BinaryOperator) -> Result<Expression> {
    if !left.same_relation(&right) {
        return Err(QueryError::CrossViewCombination {
            left: left.relation.to_string(),
            right: right.relation.to_string(),
        });
    }

    let (op, sql_type) = match op.class() {
        OperatorClass::Logical => {
            if !left.is_boolean() || !right.is_boolean() {
                return Err(QueryError::TypeMismatch(format!(
                    "{} requires boolean operands, found {} and {}",
                    op.symbol(),
                    left.sql_type,
                    right.sql_type
                )));
            }
            (op, SqlType::Boolean)
        }
        OperatorClass::Comparison => {
            require_same_type(&left, &right, op)?;
            (op, SqlType::Boolean)
        }
        OperatorClass::Arithmetic => {
            require_same_type(&left, &right, op)?;
            (arithmetic_operator(left.sql_type, op)?, left.sql_type)
        }
    };

    Ok(Expression {
        node: Node::Binary {
            left: Box::new(left.node),
            op,
            right: Box::new(right.node),
        },
        relation: left.relation,
        sql_type,
    })
}

fn combine_literal(expr: Expression, literal: Literal, op: BinaryOperator, side: Side) -> Result<Expression> {
    if op.class() == OperatorClass::Logical {
        return Err(QueryError::TypeMismatch(format!(
            "{} requires boolean expressions, found literal {}",
            op.symbol(),
            literal
        )));
    }

    let coerced = literal.coerce(expr.sql_type).ok_or_else(|| {
        QueryError::TypeMismatch(format!(
            "cannot use {} literal {} with {} expression {}",
            literal.type_name(),
            literal,
            expr.sql_type,
            expr
        ))
    })?;

    let (op, sql_type) = match op.class() {
        OperatorClass::Comparison => (op, SqlType::Boolean),
        _ => (arithmetic_operator(expr.sql_type, op)?, expr.sql_type),
    };

    let literal = Box::new(Node::Literal(coerced));
    let column = Box::new(expr.node);
    let (left, right) = match side {
        Side::Right => (column, literal),
        Side::Left => (literal, column),
    };

    Ok(Expression {
        node: Node::Binary { left, op, right },
        relation: expr.relation,
        sql_type,
    })
}

fn require_same_type(left: &Expression, right: &Expression, op: BinaryOperator) -> Result<()> {
    if left.sql_type != right.sql_type {
        return Err(QueryError::TypeMismatch(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.sql_type,
            right.sql_type
        )));
    }
    Ok(())
}

/// Resolves an arithmetic operator for operands of type `sql_type`.
///
/// Text supports only `+`, which becomes concatenation.
fn arithmetic_operator(sql_type: SqlType, op: BinaryOperator) -> Result<BinaryOperator> {
    match sql_type {
        t if t.is_numeric() => Ok(op),
        SqlType::Text if op == BinaryOperator::Add || op == BinaryOperator::Concat => {
            Ok(BinaryOperator::Concat)
        }
        t => Err(QueryError::TypeMismatch(format!(
            "cannot apply {} to {} operands",
            op.symbol(),
            t
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str) -> Expression {
        Expression::reference("r", name, TypeTag::Integer)
    }

    fn text(name: &str) -> Expression {
        Expression::reference("r", name, TypeTag::Text)
    }

    #[test]
    fn test_column_reference() {
        let a = int("a");
        assert_eq!(a.sql(), "a");
        assert_eq!(a.column_name(), Some("a"));
        assert_eq!(a.relation(), "r");
        assert_eq!(a.sql_type(), SqlType::Integer);
    }

    #[test]
    fn test_arithmetic_expressions() {
        let a = int("a");
        let b = int("b");

        assert_eq!(a.add(&b).unwrap().sql(), "(a + b)");
        assert_eq!(a.mul(2).unwrap().sql(), "(a * 2)");
        assert_eq!(a.subtract_from(10).unwrap().sql(), "(10 - a)");
        assert_eq!(a.divide_into(1).unwrap().sql(), "(1 / a)");

        let nested = a.add(&b).unwrap().div(2).unwrap();
        assert_eq!(nested.sql(), "((a + b) / 2)");
        assert_eq!(nested.sql_type(), SqlType::Integer);
    }

    #[test]
    fn test_real_column_accepts_integer_literal() {
        let price = Expression::reference("r", "price", TypeTag::Real);
        let scaled = price.mul(3).unwrap();
        assert_eq!(scaled.sql(), "(price * 3.0)");
        assert_eq!(scaled.sql_type(), SqlType::Real);
    }

    #[test]
    fn test_comparisons_are_boolean() {
        let a = int("a");
        let pred = a.gt(1).unwrap();
        assert_eq!(pred.sql(), "(a > 1)");
        assert!(pred.is_boolean());

        let both = a.gt(1).unwrap().and(&a.lt_eq(5).unwrap()).unwrap();
        assert_eq!(both.sql(), "((a > 1) AND (a <= 5))");
        assert!(both.is_boolean());

        assert_eq!(text("b").eq("x").unwrap().sql(), "(b = 'x')");
        assert_eq!(a.not_eq(&int("c")).unwrap().sql(), "(a != c)");
    }

    #[test]
    fn test_text_concatenation() {
        let b = text("b");
        assert_eq!(b.add("!").unwrap().sql(), "(b || '!')");
        assert_eq!(b.add(&text("c")).unwrap().sql(), "(b || c)");
        assert_eq!(b.add("!").unwrap().sql_type(), SqlType::Text);
    }

    #[test]
    fn test_text_rejects_numeric_operators() {
        let b = text("b");
        assert!(matches!(b.mul("x"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(b.sub(&text("c")), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn test_text_with_integer_literal_is_type_mismatch() {
        let b = text("b");
        assert!(matches!(b.add(1), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(b.eq(1), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(b.gt(2.5), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn test_expression_pairs_require_equal_types() {
        let a = int("a");
        let b = text("b");
        assert!(matches!(a.add(&b), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(a.lt(&b), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn test_logical_requires_boolean() {
        let a = int("a");
        let pred = a.gt(0).unwrap();
        assert!(matches!(a.and(&pred), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(
            combine(pred.clone().into(), 1.into(), BinaryOperator::Or),
            Err(QueryError::TypeMismatch(_))
        ));
        assert!(pred.or(&pred).is_ok());
    }

    #[test]
    fn test_cross_relation_combination_fails() {
        let a = int("a");
        let other = Expression::reference("s", "a", TypeTag::Integer);
        assert!(matches!(
            a.add(&other),
            Err(QueryError::CrossViewCombination { .. })
        ));
        let p = a.gt(1).unwrap();
        let q = other.gt(1).unwrap();
        assert!(matches!(p.and(&q), Err(QueryError::CrossViewCombination { .. })));
    }

    #[test]
    fn test_apply_aggregate() {
        let b = text("b");
        let count = b.apply(Aggregate::Count);
        assert_eq!(count.sql(), "COUNT(b)");
        assert_eq!(count.sql_type(), SqlType::Integer);

        let price = Expression::reference("r", "price", TypeTag::Real);
        let total = price.apply(Aggregate::Sum);
        assert_eq!(total.sql(), "SUM(price)");
        assert_eq!(total.sql_type(), SqlType::Real);
        assert_eq!(total.column_name(), None);
        assert!(total.is_aggregate());
        assert!(total.mul(2).unwrap().is_aggregate());
        assert!(!price.mul(2).unwrap().is_aggregate());
    }

    #[test]
    fn test_aggregate_from_str() {
        assert_eq!("sum".parse::<Aggregate>().unwrap(), Aggregate::Sum);
        assert_eq!("COUNT".parse::<Aggregate>().unwrap(), Aggregate::Count);
        assert!(matches!(
            "DROP".parse::<Aggregate>(),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_operands_are_not_mutated() {
        let a = int("a");
        let _ = a.add(1).unwrap();
        assert_eq!(a.sql(), "a");
    }

    #[test]
    fn test_quoted_identifiers_in_expressions() {
        let order = Expression::reference("r", "order", TypeTag::Integer);
        assert_eq!(order.gt(1).unwrap().sql(), "(\"order\" > 1)");
    }
}
