//! Filter expression AST.
//!
//! A closed, strongly-typed expression tree for query filters, with
//! exhaustive pattern matching enforced by the compiler. Filters reference
//! fields either on the queried resource itself or through a relationship
//! path, and may reference named aggregates declared on the same query.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

// =============================================================================
// Expression AST
// =============================================================================

/// A filter expression.
///
/// Every variant must be handled in the walkers below - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Field reference, optionally through a relationship path.
    ///
    /// An empty path means the field lives on the queried resource.
    Field { path: Vec<String>, name: String },

    /// Literal value.
    Literal(Value),

    /// Binary operation: left op right.
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Logical negation.
    Not(Box<Expr>),

    /// Reference to a named aggregate declared on the same query.
    Aggregate(String),

    /// A whole sub-expression scoped through a relationship path.
    ///
    /// This is what the reverse-join rewrite produces: the wrapped
    /// expression is evaluated in the coordinate space reached by `path`.
    Related { path: Vec<String>, expr: Box<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gte => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Create a field reference on the queried resource.
pub fn field(name: &str) -> Expr {
    Expr::Field {
        path: vec![],
        name: name.into(),
    }
}

/// Create a field reference through a relationship path.
pub fn field_at(path: &[&str], name: &str) -> Expr {
    Expr::Field {
        path: path.iter().map(|s| s.to_string()).collect(),
        name: name.into(),
    }
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Value::Int(n))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Value::Str(s.into()))
}

/// Create a boolean literal.
pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Value::Bool(b))
}

/// Create a NULL literal.
pub fn lit_null() -> Expr {
    Expr::Literal(Value::Null)
}

/// Reference a named aggregate declared on the same query.
pub fn aggregate_ref(name: &str) -> Expr {
    Expr::Aggregate(name.into())
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// Fluent combinators for building expressions.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gte, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lt, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lte, other.into())
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::And, other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Or, other.into())
    }

    fn not(self) -> Expr {
        Expr::Not(Box::new(self.into_expr()))
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Conjoin a list of expressions with AND. Returns `None` for an empty list.
pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|acc, e| acc.and(e))
}

/// Disjoin a list of expressions with OR. Returns `None` for an empty list.
pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|acc, e| acc.or(e))
}

// =============================================================================
// Path rewriting and inspection
// =============================================================================

impl Expr {
    /// Re-scope this expression through a relationship path.
    ///
    /// This is the reverse-join rewrite primitive: given the primary query's
    /// filter and the reverse relationship path from the related resource
    /// back to the primary one, the result is the equivalent filter
    /// expressed over the related resource.
    pub fn at_path(self, path: &[String]) -> Expr {
        if path.is_empty() {
            return self;
        }
        Expr::Related {
            path: path.to_vec(),
            expr: Box::new(self),
        }
    }

    /// Names of all aggregates referenced anywhere in this expression.
    pub fn referenced_aggregates(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_aggregates(&mut names);
        names
    }

    fn collect_aggregates<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Field { .. } | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_aggregates(names);
                right.collect_aggregates(names);
            }
            Expr::Not(expr) => expr.collect_aggregates(names),
            Expr::Aggregate(name) => names.push(name),
            Expr::Related { expr, .. } => expr.collect_aggregates(names),
        }
    }
}
