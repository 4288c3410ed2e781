//! Expressions over the columns of a [`RecordBatch`](quarry_array::RecordBatch).
//!
//! An [`Expr`] is a small tree of column references, literals and operators. Expressions are
//! evaluated batch by batch, render themselves for logs and plan explanations, and can be
//! checked against column statistics in [`pruning`] to skip data that cannot match.

mod aggregate;
mod builders;
mod display;
mod eval;
mod operators;
pub mod pruning;
mod simplify;

use std::sync::Arc;

pub use aggregate::*;
pub use builders::*;
use itertools::Itertools;
pub use operators::*;
use quarry_dtype::{DType, FieldName};
use quarry_scalar::Scalar;

/// A scalar expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// A reference to a column by name.
    Column(FieldName),
    /// A constant.
    Literal(Scalar),
    /// A comparison, logical connective or arithmetic operation.
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Boolean negation.
    Not(Box<Expr>),
    /// Whether each value is null. Never null itself.
    IsNull(Box<Expr>),
    /// An explicit, checked conversion.
    Cast(Box<Expr>, DType),
    /// A reduction of the child to one value per group.
    Aggregate(AggregateFunction, Box<Expr>),
    /// SQL `LIKE` matching with `%` and `_` wildcards.
    Like(Box<Expr>, Arc<str>),
}

/// The kind of an expression node, independent of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprKind {
    Column,
    Literal,
    Comparison,
    Logical,
    Arithmetic,
    Not,
    IsNull,
    Cast,
    Aggregate,
    Like,
}

impl ExprKind {
    pub const ALL: [ExprKind; 10] = [
        Self::Column,
        Self::Literal,
        Self::Comparison,
        Self::Logical,
        Self::Arithmetic,
        Self::Not,
        Self::IsNull,
        Self::Cast,
        Self::Aggregate,
        Self::Like,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Literal => "literal",
            Self::Comparison => "comparison",
            Self::Logical => "logical",
            Self::Arithmetic => "arithmetic",
            Self::Not => "not",
            Self::IsNull => "is_null",
            Self::Cast => "cast",
            Self::Aggregate => "aggregate",
            Self::Like => "like",
        }
    }
}

impl Expr {
    pub fn kind(&self) -> ExprKind {
        match self {
            Self::Column(_) => ExprKind::Column,
            Self::Literal(_) => ExprKind::Literal,
            Self::Binary { op, .. } if op.is_comparison() => ExprKind::Comparison,
            Self::Binary { op, .. } if op.is_logical() => ExprKind::Logical,
            Self::Binary { .. } => ExprKind::Arithmetic,
            Self::Not(_) => ExprKind::Not,
            Self::IsNull(_) => ExprKind::IsNull,
            Self::Cast(..) => ExprKind::Cast,
            Self::Aggregate(..) => ExprKind::Aggregate,
            Self::Like(..) => ExprKind::Like,
        }
    }

    /// The direct children of this node.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Column(_) | Self::Literal(_) => vec![],
            Self::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Self::Not(child)
            | Self::IsNull(child)
            | Self::Cast(child, _)
            | Self::Aggregate(_, child)
            | Self::Like(child, _) => vec![child],
        }
    }

    /// Visit this node and all of its descendants, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// The names of every column referenced, in order of first appearance.
    pub fn references(&self) -> Vec<FieldName> {
        let mut names = Vec::new();
        self.walk(&mut |expr| {
            if let Expr::Column(name) = expr {
                names.push(name.clone());
            }
        });
        names.into_iter().unique().collect()
    }

    /// Whether the expression contains an aggregate anywhere.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |expr| found |= matches!(expr, Expr::Aggregate(..)));
        found
    }

    /// The literal value, if this is a literal.
    pub fn as_literal(&self) -> Option<&Scalar> {
        match self {
            Self::Literal(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// The column name, if this is a column reference.
    pub fn as_column(&self) -> Option<&FieldName> {
        match self {
            Self::Column(name) => Some(name),
            _ => None,
        }
    }
}

/// Splits top level `and` operations into separate expressions.
pub fn split_conjunction(expr: &Expr) -> Vec<Expr> {
    let mut conjuncts = vec![];
    split_inner(expr, &mut conjuncts);
    conjuncts
}

fn split_inner(expr: &Expr, conjuncts: &mut Vec<Expr>) {
    match expr {
        Expr::Binary {
            op: BinaryOperator::And,
            lhs,
            rhs,
        } => {
            split_inner(lhs, conjuncts);
            split_inner(rhs, conjuncts);
        }
        other => conjuncts.push(other.clone()),
    }
}

/// Joins expressions with `and`, or `None` when there are none.
pub fn conjunction(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(and)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_rejoin() {
        let predicate = and(and(eq(col("a"), lit(1i64)), gt(col("b"), lit(2i64))), col("c"));
        let conjuncts = split_conjunction(&predicate);
        assert_eq!(conjuncts.len(), 3);
        assert_eq!(conjuncts[2], col("c"));
        assert_eq!(conjunction(conjuncts), Some(predicate));
        assert_eq!(conjunction(vec![]), None);
    }

    #[test]
    fn references_are_unique_and_ordered() {
        let expr = or(eq(col("b"), col("a")), is_null(col("b")));
        assert_eq!(
            expr.references(),
            vec![FieldName::from("b"), FieldName::from("a")]
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(eq(col("a"), lit(1i64)).kind(), ExprKind::Comparison);
        assert_eq!(add(col("a"), lit(1i64)).kind(), ExprKind::Arithmetic);
        assert_eq!(or(col("a"), col("b")).kind(), ExprKind::Logical);
        assert_eq!(median(col("a")).kind(), ExprKind::Aggregate);
        assert!(median(col("a")).contains_aggregate());
    }
}
