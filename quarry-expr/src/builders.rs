use quarry_dtype::{DType, FieldName};
use quarry_scalar::Scalar;

use crate::{AggregateFunction, BinaryOperator, Expr};

/// A reference to the named column.
pub fn col(name: impl Into<FieldName>) -> Expr {
    Expr::Column(name.into())
}

/// A constant.
///
/// ```
/// use quarry_expr::{eq, col, lit};
///
/// let predicate = eq(col("year"), lit(2024i64));
/// assert_eq!(predicate.to_string(), "(year = 2024i64)");
/// ```
pub fn lit(value: impl Into<Scalar>) -> Expr {
    Expr::Literal(value.into())
}

pub fn binary(lhs: Expr, op: BinaryOperator, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Eq, rhs)
}

pub fn not_eq(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::NotEq, rhs)
}

pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Lt, rhs)
}

pub fn lt_eq(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Lte, rhs)
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Gt, rhs)
}

pub fn gt_eq(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Gte, rhs)
}

/// Kleene `and`: false wins over null.
pub fn and(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::And, rhs)
}

/// Kleene `or`: true wins over null.
pub fn or(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Or, rhs)
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Add, rhs)
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Sub, rhs)
}

pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Mul, rhs)
}

/// Division. Integer division by zero yields null.
pub fn div(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOperator::Div, rhs)
}

pub fn not(expr: Expr) -> Expr {
    Expr::Not(Box::new(expr))
}

pub fn is_null(expr: Expr) -> Expr {
    Expr::IsNull(Box::new(expr))
}

pub fn is_not_null(expr: Expr) -> Expr {
    not(is_null(expr))
}

pub fn cast(expr: Expr, dtype: DType) -> Expr {
    Expr::Cast(Box::new(expr), dtype)
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one, `\` escapes.
pub fn like(expr: Expr, pattern: impl AsRef<str>) -> Expr {
    Expr::Like(Box::new(expr), pattern.as_ref().into())
}

pub fn aggregate(function: AggregateFunction, expr: Expr) -> Expr {
    Expr::Aggregate(function, Box::new(expr))
}

pub fn count(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Count, expr)
}

pub fn count_all(expr: Expr) -> Expr {
    aggregate(AggregateFunction::CountAll, expr)
}

pub fn sum(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Sum, expr)
}

pub fn min(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Min, expr)
}

pub fn max(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Max, expr)
}

pub fn mean(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Mean, expr)
}

pub fn median(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Median, expr)
}
