//! Deciding from statistics alone that a predicate cannot select any row.
//!
//! The file reader consults this for every row group before reading any of its column data.
//! A predicate is only ever pruned when the statistics prove it cannot be true; anything the
//! rules below do not understand is kept.

use std::cmp::Ordering;

use quarry_array::compute::Operator;
use quarry_scalar::Scalar;

use crate::{BinaryOperator, Expr};

/// The statistics of one column over a range of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStats {
    /// The smallest non-null value, if known.
    pub min: Option<Scalar>,
    /// The largest non-null value, if known.
    pub max: Option<Scalar>,
    /// The number of nulls, if known.
    pub null_count: Option<u64>,
    /// The number of rows the statistics cover.
    pub num_rows: u64,
}

impl ColumnStats {
    fn all_null(&self) -> bool {
        self.null_count == Some(self.num_rows)
    }
}

/// Whether `predicate` is provably false or null for every row described by `stats`.
///
/// `stats` returns the statistics of a column by name, or `None` when they are unknown.
pub fn can_prune<F>(predicate: &Expr, stats: &F) -> bool
where
    F: Fn(&str) -> Option<ColumnStats>,
{
    match predicate {
        Expr::Literal(_) => predicate.is_unsatisfiable(),
        Expr::Binary {
            op: BinaryOperator::And,
            lhs,
            rhs,
        } => can_prune(lhs, stats) || can_prune(rhs, stats),
        Expr::Binary {
            op: BinaryOperator::Or,
            lhs,
            rhs,
        } => can_prune(lhs, stats) && can_prune(rhs, stats),
        Expr::Binary { op, lhs, rhs } => match op.as_comparison() {
            Some(operator) => prune_comparison(operator, lhs, rhs, stats),
            None => false,
        },
        Expr::IsNull(child) => child
            .as_column()
            .and_then(|name| stats(name.as_ref()))
            .is_some_and(|s| s.null_count == Some(0)),
        Expr::Not(child) => match child.as_ref() {
            Expr::IsNull(inner) => inner
                .as_column()
                .and_then(|name| stats(name.as_ref()))
                .is_some_and(|s| s.all_null()),
            Expr::Binary { op, lhs, rhs } => match op.as_comparison() {
                Some(operator) => prune_comparison(operator.inverse(), lhs, rhs, stats),
                None => false,
            },
            _ => false,
        },
        _ => false,
    }
}

fn prune_comparison<F>(operator: Operator, lhs: &Expr, rhs: &Expr, stats: &F) -> bool
where
    F: Fn(&str) -> Option<ColumnStats>,
{
    let (name, operator, value) = match (lhs, rhs) {
        (Expr::Column(name), Expr::Literal(value)) => (name, operator, value),
        (Expr::Literal(value), Expr::Column(name)) => (name, operator.swap(), value),
        _ => return false,
    };
    let Some(stats) = stats(name.as_ref()) else {
        return false;
    };
    if value.is_null() || stats.all_null() {
        return true;
    }
    let (Some(min), Some(max)) = (&stats.min, &stats.max) else {
        return false;
    };
    let Some(value) = value.cast_lossless(&min.dtype().as_nonnullable()) else {
        return false;
    };
    let (Some(vs_min), Some(vs_max)) = (compare(&value, min), compare(&value, max)) else {
        return false;
    };
    match operator {
        Operator::Eq => vs_min.is_lt() || vs_max.is_gt(),
        Operator::NotEq => vs_min.is_eq() && vs_max.is_eq(),
        Operator::Lt => vs_min.is_le(),
        Operator::Lte => vs_min.is_lt(),
        Operator::Gt => vs_max.is_ge(),
        Operator::Gte => vs_max.is_gt(),
    }
}

fn compare(value: &Scalar, bound: &Scalar) -> Option<Ordering> {
    if bound.is_null() {
        return None;
    }
    value.value().partial_cmp(bound.value())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::*;

    fn stats(name: &str) -> Option<ColumnStats> {
        match name {
            "x" => Some(ColumnStats {
                min: Some(Scalar::from(10i64)),
                max: Some(Scalar::from(20i64)),
                null_count: Some(0),
                num_rows: 100,
            }),
            "empty" => Some(ColumnStats {
                min: None,
                max: None,
                null_count: Some(100),
                num_rows: 100,
            }),
            _ => None,
        }
    }

    #[rstest]
    #[case(eq(col("x"), lit(5i64)), true)]
    #[case(eq(col("x"), lit(15i64)), false)]
    #[case(eq(col("x"), lit(25i32)), true)]
    #[case(lt(col("x"), lit(10i64)), true)]
    #[case(lt_eq(col("x"), lit(10i64)), false)]
    #[case(gt(col("x"), lit(20i64)), true)]
    #[case(gt_eq(col("x"), lit(20i64)), false)]
    #[case(gt(lit(10i64), col("x")), true)]
    #[case(not_eq(col("x"), lit(10i64)), false)]
    #[case(not(gt(col("x"), lit(5i64))), true)]
    #[case(and(gt(col("x"), lit(0i64)), lt(col("x"), lit(5i64))), true)]
    #[case(or(lt(col("x"), lit(5i64)), gt(col("x"), lit(15i64))), false)]
    #[case(or(lt(col("x"), lit(5i64)), gt(col("x"), lit(25i64))), true)]
    #[case(is_null(col("x")), true)]
    #[case(is_not_null(col("x")), false)]
    #[case(is_not_null(col("empty")), true)]
    #[case(eq(col("empty"), lit(1i64)), true)]
    #[case(eq(col("unknown"), lit(1i64)), false)]
    #[case(eq(col("x"), lit(1.5f64)), false)]
    #[case(like(col("x"), "1%"), false)]
    #[case(lit(false), true)]
    fn prunes(#[case] predicate: Expr, #[case] expected: bool) {
        assert_eq!(can_prune(&predicate, &stats), expected, "{predicate}");
    }
}
