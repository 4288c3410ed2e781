use quarry_array::RecordBatch;
use quarry_dtype::Schema;
use quarry_scalar::Scalar;

use crate::{BinaryOperator, Expr};

impl Expr {
    /// Replace every reference to a column for which `lookup` has a value with that value.
    pub fn substitute<F>(&self, lookup: &F) -> Expr
    where
        F: Fn(&str) -> Option<Scalar>,
    {
        match self {
            Self::Column(name) => match lookup(name) {
                Some(value) => Self::Literal(value),
                None => self.clone(),
            },
            Self::Literal(_) => self.clone(),
            Self::Binary { op, lhs, rhs } => Self::Binary {
                op: *op,
                lhs: Box::new(lhs.substitute(lookup)),
                rhs: Box::new(rhs.substitute(lookup)),
            },
            Self::Not(child) => Self::Not(Box::new(child.substitute(lookup))),
            Self::IsNull(child) => Self::IsNull(Box::new(child.substitute(lookup))),
            Self::Cast(child, dtype) => Self::Cast(Box::new(child.substitute(lookup)), dtype.clone()),
            Self::Aggregate(function, child) => {
                Self::Aggregate(*function, Box::new(child.substitute(lookup)))
            }
            Self::Like(child, pattern) => {
                Self::Like(Box::new(child.substitute(lookup)), pattern.clone())
            }
        }
    }

    /// Fold constant subexpressions into literals.
    ///
    /// `false and x` folds to false and `true or x` to true even when `x` references columns.
    /// Subexpressions that fail to evaluate are left as they are.
    pub fn simplify(&self) -> Expr {
        let simplified = match self {
            Self::Column(_) | Self::Literal(_) => return self.clone(),
            Self::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.simplify(), rhs.simplify());
                match (op, as_bool(&lhs), as_bool(&rhs)) {
                    (BinaryOperator::And, Some(Some(false)), _)
                    | (BinaryOperator::And, _, Some(Some(false))) => return Self::Literal(false.into()),
                    (BinaryOperator::Or, Some(Some(true)), _)
                    | (BinaryOperator::Or, _, Some(Some(true))) => return Self::Literal(true.into()),
                    (BinaryOperator::And, Some(Some(true)), _)
                    | (BinaryOperator::Or, Some(Some(false)), _) => return rhs,
                    (BinaryOperator::And, _, Some(Some(true)))
                    | (BinaryOperator::Or, _, Some(Some(false))) => return lhs,
                    _ => Self::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                }
            }
            Self::Not(child) => Self::Not(Box::new(child.simplify())),
            Self::IsNull(child) => Self::IsNull(Box::new(child.simplify())),
            Self::Cast(child, dtype) => Self::Cast(Box::new(child.simplify()), dtype.clone()),
            Self::Aggregate(..) => return self.clone(),
            Self::Like(child, pattern) => Self::Like(Box::new(child.simplify()), pattern.clone()),
        };
        if simplified.children().iter().all(|child| child.as_literal().is_some()) {
            if let Some(value) = fold(&simplified) {
                return Self::Literal(value);
            }
        }
        simplified
    }

    /// Whether the expression is a literal that never selects a row: false or null.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(as_bool(self), Some(None | Some(false)))
    }
}

fn as_bool(expr: &Expr) -> Option<Option<bool>> {
    let scalar = expr.as_literal()?;
    if scalar.is_null() {
        return Some(None);
    }
    scalar.as_bool().ok()
}

fn fold(expr: &Expr) -> Option<Scalar> {
    let batch = RecordBatch::try_new_with_len(Schema::empty(), vec![], 1).ok()?;
    match expr.evaluate(&batch) {
        Ok(array) => array.scalar_at(0).ok(),
        Err(err) => {
            log::trace!("not folding {}: {}", expr, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_scalar::Scalar;

    use crate::*;

    fn partition(name: &str) -> Option<Scalar> {
        match name {
            "year" => Some(Scalar::from(2024i64)),
            "region" => Some(Scalar::from("eu")),
            _ => None,
        }
    }

    #[test]
    fn folds_partition_only_predicates() {
        let predicate = and(eq(col("year"), lit(2024i64)), eq(col("region"), lit("us")));
        let folded = predicate.substitute(&partition).simplify();
        assert_eq!(folded, lit(false));
        assert!(folded.is_unsatisfiable());

        let predicate = eq(col("year"), lit(2024i32));
        assert_eq!(predicate.substitute(&partition).simplify(), lit(true));
    }

    #[test]
    fn keeps_residual_columns() {
        let predicate = and(eq(col("year"), lit(2024i64)), gt(col("x"), lit(1i64)));
        let folded = predicate.substitute(&partition).simplify();
        assert_eq!(folded, gt(col("x"), lit(1i64)));
        assert!(!folded.is_unsatisfiable());

        let predicate = or(eq(col("year"), lit(2023i64)), gt(col("x"), lit(1i64)));
        assert_eq!(predicate.substitute(&partition).simplify(), gt(col("x"), lit(1i64)));
    }

    #[test]
    fn null_literals_are_unsatisfiable() {
        let null = Expr::Literal(Scalar::from(None::<i64>));
        let folded = eq(null, lit(1i64)).simplify();
        assert!(folded.is_unsatisfiable(), "{folded}");
        assert!(!col("x").is_unsatisfiable());
    }
}
