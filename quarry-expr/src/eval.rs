use std::borrow::Cow;

use quarry_array::compute::{
    LikePattern, and_kleene, binary_numeric, cast, compare, is_null, like, not, or_kleene,
    with_validity,
};
use quarry_array::{Array, Mask, RecordBatch};
use quarry_dtype::{DType, Nullability, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

use crate::{BinaryOperator, Expr};

impl Expr {
    /// Evaluate the expression against every row of `batch`.
    ///
    /// Aggregates are broadcast: every row receives the reduction over the whole batch.
    pub fn evaluate(&self, batch: &RecordBatch) -> QuarryResult<Array> {
        let dtype = self.return_dtype(batch.schema())?;
        let array = self.evaluate_unchecked(batch)?;
        conform(array, &dtype)
    }

    /// Evaluate a boolean expression into a row selection. Null counts as false.
    pub fn evaluate_predicate(&self, batch: &RecordBatch) -> QuarryResult<Mask> {
        match self.evaluate(batch)? {
            Array::Bool(result) => Ok(Mask::from_buffer(result.true_and_valid())),
            Array::Null(result) => Ok(Mask::AllFalse(result.len())),
            other => Err(quarry_err!(
                TypeError: "predicate {} must be boolean, found {}",
                self,
                other.dtype()
            )),
        }
    }

    /// Reduce `batch` to a single value. Only aggregates, literals and casts of those reduce.
    pub fn evaluate_scalar(&self, batch: &RecordBatch) -> QuarryResult<Scalar> {
        match self {
            Self::Aggregate(function, child) => function.evaluate(&child.evaluate(batch)?),
            Self::Literal(scalar) => Ok(scalar.clone()),
            Self::Cast(child, dtype) => child.evaluate_scalar(batch)?.cast(dtype),
            other => quarry_bail!("{} does not reduce to a single value", other),
        }
    }

    fn evaluate_unchecked(&self, batch: &RecordBatch) -> QuarryResult<Array> {
        match self {
            Self::Column(name) => batch.column_or_err(name).cloned(),
            Self::Literal(scalar) => Array::from_scalar(scalar, batch.num_rows()),
            Self::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = coerce_operands(*op, lhs, rhs, batch.schema())?;
                let lhs = lhs.evaluate_unchecked(batch)?;
                let rhs = rhs.evaluate_unchecked(batch)?;
                match op {
                    BinaryOperator::And => and_kleene(&lhs, &rhs),
                    BinaryOperator::Or => or_kleene(&lhs, &rhs),
                    op => match (op.as_comparison(), op.as_numeric()) {
                        (Some(cmp), _) => compare(&lhs, &rhs, cmp),
                        (_, Some(numeric)) => binary_numeric(&lhs, &rhs, numeric),
                        _ => quarry_bail!("unhandled operator {}", op),
                    },
                }
            }
            Self::Not(child) => not(&child.evaluate_unchecked(batch)?),
            Self::IsNull(child) => is_null(&child.evaluate_unchecked(batch)?),
            Self::Cast(child, dtype) => cast(&child.evaluate_unchecked(batch)?, dtype),
            Self::Aggregate(function, child) => {
                let value = function.evaluate(&child.evaluate_unchecked(batch)?)?;
                Array::from_scalar(&value, batch.num_rows())
            }
            Self::Like(child, pattern) => {
                like(&child.evaluate_unchecked(batch)?, &LikePattern::try_new(pattern)?)
            }
        }
    }

    /// The type of the values the expression produces over rows of `schema`.
    pub fn return_dtype(&self, schema: &Schema) -> QuarryResult<DType> {
        match self {
            Self::Column(name) => Ok(schema.field_or_err(name)?.dtype().clone()),
            Self::Literal(scalar) => Ok(scalar.dtype().clone()),
            Self::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = coerce_operands(*op, lhs, rhs, schema)?;
                let (ldt, rdt) = (lhs.return_dtype(schema)?, rhs.return_dtype(schema)?);
                let nullability = ldt.nullability() | rdt.nullability();
                if op.is_comparison() {
                    return Ok(DType::Bool(nullability));
                }
                if op.is_logical() {
                    if !ldt.is_boolean() {
                        quarry_bail!(TypeError: "{} expects booleans, found {}", op, ldt);
                    }
                    return Ok(DType::Bool(nullability));
                }
                match ldt {
                    DType::Primitive(ptype, _) => {
                        let nullability = if *op == BinaryOperator::Div && ptype.is_int() {
                            Nullability::Nullable
                        } else {
                            nullability
                        };
                        Ok(DType::Primitive(ptype, nullability))
                    }
                    other => quarry_bail!(TypeError: "{} expects numbers, found {}", op, other),
                }
            }
            Self::Not(child) => {
                let dtype = child.return_dtype(schema)?;
                if !dtype.is_boolean() {
                    quarry_bail!(TypeError: "not expects a boolean, found {}", dtype);
                }
                Ok(dtype)
            }
            Self::IsNull(child) => {
                child.return_dtype(schema)?;
                Ok(DType::Bool(Nullability::NonNullable))
            }
            Self::Cast(child, dtype) => {
                let from = child.return_dtype(schema)?;
                if !from.can_cast_to(dtype) {
                    quarry_bail!(TypeError: "no cast is defined from {} to {}", from, dtype);
                }
                Ok(dtype.clone())
            }
            Self::Aggregate(function, child) => function.return_dtype(&child.return_dtype(schema)?),
            Self::Like(child, _) => match child.return_dtype(schema)? {
                DType::Utf8(n) => Ok(DType::Bool(n)),
                other => quarry_bail!(TypeError: "like expects strings, found {}", other),
            },
        }
    }
}

/// Line up the operand types of a binary expression.
///
/// Operands of the same type pass through. A null-typed operand is cast to the other side's
/// type. A literal is converted to the other side's type if that loses nothing. Anything else,
/// including two columns of different widths, is a `TypeMismatch`.
fn coerce_operands<'a>(
    op: BinaryOperator,
    lhs: &'a Expr,
    rhs: &'a Expr,
    schema: &Schema,
) -> QuarryResult<(Cow<'a, Expr>, Cow<'a, Expr>)> {
    let ldt = lhs.return_dtype(schema)?;
    let rdt = rhs.return_dtype(schema)?;
    if ldt.eq_ignore_nullability(&rdt) {
        return Ok((Cow::Borrowed(lhs), Cow::Borrowed(rhs)));
    }
    if rdt == DType::Null {
        let rhs = Expr::Cast(Box::new(rhs.clone()), ldt.as_nullable());
        return Ok((Cow::Borrowed(lhs), Cow::Owned(rhs)));
    }
    if ldt == DType::Null {
        let lhs = Expr::Cast(Box::new(lhs.clone()), rdt.as_nullable());
        return Ok((Cow::Owned(lhs), Cow::Borrowed(rhs)));
    }
    if let Some(scalar) = rhs.as_literal() {
        let coerced = coerce_literal(scalar, &ldt).ok_or_else(|| {
            quarry_err!(
                TypeMismatch: lhs, rdt, ldt,
                "literal {} is not exactly representable",
                scalar
            )
        })?;
        return Ok((Cow::Borrowed(lhs), Cow::Owned(Expr::Literal(coerced))));
    }
    if let Some(scalar) = lhs.as_literal() {
        let coerced = coerce_literal(scalar, &rdt).ok_or_else(|| {
            quarry_err!(
                TypeMismatch: rhs, ldt, rdt,
                "literal {} is not exactly representable",
                scalar
            )
        })?;
        return Ok((Cow::Owned(Expr::Literal(coerced)), Cow::Borrowed(rhs)));
    }
    Err(quarry_err!(
        TypeMismatch: rhs, rdt, ldt,
        "operands of {} must have the same type; cast one side explicitly",
        op
    ))
}

fn coerce_literal(scalar: &Scalar, target: &DType) -> Option<Scalar> {
    if scalar.is_null() {
        return Some(Scalar::null(target.clone()));
    }
    scalar.cast_lossless(&target.as_nonnullable())
}

fn conform(array: Array, dtype: &DType) -> QuarryResult<Array> {
    if array.dtype() == dtype || !dtype.is_nullable() {
        return Ok(array);
    }
    let validity = array.validity().into_nullable();
    with_validity(&array, validity)
}

#[cfg(test)]
mod tests {
    use quarry_array::arrays::{PrimitiveArray, VarBinArray};
    use quarry_array::{IntoArray, RecordBatch};
    use quarry_dtype::{DType, Nullability, PType};
    use quarry_error::ErrorKind;
    use quarry_scalar::Scalar;

    use crate::*;

    fn batch() -> RecordBatch {
        RecordBatch::from_columns(vec![
            ("id", PrimitiveArray::from_iter([1i64, 2, 3, 4]).into_array()),
            ("small", PrimitiveArray::from_iter([1i32, 2, 3, 4]).into_array()),
            (
                "score",
                PrimitiveArray::from_option_iter([Some(0.5f64), None, Some(2.5), Some(4.0)])
                    .into_array(),
            ),
            ("name", VarBinArray::from_strs(["ann", "bob", "al", "cy"]).into_array()),
        ])
        .unwrap()
    }

    #[test]
    fn literal_is_coerced_losslessly() {
        let mask = gt(col("id"), lit(2i32)).evaluate_predicate(&batch()).unwrap();
        assert_eq!(mask.indices(), vec![2, 3]);

        let mask = lt(lit(3u8), col("id")).evaluate_predicate(&batch()).unwrap();
        assert_eq!(mask.indices(), vec![3]);
    }

    #[test]
    fn lossy_literal_is_a_type_mismatch() {
        let err = eq(col("small"), lit(1i64 << 40)).evaluate(&batch()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = eq(col("id"), lit(1.5f64)).evaluate(&batch()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn columns_of_different_widths_are_a_type_mismatch() {
        let err = add(col("id"), col("small")).evaluate(&batch()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("column small"), "{err}");

        let small = cast(col("small"), DType::Primitive(PType::I64, Nullability::NonNullable));
        let widened = add(col("id"), small);
        let result = widened.evaluate(&batch()).unwrap();
        assert_eq!(result.scalar_at(3).unwrap(), Scalar::from(8i64));
    }

    #[test]
    fn nulls_propagate_and_predicates_drop_them() {
        let batch = batch();
        let doubled = mul(col("score"), lit(2.0f64)).evaluate(&batch).unwrap();
        assert!(doubled.scalar_at(1).unwrap().is_null());
        assert_eq!(doubled.scalar_at(3).unwrap(), Scalar::from(Some(8.0f64)));

        let mask = gt(col("score"), lit(1.0f64)).evaluate_predicate(&batch).unwrap();
        assert_eq!(mask.indices(), vec![2, 3]);
        let mask = is_null(col("score")).evaluate_predicate(&batch).unwrap();
        assert_eq!(mask.indices(), vec![1]);
    }

    #[test]
    fn kleene_logic() {
        let batch = batch();
        let predicate = or(gt(col("score"), lit(1.0f64)), eq(col("id"), lit(2i64)));
        assert_eq!(predicate.evaluate_predicate(&batch).unwrap().indices(), vec![1, 2, 3]);
        let predicate = and(not(is_null(col("score"))), like(col("name"), "a%"));
        assert_eq!(predicate.evaluate_predicate(&batch).unwrap().indices(), vec![0, 2]);
    }

    #[test]
    fn integer_division_is_nullable() {
        let batch = batch();
        let expr = div(col("id"), lit(0i64));
        assert_eq!(
            expr.return_dtype(batch.schema()).unwrap(),
            DType::Primitive(PType::I64, Nullability::Nullable)
        );
        let result = expr.evaluate(&batch).unwrap();
        assert_eq!(result.dtype(), &DType::Primitive(PType::I64, Nullability::Nullable));
        assert_eq!(result.null_count(), 4);

        let result = div(col("id"), lit(1i64)).evaluate(&batch).unwrap();
        assert_eq!(result.dtype(), &DType::Primitive(PType::I64, Nullability::Nullable));
        assert_eq!(result.null_count(), 0);
    }

    #[test]
    fn aggregates_reduce() {
        let batch = batch();
        assert_eq!(sum(col("id")).evaluate_scalar(&batch).unwrap(), Scalar::from(Some(10i64)));
        assert_eq!(count(col("score")).evaluate_scalar(&batch).unwrap(), Scalar::from(3u64));
        let broadcast = max(col("small")).evaluate(&batch).unwrap();
        assert_eq!(broadcast.len(), 4);
        assert_eq!(broadcast.scalar_at(0).unwrap(), Scalar::from(Some(4i32)));
        assert!(col("id").evaluate_scalar(&batch).is_err());
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let err = col("nope").evaluate(&batch()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn null_literal_takes_the_column_type() {
        let null = Expr::Literal(Scalar::null(DType::Null));
        let result = eq(col("id"), null).evaluate(&batch()).unwrap();
        assert_eq!(result.null_count(), 4);
    }
}
