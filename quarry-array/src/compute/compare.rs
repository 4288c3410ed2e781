use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use arrow_buffer::BooleanBuffer;
use quarry_dtype::{NativePType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::BoolArray;
use crate::{Array, IntoArray};

/// A comparison between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl Operator {
    /// Whether an ordering between two values satisfies the comparison.
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::NotEq => ordering.is_ne(),
            Self::Gt => ordering.is_gt(),
            Self::Gte => ordering.is_ge(),
            Self::Lt => ordering.is_lt(),
            Self::Lte => ordering.is_le(),
        }
    }

    /// The logical complement: `a op b` is false exactly when `a op.inverse() b` is true.
    pub fn inverse(self) -> Self {
        match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Gte => Self::Lt,
            Self::Lt => Self::Gte,
            Self::Lte => Self::Gt,
        }
    }

    /// The operator with its operands swapped: `a op b` equals `b op.swap() a`.
    pub fn swap(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::NotEq => Self::NotEq,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        };
        Display::fmt(display, f)
    }
}

/// A function ordering slot `i` of one array against slot `j` of another, ignoring validity.
pub type Comparator<'a> = Box<dyn Fn(usize, usize) -> Ordering + 'a>;

/// Build a [`Comparator`] between two arrays of the same type (ignoring nullability).
///
/// Floats use a total order in which NaN sorts after every other value.
pub fn comparator<'a>(lhs: &'a Array, rhs: &'a Array) -> QuarryResult<Comparator<'a>> {
    if !lhs.dtype().eq_ignore_nullability(rhs.dtype()) {
        quarry_bail!(
            ComputeError: "cannot compare {} with {}",
            lhs.dtype(),
            rhs.dtype()
        );
    }
    let cmp: Comparator<'a> = match (lhs, rhs) {
        (Array::Null(_), Array::Null(_)) => Box::new(|_, _| Ordering::Equal),
        (Array::Bool(a), Array::Bool(b)) => Box::new(move |i, j| a.value(i).cmp(&b.value(j))),
        (Array::Primitive(a), Array::Primitive(b)) => {
            match_each_native_ptype!(a.ptype(), |$T| {
                let (x, y) = (a.as_slice::<$T>(), b.as_slice::<$T>());
                let cmp: Comparator<'a> = Box::new(move |i, j| x[i].total_compare(y[j]));
                cmp
            })
        }
        (Array::Temporal(a), Array::Temporal(b)) => {
            match_each_native_ptype!(a.storage().ptype(), |$T| {
                let (x, y) = (a.storage().as_slice::<$T>(), b.storage().as_slice::<$T>());
                let cmp: Comparator<'a> = Box::new(move |i, j| x[i].total_compare(y[j]));
                cmp
            })
        }
        (Array::VarBin(a), Array::VarBin(b)) => {
            Box::new(move |i, j| a.bytes_at(i).cmp(b.bytes_at(j)))
        }
        (Array::FixedSizeBinary(a), Array::FixedSizeBinary(b)) => {
            Box::new(move |i, j| a.bytes_at(i).cmp(b.bytes_at(j)))
        }
        _ => quarry_bail!(
            ComputeError: "cannot compare {} with {}",
            lhs.dtype(),
            rhs.dtype()
        ),
    };
    Ok(cmp)
}

/// Compare two arrays slot by slot. A slot is null when either input is null.
pub fn compare(lhs: &Array, rhs: &Array, operator: Operator) -> QuarryResult<Array> {
    if lhs.len() != rhs.len() {
        quarry_bail!(
            ComputeError: "cannot compare arrays of lengths {} and {}",
            lhs.len(),
            rhs.len()
        );
    }
    let cmp = comparator(lhs, rhs)?;
    let values: BooleanBuffer = (0..lhs.len())
        .map(|idx| operator.matches(cmp(idx, idx)))
        .collect();
    let validity = lhs.validity().and(&rhs.validity());
    Ok(BoolArray::try_new(values, validity)?.into_array())
}

#[cfg(test)]
mod tests {
    use quarry_scalar::Scalar;
    use rstest::rstest;

    use super::*;
    use crate::arrays::{PrimitiveArray, VarBinArray};

    #[rstest]
    #[case(Operator::Eq, [false, true, false])]
    #[case(Operator::NotEq, [true, false, true])]
    #[case(Operator::Lt, [true, false, false])]
    #[case(Operator::Gte, [false, true, true])]
    fn compare_primitives(#[case] op: Operator, #[case] expected: [bool; 3]) {
        let lhs = PrimitiveArray::from_iter([1i32, 2, 3]).into_array();
        let rhs = PrimitiveArray::from_iter([2i32, 2, 2]).into_array();
        let result = compare(&lhs, &rhs, op).unwrap();
        let bools = result.as_bool().unwrap();
        assert_eq!((0..3).map(|i| bools.value(i)).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn nulls_propagate() {
        let lhs = PrimitiveArray::from_option_iter([Some(1i64), None]).into_array();
        let rhs = PrimitiveArray::from_iter([1i64, 1]).into_array();
        let result = compare(&lhs, &rhs, Operator::Eq).unwrap();
        assert_eq!(result.scalar_at(0).unwrap(), Scalar::bool(true, quarry_dtype::Nullability::Nullable));
        assert!(result.scalar_at(1).unwrap().is_null());
    }

    #[test]
    fn strings_compare_bytewise() {
        let lhs = VarBinArray::from_strs(["apple", "b"]).into_array();
        let rhs = VarBinArray::from_strs(["banana", "a"]).into_array();
        let result = compare(&lhs, &rhs, Operator::Lt).unwrap();
        let bools = result.as_bool().unwrap();
        assert!(bools.value(0));
        assert!(!bools.value(1));
    }

    #[test]
    fn mismatched_types_fail() {
        let lhs = PrimitiveArray::from_iter([1i32]).into_array();
        let rhs = PrimitiveArray::from_iter([1i64]).into_array();
        assert!(compare(&lhs, &rhs, Operator::Eq).is_err());
    }

    #[test]
    fn operator_algebra() {
        for op in [Operator::Eq, Operator::NotEq, Operator::Gt, Operator::Gte, Operator::Lt, Operator::Lte] {
            for ord in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_eq!(op.matches(ord), !op.inverse().matches(ord));
                assert_eq!(op.matches(ord), op.swap().matches(ord.reverse()));
            }
        }
    }
}
