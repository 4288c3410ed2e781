use std::fmt::{Display, Formatter};

use quarry_buffer::BufferMut;
use quarry_dtype::{DType, NativePType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::PrimitiveArray;
use crate::validity::Validity;
use crate::{Array, IntoArray};

/// An arithmetic operator over primitive arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl Display for NumericOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        Display::fmt(display, f)
    }
}

/// The outcome of applying an operator to one pair of values.
enum Outcome<T> {
    Value(T),
    Null,
    Overflow,
}

trait CheckedArith: NativePType {
    fn apply(self, rhs: Self, op: NumericOperator) -> Outcome<Self>;
}

macro_rules! int_arith {
    ($($T:ty),*) => {
        $(
            impl CheckedArith for $T {
                fn apply(self, rhs: Self, op: NumericOperator) -> Outcome<Self> {
                    let result = match op {
                        NumericOperator::Add => self.checked_add(rhs),
                        NumericOperator::Sub => self.checked_sub(rhs),
                        NumericOperator::Mul => self.checked_mul(rhs),
                        NumericOperator::Div if rhs == 0 => return Outcome::Null,
                        NumericOperator::Div => self.checked_div(rhs),
                    };
                    result.map_or(Outcome::Overflow, Outcome::Value)
                }
            }
        )*
    };
}

macro_rules! float_arith {
    ($($T:ty),*) => {
        $(
            impl CheckedArith for $T {
                fn apply(self, rhs: Self, op: NumericOperator) -> Outcome<Self> {
                    Outcome::Value(match op {
                        NumericOperator::Add => self + rhs,
                        NumericOperator::Sub => self - rhs,
                        NumericOperator::Mul => self * rhs,
                        NumericOperator::Div => self / rhs,
                    })
                }
            }
        )*
    };
}

int_arith!(u8, u16, u32, u64, i8, i16, i32, i64);
float_arith!(f32, f64);

/// Apply `op` slot by slot to two primitive arrays of the same primitive type.
///
/// Integer overflow fails with `ComputeError`. Integer division by zero yields null. A slot
/// is null when either input is null.
pub fn binary_numeric(lhs: &Array, rhs: &Array, op: NumericOperator) -> QuarryResult<Array> {
    if lhs.len() != rhs.len() {
        quarry_bail!(
            ComputeError: "operands of {} differ in length: {} and {}",
            op,
            lhs.len(),
            rhs.len()
        );
    }
    let (Array::Primitive(l), Array::Primitive(r)) = (lhs, rhs) else {
        quarry_bail!(
            ComputeError: "cannot apply {} to {} and {}",
            op,
            lhs.dtype(),
            rhs.dtype()
        );
    };
    if l.ptype() != r.ptype() {
        quarry_bail!(
            ComputeError: "cannot apply {} to {} and {}",
            op,
            DType::from(l.ptype()),
            DType::from(r.ptype())
        );
    }
    let validity = l.validity().and(r.validity());
    match_each_native_ptype!(l.ptype(), |$T| {
        numeric_kernel::<$T>(l, r, op, validity).map(IntoArray::into_array)
    })
}

fn numeric_kernel<T: CheckedArith>(
    lhs: &PrimitiveArray,
    rhs: &PrimitiveArray,
    op: NumericOperator,
    validity: Validity,
) -> QuarryResult<PrimitiveArray> {
    let (l, r) = (lhs.as_slice::<T>(), rhs.as_slice::<T>());
    let mut values = BufferMut::<T>::with_capacity(l.len());
    let mut divided_by_zero = Vec::new();
    for (idx, (&a, &b)) in l.iter().zip(r).enumerate() {
        if !validity.is_valid(idx) {
            values.push(T::zero());
            continue;
        }
        match a.apply(b, op) {
            Outcome::Value(v) => values.push(v),
            Outcome::Null => {
                values.push(T::zero());
                divided_by_zero.push(idx);
            }
            Outcome::Overflow => {
                quarry_bail!(ComputeError: "overflow computing {} {} {}", a, op, b)
            }
        }
    }
    let validity = if divided_by_zero.is_empty() {
        validity
    } else {
        (0..l.len())
            .map(|idx| validity.is_valid(idx) && !divided_by_zero.contains(&idx))
            .collect::<Validity>()
            .into_nullable()
    };
    Ok(PrimitiveArray::new(values.freeze(), validity))
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;
    use quarry_scalar::Scalar;

    use super::*;

    #[test]
    fn adds_with_nulls() {
        let lhs = PrimitiveArray::from_option_iter([Some(1i64), None, Some(3)]).into_array();
        let rhs = PrimitiveArray::from_iter([10i64, 20, 30]).into_array();
        let sum = binary_numeric(&lhs, &rhs, NumericOperator::Add).unwrap();
        assert_eq!(sum.scalar_at(0).unwrap(), Scalar::from(Some(11i64)));
        assert!(sum.scalar_at(1).unwrap().is_null());
        assert_eq!(sum.scalar_at(2).unwrap(), Scalar::from(Some(33i64)));
    }

    #[test]
    fn overflow_is_an_error() {
        let lhs = PrimitiveArray::from_iter([i8::MAX]).into_array();
        let rhs = PrimitiveArray::from_iter([1i8]).into_array();
        let err = binary_numeric(&lhs, &rhs, NumericOperator::Add).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compute);
    }

    #[test]
    fn integer_division_by_zero_is_null() {
        let lhs = PrimitiveArray::from_iter([6u32, 7]).into_array();
        let rhs = PrimitiveArray::from_iter([3u32, 0]).into_array();
        let quotient = binary_numeric(&lhs, &rhs, NumericOperator::Div).unwrap();
        assert_eq!(quotient.scalar_at(0).unwrap(), Scalar::from(Some(2u32)));
        assert!(quotient.scalar_at(1).unwrap().is_null());
    }

    #[test]
    fn mixed_ptypes_are_rejected() {
        let lhs = PrimitiveArray::from_iter([1i32]).into_array();
        let rhs = PrimitiveArray::from_iter([1.0f64]).into_array();
        assert!(binary_numeric(&lhs, &rhs, NumericOperator::Mul).is_err());
    }
}
