use num_traits::ToPrimitive;
use quarry_dtype::{DType, NativePType, Nullability, PType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

use crate::Array;
use crate::arrays::PrimitiveArray;
use crate::compute::min_max;

/// The number of valid slots, as a non-nullable `u64`.
pub fn count(array: &Array) -> Scalar {
    Scalar::primitive((array.len() - array.null_count()) as u64, Nullability::NonNullable)
}

/// The number of slots including nulls, as a non-nullable `u64`.
pub fn count_all(array: &Array) -> Scalar {
    Scalar::primitive(array.len() as u64, Nullability::NonNullable)
}

/// The type [`sum`] produces for an input type.
pub fn sum_dtype(dtype: &DType) -> QuarryResult<DType> {
    let ptype = match dtype {
        DType::Bool(_) => PType::U64,
        DType::Primitive(p, _) if p.is_unsigned_int() => PType::U64,
        DType::Primitive(p, _) if p.is_signed_int() => PType::I64,
        DType::Primitive(..) => PType::F64,
        other => quarry_bail!(ComputeError: "cannot sum values of {}", other),
    };
    Ok(DType::Primitive(ptype, Nullability::Nullable))
}

/// The sum of the valid values, or null when there are none.
///
/// Signed integers sum into `i64`, unsigned integers and booleans into `u64`, floats into
/// `f64`. Integer overflow fails with `ComputeError`.
pub fn sum(array: &Array) -> QuarryResult<Scalar> {
    let dtype = sum_dtype(array.dtype())?;
    let validity = array.validity();
    let valid = (0..array.len()).filter(|&i| validity.is_valid(i)).collect::<Vec<_>>();
    if valid.is_empty() {
        return Ok(Scalar::null(dtype));
    }
    match array {
        Array::Bool(a) => Ok(Scalar::primitive(
            valid.iter().filter(|&&i| a.value(i)).count() as u64,
            Nullability::Nullable,
        )),
        Array::Primitive(a) => match_each_native_ptype!(a.ptype(), |$T| {
            sum_primitive::<$T>(a, &valid)
        }),
        other => quarry_bail!(ComputeError: "cannot sum values of {}", other.dtype()),
    }
}

fn sum_primitive<T: NativePType>(array: &PrimitiveArray, valid: &[usize]) -> QuarryResult<Scalar> {
    let values = array.as_slice::<T>();
    let overflow = || quarry_err!(ComputeError: "overflow summing {} values", T::PTYPE);
    if T::PTYPE.is_float() {
        let total: f64 = valid.iter().filter_map(|&i| values[i].to_f64()).sum();
        return Ok(Scalar::primitive(total, Nullability::Nullable));
    }
    if T::PTYPE.is_unsigned_int() {
        let mut total = 0u64;
        for &i in valid {
            let v = values[i].to_u64().ok_or_else(overflow)?;
            total = total.checked_add(v).ok_or_else(overflow)?;
        }
        return Ok(Scalar::primitive(total, Nullability::Nullable));
    }
    let mut total = 0i64;
    for &i in valid {
        let v = values[i].to_i64().ok_or_else(overflow)?;
        total = total.checked_add(v).ok_or_else(overflow)?;
    }
    Ok(Scalar::primitive(total, Nullability::Nullable))
}

fn valid_f64s(array: &Array) -> QuarryResult<Vec<f64>> {
    let Array::Primitive(a) = array else {
        quarry_bail!(ComputeError: "expected numeric values, found {}", array.dtype());
    };
    Ok(match_each_native_ptype!(a.ptype(), |$T| {
        let values = a.as_slice::<$T>();
        (0..a.len())
            .filter(|&i| a.validity().is_valid(i))
            .filter_map(|i| values[i].to_f64())
            .collect()
    }))
}

/// The arithmetic mean of the valid values as `f64`, or null when there are none.
pub fn mean(array: &Array) -> QuarryResult<Scalar> {
    let values = valid_f64s(array)?;
    if values.is_empty() {
        return Ok(Scalar::null(DType::Primitive(PType::F64, Nullability::Nullable)));
    }
    let total: f64 = values.iter().sum();
    Ok(Scalar::primitive(total / values.len() as f64, Nullability::Nullable))
}

/// The median of the valid values as `f64`, averaging the two middle values for an even count.
pub fn median(array: &Array) -> QuarryResult<Scalar> {
    let mut values = valid_f64s(array)?;
    if values.is_empty() {
        return Ok(Scalar::null(DType::Primitive(PType::F64, Nullability::Nullable)));
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Ok(Scalar::primitive(median, Nullability::Nullable))
}

/// The smallest valid value, or a null of the (nullable) input type when there is none.
pub fn min(array: &Array) -> QuarryResult<Scalar> {
    Ok(match min_max(array)? {
        Some(result) => result.min.into_nullable(),
        None => Scalar::null(array.dtype().clone()),
    })
}

/// The largest valid value, or a null of the (nullable) input type when there is none.
pub fn max(array: &Array) -> QuarryResult<Scalar> {
    Ok(match min_max(array)? {
        Some(result) => result.max.into_nullable(),
        None => Scalar::null(array.dtype().clone()),
    })
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::IntoArray;
    use crate::arrays::VarBinArray;

    #[test]
    fn sums_by_family() {
        let ints = PrimitiveArray::from_option_iter([Some(-2i8), None, Some(5)]).into_array();
        assert_eq!(sum(&ints).unwrap(), Scalar::from(Some(3i64)));
        let uints = PrimitiveArray::from_iter([1u16, 2, 3]).into_array();
        assert_eq!(sum(&uints).unwrap(), Scalar::from(Some(6u64)));
        let floats = PrimitiveArray::from_iter([0.5f32, 0.25]).into_array();
        assert_eq!(sum(&floats).unwrap(), Scalar::from(Some(0.75f64)));
    }

    #[test]
    fn empty_sum_is_null() {
        let nulls = PrimitiveArray::from_option_iter([None::<i32>, None]).into_array();
        assert!(sum(&nulls).unwrap().is_null());
        assert!(mean(&nulls).unwrap().is_null());
    }

    #[test]
    fn sum_overflow() {
        let array = PrimitiveArray::from_iter([i64::MAX, 1]).into_array();
        assert_eq!(sum(&array).unwrap_err().kind(), ErrorKind::Compute);
    }

    #[test]
    fn counts() {
        let array = VarBinArray::from_option_strs([Some("a"), None, Some("b")]).into_array();
        assert_eq!(count(&array), Scalar::from(2u64));
        assert_eq!(count_all(&array), Scalar::from(3u64));
    }

    #[test]
    fn mean_and_median() {
        let array = PrimitiveArray::from_iter([4i32, 1, 3, 2]).into_array();
        assert_eq!(mean(&array).unwrap(), Scalar::from(Some(2.5f64)));
        assert_eq!(median(&array).unwrap(), Scalar::from(Some(2.5f64)));
        let odd = PrimitiveArray::from_iter([9u8, 1, 5]).into_array();
        assert_eq!(median(&odd).unwrap(), Scalar::from(Some(5.0f64)));
    }

    #[test]
    fn min_and_max_are_nullable() {
        let array = PrimitiveArray::from_iter([3i32, 1, 2]).into_array();
        assert_eq!(min(&array).unwrap(), Scalar::from(Some(1i32)));
        assert_eq!(max(&array).unwrap(), Scalar::from(Some(3i32)));
    }
}
