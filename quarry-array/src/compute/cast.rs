use num_traits::NumCast;
use quarry_buffer::BufferMut;
use quarry_dtype::{DType, NativePType, PType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};

use crate::arrays::{PrimitiveArray, TemporalArray};
use crate::builder::ArrayBuilder;
use crate::compute::with_validity;
use crate::validity::Validity;
use crate::{Array, IntoArray};

/// Convert every value of `array` to `dtype`.
///
/// Fails with `TypeError` when the cast is not defined, when a value is not representable in
/// the target type, or when the array holds nulls and the target is non-nullable.
pub fn cast(array: &Array, dtype: &DType) -> QuarryResult<Array> {
    if array.dtype() == dtype {
        return Ok(array.clone());
    }
    if !dtype.is_nullable() && array.null_count() > 0 {
        quarry_bail!(
            TypeError: "cannot cast {} nulls to non-nullable {}",
            array.null_count(),
            dtype
        );
    }
    if !array.dtype().can_cast_to(dtype) {
        quarry_bail!(TypeError: "no cast is defined from {} to {}", array.dtype(), dtype);
    }
    let validity = match dtype.is_nullable() {
        true => array.validity().into_nullable(),
        false => Validity::NonNullable,
    };
    if array.dtype().eq_ignore_nullability(dtype) {
        return with_validity(array, validity);
    }

    match (array, dtype) {
        (Array::Primitive(a), DType::Primitive(ptype, _)) => {
            let a = a.with_validity(validity)?;
            match_each_native_ptype!(a.ptype(), |$S| { cast_from::<$S>(&a, *ptype) })
        }
        (Array::Primitive(a), DType::Temporal(temporal, _)) => {
            let storage = cast(
                &a.clone().into_array(),
                &DType::Primitive(temporal.storage_ptype(), dtype.nullability()),
            )?;
            let Array::Primitive(storage) = storage else {
                quarry_bail!(TypeError: "expected primitive storage for {}", dtype);
            };
            Ok(TemporalArray::try_new(temporal.clone(), storage)?.into_array())
        }
        (Array::Temporal(a), DType::Primitive(..)) => {
            cast(&a.storage().clone().into_array(), dtype)
        }
        _ => {
            let mut builder = ArrayBuilder::with_capacity(dtype.clone(), array.len());
            for scalar in array.scalars() {
                builder.append_scalar(&scalar?.cast(dtype)?)?;
            }
            builder.finish()
        }
    }
}

fn cast_from<S: NativePType>(array: &PrimitiveArray, ptype: PType) -> QuarryResult<Array> {
    match_each_native_ptype!(ptype, |$T| {
        cast_primitive::<S, $T>(array).map(IntoArray::into_array)
    })
}

fn cast_primitive<S: NativePType, T: NativePType>(
    array: &PrimitiveArray,
) -> QuarryResult<PrimitiveArray> {
    let values = array.as_slice::<S>();
    let mut cast = BufferMut::<T>::with_capacity(values.len());
    for (idx, &value) in values.iter().enumerate() {
        if array.validity().is_null(idx) {
            cast.push(T::default());
            continue;
        }
        let converted = <T as NumCast>::from(value)
            .filter(|c: &T| !(S::PTYPE.is_float() && T::PTYPE.is_int()) || fraction_free(value, *c))
            .ok_or_else(|| {
                quarry_err!(TypeError: "value {} does not fit in {}", value, T::PTYPE)
            })?;
        cast.push(converted);
    }
    Ok(PrimitiveArray::new(cast.freeze(), array.validity().clone()))
}

/// Float to integer casts reject values with a fractional part.
fn fraction_free<S: NativePType, T: NativePType>(value: S, converted: T) -> bool {
    match (value.to_f64(), converted.to_f64()) {
        (Some(v), Some(c)) => v == c,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::Nullability::{NonNullable, Nullable};
    use quarry_dtype::{TemporalType, TimeUnit};
    use quarry_error::ErrorKind;
    use quarry_scalar::Scalar;

    use super::*;
    use crate::arrays::{BoolArray, VarBinArray};

    #[test]
    fn widens_integers() {
        let array = PrimitiveArray::from_option_iter([Some(1i32), None, Some(-3)]).into_array();
        let cast = cast(&array, &DType::Primitive(PType::I64, Nullable)).unwrap();
        assert_eq!(cast.dtype(), &DType::Primitive(PType::I64, Nullable));
        assert_eq!(cast.scalar_at(2).unwrap(), Scalar::from(Some(-3i64)));
        assert!(cast.scalar_at(1).unwrap().is_null());
    }

    #[test]
    fn overflow_is_a_type_error() {
        let array = PrimitiveArray::from_iter([1i64, 1 << 40]).into_array();
        let err = cast(&array, &DType::Primitive(PType::I32, NonNullable)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn fractional_floats_do_not_become_integers() {
        let array = PrimitiveArray::from_iter([1.0f64, 2.5]).into_array();
        assert!(cast(&array, &DType::Primitive(PType::I64, NonNullable)).is_err());
        let whole = PrimitiveArray::from_iter([1.0f64, 2.0]).into_array();
        assert_eq!(
            cast(&whole, &DType::Primitive(PType::I64, NonNullable)).unwrap(),
            PrimitiveArray::from_iter([1i64, 2]).into_array()
        );
    }

    #[test]
    fn nulls_block_non_nullable_targets() {
        let array = PrimitiveArray::from_option_iter([Some(1i32), None]).into_array();
        let err = cast(&array, &DType::Primitive(PType::I32, NonNullable)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn nullability_only() {
        let array = PrimitiveArray::from_iter([1i32, 2]).into_array();
        let cast = cast(&array, &DType::Primitive(PType::I32, Nullable)).unwrap();
        assert_eq!(cast.dtype(), &DType::Primitive(PType::I32, Nullable));
        assert_eq!(cast.null_count(), 0);
    }

    #[test]
    fn through_scalars() {
        let bools = BoolArray::from_iter([true, false]).into_array();
        assert_eq!(
            cast(&bools, &DType::Primitive(PType::U8, NonNullable)).unwrap(),
            PrimitiveArray::from_iter([1u8, 0]).into_array()
        );
        let strings = VarBinArray::from_strs(["a", "bc"]).into_array();
        let binary = cast(&strings, &DType::Binary(NonNullable)).unwrap();
        assert_eq!(binary.dtype(), &DType::Binary(NonNullable));
        assert_eq!(binary.len(), 2);
    }

    #[test]
    fn integers_to_timestamps() {
        let array = PrimitiveArray::from_iter([1i32, 2]).into_array();
        let dtype = DType::Temporal(TemporalType::Timestamp(TimeUnit::Ms, None), NonNullable);
        let cast = cast(&array, &dtype).unwrap();
        assert_eq!(cast.dtype(), &dtype);
        assert_eq!(cast.scalar_at(1).unwrap(), Scalar::timestamp(2, TimeUnit::Ms, None, NonNullable));
    }
}
