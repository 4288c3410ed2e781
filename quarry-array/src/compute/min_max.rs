use quarry_dtype::{NativePType, match_each_native_ptype};
use quarry_error::QuarryResult;
use quarry_scalar::Scalar;

use crate::Array;
use crate::compute::comparator;

/// The smallest and largest valid value of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinMaxResult {
    /// The smallest value.
    pub min: Scalar,
    /// The largest value.
    pub max: Scalar,
}

/// Summary statistics of an array, as recorded in file page headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayStatistics {
    /// The smallest valid value, absent when every slot is null.
    pub min: Option<Scalar>,
    /// The largest valid value, absent when every slot is null.
    pub max: Option<Scalar>,
    /// The number of null slots.
    pub null_count: usize,
}

/// The minimum and maximum of the valid values, or `None` when there are none.
///
/// NaN is ignored.
pub fn min_max(array: &Array) -> QuarryResult<Option<MinMaxResult>> {
    if matches!(array, Array::Null(_)) {
        return Ok(None);
    }
    let validity = array.validity();
    let nan = nan_mask(array);
    let mut candidates = (0..array.len())
        .filter(|&idx| validity.is_valid(idx) && !nan.as_ref().is_some_and(|n| n[idx]));
    let Some(first) = candidates.next() else {
        return Ok(None);
    };
    let cmp = comparator(array, array)?;
    let (min, max) = candidates.fold((first, first), |(min, max), idx| {
        (
            if cmp(idx, min).is_lt() { idx } else { min },
            if cmp(idx, max).is_gt() { idx } else { max },
        )
    });
    Ok(Some(MinMaxResult {
        min: array.scalar_at(min)?,
        max: array.scalar_at(max)?,
    }))
}

fn nan_mask(array: &Array) -> Option<Vec<bool>> {
    match array {
        Array::Primitive(p) if p.ptype().is_float() => Some(match_each_native_ptype!(p.ptype(), |$T| {
            p.as_slice::<$T>().iter().map(|v| v.is_nan()).collect()
        })),
        _ => None,
    }
}

/// Compute the statistics of an array.
///
/// Float arrays holding a valid NaN get no bounds, since NaN orders above every value.
pub fn statistics(array: &Array) -> QuarryResult<ArrayStatistics> {
    let validity = array.validity();
    let has_nan = nan_mask(array)
        .is_some_and(|nan| nan.iter().enumerate().any(|(idx, &n)| n && validity.is_valid(idx)));
    if has_nan {
        return Ok(ArrayStatistics {
            min: None,
            max: None,
            null_count: array.null_count(),
        });
    }
    let min_max = min_max(array)?;
    Ok(ArrayStatistics {
        min: min_max.as_ref().map(|m| m.min.clone()),
        max: min_max.map(|m| m.max),
        null_count: array.null_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntoArray;
    use crate::arrays::{NullArray, PrimitiveArray, VarBinArray};

    #[test]
    fn ignores_nulls_and_nan() {
        let array =
            PrimitiveArray::from_option_iter([Some(3.0f64), None, Some(f64::NAN), Some(-1.0)])
                .into_array();
        let result = min_max(&array).unwrap().unwrap();
        assert_eq!(result.min, Scalar::from(Some(-1.0f64)));
        assert_eq!(result.max, Scalar::from(Some(3.0f64)));
    }

    #[test]
    fn nan_drops_bounds() {
        let array = PrimitiveArray::from_option_iter([Some(1.0f64), Some(f64::NAN), None]).into_array();
        let stats = statistics(&array).unwrap();
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.null_count, 1);
    }

    #[test]
    fn strings() {
        let array = VarBinArray::from_strs(["pear", "apple", "zucchini"]).into_array();
        let stats = statistics(&array).unwrap();
        assert_eq!(stats.min, Some(Scalar::from("apple")));
        assert_eq!(stats.max, Some(Scalar::from("zucchini")));
        assert_eq!(stats.null_count, 0);
    }

    #[test]
    fn all_null() {
        let stats = statistics(&NullArray::new(3).into_array()).unwrap();
        assert_eq!(stats.min, None);
        assert_eq!(stats.null_count, 3);
    }
}
