use arrow_buffer::BooleanBuffer;
use quarry_buffer::{Buffer, BufferMut};
use quarry_dtype::match_each_native_ptype;
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, PrimitiveArray, TemporalArray, VarBinArray,
};
use crate::compute::with_validity;
use crate::{Array, IntoArray};

/// The values at `indices`, in the order given. Indices may repeat.
pub fn take(array: &Array, indices: &[usize]) -> QuarryResult<Array> {
    if let Some(&idx) = indices.iter().find(|&&idx| idx >= array.len()) {
        quarry_bail!(OutOfBounds: idx, 0, array.len());
    }
    let validity = array.validity();

    Ok(match array {
        Array::Null(_) => NullArray::new(indices.len()).into_array(),
        Array::Bool(a) => BoolArray::try_new(
            indices.iter().map(|&idx| a.value(idx)).collect::<BooleanBuffer>(),
            a.validity().take(indices),
        )?
        .into_array(),
        Array::Primitive(a) => take_primitive(a, indices)?.into_array(),
        Array::VarBin(a) => {
            let mut offsets = BufferMut::<i32>::with_capacity(indices.len() + 1);
            let mut bytes = BufferMut::<u8>::empty();
            offsets.push(0);
            for &idx in indices {
                bytes.extend_from_slice(a.bytes_at(idx));
                offsets.push(bytes.len() as i32);
            }
            VarBinArray::new_unchecked(
                offsets.freeze(),
                bytes.freeze(),
                a.dtype().clone(),
                validity.take(indices),
            )
            .into_array()
        }
        Array::FixedSizeBinary(a) => {
            let mut bytes = BufferMut::<u8>::with_capacity(indices.len() * a.width() as usize);
            for &idx in indices {
                bytes.extend_from_slice(a.bytes_at(idx));
            }
            FixedSizeBinaryArray::try_new(a.width(), bytes.freeze(), validity.take(indices))?
                .into_array()
        }
        Array::Temporal(a) => {
            TemporalArray::try_new(a.temporal_type().clone(), take_primitive(a.storage(), indices)?)?
                .into_array()
        }
    })
}

fn take_primitive(array: &PrimitiveArray, indices: &[usize]) -> QuarryResult<PrimitiveArray> {
    let validity = array.validity().take(indices);
    Ok(match_each_native_ptype!(array.ptype(), |$T| {
        let values = array.as_slice::<$T>();
        PrimitiveArray::new(
            indices.iter().map(|&idx| values[idx]).collect::<Buffer<$T>>(),
            validity,
        )
    }))
}

/// The values at `indices`, where a missing index produces a null. The result is nullable.
pub fn take_opt(array: &Array, indices: &[Option<usize>]) -> QuarryResult<Array> {
    if array.is_empty() {
        if let Some(idx) = indices.iter().flatten().next() {
            quarry_bail!(OutOfBounds: *idx, 0, 0);
        }
        return Array::nulls(array.dtype(), indices.len());
    }
    let dense: Vec<usize> = indices.iter().map(|idx| idx.unwrap_or(0)).collect();
    let taken = take(array, &dense)?;
    with_validity(&taken, array.validity().take_opt(indices))
}

#[cfg(test)]
mod tests {
    use quarry_scalar::Scalar;

    use super::*;

    #[test]
    fn take_strings() {
        let array = VarBinArray::from_strs(["a", "bb", "ccc"]).into_array();
        let taken = take(&array, &[2, 0, 2]).unwrap();
        assert_eq!(taken, VarBinArray::from_strs(["ccc", "a", "ccc"]).into_array());
        assert!(take(&array, &[3]).is_err());
    }

    #[test]
    fn take_opt_fills_nulls() {
        let array = PrimitiveArray::from_iter([1i32, 2, 3]).into_array();
        let taken = take_opt(&array, &[Some(2), None, Some(0)]).unwrap();
        assert_eq!(taken.scalar_at(0).unwrap(), Scalar::from(Some(3i32)));
        assert!(taken.scalar_at(1).unwrap().is_null());
        assert_eq!(taken.null_count(), 1);
    }
}
