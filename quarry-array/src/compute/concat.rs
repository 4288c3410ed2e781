use arrow_buffer::BooleanBufferBuilder;
use itertools::Itertools;
use quarry_buffer::BufferMut;
use quarry_dtype::{DType, Nullability};
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, PrimitiveArray, TemporalArray, VarBinArray,
};
use crate::validity::Validity;
use crate::{Array, IntoArray};

/// Concatenate arrays of one type (ignoring nullability) into a single array.
///
/// The result is nullable if any input is.
pub fn concat(arrays: &[Array]) -> QuarryResult<Array> {
    let Some(first) = arrays.first() else {
        quarry_bail!("cannot concatenate zero arrays");
    };
    if let Some(other) = arrays
        .iter()
        .find(|a| !a.dtype().eq_ignore_nullability(first.dtype()))
    {
        quarry_bail!(
            TypeError: "cannot concatenate {} with {}",
            first.dtype(),
            other.dtype()
        );
    }
    if arrays.len() == 1 {
        return Ok(first.clone());
    }
    let nullability = arrays
        .iter()
        .map(|a| a.dtype().nullability())
        .fold(Nullability::NonNullable, |acc, n| acc | n);
    let dtype = first.dtype().with_nullability(nullability);
    let total: usize = arrays.iter().map(Array::len).sum();
    let validity = Validity::concat(
        &arrays.iter().map(|a| (a.validity(), a.len())).collect_vec(),
        nullability,
    );

    Ok(match &dtype {
        DType::Null => NullArray::new(total).into_array(),
        DType::Bool(_) => {
            let mut values = BooleanBufferBuilder::new(total);
            for array in arrays {
                if let Array::Bool(a) = array {
                    values.append_buffer(a.boolean_buffer());
                }
            }
            BoolArray::try_new(values.finish(), validity)?.into_array()
        }
        DType::Primitive(ptype, _) => {
            PrimitiveArray::from_byte_buffer(concat_primitive_bytes(arrays), *ptype, validity)?
                .into_array()
        }
        DType::Temporal(temporal, _) => {
            let storage = PrimitiveArray::from_byte_buffer(
                concat_primitive_bytes(arrays),
                temporal.storage_ptype(),
                validity,
            )?;
            TemporalArray::try_new(temporal.clone(), storage)?.into_array()
        }
        DType::Utf8(_) | DType::Binary(_) => {
            let mut offsets = BufferMut::<i32>::with_capacity(total + 1);
            let mut bytes = BufferMut::<u8>::empty();
            offsets.push(0);
            for array in arrays {
                if let Array::VarBin(a) = array {
                    let range = a.data_range();
                    let base = bytes.len() as i32 - range.start as i32;
                    bytes.extend_from_slice(&a.bytes().as_slice()[range]);
                    offsets.extend(a.offsets().iter().skip(1).map(|o| o + base));
                }
            }
            VarBinArray::new_unchecked(offsets.freeze(), bytes.freeze(), dtype, validity)
                .into_array()
        }
        DType::FixedSizeBinary(width, _) => {
            let mut bytes = BufferMut::<u8>::with_capacity(total * *width as usize);
            for array in arrays {
                if let Array::FixedSizeBinary(a) = array {
                    bytes.extend_from_slice(a.bytes());
                }
            }
            FixedSizeBinaryArray::try_new(*width, bytes.freeze(), validity)?.into_array()
        }
    })
}

fn concat_primitive_bytes(arrays: &[Array]) -> quarry_buffer::ByteBuffer {
    let storage = |a: &Array| match a {
        Array::Primitive(p) => Some(p.byte_buffer().clone()),
        Array::Temporal(t) => Some(t.storage().byte_buffer().clone()),
        _ => None,
    };
    let nbytes = arrays.iter().filter_map(storage).map(|b| b.len()).sum();
    let mut bytes = BufferMut::<u8>::with_capacity(nbytes);
    for buffer in arrays.iter().filter_map(storage) {
        bytes.extend_from_slice(&buffer);
    }
    bytes.freeze()
}

#[cfg(test)]
mod tests {
    use quarry_dtype::Nullability::Nullable;
    use quarry_dtype::PType;

    use super::*;

    #[test]
    fn concat_primitives_unions_nullability() {
        let a = PrimitiveArray::from_iter([1i32, 2]).into_array();
        let b = PrimitiveArray::from_option_iter([None, Some(4i32)]).into_array();
        let result = concat(&[a, b]).unwrap();
        assert_eq!(result.dtype(), &DType::Primitive(PType::I32, Nullable));
        assert_eq!(
            result,
            PrimitiveArray::from_option_iter([Some(1i32), Some(2), None, Some(4)]).into_array()
        );
    }

    #[test]
    fn concat_sliced_strings_rebases_offsets() {
        let a = VarBinArray::from_strs(["skip", "x", "yz"]).into_array();
        let a = a.slice(1, 3).unwrap();
        let b = VarBinArray::from_strs(["w"]).into_array();
        let result = concat(&[a, b]).unwrap();
        assert_eq!(result, VarBinArray::from_strs(["x", "yz", "w"]).into_array());
        assert_eq!(result.as_varbin().unwrap().offsets().as_slice(), &[0, 1, 3, 4]);
    }

    #[test]
    fn concat_rejects_mixed_types() {
        let a = PrimitiveArray::from_iter([1i32]).into_array();
        let b = VarBinArray::from_strs(["a"]).into_array();
        assert!(concat(&[a, b]).is_err());
        assert!(concat(&[]).is_err());
    }
}
