use arrow_buffer::BooleanBufferBuilder;
use quarry_buffer::{Alignment, BufferMut};
use quarry_dtype::{DType, Nullability, PType};
use quarry_error::{QuarryResult, quarry_bail};
use quarry_scalar::{Scalar, ScalarValue};

use crate::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, PrimitiveArray, TemporalArray, VarBinArray,
};
use crate::validity::Validity;
use crate::{Array, IntoArray};

enum Values {
    Null,
    Bool(BooleanBufferBuilder),
    Primitive(PType, BufferMut<u8>),
    VarBin {
        offsets: BufferMut<i32>,
        bytes: BufferMut<u8>,
    },
    FixedSizeBinary(u32, BufferMut<u8>),
}

/// Builds an array of a fixed type one scalar at a time.
pub struct ArrayBuilder {
    dtype: DType,
    values: Values,
    validity: BooleanBufferBuilder,
    null_count: usize,
    len: usize,
}

impl ArrayBuilder {
    /// Create a builder for values of `dtype`.
    pub fn with_capacity(dtype: DType, capacity: usize) -> Self {
        let values = match &dtype {
            DType::Null => Values::Null,
            DType::Bool(_) => Values::Bool(BooleanBufferBuilder::new(capacity)),
            DType::Primitive(..) | DType::Temporal(..) => {
                let ptype = dtype.storage_ptype().unwrap_or(PType::I64);
                Values::Primitive(
                    ptype,
                    BufferMut::with_capacity_aligned(
                        capacity * ptype.byte_width(),
                        Alignment::new(ptype.byte_width()),
                    ),
                )
            }
            DType::Utf8(_) | DType::Binary(_) => {
                let mut offsets = BufferMut::with_capacity(capacity + 1);
                offsets.push(0);
                Values::VarBin {
                    offsets,
                    bytes: BufferMut::empty(),
                }
            }
            DType::FixedSizeBinary(width, _) => Values::FixedSizeBinary(
                *width,
                BufferMut::with_capacity(capacity * *width as usize),
            ),
        };
        Self {
            dtype,
            values,
            validity: BooleanBufferBuilder::new(capacity),
            null_count: 0,
            len: 0,
        }
    }

    /// The type being built.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The number of values appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a scalar. Its type must match the builder's, ignoring nullability.
    pub fn append_scalar(&mut self, scalar: &Scalar) -> QuarryResult<()> {
        if scalar.is_null() {
            return self.append_null();
        }
        if !scalar.dtype().eq_ignore_nullability(&self.dtype) {
            quarry_bail!(
                TypeError: "cannot append a {} value to an array of {}",
                scalar.dtype(),
                self.dtype
            );
        }
        self.append_value(scalar.value())?;
        self.validity.append(true);
        self.len += 1;
        Ok(())
    }

    /// Append a null. Fails for non-nullable types.
    pub fn append_null(&mut self) -> QuarryResult<()> {
        if !self.dtype.is_nullable() {
            quarry_bail!(TypeError: "cannot append null to an array of non-nullable {}", self.dtype);
        }
        match &mut self.values {
            Values::Null => {}
            Values::Bool(values) => values.append(false),
            Values::Primitive(ptype, values) => {
                values.extend(std::iter::repeat_n(0u8, ptype.byte_width()))
            }
            Values::VarBin { offsets, bytes } => offsets.push(bytes.len() as i32),
            Values::FixedSizeBinary(width, values) => {
                values.extend(std::iter::repeat_n(0u8, *width as usize))
            }
        }
        self.validity.append(false);
        self.null_count += 1;
        self.len += 1;
        Ok(())
    }

    /// Append `n` nulls.
    pub fn append_nulls(&mut self, n: usize) -> QuarryResult<()> {
        for _ in 0..n {
            self.append_null()?;
        }
        Ok(())
    }

    fn append_value(&mut self, value: &ScalarValue) -> QuarryResult<()> {
        match (&mut self.values, value) {
            (Values::Bool(values), ScalarValue::Bool(b)) => values.append(*b),
            (Values::Primitive(ptype, values), ScalarValue::Primitive(pv)) => {
                values.extend_from_slice(&pv.cast(*ptype)?.to_le_bytes())
            }
            (Values::VarBin { offsets, bytes }, ScalarValue::BufferString(s)) => {
                bytes.extend_from_slice(s.as_bytes());
                offsets.push(bytes.len() as i32);
            }
            (Values::VarBin { offsets, bytes }, ScalarValue::Buffer(b)) => {
                bytes.extend_from_slice(b.as_slice());
                offsets.push(bytes.len() as i32);
            }
            (Values::FixedSizeBinary(width, values), ScalarValue::Buffer(b)) => {
                if b.len() != *width as usize {
                    quarry_bail!(TypeError: "expected {} bytes, found {}", width, b.len());
                }
                values.extend_from_slice(b.as_slice());
            }
            (_, value) => {
                quarry_bail!(TypeError: "{} is not a valid value of {}", value, self.dtype)
            }
        }
        Ok(())
    }

    /// Finish building the array.
    pub fn finish(mut self) -> QuarryResult<Array> {
        let validity = match self.dtype.nullability() {
            Nullability::NonNullable => Validity::NonNullable,
            Nullability::Nullable if self.null_count == 0 => Validity::AllValid,
            Nullability::Nullable => Validity::Array(self.validity.finish()),
        };
        Ok(match (self.values, self.dtype) {
            (Values::Null, _) => NullArray::new(self.len).into_array(),
            (Values::Bool(mut values), _) => BoolArray::try_new(values.finish(), validity)?.into_array(),
            (Values::Primitive(ptype, values), DType::Temporal(temporal, _)) => {
                let storage = PrimitiveArray::from_byte_buffer(values.freeze(), ptype, validity)?;
                TemporalArray::try_new(temporal, storage)?.into_array()
            }
            (Values::Primitive(ptype, values), _) => {
                PrimitiveArray::from_byte_buffer(values.freeze(), ptype, validity)?.into_array()
            }
            (Values::VarBin { offsets, bytes }, dtype) => {
                VarBinArray::try_new(offsets.freeze(), bytes.freeze(), dtype, validity)?.into_array()
            }
            (Values::FixedSizeBinary(width, values), _) => {
                FixedSizeBinaryArray::try_new(width, values.freeze(), validity)?.into_array()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::Nullability::{NonNullable, Nullable};
    use quarry_error::ErrorKind;

    use super::*;

    #[test]
    fn builds_nullable_utf8() {
        let mut builder = ArrayBuilder::with_capacity(DType::Utf8(Nullable), 3);
        builder.append_scalar(&Scalar::from("a")).unwrap();
        builder.append_null().unwrap();
        builder.append_scalar(&Scalar::from("bc")).unwrap();
        let array = builder.finish().unwrap();
        assert_eq!(array.len(), 3);
        assert!(array.scalar_at(1).unwrap().is_null());
        assert_eq!(array.scalar_at(2).unwrap(), Scalar::utf8("bc", Nullable));
    }

    #[test]
    fn rejects_heterogeneous_values() {
        let mut builder = ArrayBuilder::with_capacity(DType::Primitive(PType::I64, NonNullable), 2);
        builder.append_scalar(&Scalar::from(1i64)).unwrap();
        let err = builder.append_scalar(&Scalar::from("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(builder.append_null().unwrap_err().kind(), ErrorKind::Type);
    }
}
