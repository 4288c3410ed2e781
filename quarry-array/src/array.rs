use std::fmt::{Display, Formatter};

use quarry_buffer::BufferString;
use quarry_dtype::DType;
use quarry_error::{QuarryError, QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::{Scalar, ScalarValue};

use crate::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, PrimitiveArray, TemporalArray, VarBinArray,
};
use crate::builder::ArrayBuilder;
use crate::validity::Validity;

/// An immutable, fixed-length sequence of values of one type.
///
/// Cloning an array or slicing it shares the underlying buffers.
#[derive(Clone, Debug)]
pub enum Array {
    /// See [`NullArray`].
    Null(NullArray),
    /// See [`BoolArray`].
    Bool(BoolArray),
    /// See [`PrimitiveArray`].
    Primitive(PrimitiveArray),
    /// See [`VarBinArray`].
    VarBin(VarBinArray),
    /// See [`FixedSizeBinaryArray`].
    FixedSizeBinary(FixedSizeBinaryArray),
    /// See [`TemporalArray`].
    Temporal(TemporalArray),
}

/// Conversion of a concrete array into an [`Array`].
pub trait IntoArray {
    /// Wrap `self` as an [`Array`].
    fn into_array(self) -> Array;
}

macro_rules! impl_array_variant {
    ($variant:ident, $T:ty) => {
        impl IntoArray for $T {
            fn into_array(self) -> Array {
                Array::$variant(self)
            }
        }

        impl From<$T> for Array {
            fn from(value: $T) -> Self {
                Array::$variant(value)
            }
        }

        impl TryFrom<Array> for $T {
            type Error = QuarryError;

            fn try_from(value: Array) -> Result<Self, Self::Error> {
                match value {
                    Array::$variant(array) => Ok(array),
                    other => Err(quarry_err!(
                        TypeError: "expected a {} array, found {}",
                        stringify!($variant),
                        other.dtype()
                    )),
                }
            }
        }

        impl<'a> TryFrom<&'a Array> for &'a $T {
            type Error = QuarryError;

            fn try_from(value: &'a Array) -> Result<Self, Self::Error> {
                match value {
                    Array::$variant(array) => Ok(array),
                    other => Err(quarry_err!(
                        TypeError: "expected a {} array, found {}",
                        stringify!($variant),
                        other.dtype()
                    )),
                }
            }
        }
    };
}

impl_array_variant!(Null, NullArray);
impl_array_variant!(Bool, BoolArray);
impl_array_variant!(Primitive, PrimitiveArray);
impl_array_variant!(VarBin, VarBinArray);
impl_array_variant!(FixedSizeBinary, FixedSizeBinaryArray);
impl_array_variant!(Temporal, TemporalArray);

impl IntoArray for Array {
    fn into_array(self) -> Array {
        self
    }
}

impl Array {
    /// Create an array from values and an optional null mask (`true` marks a null slot).
    ///
    /// The type is taken from the first non-null value; every other value must share it,
    /// otherwise this fails with `TypeError`. Values that are all null produce a null array.
    pub fn create(values: &[Scalar], nulls: Option<&[bool]>) -> QuarryResult<Array> {
        if let Some(nulls) = nulls {
            if nulls.len() != values.len() {
                quarry_bail!(
                    "null mask of length {} does not match {} values",
                    nulls.len(),
                    values.len()
                );
            }
        }
        let is_null = |idx: usize| nulls.is_some_and(|n| n[idx]) || values[idx].is_null();
        let has_nulls = (0..values.len()).any(is_null);
        let Some(first) = (0..values.len()).find(|&idx| !is_null(idx)) else {
            return Ok(NullArray::new(values.len()).into_array());
        };
        let dtype = values[first].dtype().with_nullability(has_nulls.into());

        let mut builder = ArrayBuilder::with_capacity(dtype, values.len());
        for (idx, value) in values.iter().enumerate() {
            if is_null(idx) {
                builder.append_null()?;
            } else {
                builder.append_scalar(value)?;
            }
        }
        builder.finish()
    }

    /// Create an array of `dtype` from scalars.
    pub fn from_scalars(dtype: &DType, scalars: &[Scalar]) -> QuarryResult<Array> {
        let mut builder = ArrayBuilder::with_capacity(dtype.clone(), scalars.len());
        for scalar in scalars {
            builder.append_scalar(scalar)?;
        }
        builder.finish()
    }

    /// An array of `len` copies of `scalar`.
    pub fn from_scalar(scalar: &Scalar, len: usize) -> QuarryResult<Array> {
        let mut builder = ArrayBuilder::with_capacity(scalar.dtype().clone(), len);
        for _ in 0..len {
            builder.append_scalar(scalar)?;
        }
        builder.finish()
    }

    /// An array of `len` nulls of `dtype`, which is made nullable.
    pub fn nulls(dtype: &DType, len: usize) -> QuarryResult<Array> {
        let mut builder = ArrayBuilder::with_capacity(dtype.as_nullable(), len);
        builder.append_nulls(len)?;
        builder.finish()
    }

    /// An empty array of `dtype`.
    pub fn empty(dtype: &DType) -> QuarryResult<Array> {
        ArrayBuilder::with_capacity(dtype.clone(), 0).finish()
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        match self {
            Self::Null(a) => a.len(),
            Self::Bool(a) => a.len(),
            Self::Primitive(a) => a.len(),
            Self::VarBin(a) => a.len(),
            Self::FixedSizeBinary(a) => a.len(),
            Self::Temporal(a) => a.len(),
        }
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The type of the values.
    pub fn dtype(&self) -> &DType {
        match self {
            Self::Null(a) => a.dtype(),
            Self::Bool(a) => a.dtype(),
            Self::Primitive(a) => a.dtype(),
            Self::VarBin(a) => a.dtype(),
            Self::FixedSizeBinary(a) => a.dtype(),
            Self::Temporal(a) => a.dtype(),
        }
    }

    /// The validity of the slots.
    pub fn validity(&self) -> Validity {
        match self {
            Self::Null(_) => Validity::AllInvalid,
            Self::Bool(a) => a.validity().clone(),
            Self::Primitive(a) => a.validity().clone(),
            Self::VarBin(a) => a.validity().clone(),
            Self::FixedSizeBinary(a) => a.validity().clone(),
            Self::Temporal(a) => a.validity().clone(),
        }
    }

    /// Whether the slot at `index` holds a value.
    pub fn is_valid(&self, index: usize) -> bool {
        match self {
            Self::Null(_) => false,
            Self::Bool(a) => a.validity().is_valid(index),
            Self::Primitive(a) => a.validity().is_valid(index),
            Self::VarBin(a) => a.validity().is_valid(index),
            Self::FixedSizeBinary(a) => a.validity().is_valid(index),
            Self::Temporal(a) => a.validity().is_valid(index),
        }
    }

    /// The number of null slots.
    pub fn null_count(&self) -> usize {
        self.validity().null_count(self.len())
    }

    /// The value at `index`.
    pub fn scalar_at(&self, index: usize) -> QuarryResult<Scalar> {
        if index >= self.len() {
            quarry_bail!(OutOfBounds: index, 0, self.len());
        }
        if !self.is_valid(index) {
            return Ok(Scalar::null(self.dtype().clone()));
        }
        let nullability = self.dtype().nullability();
        Ok(match self {
            Self::Null(_) => Scalar::null(DType::Null),
            Self::Bool(a) => Scalar::bool(a.value(index), nullability),
            Self::Primitive(a) => Scalar::primitive_value(a.value(index), nullability),
            Self::VarBin(a) => match a.dtype() {
                // SAFETY: utf8 arrays validate every valid slot on construction.
                DType::Utf8(_) => Scalar::utf8(
                    unsafe { BufferString::new_unchecked(a.buffer_at(index)) },
                    nullability,
                ),
                _ => Scalar::binary(a.buffer_at(index), nullability),
            },
            Self::FixedSizeBinary(a) => {
                Scalar::try_new(a.dtype().clone(), ScalarValue::Buffer(a.buffer_at(index)))?
            }
            Self::Temporal(a) => Scalar::try_new(
                a.dtype().clone(),
                ScalarValue::Primitive(a.storage().value(index)),
            )?,
        })
    }

    /// A zero-copy view over the slots `start..stop`. The parent is left untouched.
    pub fn slice(&self, start: usize, stop: usize) -> QuarryResult<Array> {
        if start > stop {
            quarry_bail!("slice start {} is after stop {}", start, stop);
        }
        if stop > self.len() {
            quarry_bail!(OutOfBounds: stop, 0, self.len());
        }
        Ok(match self {
            Self::Null(a) => a.slice(start, stop).into_array(),
            Self::Bool(a) => a.slice(start, stop).into_array(),
            Self::Primitive(a) => a.slice(start, stop).into_array(),
            Self::VarBin(a) => a.slice(start, stop).into_array(),
            Self::FixedSizeBinary(a) => a.slice(start, stop).into_array(),
            Self::Temporal(a) => a.slice(start, stop).into_array(),
        })
    }

    /// Iterate over the values as scalars.
    pub fn scalars(&self) -> impl Iterator<Item = QuarryResult<Scalar>> + '_ {
        (0..self.len()).map(|idx| self.scalar_at(idx))
    }

    /// The number of bytes referenced by the array's value buffers.
    pub fn nbytes(&self) -> usize {
        match self {
            Self::Null(_) => 0,
            Self::Bool(a) => a.len().div_ceil(8),
            Self::Primitive(a) => a.byte_buffer().len(),
            Self::VarBin(a) => a.offsets().len() * 4 + a.data_range().len(),
            Self::FixedSizeBinary(a) => a.bytes().len(),
            Self::Temporal(a) => a.storage().byte_buffer().len(),
        }
    }

    /// The concrete primitive array, if this is one.
    pub fn as_primitive(&self) -> Option<&PrimitiveArray> {
        match self {
            Self::Primitive(a) => Some(a),
            _ => None,
        }
    }

    /// The concrete bool array, if this is one.
    pub fn as_bool(&self) -> Option<&BoolArray> {
        match self {
            Self::Bool(a) => Some(a),
            _ => None,
        }
    }

    /// The concrete variable-width array, if this is one.
    pub fn as_varbin(&self) -> Option<&VarBinArray> {
        match self {
            Self::VarBin(a) => Some(a),
            _ => None,
        }
    }
}

impl PartialEq for Array {
    /// Logical equality: same type, same length and equal values at every slot.
    fn eq(&self, other: &Self) -> bool {
        self.dtype() == other.dtype()
            && self.len() == other.len()
            && self
                .scalars()
                .zip(other.scalars())
                .all(|(a, b)| matches!((a, b), (Ok(a), Ok(b)) if a == b))
    }
}

impl Display for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (idx, scalar) in self.scalars().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match scalar {
                Ok(scalar) => write!(f, "{}", scalar)?,
                Err(_) => write!(f, "<error>")?,
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use quarry_buffer::buffer;
    use quarry_dtype::Nullability::{NonNullable, Nullable};
    use quarry_dtype::PType;
    use quarry_error::ErrorKind;
    use rstest::rstest;

    use super::*;

    fn sample() -> Array {
        Array::create(
            &[
                Scalar::from(10i64),
                Scalar::from(11i64),
                Scalar::from(12i64),
                Scalar::from(13i64),
                Scalar::from(14i64),
            ],
            Some(&[false, true, false, false, false][..]),
        )
        .unwrap()
    }

    #[rstest]
    #[case(0, 5)]
    #[case(1, 4)]
    #[case(2, 2)]
    #[case(4, 5)]
    fn slicing_law(#[case] start: usize, #[case] stop: usize) {
        let array = sample();
        let sliced = array.slice(start, stop).unwrap();
        assert_eq!(sliced.len(), stop - start);
        for i in 0..sliced.len() {
            assert_eq!(sliced.scalar_at(i).unwrap(), array.scalar_at(start + i).unwrap());
        }
    }

    #[test]
    fn slicing_copies_nothing() {
        let array = sample();
        let sliced = array.slice(2, 4).unwrap();
        let parent = array.as_primitive().unwrap();
        let child = sliced.as_primitive().unwrap();
        assert_eq!(
            child.as_slice::<i64>().as_ptr(),
            parent.as_slice::<i64>()[2..].as_ptr()
        );
        match (parent.validity(), child.validity()) {
            (Validity::Array(p), Validity::Array(c)) => {
                assert_eq!(p.inner().as_ptr(), c.inner().as_ptr())
            }
            _ => unreachable!(),
        }
        assert_eq!(array.len(), 5);
        assert!(array.scalar_at(1).unwrap().is_null());
    }

    #[test]
    fn create_rejects_mixed_types() {
        let err = Array::create(&[Scalar::from(1i32), Scalar::from("a")], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn create_infers_nullability() {
        let array = Array::create(&[Scalar::from(1i32), Scalar::from(None::<i32>)], None).unwrap();
        assert_eq!(array.dtype(), &DType::Primitive(PType::I32, Nullable));
        assert_eq!(array.null_count(), 1);
        let all_null = Array::create(&[Scalar::null(DType::Null)], None).unwrap();
        assert_eq!(all_null.dtype(), &DType::Null);
    }

    #[test]
    fn get_out_of_bounds() {
        let array = PrimitiveArray::new(buffer![1u8, 2], Validity::NonNullable).into_array();
        assert_eq!(array.scalar_at(2).unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert_eq!(array.slice(1, 3).unwrap_err().kind(), ErrorKind::OutOfBounds);
    }

    #[test]
    fn utf8_scalars() {
        let array = VarBinArray::from_option_strs([Some("x"), None]).into_array();
        assert_eq!(array.scalar_at(0).unwrap(), Scalar::utf8("x", Nullable));
        assert_eq!(array.scalar_at(1).unwrap(), Scalar::null(DType::Utf8(NonNullable)));
    }
}
