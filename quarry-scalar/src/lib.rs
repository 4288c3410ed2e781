//! Single typed values.
//!
//! A [`Scalar`] pairs a [`DType`] with a [`ScalarValue`]. Scalars are produced transiently by
//! reading a slot of an array, by literals in expressions, and by partition values inferred
//! from paths. They are immutable.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use pvalue::*;
use quarry_buffer::{BufferString, ByteBuffer};
use quarry_dtype::{DType, NativePType, Nullability, PType, TemporalType, TimeUnit};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
pub use value::*;

mod cast;
mod pvalue;
mod value;

/// A single value together with its logical type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scalar {
    dtype: DType,
    value: ScalarValue,
}

impl Scalar {
    /// Create a scalar, checking that the value fits the declared type.
    ///
    /// Primitive values are converted to the declared width and fail with `TypeError` on
    /// overflow. Binary values declared as utf8 are validated, fixed-size binary values must
    /// have the declared width, and nulls require a nullable type.
    pub fn try_new(dtype: DType, value: ScalarValue) -> QuarryResult<Self> {
        let value = match (&dtype, value) {
            (_, ScalarValue::Null) => {
                if !dtype.is_nullable() {
                    quarry_bail!(TypeError: "null is not a valid value of non-nullable {}", dtype);
                }
                ScalarValue::Null
            }
            (DType::Bool(_), v @ ScalarValue::Bool(_)) => v,
            (DType::Primitive(ptype, _), ScalarValue::Primitive(pv)) => {
                ScalarValue::Primitive(pv.cast(*ptype)?)
            }
            (DType::Temporal(temporal, _), ScalarValue::Primitive(pv)) => {
                ScalarValue::Primitive(pv.cast(temporal.storage_ptype())?)
            }
            (DType::Utf8(_), v @ ScalarValue::BufferString(_)) => v,
            (DType::Utf8(_), ScalarValue::Buffer(buf)) => {
                ScalarValue::BufferString(BufferString::try_from(buf)?)
            }
            (DType::Binary(_), v @ ScalarValue::Buffer(_)) => v,
            (DType::Binary(_), ScalarValue::BufferString(s)) => ScalarValue::Buffer(s.into_inner()),
            (DType::FixedSizeBinary(width, _), ScalarValue::Buffer(buf)) => {
                if buf.len() != *width as usize {
                    quarry_bail!(
                        TypeError: "expected {} bytes for {}, found {}",
                        width,
                        dtype,
                        buf.len()
                    );
                }
                ScalarValue::Buffer(buf)
            }
            (_, value) => quarry_bail!(TypeError: "{} is not a valid value of {}", value, dtype),
        };
        Ok(Self { dtype, value })
    }

    /// The null value of a type. The type is made nullable.
    pub fn null(dtype: DType) -> Self {
        Self {
            dtype: dtype.as_nullable(),
            value: ScalarValue::Null,
        }
    }

    /// A boolean scalar.
    pub fn bool(value: bool, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Bool(nullability),
            value: ScalarValue::Bool(value),
        }
    }

    /// A primitive scalar of the native type `T`.
    pub fn primitive<T: NativePType + Into<PValue>>(value: T, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Primitive(T::PTYPE, nullability),
            value: ScalarValue::Primitive(value.into()),
        }
    }

    /// A primitive scalar from an already tagged value.
    pub fn primitive_value(value: PValue, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Primitive(value.ptype(), nullability),
            value: ScalarValue::Primitive(value),
        }
    }

    /// A utf8 scalar.
    pub fn utf8(value: impl Into<BufferString>, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Utf8(nullability),
            value: ScalarValue::BufferString(value.into()),
        }
    }

    /// A binary scalar.
    pub fn binary(value: impl Into<ByteBuffer>, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Binary(nullability),
            value: ScalarValue::Buffer(value.into()),
        }
    }

    /// A fixed-size binary scalar whose width is the length of `value`.
    pub fn fixed_size_binary(value: impl Into<ByteBuffer>, nullability: Nullability) -> QuarryResult<Self> {
        let value = value.into();
        let width = u32::try_from(value.len())
            .map_err(|_| quarry_err!(TypeError: "fixed-size binary of {} bytes is too wide", value.len()))?;
        Ok(Self {
            dtype: DType::FixedSizeBinary(width, nullability),
            value: ScalarValue::Buffer(value),
        })
    }

    /// A date as days since the UNIX epoch.
    pub fn date32(days: i32, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Temporal(TemporalType::Date32, nullability),
            value: ScalarValue::Primitive(PValue::I32(days)),
        }
    }

    /// A time of day since midnight.
    pub fn time64(value: i64, unit: TimeUnit, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Temporal(TemporalType::Time64(unit), nullability),
            value: ScalarValue::Primitive(PValue::I64(value)),
        }
    }

    /// An instant since the UNIX epoch, optionally in a named timezone.
    pub fn timestamp(
        value: i64,
        unit: TimeUnit,
        tz: Option<Arc<str>>,
        nullability: Nullability,
    ) -> Self {
        Self {
            dtype: DType::Temporal(TemporalType::Timestamp(unit, tz), nullability),
            value: ScalarValue::Primitive(PValue::I64(value)),
        }
    }

    /// An elapsed span of time.
    pub fn duration(value: i64, unit: TimeUnit, nullability: Nullability) -> Self {
        Self {
            dtype: DType::Temporal(TemporalType::Duration(unit), nullability),
            value: ScalarValue::Primitive(PValue::I64(value)),
        }
    }

    /// The type of the scalar.
    #[inline]
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The payload of the scalar.
    #[inline]
    pub fn value(&self) -> &ScalarValue {
        &self.value
    }

    /// Split the scalar into its type and payload.
    pub fn into_parts(self) -> (DType, ScalarValue) {
        (self.dtype, self.value)
    }

    /// Whether the scalar is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// The same value with a nullable type.
    pub fn into_nullable(self) -> Self {
        Self {
            dtype: self.dtype.as_nullable(),
            value: self.value,
        }
    }

    /// The same value with the given nullability. Fails if a null would become non-nullable.
    pub fn with_nullability(self, nullability: Nullability) -> QuarryResult<Self> {
        Self::try_new(self.dtype.with_nullability(nullability), self.value)
    }

    /// The boolean value, `None` when null.
    pub fn as_bool(&self) -> QuarryResult<Option<bool>> {
        match &self.value {
            ScalarValue::Null => Ok(None),
            ScalarValue::Bool(b) => Ok(Some(*b)),
            _ => Err(quarry_err!(TypeError: "expected a bool scalar, found {}", self.dtype)),
        }
    }

    /// The primitive value, `None` when null. Temporal scalars yield their stored integer.
    pub fn as_pvalue(&self) -> QuarryResult<Option<PValue>> {
        match &self.value {
            ScalarValue::Null => Ok(None),
            ScalarValue::Primitive(pv) => Ok(Some(*pv)),
            _ => Err(quarry_err!(TypeError: "expected a primitive scalar, found {}", self.dtype)),
        }
    }

    /// The primitive value converted to `T`, `None` when null.
    pub fn as_primitive<T: NativePType>(&self) -> QuarryResult<Option<T>> {
        self.as_pvalue()?
            .map(|pv| {
                pv.as_primitive::<T>()
                    .ok_or_else(|| quarry_err!(TypeError: "value {} does not fit in {}", pv, T::PTYPE))
            })
            .transpose()
    }

    /// The string value, `None` when null.
    pub fn as_utf8(&self) -> QuarryResult<Option<&BufferString>> {
        match &self.value {
            ScalarValue::Null => Ok(None),
            ScalarValue::BufferString(s) => Ok(Some(s)),
            _ => Err(quarry_err!(TypeError: "expected a utf8 scalar, found {}", self.dtype)),
        }
    }

    /// The bytes of a binary or fixed-size binary scalar, `None` when null.
    pub fn as_binary(&self) -> QuarryResult<Option<&ByteBuffer>> {
        match &self.value {
            ScalarValue::Null => Ok(None),
            ScalarValue::Buffer(b) => Ok(Some(b)),
            _ => Err(quarry_err!(TypeError: "expected a binary scalar, found {}", self.dtype)),
        }
    }

    /// The physical type of a primitive or temporal scalar.
    pub fn ptype(&self) -> Option<PType> {
        self.dtype.storage_ptype()
    }
}

impl PartialOrd for Scalar {
    /// Scalars of the same type (ignoring nullability) are ordered with nulls first.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.dtype.eq_ignore_nullability(&other.dtype)
            && !(self.dtype.is_primitive() && other.dtype.is_primitive())
        {
            return None;
        }
        self.value.partial_cmp(&other.value)
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.dtype, &self.value) {
            (_, ScalarValue::Null) => write!(f, "null"),
            (DType::Temporal(temporal, _), ScalarValue::Primitive(pv)) => {
                write!(f, "{}({})", temporal, pv)
            }
            (_, value) => Display::fmt(value, f),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::bool(value, Nullability::NonNullable)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::utf8(value, Nullability::NonNullable)
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::utf8(value, Nullability::NonNullable)
    }
}

impl From<BufferString> for Scalar {
    fn from(value: BufferString) -> Self {
        Scalar::utf8(value, Nullability::NonNullable)
    }
}

impl From<ByteBuffer> for Scalar {
    fn from(value: ByteBuffer) -> Self {
        Scalar::binary(value, Nullability::NonNullable)
    }
}

impl From<PValue> for Scalar {
    fn from(value: PValue) -> Self {
        Scalar::primitive_value(value, Nullability::NonNullable)
    }
}

macro_rules! from_native_for_scalar {
    ($T:ty) => {
        impl From<$T> for Scalar {
            fn from(value: $T) -> Self {
                Scalar::primitive(value, Nullability::NonNullable)
            }
        }

        impl From<Option<$T>> for Scalar {
            fn from(value: Option<$T>) -> Self {
                match value {
                    Some(v) => Scalar::primitive(v, Nullability::Nullable),
                    None => Scalar::null(DType::Primitive(<$T>::PTYPE, Nullability::Nullable)),
                }
            }
        }
    };
}

from_native_for_scalar!(u8);
from_native_for_scalar!(u16);
from_native_for_scalar!(u32);
from_native_for_scalar!(u64);
from_native_for_scalar!(i8);
from_native_for_scalar!(i16);
from_native_for_scalar!(i32);
from_native_for_scalar!(i64);
from_native_for_scalar!(f32);
from_native_for_scalar!(f64);

#[cfg(test)]
mod tests {
    use quarry_buffer::buffer;
    use quarry_dtype::Nullability::{NonNullable, Nullable};
    use quarry_error::ErrorKind;

    use super::*;

    #[test]
    fn overflow_is_a_type_error() {
        let err = Scalar::try_new(
            DType::Primitive(PType::I8, NonNullable),
            ScalarValue::Primitive(PValue::I64(300)),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);

        let ok = Scalar::try_new(
            DType::Primitive(PType::I8, NonNullable),
            ScalarValue::Primitive(PValue::I64(-5)),
        )
        .unwrap();
        assert_eq!(ok.value(), &ScalarValue::Primitive(PValue::I8(-5)));
        assert!(ok.value().clone() == ScalarValue::Primitive(PValue::I8(-5)));
    }

    #[test]
    fn invalid_utf8_is_a_type_error() {
        let err = Scalar::try_new(
            DType::Utf8(NonNullable),
            ScalarValue::Buffer(buffer![0xc3u8, 0x28]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn null_requires_nullable() {
        assert!(Scalar::try_new(DType::Bool(NonNullable), ScalarValue::Null).is_err());
        assert!(Scalar::try_new(DType::Bool(Nullable), ScalarValue::Null).unwrap().is_null());
    }

    #[test]
    fn fixed_size_width_checked() {
        let dtype = DType::FixedSizeBinary(4, NonNullable);
        assert!(Scalar::try_new(dtype.clone(), ScalarValue::Buffer(buffer![1u8, 2, 3])).is_err());
        assert!(Scalar::try_new(dtype, ScalarValue::Buffer(buffer![1u8, 2, 3, 4])).is_ok());
    }

    #[test]
    fn wrong_variant_rejected() {
        let err = Scalar::try_new(DType::Bool(NonNullable), ScalarValue::Primitive(PValue::I32(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn nulls_order_first() {
        let null = Scalar::from(None::<i32>);
        let one = Scalar::from(Some(1i32));
        assert!(null < one);
        assert_eq!(Scalar::from(2i64).partial_cmp(&Scalar::from("a")), None);
    }

    #[test]
    fn accessors() {
        assert_eq!(Scalar::from(7u16).as_primitive::<i64>().unwrap(), Some(7));
        assert_eq!(Scalar::from("x").as_utf8().unwrap().map(|s| s.as_str()), Some("x"));
        assert!(Scalar::from(true).as_utf8().is_err());
        assert_eq!(
            Scalar::timestamp(5, TimeUnit::Ms, None, NonNullable).to_string(),
            "timestamp[ms](5i64)"
        );
    }
}
