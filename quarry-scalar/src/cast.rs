use quarry_buffer::BufferString;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_bail};

use crate::{PValue, Scalar, ScalarValue};

impl Scalar {
    /// Convert the scalar to another type.
    ///
    /// The cast must be defined by [`DType::can_cast_to`], and the value must be representable
    /// in the target type. Failures are `TypeError`s.
    pub fn cast(&self, dtype: &DType) -> QuarryResult<Scalar> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        if self.is_null() {
            if !dtype.is_nullable() {
                quarry_bail!(TypeError: "cannot cast null to non-nullable {}", dtype);
            }
            return Ok(Scalar::null(dtype.clone()));
        }
        if !self.dtype().can_cast_to(dtype) {
            quarry_bail!(TypeError: "no cast is defined from {} to {}", self.dtype(), dtype);
        }

        let value = match (self.value(), dtype) {
            (ScalarValue::Bool(b), DType::Primitive(..)) => {
                ScalarValue::Primitive(PValue::U8(u8::from(*b)))
            }
            (ScalarValue::Primitive(pv), DType::Bool(_)) => match pv.as_i64() {
                Some(0) => ScalarValue::Bool(false),
                Some(1) => ScalarValue::Bool(true),
                _ => quarry_bail!(TypeError: "value {} is not a boolean", pv),
            },
            (ScalarValue::BufferString(s), DType::Binary(_)) => {
                ScalarValue::Buffer(s.clone().into_inner())
            }
            (ScalarValue::Buffer(buf), DType::Utf8(_)) => {
                ScalarValue::BufferString(BufferString::try_from(buf.clone())?)
            }
            (value, _) => value.clone(),
        };
        Scalar::try_new(dtype.clone(), value)
    }

    /// Convert the scalar to another type only when no information is lost, i.e. when
    /// converting the result back yields the original value.
    pub fn cast_lossless(&self, dtype: &DType) -> Option<Scalar> {
        if let (ScalarValue::Primitive(pv), Some(ptype)) = (self.value(), dtype.storage_ptype()) {
            pv.cast_lossless(ptype)?;
        }
        let cast = self.cast(dtype).ok()?;
        let back = cast.cast(self.dtype()).ok()?;
        (back == *self).then_some(cast)
    }
}
