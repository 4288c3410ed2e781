//! Plain encoding of statistic values.

use quarry_buffer::ByteBuffer;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_bail};
use quarry_scalar::{PValue, Scalar, ScalarValue};

/// Values longer than this are not recorded as statistics.
pub(crate) const MAX_STAT_BYTES: usize = 256;

/// The plain bytes of a non-null scalar.
pub(crate) fn encode_scalar(scalar: &Scalar) -> Option<Vec<u8>> {
    let bytes = match scalar.value() {
        ScalarValue::Null => return None,
        ScalarValue::Bool(b) => vec![u8::from(*b)],
        ScalarValue::Primitive(pv) => pv.to_le_bytes(),
        ScalarValue::Buffer(buffer) => buffer.as_slice().to_vec(),
        ScalarValue::BufferString(s) => s.as_bytes().to_vec(),
    };
    (bytes.len() <= MAX_STAT_BYTES).then_some(bytes)
}

/// Decode a non-null value of `dtype` from its plain bytes.
pub(crate) fn decode_scalar(dtype: &DType, bytes: &[u8]) -> QuarryResult<Scalar> {
    let value = match dtype {
        DType::Null => quarry_bail!(FormatError: "null columns carry no statistics"),
        DType::Bool(_) => match bytes {
            [0] => ScalarValue::Bool(false),
            [1] => ScalarValue::Bool(true),
            _ => quarry_bail!(FormatError: "invalid boolean statistic {:?}", bytes),
        },
        DType::Primitive(ptype, _) => ScalarValue::Primitive(PValue::from_le_bytes(*ptype, bytes)?),
        DType::Temporal(temporal, _) => {
            ScalarValue::Primitive(PValue::from_le_bytes(temporal.storage_ptype(), bytes)?)
        }
        DType::Utf8(_) | DType::Binary(_) | DType::FixedSizeBinary(..) => {
            ScalarValue::Buffer(ByteBuffer::from(bytes.to_vec()))
        }
    };
    Scalar::try_new(dtype.as_nonnullable(), value)
        .map_err(|err| quarry_error::quarry_err!(FormatError: "invalid {} statistic: {}", dtype, err))
}

#[cfg(test)]
mod tests {
    use quarry_dtype::{Nullability, TimeUnit};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Scalar::from(-7i64))]
    #[case(Scalar::from(2.5f32))]
    #[case(Scalar::from(true))]
    #[case(Scalar::from("pear"))]
    #[case(Scalar::timestamp(1_700_000_000, TimeUnit::Us, None, Nullability::NonNullable))]
    fn plain_values(#[case] scalar: Scalar) {
        let bytes = encode_scalar(&scalar).unwrap();
        assert_eq!(decode_scalar(scalar.dtype(), &bytes).unwrap(), scalar);
    }

    #[test]
    fn skips_nulls_and_long_values() {
        assert_eq!(encode_scalar(&Scalar::from(None::<i32>)), None);
        assert_eq!(encode_scalar(&Scalar::from("x".repeat(MAX_STAT_BYTES + 1))), None);
    }

    #[test]
    fn rejects_wrong_width() {
        let err = decode_scalar(&DType::from(quarry_dtype::PType::I32), &[1, 2]).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::Format);
    }
}
