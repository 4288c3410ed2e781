use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use num_traits::NumCast;
use paste::paste;
use quarry_dtype::{NativePType, PType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};

/// A single primitive value, tagged with its physical type.
///
/// Integers compare and hash by numeric value across widths; floats use a total order and
/// never compare equal to integers.
#[derive(Debug, Clone, Copy)]
pub enum PValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl PartialEq for PValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for PValue {}

impl PartialOrd for PValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.as_i128(), other.as_i128()) {
            (Some(s), Some(o)) => Some(s.cmp(&o)),
            (None, None) => Some(self.as_float()?.total_cmp(&other.as_float()?)),
            _ => None,
        }
    }
}

impl Hash for PValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_i128() {
            Some(v) => v.hash(state),
            None => self.as_float().map(f64::to_bits).hash(state),
        }
    }
}

macro_rules! as_primitive {
    ($T:ty) => {
        paste! {
            #[doc = "Access PValue as `" $T "`, returning `None` if the value does not fit"]
            pub fn [<as_ $T>](self) -> Option<$T> {
                self.as_primitive::<$T>()
            }
        }
    };
}

impl PValue {
    /// The physical type of the value.
    pub fn ptype(&self) -> PType {
        match self {
            Self::U8(_) => PType::U8,
            Self::U16(_) => PType::U16,
            Self::U32(_) => PType::U32,
            Self::U64(_) => PType::U64,
            Self::I8(_) => PType::I8,
            Self::I16(_) => PType::I16,
            Self::I32(_) => PType::I32,
            Self::I64(_) => PType::I64,
            Self::F32(_) => PType::F32,
            Self::F64(_) => PType::F64,
        }
    }

    /// Whether the value is of exactly the given physical type.
    pub fn is_instance_of(&self, ptype: &PType) -> bool {
        &self.ptype() == ptype
    }

    /// Convert the value to `T`, returning `None` if it overflows `T`, or if a fractional or
    /// non-finite float would be truncated to an integer.
    pub fn as_primitive<T: NativePType>(self) -> Option<T> {
        match self {
            PValue::U8(v) => <T as NumCast>::from(v),
            PValue::U16(v) => <T as NumCast>::from(v),
            PValue::U32(v) => <T as NumCast>::from(v),
            PValue::U64(v) => <T as NumCast>::from(v),
            PValue::I8(v) => <T as NumCast>::from(v),
            PValue::I16(v) => <T as NumCast>::from(v),
            PValue::I32(v) => <T as NumCast>::from(v),
            PValue::I64(v) => <T as NumCast>::from(v),
            PValue::F32(v) => (!T::PTYPE.is_int() || v.fract() == 0.0)
                .then(|| <T as NumCast>::from(v))
                .flatten(),
            PValue::F64(v) => (!T::PTYPE.is_int() || v.fract() == 0.0)
                .then(|| <T as NumCast>::from(v))
                .flatten(),
        }
    }

    as_primitive!(u8);
    as_primitive!(u16);
    as_primitive!(u32);
    as_primitive!(u64);
    as_primitive!(i8);
    as_primitive!(i16);
    as_primitive!(i32);
    as_primitive!(i64);
    as_primitive!(f32);
    as_primitive!(f64);

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::U64(v) => Some(v.into()),
            Self::I8(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::I64(v) => Some(v.into()),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to another physical type, failing with `TypeError` if the value does not fit.
    pub fn cast(&self, ptype: PType) -> QuarryResult<PValue> {
        match_each_native_ptype!(ptype, |$T| {
            self.as_primitive::<$T>()
                .map(PValue::from)
                .ok_or_else(|| quarry_err!(TypeError: "value {} does not fit in {}", self, ptype))
        })
    }

    /// Convert to another physical type only if converting back yields the same value.
    pub fn cast_lossless(&self, ptype: PType) -> Option<PValue> {
        let cast = self.cast(ptype).ok()?;
        let back = cast.cast(self.ptype()).ok()?;
        (back.to_le_bytes() == self.to_le_bytes()).then_some(cast)
    }

    /// The little-endian bytes of the value.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => v.to_le_bytes().to_vec(),
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::U64(v) => v.to_le_bytes().to_vec(),
            Self::I8(v) => v.to_le_bytes().to_vec(),
            Self::I16(v) => v.to_le_bytes().to_vec(),
            Self::I32(v) => v.to_le_bytes().to_vec(),
            Self::I64(v) => v.to_le_bytes().to_vec(),
            Self::F32(v) => v.to_le_bytes().to_vec(),
            Self::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Decode a value of `ptype` from its little-endian bytes.
    pub fn from_le_bytes(ptype: PType, bytes: &[u8]) -> QuarryResult<PValue> {
        if bytes.len() != ptype.byte_width() {
            quarry_bail!(
                FormatError: "expected {} bytes for a {} value, found {}",
                ptype.byte_width(),
                ptype,
                bytes.len()
            );
        }
        macro_rules! decode {
            ($T:ty) => {{
                let mut raw = [0u8; size_of::<$T>()];
                raw.copy_from_slice(bytes);
                PValue::from(<$T>::from_le_bytes(raw))
            }};
        }
        Ok(match ptype {
            PType::U8 => decode!(u8),
            PType::U16 => decode!(u16),
            PType::U32 => decode!(u32),
            PType::U64 => decode!(u64),
            PType::I8 => decode!(i8),
            PType::I16 => decode!(i16),
            PType::I32 => decode!(i32),
            PType::I64 => decode!(i64),
            PType::F32 => decode!(f32),
            PType::F64 => decode!(f64),
        })
    }
}

macro_rules! pvalue_from {
    ($T:ty, $PT:tt) => {
        impl From<$T> for PValue {
            fn from(value: $T) -> Self {
                PValue::$PT(value)
            }
        }
    };
}

pvalue_from!(u8, U8);
pvalue_from!(u16, U16);
pvalue_from!(u32, U32);
pvalue_from!(u64, U64);
pvalue_from!(i8, I8);
pvalue_from!(i16, I16);
pvalue_from!(i32, I32);
pvalue_from!(i64, I64);
pvalue_from!(f32, F32);
pvalue_from!(f64, F64);

impl Display for PValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{}u8", v),
            Self::U16(v) => write!(f, "{}u16", v),
            Self::U32(v) => write!(f, "{}u32", v),
            Self::U64(v) => write!(f, "{}u64", v),
            Self::I8(v) => write!(f, "{}i8", v),
            Self::I16(v) => write!(f, "{}i16", v),
            Self::I32(v) => write!(f, "{}i32", v),
            Self::I64(v) => write!(f, "{}i64", v),
            Self::F32(v) => write!(f, "{}f32", v),
            Self::F64(v) => write!(f, "{}f64", v),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[test]
    fn integers_compare_across_widths() {
        assert_eq!(PValue::I32(7), PValue::U64(7));
        assert!(PValue::I8(-1) < PValue::U8(0));
        assert_eq!(PValue::F32(1.0).partial_cmp(&PValue::I32(1)), None);
    }

    #[rstest]
    #[case(PValue::I64(300), PType::I8, None)]
    #[case(PValue::I64(-1), PType::U32, None)]
    #[case(PValue::I32(5), PType::I64, Some(PValue::I64(5)))]
    #[case(PValue::F64(1.5), PType::I64, None)]
    #[case(PValue::F64(2.0), PType::I16, Some(PValue::I16(2)))]
    fn checked_cast(#[case] value: PValue, #[case] ptype: PType, #[case] expected: Option<PValue>) {
        assert_eq!(value.cast(ptype).ok(), expected);
    }

    #[test]
    fn lossless_cast() {
        assert_eq!(PValue::I64(3).cast_lossless(PType::I32), Some(PValue::I32(3)));
        assert_eq!(PValue::I64(i64::MAX).cast_lossless(PType::F64), None);
        assert_eq!(PValue::F64(0.1).cast_lossless(PType::F32), None);
    }

    #[test]
    fn le_bytes() {
        let value = PValue::I32(-42);
        let decoded = PValue::from_le_bytes(PType::I32, &value.to_le_bytes()).unwrap();
        assert!(decoded.is_instance_of(&PType::I32));
        assert_eq!(decoded, value);
        assert!(PValue::from_le_bytes(PType::I64, &[0, 1]).is_err());
    }
}
