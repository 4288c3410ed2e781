use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::panic::RefUnwindSafe;

use num_traits::{FromPrimitive, Num, NumCast, ToPrimitive};
use quarry_error::{QuarryError, QuarryResult, quarry_err};

use crate::DType;
use crate::Nullability::NonNullable;

/// Physical type enum, represents the in-memory physical layout but might represent a different logical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum PType {
    /// An 8-bit unsigned integer
    U8,
    /// A 16-bit unsigned integer
    U16,
    /// A 32-bit unsigned integer
    U32,
    /// A 64-bit unsigned integer
    U64,
    /// An 8-bit signed integer
    I8,
    /// A 16-bit signed integer
    I16,
    /// A 32-bit signed integer
    I32,
    /// A 64-bit signed integer
    I64,
    /// A 32-bit floating point number
    F32,
    /// A 64-bit floating point number
    F64,
}

/// A trait for native Rust types that correspond 1:1 to a PType
pub trait NativePType:
    Send
    + Sync
    + Clone
    + Copy
    + Debug
    + Display
    + Default
    + PartialEq
    + PartialOrd
    + RefUnwindSafe
    + Num
    + NumCast
    + FromPrimitive
    + ToPrimitive
    + 'static
{
    /// The PType that corresponds to this native type
    const PTYPE: PType;

    /// Whether this instance (`self`) is NaN
    /// For integer types, this is always `false`
    fn is_nan(self) -> bool;

    /// Compare another instance of this type to `self`, providing a total ordering
    fn total_compare(self, other: Self) -> Ordering;

    /// Equality that considers NaN equal to itself
    #[inline]
    fn is_eq(self, other: Self) -> bool {
        self.total_compare(other).is_eq()
    }

    /// The value's bits widened to a `u64`, for hashing
    fn to_bits_u64(self) -> u64;
}

macro_rules! native_ptype {
    ($T:ty, $ptype:tt) => {
        impl NativePType for $T {
            const PTYPE: PType = PType::$ptype;

            #[inline]
            fn is_nan(self) -> bool {
                false
            }

            #[inline]
            fn total_compare(self, other: Self) -> Ordering {
                self.cmp(&other)
            }

            #[inline]
            fn to_bits_u64(self) -> u64 {
                self as u64
            }
        }
    };
}

macro_rules! native_float_ptype {
    ($T:ty, $ptype:tt) => {
        impl NativePType for $T {
            const PTYPE: PType = PType::$ptype;

            #[inline]
            fn is_nan(self) -> bool {
                <$T>::is_nan(self)
            }

            #[inline]
            fn total_compare(self, other: Self) -> Ordering {
                self.total_cmp(&other)
            }

            #[inline]
            fn to_bits_u64(self) -> u64 {
                self.to_bits() as u64
            }
        }
    };
}

native_ptype!(u8, U8);
native_ptype!(u16, U16);
native_ptype!(u32, U32);
native_ptype!(u64, U64);
native_ptype!(i8, I8);
native_ptype!(i16, I16);
native_ptype!(i32, I32);
native_ptype!(i64, I64);
native_float_ptype!(f32, F32);
native_float_ptype!(f64, F64);

/// Macro to match over each PType, binding the corresponding native type (from `NativePType`)
#[macro_export]
macro_rules! match_each_native_ptype {
    ($self:expr, | $_:tt $tp:ident | $($body:tt)*) => ({
        macro_rules! __with__ {( $_ $tp:ident ) => ( $($body)* )}
        use $crate::PType;
        match $self {
            PType::U8 => __with__! { u8 },
            PType::U16 => __with__! { u16 },
            PType::U32 => __with__! { u32 },
            PType::U64 => __with__! { u64 },
            PType::I8 => __with__! { i8 },
            PType::I16 => __with__! { i16 },
            PType::I32 => __with__! { i32 },
            PType::I64 => __with__! { i64 },
            PType::F32 => __with__! { f32 },
            PType::F64 => __with__! { f64 },
        }
    })
}

/// Macro to match over each integer PType, binding the corresponding native type (from `NativePType`)
#[macro_export]
macro_rules! match_each_integer_ptype {
    ($self:expr, | $_:tt $tp:ident | $($body:tt)*) => ({
        macro_rules! __with__ {( $_ $tp:ident ) => ( $($body)* )}
        use $crate::PType;
        match $self {
            PType::U8 => __with__! { u8 },
            PType::U16 => __with__! { u16 },
            PType::U32 => __with__! { u32 },
            PType::U64 => __with__! { u64 },
            PType::I8 => __with__! { i8 },
            PType::I16 => __with__! { i16 },
            PType::I32 => __with__! { i32 },
            PType::I64 => __with__! { i64 },
            other => panic!("Unsupported ptype {other}"),
        }
    })
}

impl PType {
    /// Returns `true` iff this PType is an unsigned integer type
    pub const fn is_unsigned_int(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` iff this PType is a signed integer type
    pub const fn is_signed_int(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` iff this PType is an integer type, signed or unsigned
    pub const fn is_int(self) -> bool {
        self.is_unsigned_int() || self.is_signed_int()
    }

    /// Returns `true` iff this PType is a floating point type
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns the number of bytes in this PType
    pub const fn byte_width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Returns the number of bits in this PType
    pub const fn bit_width(&self) -> usize {
        self.byte_width() * 8
    }

    /// The narrowest type that holds every value of both `self` and `other` without changing
    /// its kind.
    ///
    /// Only types of the same family widen: signed with signed, unsigned with unsigned and
    /// float with float. Any other pairing has no common type.
    pub fn widen(self, other: PType) -> Option<PType> {
        let same_family = (self.is_signed_int() && other.is_signed_int())
            || (self.is_unsigned_int() && other.is_unsigned_int())
            || (self.is_float() && other.is_float());
        same_family.then(|| {
            if self.byte_width() >= other.byte_width() {
                self
            } else {
                other
            }
        })
    }
}

impl Display for PType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

impl TryFrom<&DType> for PType {
    type Error = QuarryError;

    fn try_from(value: &DType) -> QuarryResult<Self> {
        match value {
            DType::Primitive(p, _) => Ok(*p),
            _ => Err(quarry_err!(TypeError: "Cannot convert DType {} into PType", value)),
        }
    }
}

impl From<PType> for DType {
    fn from(item: PType) -> Self {
        DType::Primitive(item, NonNullable)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PType::I32, PType::I64, Some(PType::I64))]
    #[case(PType::I64, PType::I8, Some(PType::I64))]
    #[case(PType::U8, PType::U32, Some(PType::U32))]
    #[case(PType::F32, PType::F64, Some(PType::F64))]
    #[case(PType::U32, PType::I64, None)]
    #[case(PType::I32, PType::F64, None)]
    fn widening(#[case] a: PType, #[case] b: PType, #[case] expected: Option<PType>) {
        assert_eq!(a.widen(b), expected);
        assert_eq!(b.widen(a), expected);
    }

    #[test]
    fn native_ptype_dispatch() {
        let width = match_each_native_ptype!(PType::I16, |$T| { size_of::<$T>() });
        assert_eq!(width, PType::I16.byte_width());
    }

    #[test]
    fn float_total_order() {
        assert!(f64::NAN.is_eq(f64::NAN));
        assert_eq!((-0.0f32).total_compare(0.0), Ordering::Less);
    }
}
