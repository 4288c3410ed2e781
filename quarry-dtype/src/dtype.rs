use std::fmt::{Display, Formatter};

use quarry_error::{QuarryResult, quarry_bail};
use DType::*;

use crate::nullability::Nullability;
use crate::{PType, TemporalType};

/// The logical types of elements in Quarry arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DType {
    /// The logical null type (only has a single value, `null`)
    Null,
    /// The logical boolean type
    Bool(Nullability),
    /// Primitive, fixed-width numeric types
    Primitive(PType, Nullability),
    /// UTF-8 strings
    Utf8(Nullability),
    /// Variable-width binary data
    Binary(Nullability),
    /// Binary data where every value has the same width in bytes
    FixedSizeBinary(u32, Nullability),
    /// Dates, times, timestamps and durations
    Temporal(TemporalType, Nullability),
}

impl DType {
    /// Get the nullability of the DType
    pub fn nullability(&self) -> Nullability {
        self.is_nullable().into()
    }

    /// Check if the DType is nullable
    pub fn is_nullable(&self) -> bool {
        use crate::nullability::Nullability::*;

        match self {
            Null => true,
            Bool(n)
            | Primitive(_, n)
            | Utf8(n)
            | Binary(n)
            | FixedSizeBinary(_, n)
            | Temporal(_, n) => matches!(n, Nullable),
        }
    }

    /// Get a new DType with `Nullability::NonNullable` (but otherwise the same as `self`)
    pub fn as_nonnullable(&self) -> Self {
        self.with_nullability(Nullability::NonNullable)
    }

    /// Get a new DType with `Nullability::Nullable` (but otherwise the same as `self`)
    pub fn as_nullable(&self) -> Self {
        self.with_nullability(Nullability::Nullable)
    }

    /// Get a new DType with the given nullability (but otherwise the same as `self`)
    pub fn with_nullability(&self, nullability: Nullability) -> Self {
        match self {
            Null => Null,
            Bool(_) => Bool(nullability),
            Primitive(p, _) => Primitive(*p, nullability),
            Utf8(_) => Utf8(nullability),
            Binary(_) => Binary(nullability),
            FixedSizeBinary(w, _) => FixedSizeBinary(*w, nullability),
            Temporal(t, _) => Temporal(t.clone(), nullability),
        }
    }

    /// Check if `self` and `other` are equal, ignoring nullability
    pub fn eq_ignore_nullability(&self, other: &Self) -> bool {
        self.as_nullable().eq(&other.as_nullable())
    }

    /// Check if `self` is an unsigned integer
    pub fn is_unsigned_int(&self) -> bool {
        PType::try_from(self).is_ok_and(PType::is_unsigned_int)
    }

    /// Check if `self` is a signed integer
    pub fn is_signed_int(&self) -> bool {
        PType::try_from(self).is_ok_and(PType::is_signed_int)
    }

    /// Check if `self` is an integer (signed or unsigned)
    pub fn is_int(&self) -> bool {
        PType::try_from(self).is_ok_and(PType::is_int)
    }

    /// Check if `self` is a floating point number
    pub fn is_float(&self) -> bool {
        PType::try_from(self).is_ok_and(PType::is_float)
    }

    /// Check if `self` is a primitive numeric type
    pub fn is_primitive(&self) -> bool {
        matches!(self, Primitive(..))
    }

    /// Check if `self` is a boolean
    pub fn is_boolean(&self) -> bool {
        matches!(self, Bool(_))
    }

    /// Check if `self` holds variable-width values
    pub fn is_varbin(&self) -> bool {
        matches!(self, Utf8(_) | Binary(_))
    }

    /// The physical primitive type backing this type, if it is stored as one.
    pub fn storage_ptype(&self) -> Option<PType> {
        match self {
            Primitive(p, _) => Some(*p),
            Temporal(t, _) => Some(t.storage_ptype()),
            _ => None,
        }
    }

    /// The width in bytes of a single value, for fixed-width types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FixedSizeBinary(w, _) => Some(*w as usize),
            _ => self.storage_ptype().map(|p| p.byte_width()),
        }
    }

    /// The type both `self` and `other` can be losslessly widened to, for reconciling the
    /// schemas of different files.
    ///
    /// Identical types differing only in nullability become nullable. Integers widen within
    /// their signedness and floats widen to the larger float. Values of the `Null` type fit
    /// any type once it is nullable. Every other pairing is a `SchemaConflict`.
    pub fn widen(&self, other: &DType) -> QuarryResult<DType> {
        let nullability = self.nullability() | other.nullability();
        match (self, other) {
            (Null, dtype) | (dtype, Null) => Ok(dtype.as_nullable()),
            (a, b) if a.eq_ignore_nullability(b) => Ok(a.with_nullability(nullability)),
            (Primitive(a, _), Primitive(b, _)) => match a.widen(*b) {
                Some(p) => Ok(Primitive(p, nullability)),
                None => quarry_bail!(
                    SchemaConflict: "cannot reconcile {} with {}: mixed numeric families are never widened",
                    self,
                    other
                ),
            },
            _ => quarry_bail!(SchemaConflict: "cannot reconcile {} with {}", self, other),
        }
    }

    /// Whether an explicit cast from `self` to `other` is defined.
    ///
    /// A defined cast can still fail for individual values, e.g. on overflow.
    pub fn can_cast_to(&self, other: &DType) -> bool {
        match (self, other) {
            (a, b) if a.eq_ignore_nullability(b) => true,
            (Null, b) => b.is_nullable(),
            (Primitive(..), Primitive(..)) => true,
            (Bool(_), Primitive(p, _)) => p.is_int(),
            (Primitive(p, _), Bool(_)) => p.is_int(),
            (Temporal(..), Primitive(p, _)) | (Primitive(p, _), Temporal(..)) => p.is_int(),
            (Utf8(_), Binary(_)) | (Binary(_), Utf8(_)) => true,
            (FixedSizeBinary(..), Binary(_)) | (Binary(_), FixedSizeBinary(..)) => true,
            _ => false,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Null => write!(f, "null"),
            Bool(n) => write!(f, "bool{}", n),
            Primitive(pt, n) => write!(f, "{}{}", pt, n),
            Utf8(n) => write!(f, "utf8{}", n),
            Binary(n) => write!(f, "binary{}", n),
            FixedSizeBinary(w, n) => write!(f, "fixed_size_binary({}){}", w, n),
            Temporal(t, n) => write!(f, "{}{}", t, n),
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;
    use rstest::rstest;

    use super::*;
    use crate::Nullability::{NonNullable, Nullable};
    use crate::TimeUnit;

    #[rstest]
    #[case(Primitive(PType::I32, NonNullable), Primitive(PType::I64, NonNullable), Primitive(PType::I64, NonNullable))]
    #[case(Primitive(PType::I32, Nullable), Primitive(PType::I32, NonNullable), Primitive(PType::I32, Nullable))]
    #[case(Primitive(PType::U8, NonNullable), Primitive(PType::U16, Nullable), Primitive(PType::U16, Nullable))]
    #[case(Null, Utf8(NonNullable), Utf8(Nullable))]
    fn widen_compatible(#[case] a: DType, #[case] b: DType, #[case] expected: DType) {
        assert_eq!(a.widen(&b).unwrap(), expected);
        assert_eq!(b.widen(&a).unwrap(), expected);
    }

    #[rstest]
    #[case(Primitive(PType::U32, NonNullable), Primitive(PType::I64, NonNullable))]
    #[case(Primitive(PType::I64, NonNullable), Primitive(PType::F64, NonNullable))]
    #[case(Utf8(NonNullable), Binary(NonNullable))]
    #[case(
        Temporal(TemporalType::Timestamp(TimeUnit::Ms, None), NonNullable),
        Temporal(TemporalType::Timestamp(TimeUnit::Us, None), NonNullable)
    )]
    fn widen_conflicting(#[case] a: DType, #[case] b: DType) {
        assert_eq!(a.widen(&b).unwrap_err().kind(), ErrorKind::SchemaConflict);
    }

    #[test]
    fn casts() {
        let i32_ = Primitive(PType::I32, NonNullable);
        assert!(i32_.can_cast_to(&Primitive(PType::I64, NonNullable)));
        assert!(i32_.can_cast_to(&Temporal(TemporalType::Date32, NonNullable)));
        assert!(!Utf8(NonNullable).can_cast_to(&i32_));
        assert!(!Null.can_cast_to(&i32_));
    }

    #[test]
    fn display() {
        assert_eq!(Primitive(PType::I64, Nullable).to_string(), "i64?");
        assert_eq!(
            Temporal(TemporalType::Timestamp(TimeUnit::Us, Some("UTC".into())), NonNullable)
                .to_string(),
            "timestamp[us, UTC]"
        );
    }
}
