use std::fmt::{Display, Formatter};

use itertools::Itertools;
use quarry_buffer::{BufferString, ByteBuffer};

use crate::PValue;

/// The untyped payload of a [`Scalar`](crate::Scalar).
///
/// The [`DType`](quarry_dtype::DType) of the owning scalar decides how the payload is read:
/// temporal values are stored as their physical integers, utf8 values as validated strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd)]
pub enum ScalarValue {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A primitive number.
    Primitive(PValue),
    /// Raw bytes.
    Buffer(ByteBuffer),
    /// UTF-8 text.
    BufferString(BufferString),
}

impl ScalarValue {
    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Primitive(pvalue) => write!(f, "{}", pvalue),
            Self::Buffer(buf) => write!(
                f,
                "0x{}",
                buf.as_slice().iter().map(|b| format!("{b:02x}")).join("")
            ),
            Self::BufferString(s) => write!(f, "\"{}\"", s.as_str()),
        }
    }
}
