use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::DType;

/// A name for a field in a schema
pub type FieldName = Arc<str>;

/// A named column declaration. Nullability is carried by the [`DType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Field {
    name: FieldName,
    dtype: DType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<FieldName>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    /// The name of the field.
    pub fn name(&self) -> &FieldName {
        &self.name
    }

    /// The type of the field.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// Whether the field may hold nulls.
    pub fn is_nullable(&self) -> bool {
        self.dtype.is_nullable()
    }

    /// A copy of this field with a different type.
    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self {
            name: self.name.clone(),
            dtype,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.dtype)
    }
}
