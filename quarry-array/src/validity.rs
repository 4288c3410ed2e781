use arrow_buffer::{BooleanBuffer, BooleanBufferBuilder};
use quarry_dtype::Nullability;
use quarry_error::{QuarryResult, quarry_bail};

use crate::Mask;

/// Validity information for an array
#[derive(Clone, Debug)]
pub enum Validity {
    /// Items *can't* be null
    NonNullable,
    /// All items are valid
    AllValid,
    /// All items are null
    AllInvalid,
    /// Specified items are null; a set bit marks a valid slot
    Array(BooleanBuffer),
}

impl Validity {
    /// The validity of a freshly built array with the given nullability and no nulls.
    pub fn from_nullability(nullability: Nullability) -> Self {
        match nullability {
            Nullability::NonNullable => Self::NonNullable,
            Nullability::Nullable => Self::AllValid,
        }
    }

    /// Check that a validity bitmap covers exactly `len` slots.
    pub fn check_len(&self, len: usize) -> QuarryResult<()> {
        if let Self::Array(buffer) = self {
            if buffer.len() != len {
                quarry_bail!(
                    "Validity array length {} doesn't match array length {}",
                    buffer.len(),
                    len
                );
            }
        }
        Ok(())
    }

    /// The nullability of an array with this validity.
    pub fn nullability(&self) -> Nullability {
        match self {
            Self::NonNullable => Nullability::NonNullable,
            _ => Nullability::Nullable,
        }
    }

    /// Returns whether the `index` item is valid.
    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        match self {
            Self::NonNullable | Self::AllValid => true,
            Self::AllInvalid => false,
            Self::Array(buffer) => buffer.value(index),
        }
    }

    /// Returns whether the `index` item is null.
    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        !self.is_valid(index)
    }

    /// The number of null slots among `len`.
    pub fn null_count(&self, len: usize) -> usize {
        match self {
            Self::NonNullable | Self::AllValid => 0,
            Self::AllInvalid => len,
            Self::Array(buffer) => buffer.len() - buffer.count_set_bits(),
        }
    }

    /// A zero-copy view over `len` slots starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        match self {
            Self::Array(buffer) => Self::Array(buffer.slice(offset, len)),
            other => other.clone(),
        }
    }

    /// The validity of the slots at `indices`.
    pub fn take(&self, indices: &[usize]) -> Self {
        match self {
            Self::Array(buffer) => {
                Self::Array(indices.iter().map(|&idx| buffer.value(idx)).collect())
            }
            other => other.clone(),
        }
    }

    /// The validity of the slots at `indices`, where a missing index is null.
    pub fn take_opt(&self, indices: &[Option<usize>]) -> Self {
        if indices.iter().all(Option::is_some) {
            return self.take(&indices.iter().flatten().copied().collect::<Vec<_>>()).into_nullable();
        }
        Self::Array(
            indices
                .iter()
                .map(|idx| idx.is_some_and(|idx| self.is_valid(idx)))
                .collect(),
        )
    }

    /// The validity of the slots selected by `mask`.
    pub fn filter(&self, mask: &Mask) -> Self {
        match (self, mask) {
            (Self::Array(buffer), Mask::Values(values)) => Self::Array(
                values
                    .indices()
                    .iter()
                    .map(|&idx| buffer.value(idx))
                    .collect(),
            ),
            (Self::Array(buffer), Mask::AllTrue(_)) => Self::Array(buffer.clone()),
            (Self::Array(_), Mask::AllFalse(_)) => Self::Array(BooleanBuffer::new_unset(0)),
            (other, _) => other.clone(),
        }
    }

    /// Logically & two Validity values of the same length
    pub fn and(&self, rhs: &Validity) -> Validity {
        match (self, rhs) {
            (Validity::NonNullable, Validity::NonNullable) => Validity::NonNullable,
            (Validity::AllInvalid, _) | (_, Validity::AllInvalid) => Validity::AllInvalid,
            (Validity::Array(a), Validity::AllValid | Validity::NonNullable)
            | (Validity::AllValid | Validity::NonNullable, Validity::Array(a)) => {
                Validity::Array(a.clone())
            }
            (Validity::Array(lhs), Validity::Array(rhs)) => Validity::Array(lhs & rhs),
            _ => Validity::AllValid,
        }
    }

    /// The same validity, as a nullable array would report it.
    pub fn into_nullable(self) -> Validity {
        match self {
            Self::NonNullable => Self::AllValid,
            other => other,
        }
    }

    /// The validity bitmap over `len` slots, `None` when no slot is null.
    pub fn to_null_buffer(&self, len: usize) -> Option<BooleanBuffer> {
        match self {
            Self::NonNullable | Self::AllValid => None,
            Self::AllInvalid => Some(BooleanBuffer::new_unset(len)),
            Self::Array(buffer) => (buffer.count_set_bits() != len).then(|| buffer.clone()),
        }
    }

    /// The valid slots as a [`Mask`].
    pub fn to_mask(&self, len: usize) -> Mask {
        match self {
            Self::NonNullable | Self::AllValid => Mask::AllTrue(len),
            Self::AllInvalid => Mask::AllFalse(len),
            Self::Array(buffer) => Mask::from_buffer(buffer.clone()),
        }
    }

    /// Concatenate the validity of several arrays of the given lengths.
    pub fn concat(parts: &[(Validity, usize)], nullability: Nullability) -> Validity {
        if nullability == Nullability::NonNullable {
            return Validity::NonNullable;
        }
        if parts
            .iter()
            .all(|(v, _)| matches!(v, Validity::NonNullable | Validity::AllValid))
        {
            return Validity::AllValid;
        }
        let total = parts.iter().map(|(_, len)| len).sum();
        let mut builder = BooleanBufferBuilder::new(total);
        for (validity, len) in parts {
            match validity {
                Validity::NonNullable | Validity::AllValid => builder.append_n(*len, true),
                Validity::AllInvalid => builder.append_n(*len, false),
                Validity::Array(buffer) => builder.append_buffer(buffer),
            }
        }
        Validity::Array(builder.finish())
    }
}

impl PartialEq for Validity {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NonNullable, Self::NonNullable) => true,
            (Self::AllValid, Self::AllValid) => true,
            (Self::AllInvalid, Self::AllInvalid) => true,
            (Self::Array(a), Self::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl From<BooleanBuffer> for Validity {
    fn from(value: BooleanBuffer) -> Self {
        if value.count_set_bits() == value.len() {
            Self::AllValid
        } else if value.count_set_bits() == 0 {
            Self::AllInvalid
        } else {
            Self::Array(value)
        }
    }
}

impl FromIterator<bool> for Validity {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Validity::from(BooleanBuffer::from_iter(iter))
    }
}
