use quarry_dtype::{DType, TemporalType};
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::PrimitiveArray;
use crate::validity::Validity;

/// Dates, times, timestamps and durations, stored as a primitive array of their integers.
#[derive(Clone, Debug)]
pub struct TemporalArray {
    dtype: DType,
    temporal: TemporalType,
    storage: PrimitiveArray,
}

impl TemporalArray {
    /// Wrap a primitive array of the temporal type's storage type.
    pub fn try_new(temporal: TemporalType, storage: PrimitiveArray) -> QuarryResult<Self> {
        if storage.ptype() != temporal.storage_ptype() {
            quarry_bail!(
                TypeError: "{} values must be stored as {}, found {}",
                temporal,
                temporal.storage_ptype(),
                storage.ptype()
            );
        }
        Ok(Self {
            dtype: DType::Temporal(temporal.clone(), storage.nullability()),
            temporal,
            storage,
        })
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The temporal type of the values.
    pub fn temporal_type(&self) -> &TemporalType {
        &self.temporal
    }

    /// The underlying integers.
    pub fn storage(&self) -> &PrimitiveArray {
        &self.storage
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The validity of the slots.
    pub fn validity(&self) -> &Validity {
        self.storage.validity()
    }

    /// A zero-copy view over the slots `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        Self {
            dtype: self.dtype.clone(),
            temporal: self.temporal.clone(),
            storage: self.storage.slice(start, stop),
        }
    }
}
