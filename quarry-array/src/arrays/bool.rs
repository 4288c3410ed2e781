use arrow_buffer::BooleanBuffer;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_panic};

use crate::validity::Validity;

/// Booleans packed one bit per slot.
#[derive(Clone, Debug)]
pub struct BoolArray {
    dtype: DType,
    buffer: BooleanBuffer,
    validity: Validity,
}

impl BoolArray {
    /// Create an array from a bitmap of values.
    ///
    /// ## Panics
    ///
    /// Panics if a validity bitmap does not cover the values.
    pub fn new(buffer: BooleanBuffer, validity: Validity) -> Self {
        Self::try_new(buffer, validity).unwrap_or_else(|err| quarry_panic!(err))
    }

    /// Create an array from a bitmap of values, checking the validity length.
    pub fn try_new(buffer: BooleanBuffer, validity: Validity) -> QuarryResult<Self> {
        validity.check_len(buffer.len())?;
        Ok(Self {
            dtype: DType::Bool(validity.nullability()),
            buffer,
            validity,
        })
    }

    /// Create a nullable array from an iterator of optional values.
    pub fn from_option_iter<I: IntoIterator<Item = Option<bool>>>(iter: I) -> Self {
        let (values, validity): (Vec<bool>, Vec<bool>) = iter
            .into_iter()
            .map(|v| (v.unwrap_or_default(), v.is_some()))
            .unzip();
        Self::new(
            BooleanBuffer::from_iter(values),
            Validity::Array(BooleanBuffer::from_iter(validity)),
        )
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The value bitmap. Null slots hold unspecified bits.
    pub fn boolean_buffer(&self) -> &BooleanBuffer {
        &self.buffer
    }

    /// The validity of the slots.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// The value at `index`, ignoring validity.
    pub fn value(&self, index: usize) -> bool {
        self.buffer.value(index)
    }

    /// A zero-copy view over the slots `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        Self {
            dtype: self.dtype.clone(),
            buffer: self.buffer.slice(start, stop - start),
            validity: self.validity.slice(start, stop - start),
        }
    }

    /// Positions that are valid and true.
    pub fn true_and_valid(&self) -> BooleanBuffer {
        match self.validity.to_null_buffer(self.len()) {
            None => self.buffer.clone(),
            Some(valid) => &self.buffer & &valid,
        }
    }
}

impl FromIterator<bool> for BoolArray {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self::new(BooleanBuffer::from_iter(iter), Validity::NonNullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_and_value() {
        let array = BoolArray::from_iter([true, false, true, true]);
        let sliced = array.slice(1, 3);
        assert!(!sliced.value(0));
        assert!(sliced.value(1));
        assert_eq!(sliced.len(), 2);
        assert_eq!(
            sliced.boolean_buffer().inner().as_ptr(),
            array.boolean_buffer().inner().as_ptr()
        );
    }

    #[test]
    fn true_and_valid_ignores_nulls() {
        let array = BoolArray::from_option_iter([Some(true), None, Some(false)]);
        assert_eq!(array.true_and_valid().count_set_bits(), 1);
    }
}
