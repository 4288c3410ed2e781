use quarry_buffer::ByteBuffer;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_bail};

use crate::validity::Validity;

/// Binary values that all have the same width, held in one flat buffer.
#[derive(Clone, Debug)]
pub struct FixedSizeBinaryArray {
    dtype: DType,
    width: u32,
    bytes: ByteBuffer,
    validity: Validity,
    len: usize,
}

impl FixedSizeBinaryArray {
    /// Create an array of `width`-byte values.
    pub fn try_new(width: u32, bytes: ByteBuffer, validity: Validity) -> QuarryResult<Self> {
        if width == 0 {
            quarry_bail!("fixed-size binary width must be positive");
        }
        let w = width as usize;
        if bytes.len() % w != 0 {
            quarry_bail!(
                "buffer of {} bytes is not a multiple of the value width {}",
                bytes.len(),
                width
            );
        }
        let len = bytes.len() / w;
        validity.check_len(len)?;
        Ok(Self {
            dtype: DType::FixedSizeBinary(width, validity.nullability()),
            width,
            bytes,
            validity,
            len,
        })
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The width of every value, in bytes.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The validity of the slots.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// The raw value bytes.
    pub fn bytes(&self) -> &ByteBuffer {
        &self.bytes
    }

    /// The bytes of the slot at `index`, ignoring validity.
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        let w = self.width as usize;
        &self.bytes.as_slice()[index * w..(index + 1) * w]
    }

    /// The slot at `index` as a shared buffer, ignoring validity.
    pub fn buffer_at(&self, index: usize) -> ByteBuffer {
        let w = self.width as usize;
        self.bytes.slice(index * w..(index + 1) * w)
    }

    /// A zero-copy view over the slots `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        let w = self.width as usize;
        Self {
            dtype: self.dtype.clone(),
            width: self.width,
            bytes: self.bytes.slice(start * w..stop * w),
            validity: self.validity.slice(start, stop - start),
            len: stop - start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_slots() {
        let array = FixedSizeBinaryArray::try_new(
            2,
            ByteBuffer::copy_from(b"aabbcc"),
            Validity::NonNullable,
        )
        .unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.slice(1, 3).bytes_at(1), b"cc");
        assert!(FixedSizeBinaryArray::try_new(4, ByteBuffer::copy_from(b"abc"), Validity::NonNullable).is_err());
    }
}
