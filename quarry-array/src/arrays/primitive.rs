use quarry_buffer::{Alignment, Buffer, ByteBuffer};
use quarry_dtype::{DType, NativePType, Nullability, PType, match_each_native_ptype};
use quarry_error::{QuarryResult, quarry_bail, quarry_panic};
use quarry_scalar::PValue;

use crate::validity::Validity;

/// Fixed-width numbers held in one flat buffer of `len * width` bytes.
#[derive(Clone, Debug)]
pub struct PrimitiveArray {
    dtype: DType,
    ptype: PType,
    buffer: ByteBuffer,
    validity: Validity,
    len: usize,
}

impl PrimitiveArray {
    /// Create an array from a typed buffer.
    ///
    /// ## Panics
    ///
    /// Panics if a validity bitmap does not cover the buffer.
    pub fn new<T: NativePType>(buffer: impl Into<Buffer<T>>, validity: Validity) -> Self {
        let buffer = buffer.into();
        let len = buffer.len();
        if let Err(err) = validity.check_len(len) {
            quarry_panic!(err);
        }
        Self {
            dtype: DType::Primitive(T::PTYPE, validity.nullability()),
            ptype: T::PTYPE,
            buffer: buffer.into_byte_buffer(),
            validity,
            len,
        }
    }

    /// Create an array of `ptype` values from raw little-endian bytes.
    ///
    /// The bytes are reused without copying when they are suitably aligned.
    pub fn from_byte_buffer(
        buffer: ByteBuffer,
        ptype: PType,
        validity: Validity,
    ) -> QuarryResult<Self> {
        let width = ptype.byte_width();
        if buffer.len() % width != 0 {
            quarry_bail!(
                "buffer of {} bytes is not a multiple of the {} width {}",
                buffer.len(),
                ptype,
                width
            );
        }
        let len = buffer.len() / width;
        validity.check_len(len)?;
        let buffer = if buffer.as_slice().as_ptr().align_offset(width) == 0 {
            buffer
        } else {
            buffer.aligned(Alignment::new(width))
        };
        Ok(Self {
            dtype: DType::Primitive(ptype, validity.nullability()),
            ptype,
            buffer,
            validity,
            len,
        })
    }

    /// Create a non-nullable array from an iterator of values.
    pub fn from_iter<T: NativePType, I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(Buffer::<T>::from_iter(iter), Validity::NonNullable)
    }

    /// Create a nullable array from an iterator of optional values.
    pub fn from_option_iter<T: NativePType, I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let (values, validity): (Vec<T>, Vec<bool>) = iter
            .into_iter()
            .map(|v| (v.unwrap_or_default(), v.is_some()))
            .unzip();
        Self::new(
            Buffer::copy_from(values),
            Validity::Array(validity.into_iter().collect()),
        )
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The physical type of the values.
    pub fn ptype(&self) -> PType {
        self.ptype
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
    pub fn byte_buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    /// The values as a typed slice. Null slots hold unspecified values.
    ///
    /// ## Panics
    ///
    /// Panics if `T` is not the physical type of the array.
    pub fn as_slice<T: NativePType>(&self) -> &[T] {
        if T::PTYPE != self.ptype {
            quarry_panic!(
                "Attempted to get slice of type {} from array of type {}",
                T::PTYPE,
                self.ptype
            );
        }
        let raw = self.buffer.as_slice();
        debug_assert_eq!(raw.as_ptr().align_offset(align_of::<T>()), 0);
        // SAFETY: the ptype matches and alignment is established on construction.
        unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<T>(), self.len) }
    }

    /// The values as a typed buffer sharing this array's memory.
    pub fn buffer<T: NativePType>(&self) -> Buffer<T> {
        if T::PTYPE != self.ptype {
            quarry_panic!(
                "Attempted to get buffer of type {} from array of type {}",
                T::PTYPE,
                self.ptype
            );
        }
        Buffer::<T>::from_byte_buffer(self.buffer.clone())
    }

    /// The value at `index`, ignoring validity.
    pub fn value(&self, index: usize) -> PValue {
        match_each_native_ptype!(self.ptype, |$T| {
            PValue::from(self.as_slice::<$T>()[index])
        })
    }

    /// A zero-copy view over the slots `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        let width = self.ptype.byte_width();
        Self {
            dtype: self.dtype.clone(),
            ptype: self.ptype,
            buffer: self.buffer.slice(start * width..stop * width),
            validity: self.validity.slice(start, stop - start),
            len: stop - start,
        }
    }

    /// The same values with a different validity.
    pub fn with_validity(&self, validity: Validity) -> QuarryResult<Self> {
        validity.check_len(self.len)?;
        Ok(Self {
            dtype: DType::Primitive(self.ptype, validity.nullability()),
            ptype: self.ptype,
            buffer: self.buffer.clone(),
            validity,
            len: self.len,
        })
    }

    /// The nullability of the array.
    pub fn nullability(&self) -> Nullability {
        self.dtype.nullability()
    }
}

#[cfg(test)]
mod tests {
    use quarry_buffer::buffer;

    use super::*;

    #[test]
    fn slice_is_zero_copy() {
        let array = PrimitiveArray::new(buffer![1i64, 2, 3, 4, 5], Validity::NonNullable);
        let sliced = array.slice(1, 4);
        assert_eq!(sliced.as_slice::<i64>(), &[2, 3, 4]);
        assert_eq!(
            sliced.byte_buffer().as_slice().as_ptr(),
            array.as_slice::<i64>()[1..].as_ptr().cast::<u8>()
        );
    }

    #[test]
    fn from_option_iter_tracks_nulls() {
        let array = PrimitiveArray::from_option_iter([Some(1u32), None, Some(3)]);
        assert_eq!(array.dtype(), &DType::Primitive(PType::U32, Nullability::Nullable));
        assert!(array.validity().is_null(1));
        assert_eq!(array.value(2), PValue::U32(3));
    }

    #[test]
    #[should_panic]
    fn wrong_ptype_panics() {
        PrimitiveArray::from_iter([1u8, 2]).as_slice::<i32>();
    }

    #[test]
    fn misaligned_bytes_are_realigned() {
        let bytes = ByteBuffer::from(vec![0u8, 1, 0, 0, 0, 2, 0, 0, 0]).slice(1..);
        let array = PrimitiveArray::from_byte_buffer(bytes, PType::I32, Validity::NonNullable).unwrap();
        assert_eq!(array.as_slice::<i32>(), &[1, 2]);
    }
}
