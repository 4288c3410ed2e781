use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use bytes::{Buf, BytesMut};
use quarry_error::quarry_panic;

use crate::{Alignment, Buffer};

/// A mutable buffer that maintains a runtime-defined alignment through resizing operations.
pub struct BufferMut<T> {
    pub(crate) bytes: BytesMut,
    pub(crate) length: usize,
    pub(crate) alignment: Alignment,
    pub(crate) _marker: PhantomData<T>,
}

impl<T: Copy> BufferMut<T> {
    /// Create a new `BufferMut` with the requested capacity, aligned to `T`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_aligned(capacity, Alignment::of::<T>())
    }

    /// Create a new `BufferMut` with the requested capacity and alignment.
    pub fn with_capacity_aligned(capacity: usize, alignment: Alignment) -> Self {
        if !alignment.is_aligned_to(Alignment::of::<T>()) {
            quarry_panic!(
                "Alignment {} must align to the natural alignment of the element type {}",
                alignment,
                align_of::<T>()
            );
        }

        let mut bytes = BytesMut::with_capacity((capacity * size_of::<T>()) + *alignment);
        align_empty_bytes(&mut bytes, alignment);

        Self {
            bytes,
            length: 0,
            alignment,
            _marker: PhantomData,
        }
    }

    /// Create a new empty `BufferMut`.
    pub fn empty() -> Self {
        Self::with_capacity(0)
    }

    /// Create a `BufferMut` of `len` copies of `item`.
    pub fn full(item: T, len: usize) -> Self {
        let mut buffer = Self::with_capacity(len);
        buffer.extend(std::iter::repeat_n(item, len));
        buffer
    }

    /// Create a `BufferMut` by copying the given values.
    pub fn copy_from(values: impl AsRef<[T]>) -> Self {
        let values = values.as_ref();
        let mut buffer = Self::with_capacity(values.len());
        buffer.extend_from_slice(values);
        buffer
    }

    /// Get the alignment of the buffer.
    #[inline(always)]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Returns the length of the buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns whether the buffer is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the number of elements the buffer can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity() / size_of::<T>()
    }

    /// Returns a slice over the buffer of elements of type T.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        let raw_slice = self.bytes.as_ref();
        // SAFETY: alignment of the bytes is maintained by every mutating operation.
        unsafe { std::slice::from_raw_parts(raw_slice.as_ptr().cast(), self.length) }
    }

    /// Returns a mutable slice over the buffer of elements of type T.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let raw_slice = self.bytes.as_mut();
        // SAFETY: alignment of the bytes is maintained by every mutating operation.
        unsafe { std::slice::from_raw_parts_mut(raw_slice.as_mut_ptr().cast(), self.length) }
    }

    /// Clear the buffer, retaining any existing capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.length = 0;
    }

    /// Shortens the buffer to `len` elements. Has no effect if `len` exceeds the length.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        if len < self.length {
            self.bytes.truncate(len * size_of::<T>());
            self.length = len;
        }
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// A reallocation copies the existing elements into a freshly aligned allocation.
    pub fn reserve(&mut self, additional: usize) {
        let additional_bytes = additional * size_of::<T>();
        if additional_bytes <= self.bytes.capacity() - self.bytes.len() {
            return;
        }

        let required = self.bytes.len() + additional_bytes;
        let new_capacity = required.max(self.bytes.capacity() * 2) + *self.alignment;

        let mut bytes = BytesMut::with_capacity(new_capacity);
        align_empty_bytes(&mut bytes, self.alignment);
        bytes.extend_from_slice(&self.bytes);
        self.bytes = bytes;
    }

    /// Appends a value to the buffer.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.reserve(1);
        // SAFETY: T is Copy, so its bytes may be read directly.
        let raw = unsafe {
            std::slice::from_raw_parts((&raw const value).cast::<u8>(), size_of::<T>())
        };
        self.bytes.extend_from_slice(raw);
        self.length += 1;
    }

    /// Appends every value of a slice to the buffer.
    pub fn extend_from_slice(&mut self, values: &[T]) {
        self.reserve(values.len());
        // SAFETY: T is Copy, so its bytes may be read directly.
        let raw = unsafe {
            std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), size_of_val(values))
        };
        self.bytes.extend_from_slice(raw);
        self.length += values.len();
    }

    /// Freeze the `BufferMut` into an immutable `Buffer` without copying.
    pub fn freeze(self) -> Buffer<T> {
        Buffer {
            bytes: self.bytes.freeze(),
            length: self.length,
            alignment: self.alignment,
            _marker: PhantomData,
        }
    }
}

/// Pads an empty `BytesMut` so that its start pointer has the requested alignment.
fn align_empty_bytes(bytes: &mut BytesMut, alignment: Alignment) {
    let padding = bytes.as_ptr().align_offset(*alignment);
    bytes.resize(padding, 0);
    bytes.advance(padding);
}

impl<T: Copy> Clone for BufferMut<T> {
    fn clone(&self) -> Self {
        let mut buffer = Self::with_capacity_aligned(self.length, self.alignment);
        buffer.extend_from_slice(self.as_slice());
        buffer
    }
}

impl<T: Copy + Debug> Debug for BufferMut<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferMut")
            .field("length", &self.length)
            .field("alignment", &self.alignment)
            .field("as_slice", &self.as_slice())
            .finish()
    }
}

impl<T: Copy> Default for BufferMut<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Copy> Deref for BufferMut<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Copy> DerefMut for BufferMut<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: Copy> Extend<T> for BufferMut<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T: Copy + 'a> Extend<&'a T> for BufferMut<T> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied())
    }
}

impl<T: Copy> FromIterator<T> for BufferMut<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut buffer = Self::empty();
        buffer.extend(iter);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use crate::{Alignment, BufferMut, buffer_mut};

    #[test]
    fn capacity_grows_and_stays_aligned() {
        let mut buf = BufferMut::<u64>::with_capacity_aligned(1, Alignment::new(64));
        for i in 0..1000u64 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.as_slice()[999], 999);
        assert_eq!(buf.as_ptr().align_offset(64), 0);
    }

    #[test]
    fn freeze_is_zero_copy() {
        let buf = buffer_mut![1i32, 2, 3];
        let ptr = buf.as_ptr();
        let frozen = buf.freeze();
        assert_eq!(frozen.as_ptr(), ptr);
        assert_eq!(frozen.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn truncate_and_clear() {
        let mut buf = BufferMut::<u16>::full(7, 10);
        buf.truncate(4);
        assert_eq!(buf.as_slice(), &[7, 7, 7, 7]);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn deref_mut_writes_through() {
        let mut buf = BufferMut::<i8>::copy_from([1, 2, 3]);
        buf[1] = 20;
        assert_eq!(buf.freeze().as_slice(), &[1, 20, 3]);
    }
}
