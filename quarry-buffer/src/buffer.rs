use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Bound, Deref, RangeBounds};

use bytes::Bytes;
use quarry_error::{QuarryExpect, quarry_panic};

use crate::{Alignment, BufferMut, ByteBuffer};

/// An immutable buffer of items of `T`, backed by reference-counted bytes.
///
/// Cloning and slicing share the underlying allocation.
pub struct Buffer<T> {
    pub(crate) bytes: Bytes,
    pub(crate) length: usize,
    pub(crate) alignment: Alignment,
    pub(crate) _marker: PhantomData<T>,
}

impl<T> Clone for Buffer<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            length: self.length,
            alignment: self.alignment,
            _marker: PhantomData,
        }
    }
}

impl<T: Copy> Default for Buffer<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Copy> Buffer<T> {
    /// Returns a new `Buffer<T>` copied from the provided `Vec<T>`, `&[T]`, etc.
    pub fn copy_from(values: impl AsRef<[T]>) -> Self {
        BufferMut::copy_from(values).freeze()
    }

    /// Create a new empty `Buffer`.
    pub fn empty() -> Self {
        BufferMut::empty().freeze()
    }

    /// Create a new full `Buffer` with the given value.
    pub fn full(item: T, len: usize) -> Self {
        BufferMut::full(item, len).freeze()
    }

    /// Create a `Buffer<T>` from a [`ByteBuffer`].
    ///
    /// The bytes are reused when they are suitably aligned for `T` and copied otherwise.
    ///
    /// ## Panics
    ///
    /// Panics if the byte length is not a multiple of the size of `T`.
    pub fn from_byte_buffer(buffer: ByteBuffer) -> Self {
        if buffer.len() % size_of::<T>() != 0 {
            quarry_panic!(
                "Byte buffer of length {} is not a multiple of the element size {}",
                buffer.len(),
                size_of::<T>()
            );
        }

        if buffer.as_slice().as_ptr().align_offset(align_of::<T>()) != 0 {
            let mut aligned = BufferMut::<u8>::with_capacity_aligned(buffer.len(), Alignment::of::<T>());
            aligned.extend_from_slice(buffer.as_slice());
            return Self::from_byte_buffer(aligned.freeze());
        }

        let length = buffer.len() / size_of::<T>();
        let alignment = if buffer.alignment.is_aligned_to(Alignment::of::<T>()) {
            buffer.alignment
        } else {
            Alignment::of::<T>()
        };
        Self {
            bytes: buffer.bytes,
            length,
            alignment,
            _marker: PhantomData,
        }
    }

    /// Returns the length of the buffer in elements of type T.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns whether the buffer is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the alignment of the buffer.
    #[inline(always)]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Returns a slice over the buffer of elements of type T.
    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        let raw_slice = self.bytes.as_ref();
        // SAFETY: alignment of the bytes is checked on construction.
        unsafe { std::slice::from_raw_parts(raw_slice.as_ptr().cast(), self.length) }
    }

    /// Returns the size of the buffer in bytes.
    #[inline(always)]
    pub fn nbytes(&self) -> usize {
        self.bytes.len()
    }

    /// Returns an iterator over the buffer of elements of type T.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns a zero-copy slice of the buffer, in units of `T`.
    ///
    /// ## Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let len = self.len();
        let begin = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.checked_add(1).quarry_expect("out of range"),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1).quarry_expect("out of range"),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };

        if begin > end {
            quarry_panic!("range start must not be greater than end: {:?} <= {:?}", begin, end);
        }
        if end > len {
            quarry_panic!(OutOfBounds: end, 0, len);
        }

        if begin == end {
            return Self::empty();
        }

        let alignment = if begin == 0 {
            self.alignment
        } else {
            Alignment::of::<T>()
        };

        Self {
            bytes: self
                .bytes
                .slice(begin * size_of::<T>()..end * size_of::<T>()),
            length: end - begin,
            alignment,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying reference-counted bytes.
    #[inline(always)]
    pub fn inner(&self) -> &Bytes {
        &self.bytes
    }

    /// Consumes the buffer and returns the underlying reference-counted bytes.
    #[inline(always)]
    pub fn into_inner(self) -> Bytes {
        self.bytes
    }

    /// Reinterpret the buffer as a [`ByteBuffer`] without copying.
    pub fn into_byte_buffer(self) -> ByteBuffer {
        ByteBuffer {
            bytes: self.bytes,
            length: self.length * size_of::<T>(),
            alignment: self.alignment,
            _marker: PhantomData,
        }
    }

    /// Return a buffer with the given alignment, copying only when the current one is insufficient.
    pub fn aligned(self, alignment: Alignment) -> Self {
        if self.as_slice().as_ptr().align_offset(*alignment) == 0 {
            Self { alignment, ..self }
        } else {
            let mut buffer = BufferMut::with_capacity_aligned(self.len(), alignment);
            buffer.extend_from_slice(self.as_slice());
            buffer.freeze()
        }
    }

    /// Copy the contents into a new mutable buffer.
    pub fn into_mut(self) -> BufferMut<T> {
        let mut buffer = BufferMut::with_capacity_aligned(self.len(), self.alignment);
        buffer.extend_from_slice(self.as_slice());
        buffer
    }
}

impl ByteBuffer {
    /// Create a `ByteBuffer` from reference-counted bytes without copying.
    pub fn from_bytes(bytes: Bytes) -> Self {
        let length = bytes.len();
        Self {
            bytes,
            length,
            alignment: Alignment::of::<u8>(),
            _marker: PhantomData,
        }
    }
}

impl From<Bytes> for ByteBuffer {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for ByteBuffer {
    fn from(value: &'static [u8]) -> Self {
        Self::from_bytes(Bytes::from_static(value))
    }
}

impl<T: Copy + Debug> Debug for Buffer<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        const TRUNC_SIZE: usize = 16;
        let mut binding = f.debug_struct("Buffer");
        let mut fields = binding
            .field("length", &self.length)
            .field("alignment", &self.alignment);

        if self.len() <= TRUNC_SIZE {
            fields = fields.field("as_slice", &self.as_slice());
        } else {
            fields = fields.field("as_slice(trunc)", &&self.as_slice()[..TRUNC_SIZE]);
        }

        fields.finish()
    }
}

impl<T: Copy> Deref for Buffer<T> {
    type Target = [T];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Copy> AsRef<[T]> for Buffer<T> {
    #[inline(always)]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy + PartialEq> PartialEq for Buffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Copy + Eq> Eq for Buffer<T> {}

impl<T: Copy + PartialOrd> PartialOrd for Buffer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Copy + Ord> Ord for Buffer<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Copy + Hash> Hash for Buffer<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T: Copy> FromIterator<T> for Buffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        BufferMut::from_iter(iter).freeze()
    }
}

impl<T: Copy> From<BufferMut<T>> for Buffer<T> {
    fn from(value: BufferMut<T>) -> Self {
        value.freeze()
    }
}

/// Owned iterator over a [`Buffer`].
pub struct BufferIterator<T> {
    buffer: Buffer<T>,
    index: usize,
}

impl<T: Copy> Iterator for BufferIterator<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let value = self.buffer.as_slice().get(self.index).copied();
        self.index += 1;
        value
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<T: Copy> ExactSizeIterator for BufferIterator<T> {}

impl<T: Copy> IntoIterator for Buffer<T> {
    type Item = T;
    type IntoIter = BufferIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        BufferIterator {
            buffer: self,
            index: 0,
        }
    }
}

impl<'a, T: Copy> IntoIterator for &'a Buffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::{Alignment, Buffer, ByteBuffer, buffer};

    #[test]
    fn slice_shares_memory() {
        let buf = buffer![0u32, 1, 2, 3, 4, 5, 6, 7];
        let sliced = buf.slice(2..5);
        assert_eq!(sliced.as_slice(), &[2, 3, 4]);
        assert_eq!(sliced.as_ptr(), buf.as_slice()[2..].as_ptr());
        assert_eq!(sliced.slice(1..).as_slice(), &[3, 4]);
    }

    #[test]
    #[should_panic]
    fn slice_out_of_bounds() {
        buffer![1u8, 2, 3].slice(1..4);
    }

    #[test]
    fn byte_buffer_reinterpret() {
        let buf = buffer![1i64, -2, 3];
        let ptr = buf.as_ptr();
        let bytes = buf.into_byte_buffer();
        assert_eq!(bytes.len(), 24);
        let back = Buffer::<i64>::from_byte_buffer(bytes);
        assert_eq!(back.as_ptr(), ptr);
        assert_eq!(back.as_slice(), &[1, -2, 3]);
    }

    #[test]
    fn misaligned_bytes_are_copied() {
        let mut raw = vec![0u8; 17];
        raw[1..9].copy_from_slice(&42u64.to_le_bytes());
        raw[9..17].copy_from_slice(&7u64.to_le_bytes());
        let bytes = ByteBuffer::from(Bytes::from(raw)).slice(1..);
        let values = Buffer::<u64>::from_byte_buffer(bytes);
        assert_eq!(values.as_slice(), &[42, 7]);
        assert_eq!(values.as_ptr().align_offset(align_of::<u64>()), 0);
    }

    #[test]
    fn aligned_copies_only_when_needed() {
        let buf = Buffer::<u8>::copy_from(b"abcdef").aligned(Alignment::new(32));
        assert_eq!(buf.as_ptr().align_offset(32), 0);
        assert_eq!(buf.alignment(), Alignment::new(32));
        assert_eq!(buf.as_slice(), b"abcdef");
    }

    #[test]
    fn owned_iteration() {
        let buf = buffer![3u16; 4];
        assert_eq!(buf.into_iter().sum::<u16>(), 12);
    }
}
