use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::str::Utf8Error;

use quarry_error::{QuarryError, quarry_err};

use crate::ByteBuffer;

/// A wrapper around a [`ByteBuffer`] that guarantees that the buffer contains valid UTF-8.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferString(ByteBuffer);

impl BufferString {
    /// Creates a new `BufferString` from a [`ByteBuffer`].
    ///
    /// # Safety
    /// Assumes that the buffer contains valid UTF-8.
    pub const unsafe fn new_unchecked(buffer: ByteBuffer) -> Self {
        Self(buffer)
    }

    /// Create an empty string.
    pub fn empty() -> Self {
        Self(ByteBuffer::empty())
    }

    /// Return a view of the contents as a string slice.
    pub fn as_str(&self) -> &str {
        // SAFETY: UTF-8 is validated on construction.
        unsafe { std::str::from_utf8_unchecked(self.0.as_slice()) }
    }

    /// Returns the underlying bytes.
    pub fn inner(&self) -> &ByteBuffer {
        &self.0
    }

    /// Consumes the string and returns the underlying bytes.
    pub fn into_inner(self) -> ByteBuffer {
        self.0
    }
}

impl Debug for BufferString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BufferString").field(&self.as_str()).finish()
    }
}

impl Display for BufferString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.as_str(), f)
    }
}

impl From<BufferString> for ByteBuffer {
    fn from(value: BufferString) -> Self {
        value.0
    }
}

impl From<String> for BufferString {
    fn from(value: String) -> Self {
        Self(ByteBuffer::from(value.into_bytes()))
    }
}

impl From<&str> for BufferString {
    fn from(value: &str) -> Self {
        Self(ByteBuffer::copy_from(value.as_bytes()))
    }
}

impl TryFrom<ByteBuffer> for BufferString {
    type Error = QuarryError;

    fn try_from(value: ByteBuffer) -> Result<Self, Self::Error> {
        std::str::from_utf8(value.as_slice())
            .map_err(|e: Utf8Error| quarry_err!(TypeError: "invalid UTF-8: {}", e))?;
        Ok(Self(value))
    }
}

impl Deref for BufferString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for BufferString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use crate::{BufferString, ByteBuffer};

    #[test]
    fn buffer_string() {
        let buf = BufferString::from("hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_str(), "hello");
        assert_eq!(buf.into_inner().as_slice(), b"hello");
    }

    #[test]
    fn buffer_string_rejects_invalid_utf8() {
        let err = BufferString::try_from(ByteBuffer::from(vec![0xffu8, 0xfe])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}
