use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use quarry_buffer::ByteBuffer;

/// A source of positional reads.
///
/// Readers are shared between threads, so implementations must be `Send + Sync`. A read past
/// the end fails with [`UnexpectedEof`][io::ErrorKind::UnexpectedEof].
pub trait ReadAt: Send + Sync {
    /// Read the bytes in `range`.
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes>;

    /// The number of readable bytes.
    fn size(&self) -> io::Result<u64>;
}

pub(crate) fn check_range(range: &Range<u64>, size: u64) -> io::Result<(usize, usize)> {
    if range.start > range.end || range.end > size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {range:?} is outside an object of {size} bytes"),
        ));
    }
    let start = usize::try_from(range.start).map_err(io::Error::other)?;
    let end = usize::try_from(range.end).map_err(io::Error::other)?;
    Ok((start, end))
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        T::read_byte_range(self, range)
    }

    fn size(&self) -> io::Result<u64> {
        T::size(self)
    }
}

impl ReadAt for Bytes {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let (start, end) = check_range(&range, self.len() as u64)?;
        Ok(self.slice(start..end))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for ByteBuffer {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        self.inner().read_byte_range(range)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}
