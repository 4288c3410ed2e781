use std::fs::File;
use std::io;
use std::ops::{Deref, Range};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::trace;

use crate::ReadAt;
use crate::read::check_range;

/// A cheaply cloneable, read-only file on the local file system.
///
/// Clones share one file descriptor, which is closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct LocalFile(Arc<File>);

impl LocalFile {
    /// Open a file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self(Arc::new(File::open(path)?)))
    }
}

impl Deref for LocalFile {
    type Target = File;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ReadAt for LocalFile {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let (start, end) = check_range(&range, self.size()?)?;
        trace!("reading {} bytes at offset {}", end - start, start);
        let mut buffer = BytesMut::zeroed(end - start);
        self.read_exact_at(&mut buffer, range.start)?;
        Ok(buffer.freeze())
    }

    fn size(&self) -> io::Result<u64> {
        self.metadata().map(|metadata| metadata.len())
    }
}
