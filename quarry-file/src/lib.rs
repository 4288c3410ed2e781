#![allow(clippy::cast_possible_truncation)]
//! Read and write Quarry files: tables laid out as row groups of independently readable
//! column chunks.
//!
//! A file holds one schema. Rows are split into row groups, and each row group stores every
//! column as a contiguous chunk of pages. The trailer records where every chunk and page lives
//! together with per-chunk statistics, so a reader can skip whole row groups and fetch only
//! the byte ranges of the columns it was asked for.
//!
//! # Writing
//!
//! [`FileWriter`] accepts record batches and buffers them until a row group is full. Pages are
//! cut so that their body stays near [`WriteOptions::page_bytes`]. [`FileWriter::finish`] writes
//! the trailer and the footer.
//!
//! # Reading
//!
//! [`FileReader::open`] issues one read for the footer and one for the trailer. Every
//! subsequent read is lazy: [`FileReader::read`] returns an iterator that visits the row groups
//! in order, prunes those whose statistics rule out the predicate, and reads only the projected
//! column chunks of the rest.
//!
//! # File Format
//!
//! All integers are little endian.
//!
//! ```text
//! ┌────────────────────────────┐
//! │        Magic "QRYF"        │
//! ├────────────────────────────┤
//! │  Row group 0               │
//! │    column 0 pages          │
//! │    column 1 pages          │
//! │    ...                     │
//! ├────────────────────────────┤
//! │  Row group 1 ...           │
//! ├────────────────────────────┤
//! │  Trailer (FileMetadata,    │
//! │   flexbuffers encoded)     │
//! ├────────────────────────────┤
//! │  Footer (20 bytes)         │
//! │  8 bytes: trailer offset   │
//! │  4 bytes: trailer length   │
//! │  2 bytes: version          │
//! │  2 bytes: flags            │
//! │  4 bytes: magic "QRYF"     │
//! └────────────────────────────┘
//! ```
//!
//! A page is a 24 byte [`PageHeader`], an optional statistics section holding the plain
//! encoded minimum and maximum, and the body. A plain body is the validity bitmap (only when
//! the page has nulls) followed by the values: `n * width` bytes for fixed width types, packed
//! bits for booleans, and `n + 1` offsets rebased to zero followed by the value bytes for
//! strings and binary.

mod footer;
mod metadata;
mod options;
mod page;
mod reader;
mod stats;
mod writer;

use std::path::Path;
use std::sync::Arc;

pub use footer::*;
pub use forever_constant::*;
pub use metadata::*;
pub use options::*;
pub use page::{Compression, Encoding, PageHeader};
use quarry_array::Table;
use quarry_error::QuarryResult;
use quarry_io::LocalFile;
pub use reader::*;
pub use writer::*;

/// The current version of the file format.
pub const VERSION: u16 = 1;

/// The name recorded in every trailer's `created_by`.
pub const CREATED_BY: &str = concat!("quarry-file ", env!("CARGO_PKG_VERSION"));

/// Constants that will never change (i.e., doing so would break backwards compatibility)
mod forever_constant {
    /// The extension of Quarry files.
    pub const FILE_EXTENSION: &str = "qry";

    /// The magic bytes at the start and end of every file.
    pub const MAGIC_BYTES: [u8; 4] = *b"QRYF";

    /// The size of the footer in bytes.
    pub const FOOTER_SIZE: usize = 20;

    /// The size of a page header in bytes.
    pub const PAGE_HEADER_SIZE: usize = 24;

    /// The largest trailer a reader accepts.
    pub const MAX_METADATA_SIZE: u32 = 256 << 20;

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn never_change_these_constants() {
            assert_eq!(FILE_EXTENSION, "qry");
            assert_eq!(MAGIC_BYTES, *b"QRYF");
            assert_eq!(FOOTER_SIZE, 20);
            assert_eq!(PAGE_HEADER_SIZE, 24);
            assert_eq!(MAX_METADATA_SIZE, 256 << 20);
        }
    }
}

/// Read a whole file from the local file system into a [`Table`].
pub fn read_table(path: impl AsRef<Path>, options: ReadOptions) -> QuarryResult<Table> {
    let reader = FileReader::open(Arc::new(LocalFile::open(path)?))?;
    reader.read(options)?.into_table()
}

/// Write `table` to a new file on the local file system.
pub fn write_table(table: &Table, path: impl AsRef<Path>) -> QuarryResult<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    let mut writer = FileWriter::new(file, table.schema().clone(), WriteOptions::default())?;
    writer.write_table(table)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests;
