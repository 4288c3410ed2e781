#![deny(missing_docs)]

//! Storage access for Quarry.
//!
//! The file codec reads through [`ReadAt`], a cheaply cloneable positional reader. Datasets
//! enumerate and open files through [`ObjectStorage`]. Both can be wrapped with
//! [`InstrumentedStorage`] to count the files opened and bytes fetched.

pub use file::*;
pub use memory::*;
pub use metrics::*;
pub use ranges::*;
pub use read::*;
pub use storage::*;

mod file;
mod memory;
mod metrics;
mod ranges;
mod read;
mod storage;
