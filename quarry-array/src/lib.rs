#![deny(missing_docs)]

//! In-memory columnar data for Quarry.
//!
//! An [`Array`] is an immutable, typed sequence of values laid out in aligned buffers, with an
//! optional validity bitmap. Arrays are grouped into [`ChunkedArray`]s, which in turn form the
//! columns of a [`Table`]. A [`RecordBatch`] is the contiguous unit exchanged with the file
//! codec and scan iterators.
//!
//! Slicing never copies. Every kernel in [`compute`] returns a new array and leaves its
//! inputs untouched, so values can be shared freely across threads.

mod array;
pub mod arrays;
mod batch;
mod builder;
mod chunked;
pub mod compute;
mod mask;
mod table;
mod validity;

pub use array::*;
pub use batch::*;
pub use builder::*;
pub use chunked::*;
pub use mask::*;
pub use table::*;
pub use validity::*;
