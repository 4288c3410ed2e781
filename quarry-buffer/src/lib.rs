#![deny(missing_docs)]

//! A byte buffer implementation for Quarry.
//!
//! Quarry arrays hold their data in a set of immutable buffers. A [`Buffer<T>`] is a typed view
//! over reference-counted [`bytes::Bytes`], so cloning and slicing never copy the underlying
//! memory.
//!
//! # Alignment
//!
//! Every buffer records the [`Alignment`] it was created with. Typed buffers are always aligned
//! to at least the alignment of `T`, which is what makes the zero-copy `&[T]` view sound.

pub use alignment::*;
pub use buffer::*;
pub use buffer_mut::*;
pub use string::*;

mod alignment;
mod buffer;
mod buffer_mut;
mod macros;
mod string;

/// An immutable buffer of bytes.
pub type ByteBuffer = Buffer<u8>;

/// A mutable buffer of bytes.
pub type ByteBufferMut = BufferMut<u8>;
