#![deny(missing_docs)]

//! Error handling for Quarry.
//!
//! Every fallible operation in the workspace returns a [`QuarryResult`]. The variants of
//! [`QuarryError`] follow the engine's failure taxonomy: construction errors (types, schemas),
//! storage errors (partitions, file format) and planning errors (unsupported operations).

#[macro_use]
mod macros;
mod ext;
mod warning;

use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

pub use ext::*;
pub use warning::*;

/// A string that can be used as an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Quarry.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum QuarryError {
    /// A value does not fit the type it was declared with.
    #[error("type error: {0}")]
    TypeError(ErrString),
    /// Columns do not line up with each other or with a schema.
    #[error("schema error: {0}")]
    SchemaError(ErrString),
    /// Two schemas cannot be reconciled into one.
    #[error("schema conflict: {0}")]
    SchemaConflict(ErrString),
    /// An explicit coercion of a column is not representable.
    #[error("type mismatch in column {column}: cannot convert {from} to {to}: {reason}")]
    TypeMismatch {
        /// The offending column.
        column: ErrString,
        /// The type of the column's values.
        from: ErrString,
        /// The requested type.
        to: ErrString,
        /// Why the conversion failed.
        reason: ErrString,
    },
    /// A path segment of a partitioned directory is malformed.
    #[error("partition error: {0}")]
    PartitionError(ErrString),
    /// A file is corrupt or truncated.
    #[error("format error: {0}")]
    FormatError(ErrString),
    /// A plan contains a construct no configured engine can execute safely.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(ErrString),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}")]
    OutOfBounds(usize, usize, usize),
    /// An argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(ErrString),
    /// A compute kernel failed.
    #[error("compute error: {0}")]
    ComputeError(ErrString),
    /// Adds additional context to an error.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<QuarryError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for flexbuffers serialization errors.
    #[cfg(feature = "flexbuffers")]
    #[error(transparent)]
    FlexBufferSerError(#[from] flexbuffers::SerializationError),
    /// A wrapper for flexbuffers deserialization errors.
    #[cfg(feature = "flexbuffers")]
    #[error(transparent)]
    FlexBufferDeError(#[from] flexbuffers::DeserializationError),
}

/// The category of a [`QuarryError`], with any context stripped away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`QuarryError::TypeError`].
    Type,
    /// See [`QuarryError::SchemaError`].
    Schema,
    /// See [`QuarryError::SchemaConflict`].
    SchemaConflict,
    /// See [`QuarryError::TypeMismatch`].
    TypeMismatch,
    /// See [`QuarryError::PartitionError`].
    Partition,
    /// See [`QuarryError::FormatError`] and the serialization wrappers.
    Format,
    /// See [`QuarryError::UnsupportedOperation`].
    UnsupportedOperation,
    /// See [`QuarryError::OutOfBounds`].
    OutOfBounds,
    /// See [`QuarryError::InvalidArgument`].
    InvalidArgument,
    /// See [`QuarryError::ComputeError`].
    Compute,
    /// See [`QuarryError::IOError`].
    Io,
}

impl QuarryError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        QuarryError::Context(msg.into(), Box::new(self))
    }

    /// The category of this error, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeError(_) => ErrorKind::Type,
            Self::SchemaError(_) => ErrorKind::Schema,
            Self::SchemaConflict(_) => ErrorKind::SchemaConflict,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::PartitionError(_) => ErrorKind::Partition,
            Self::FormatError(_) => ErrorKind::Format,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::OutOfBounds(..) => ErrorKind::OutOfBounds,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ComputeError(_) => ErrorKind::Compute,
            Self::Context(_, inner) => inner.kind(),
            Self::IOError(_) => ErrorKind::Io,
            #[cfg(feature = "flexbuffers")]
            Self::FlexBufferSerError(_) | Self::FlexBufferDeError(_) => ErrorKind::Format,
        }
    }
}

impl Debug for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return QuarryErrors as their error type.
pub type QuarryResult<T> = Result<T, QuarryError>;

/// A trait for unwrapping a QuarryResult.
pub trait QuarryUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn quarry_unwrap(self) -> Self::Output;
}

impl<T, E> QuarryUnwrap for Result<T, E>
where
    E: Into<QuarryError>,
{
    type Output = T;

    #[inline(always)]
    fn quarry_unwrap(self) -> Self::Output {
        self.map_err(Into::<QuarryError>::into)
            .unwrap_or_else(|err| quarry_panic!(err))
    }
}

/// A trait for expect-ing a QuarryResult or an Option.
pub trait QuarryExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn quarry_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> QuarryExpect for Result<T, E>
where
    E: Into<QuarryError>,
{
    type Output = T;

    #[inline(always)]
    fn quarry_expect(self, msg: &str) -> Self::Output {
        self.map_err(Into::<QuarryError>::into)
            .unwrap_or_else(|e| quarry_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> QuarryExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn quarry_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| quarry_panic!("{}", msg))
    }
}
