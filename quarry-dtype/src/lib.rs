#![cfg(target_endian = "little")]
#![deny(missing_docs)]

//! A type system for Quarry
//!
//! This crate contains the logical types of Quarry columns, the [`Schema`] describing a table,
//! and the rules for reconciling types that differ between files.

pub use dtype::*;
pub use field::*;
pub use nullability::*;
pub use ptype::*;
pub use schema::*;
pub use temporal::*;

mod dtype;
mod field;
mod nullability;
mod ptype;
mod schema;
mod temporal;
