//! The concrete array types.

mod bool;
mod fixed_size_binary;
mod null;
mod primitive;
mod temporal;
mod varbin;

pub use bool::*;
pub use fixed_size_binary::*;
pub use null::*;
pub use primitive::*;
pub use temporal::*;
pub use varbin::*;
