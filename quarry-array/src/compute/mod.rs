//! Compute kernels over [`Array`](crate::Array)s.
//!
//! Kernels never mutate their inputs. Each returns a new array, sharing buffers with the
//! input where the result is a pure view.

mod aggregate;
mod boolean;
mod cast;
mod compare;
mod concat;
mod filter;
mod like;
mod min_max;
mod numeric;
mod sort;
mod take;

pub use aggregate::*;
pub use boolean::*;
pub use cast::*;
pub use compare::*;
pub use concat::*;
pub use filter::*;
pub use like::*;
pub use min_max::*;
pub use numeric::*;
pub use sort::*;
pub use take::*;

use quarry_error::QuarryResult;

use crate::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, TemporalArray, VarBinArray,
};
use crate::validity::Validity;
use crate::{Array, IntoArray};

/// The same values with a different validity. The type's nullability follows the validity.
pub fn with_validity(array: &Array, validity: Validity) -> QuarryResult<Array> {
    validity.check_len(array.len())?;
    Ok(match array {
        Array::Null(a) => NullArray::new(a.len()).into_array(),
        Array::Bool(a) => BoolArray::try_new(a.boolean_buffer().clone(), validity)?.into_array(),
        Array::Primitive(a) => a.with_validity(validity)?.into_array(),
        Array::VarBin(a) => {
            let dtype = a.dtype().with_nullability(validity.nullability());
            VarBinArray::new_unchecked(a.offsets().clone(), a.bytes().clone(), dtype, validity)
                .into_array()
        }
        Array::FixedSizeBinary(a) => {
            FixedSizeBinaryArray::try_new(a.width(), a.bytes().clone(), validity)?.into_array()
        }
        Array::Temporal(a) => TemporalArray::try_new(
            a.temporal_type().clone(),
            a.storage().with_validity(validity)?,
        )?
        .into_array(),
    })
}
