use arrow_buffer::BooleanBuffer;
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::BoolArray;
use crate::validity::Validity;
use crate::{Array, IntoArray};

fn as_bool<'a>(array: &'a Array, op: &str) -> QuarryResult<&'a BoolArray> {
    match array {
        Array::Bool(a) => Ok(a),
        other => quarry_bail!(ComputeError: "{} expects booleans, found {}", op, other.dtype()),
    }
}

fn check_len(lhs: &Array, rhs: &Array) -> QuarryResult<()> {
    if lhs.len() != rhs.len() {
        quarry_bail!(
            ComputeError: "boolean operands differ in length: {} and {}",
            lhs.len(),
            rhs.len()
        );
    }
    Ok(())
}

/// Three-valued logical AND: `false AND null` is `false`, `true AND null` is null.
pub fn and_kleene(lhs: &Array, rhs: &Array) -> QuarryResult<Array> {
    check_len(lhs, rhs)?;
    let (l, r) = (as_bool(lhs, "and")?, as_bool(rhs, "and")?);
    let values = l.boolean_buffer() & r.boolean_buffer();
    if l.dtype().is_nullable() || r.dtype().is_nullable() {
        // A definite false on either side decides the result regardless of the other.
        let validity: BooleanBuffer = (0..l.len())
            .map(|i| {
                let (lv, rv) = (l.validity().is_valid(i), r.validity().is_valid(i));
                (lv && rv) || (lv && !l.value(i)) || (rv && !r.value(i))
            })
            .collect();
        let values: BooleanBuffer = (0..l.len())
            .map(|i| l.validity().is_valid(i) && r.validity().is_valid(i) && values.value(i))
            .collect();
        return Ok(BoolArray::try_new(values, Validity::Array(validity))?.into_array());
    }
    Ok(BoolArray::try_new(values, Validity::NonNullable)?.into_array())
}

/// Three-valued logical OR: `true OR null` is `true`, `false OR null` is null.
pub fn or_kleene(lhs: &Array, rhs: &Array) -> QuarryResult<Array> {
    check_len(lhs, rhs)?;
    let (l, r) = (as_bool(lhs, "or")?, as_bool(rhs, "or")?);
    if l.dtype().is_nullable() || r.dtype().is_nullable() {
        let (values, validity): (Vec<bool>, Vec<bool>) = (0..l.len())
            .map(|i| {
                let (lv, rv) = (l.validity().is_valid(i), r.validity().is_valid(i));
                let lt = lv && l.value(i);
                let rt = rv && r.value(i);
                (lt || rt, lt || rt || (lv && rv))
            })
            .unzip();
        return Ok(BoolArray::try_new(
            BooleanBuffer::from_iter(values),
            Validity::Array(BooleanBuffer::from_iter(validity)),
        )?
        .into_array());
    }
    let values = l.boolean_buffer() | r.boolean_buffer();
    Ok(BoolArray::try_new(values, Validity::NonNullable)?.into_array())
}

/// Logical negation. Nulls stay null.
pub fn not(array: &Array) -> QuarryResult<Array> {
    let a = as_bool(array, "not")?;
    Ok(BoolArray::try_new(!a.boolean_buffer(), a.validity().clone())?.into_array())
}

/// A non-nullable boolean array marking the null slots.
pub fn is_null(array: &Array) -> QuarryResult<Array> {
    let validity = array.validity();
    let values: BooleanBuffer = (0..array.len()).map(|i| validity.is_null(i)).collect();
    Ok(BoolArray::try_new(values, Validity::NonNullable)?.into_array())
}

/// A non-nullable boolean array marking the valid slots.
pub fn is_not_null(array: &Array) -> QuarryResult<Array> {
    not(&is_null(array)?)
}
