use quarry_error::{QuarryResult, quarry_bail};

use crate::compute::take;
use crate::{Array, Mask};

/// The values at the positions selected by `mask`, preserving order.
pub fn filter(array: &Array, mask: &Mask) -> QuarryResult<Array> {
    if mask.len() != array.len() {
        quarry_bail!(
            "mask.len() is {}, does not equal array.len() of {}",
            mask.len(),
            array.len()
        );
    }
    match mask {
        Mask::AllTrue(_) => Ok(array.clone()),
        Mask::AllFalse(_) => array.slice(0, 0),
        Mask::Values(values) => take(array, values.indices()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntoArray;
    use crate::arrays::PrimitiveArray;

    #[test]
    fn filter_selected() {
        let array = PrimitiveArray::from_iter([1u16, 2, 3, 4]).into_array();
        let filtered = filter(&array, &Mask::from_iter([false, true, false, true])).unwrap();
        assert_eq!(filtered, PrimitiveArray::from_iter([2u16, 4]).into_array());
        assert!(filter(&array, &Mask::AllTrue(3)).is_err());
        assert!(filter(&array, &Mask::AllFalse(4)).unwrap().is_empty());
    }
}
