use std::sync::{Arc, OnceLock};

use arrow_buffer::{BooleanBuffer, BooleanBufferBuilder};

/// A selection over the positions of an array.
#[derive(Clone, Debug)]
pub enum Mask {
    /// All positions are selected.
    AllTrue(usize),
    /// No position is selected.
    AllFalse(usize),
    /// Some positions are selected.
    Values(Arc<MaskValues>),
}

/// The bitmap of a [`Mask`] that selects some, but not all, positions.
#[derive(Debug)]
pub struct MaskValues {
    buffer: BooleanBuffer,
    indices: OnceLock<Vec<usize>>,
    true_count: usize,
}

impl MaskValues {
    /// The bitmap.
    pub fn boolean_buffer(&self) -> &BooleanBuffer {
        &self.buffer
    }

    /// The selected positions, in ascending order.
    pub fn indices(&self) -> &[usize] {
        self.indices
            .get_or_init(|| self.buffer.set_indices().collect())
    }
}

impl Mask {
    /// Create a mask from a bitmap, collapsing uniform bitmaps.
    pub fn from_buffer(buffer: BooleanBuffer) -> Self {
        let len = buffer.len();
        let true_count = buffer.count_set_bits();
        if true_count == len {
            Self::AllTrue(len)
        } else if true_count == 0 {
            Self::AllFalse(len)
        } else {
            Self::Values(Arc::new(MaskValues {
                buffer,
                indices: OnceLock::new(),
                true_count,
            }))
        }
    }

    /// Create a mask of length `len` selecting the given ascending positions.
    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        let mut builder = BooleanBufferBuilder::new(len);
        builder.append_n(len, false);
        for &idx in indices {
            builder.set_bit(idx, true);
        }
        Self::from_buffer(builder.finish())
    }

    /// The number of positions the mask covers.
    pub fn len(&self) -> usize {
        match self {
            Self::AllTrue(len) | Self::AllFalse(len) => *len,
            Self::Values(values) => values.buffer.len(),
        }
    }

    /// Whether the mask covers no positions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of selected positions.
    pub fn true_count(&self) -> usize {
        match self {
            Self::AllTrue(len) => *len,
            Self::AllFalse(_) => 0,
            Self::Values(values) => values.true_count,
        }
    }

    /// Whether a position is selected.
    pub fn value(&self, index: usize) -> bool {
        match self {
            Self::AllTrue(_) => true,
            Self::AllFalse(_) => false,
            Self::Values(values) => values.buffer.value(index),
        }
    }

    /// The selected positions, in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            Self::AllTrue(len) => (0..*len).collect(),
            Self::AllFalse(_) => Vec::new(),
            Self::Values(values) => values.indices().to_vec(),
        }
    }

    /// The mask as a bitmap.
    pub fn to_boolean_buffer(&self) -> BooleanBuffer {
        match self {
            Self::AllTrue(len) => BooleanBuffer::new_set(*len),
            Self::AllFalse(len) => BooleanBuffer::new_unset(*len),
            Self::Values(values) => values.buffer.clone(),
        }
    }

    /// Positions selected by both masks.
    pub fn intersect(&self, other: &Mask) -> Mask {
        match (self, other) {
            (Self::AllFalse(len), _) | (_, Self::AllFalse(len)) => Self::AllFalse(*len),
            (Self::AllTrue(_), m) | (m, Self::AllTrue(_)) => m.clone(),
            (Self::Values(a), Self::Values(b)) => Self::from_buffer(&a.buffer & &b.buffer),
        }
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self::from_buffer(BooleanBuffer::from_iter(iter))
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.to_boolean_buffer() == other.to_boolean_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_uniform_buffers() {
        assert!(matches!(Mask::from_iter([true, true]), Mask::AllTrue(2)));
        assert!(matches!(Mask::from_iter([false; 3]), Mask::AllFalse(3)));
        let mask = Mask::from_iter([true, false, true]);
        assert_eq!(mask.true_count(), 2);
        assert_eq!(mask.indices(), vec![0, 2]);
    }

    #[test]
    fn intersect() {
        let a = Mask::from_iter([true, true, false, true]);
        let b = Mask::from_indices(4, &[1, 2, 3]);
        assert_eq!(a.intersect(&b).indices(), vec![1, 3]);
        assert_eq!(a.intersect(&Mask::AllTrue(4)), a);
    }
}
