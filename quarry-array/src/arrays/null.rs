use quarry_dtype::DType;

/// An array of the `Null` type: every slot is null and no buffers are held.
#[derive(Clone, Debug)]
pub struct NullArray {
    len: usize,
}

impl NullArray {
    /// Create a null array of `len` slots.
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &DType::Null
    }

    /// A view over `stop - start` slots.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        Self::new(stop - start)
    }
}
