use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// The alignment of a buffer, in bytes. Always a power of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);

impl Alignment {
    /// Create a new alignment.
    ///
    /// ## Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    pub const fn new(align: usize) -> Self {
        assert!(align > 0, "Alignment must be greater than 0");
        assert!(align.is_power_of_two(), "Alignment must be a power of 2");
        Self(align)
    }

    /// The natural alignment of `T`.
    #[inline]
    pub const fn of<T>() -> Self {
        Self::new(align_of::<T>())
    }

    /// Whether memory aligned to `self` is also aligned to `other`.
    #[inline]
    pub fn is_aligned_to(&self, other: Alignment) -> bool {
        self.0 % other.0 == 0
    }
}

impl Deref for Alignment {
    type Target = usize;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Alignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Alignment> for usize {
    fn from(value: Alignment) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_ordering() {
        assert!(Alignment::new(64).is_aligned_to(Alignment::of::<u64>()));
        assert!(!Alignment::of::<u8>().is_aligned_to(Alignment::of::<u32>()));
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn alignment_power_of_two() {
        Alignment::new(3);
    }
}
