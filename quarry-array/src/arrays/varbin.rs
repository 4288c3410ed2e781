use itertools::Itertools;
use quarry_buffer::{Buffer, BufferMut, BufferString, ByteBuffer};
use quarry_dtype::{DType, Nullability};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};

use crate::validity::Validity;

/// Variable-width strings or bytes: `len + 1` offsets into one data buffer.
///
/// Slot `i` spans `bytes[offsets[i]..offsets[i + 1]]`. Offsets of a slice are not rebased, so
/// slicing never touches the data buffer.
#[derive(Clone, Debug)]
pub struct VarBinArray {
    dtype: DType,
    offsets: Buffer<i32>,
    bytes: ByteBuffer,
    validity: Validity,
}

impl VarBinArray {
    /// Create an array, validating the offsets and, for utf8, the encoding of every valid slot.
    pub fn try_new(
        offsets: Buffer<i32>,
        bytes: ByteBuffer,
        dtype: DType,
        validity: Validity,
    ) -> QuarryResult<Self> {
        if !dtype.is_varbin() {
            quarry_bail!(TypeError: "VarBinArray cannot hold values of type {}", dtype);
        }
        if offsets.is_empty() {
            quarry_bail!("offsets must hold at least one entry");
        }
        if offsets[0] < 0 {
            quarry_bail!("first offset {} is negative", offsets[0]);
        }
        if let Some((a, b)) = offsets.iter().tuple_windows().find(|(a, b)| a > b) {
            quarry_bail!("offsets must be non-decreasing, found {} before {}", a, b);
        }
        let last = offsets[offsets.len() - 1] as usize;
        if last > bytes.len() {
            quarry_bail!(OutOfBounds: last, 0, bytes.len());
        }
        let len = offsets.len() - 1;
        validity.check_len(len)?;
        if dtype.nullability() != validity.nullability() {
            quarry_bail!(
                "validity nullability {:?} does not match {}",
                validity.nullability(),
                dtype
            );
        }

        let array = Self {
            dtype,
            offsets,
            bytes,
            validity,
        };
        if matches!(array.dtype, DType::Utf8(_)) {
            for idx in 0..len {
                if array.validity.is_valid(idx) {
                    std::str::from_utf8(array.bytes_at(idx)).map_err(|e| {
                        quarry_err!(TypeError: "slot {} is not valid UTF-8: {}", idx, e)
                    })?;
                }
            }
        }
        Ok(array)
    }

    /// Create an array from parts that are already known to be consistent, e.g. produced by a
    /// kernel from validated inputs.
    pub(crate) fn new_unchecked(
        offsets: Buffer<i32>,
        bytes: ByteBuffer,
        dtype: DType,
        validity: Validity,
    ) -> Self {
        debug_assert_eq!(offsets.len(), validity_len(&validity, offsets.len() - 1) + 1);
        Self {
            dtype,
            offsets,
            bytes,
            validity,
        }
    }

    /// Create a utf8 array from string values.
    pub fn from_strs<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::from_values(
            values.into_iter().map(|s| Some(s.as_ref().as_bytes().to_vec())),
            DType::Utf8(Nullability::NonNullable),
        )
    }

    /// Create a nullable utf8 array from optional string values.
    pub fn from_option_strs<S: AsRef<str>>(values: impl IntoIterator<Item = Option<S>>) -> Self {
        Self::from_values(
            values
                .into_iter()
                .map(|s| s.map(|s| s.as_ref().as_bytes().to_vec())),
            DType::Utf8(Nullability::Nullable),
        )
    }

    /// Create a binary array from byte values.
    pub fn from_bytes<B: AsRef<[u8]>>(values: impl IntoIterator<Item = B>) -> Self {
        Self::from_values(
            values.into_iter().map(|b| Some(b.as_ref().to_vec())),
            DType::Binary(Nullability::NonNullable),
        )
    }

    fn from_values(values: impl Iterator<Item = Option<Vec<u8>>>, dtype: DType) -> Self {
        let mut offsets = BufferMut::<i32>::with_capacity(values.size_hint().0 + 1);
        let mut bytes = BufferMut::<u8>::empty();
        let mut validity = Vec::new();
        offsets.push(0);
        for value in values {
            validity.push(value.is_some());
            if let Some(value) = value {
                bytes.extend_from_slice(&value);
            }
            offsets.push(bytes.len() as i32);
        }
        let validity = match dtype.nullability() {
            Nullability::NonNullable => Validity::NonNullable,
            Nullability::Nullable => Validity::Array(validity.into_iter().collect()),
        };
        Self {
            dtype,
            offsets: offsets.freeze(),
            bytes: bytes.freeze(),
            validity,
        }
    }

    /// The type of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The validity of the slots.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// The `len + 1` offsets into the data buffer.
    pub fn offsets(&self) -> &Buffer<i32> {
        &self.offsets
    }

    /// The concatenated value bytes.
    pub fn bytes(&self) -> &ByteBuffer {
        &self.bytes
    }

    /// The bytes of the slot at `index`, ignoring validity.
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        let start = self.offsets[index] as usize;
        let end = self.offsets[index + 1] as usize;
        &self.bytes.as_slice()[start..end]
    }

    /// The slot at `index` as a shared buffer, ignoring validity.
    pub fn buffer_at(&self, index: usize) -> ByteBuffer {
        let start = self.offsets[index] as usize;
        let end = self.offsets[index + 1] as usize;
        self.bytes.slice(start..end)
    }

    /// The slot at `index` as a string.
    pub fn str_at(&self, index: usize) -> QuarryResult<BufferString> {
        BufferString::try_from(self.buffer_at(index))
    }

    /// A zero-copy view over the slots `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        Self {
            dtype: self.dtype.clone(),
            offsets: self.offsets.slice(start..stop + 1),
            bytes: self.bytes.clone(),
            validity: self.validity.slice(start, stop - start),
        }
    }

    /// The byte range of the data buffer referenced by the slots.
    pub fn data_range(&self) -> std::ops::Range<usize> {
        self.offsets[0] as usize..self.offsets[self.len()] as usize
    }
}

fn validity_len(validity: &Validity, len: usize) -> usize {
    match validity {
        Validity::Array(buffer) => buffer.len(),
        _ => len,
    }
}
