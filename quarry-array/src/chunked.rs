//! Arrays made of a sequence of same-typed chunks.
//!
//! A [`ChunkedArray`] is the column type of a [`Table`](crate::Table). Chunk boundaries are an
//! implementation detail: indexing, slicing and equality behave as if the chunks were one
//! contiguous array.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_bail};
use quarry_scalar::Scalar;

use crate::Array;
use crate::compute::{cast, concat};

/// A logical array stored as a sequence of chunks of one type.
///
/// Cloning, slicing and appending share the chunks; values are never copied.
#[derive(Clone, Debug)]
pub struct ChunkedArray {
    dtype: DType,
    chunks: Arc<[Array]>,
    // offsets[i] is the logical index of the first slot of chunk i; the last entry is the length.
    offsets: Arc<[usize]>,
}

impl ChunkedArray {
    /// Create a chunked array of `dtype` from chunks.
    ///
    /// Every chunk must have exactly `dtype`, except that non-nullable chunks are accepted in a
    /// nullable array. Otherwise this fails with `TypeError`.
    pub fn try_new(chunks: Vec<Array>, dtype: DType) -> QuarryResult<Self> {
        for chunk in &chunks {
            if !Self::accepts(&dtype, chunk.dtype()) {
                quarry_bail!(
                    TypeError: "chunk of type {} does not match chunked array type {}",
                    chunk.dtype(),
                    dtype
                );
            }
        }
        let offsets = std::iter::once(0)
            .chain(chunks.iter().scan(0, |acc, chunk| {
                *acc += chunk.len();
                Some(*acc)
            }))
            .collect();
        Ok(Self {
            dtype,
            chunks: chunks.into(),
            offsets,
        })
    }

    fn accepts(dtype: &DType, chunk: &DType) -> bool {
        chunk == dtype || (dtype.is_nullable() && chunk.eq_ignore_nullability(dtype))
    }

    /// A chunked array with a single chunk.
    pub fn from_array(array: Array) -> Self {
        let dtype = array.dtype().clone();
        let len = array.len();
        Self {
            dtype,
            chunks: vec![array].into(),
            offsets: vec![0, len].into(),
        }
    }

    /// A chunked array without chunks.
    pub fn empty(dtype: DType) -> Self {
        Self {
            dtype,
            chunks: Vec::new().into(),
            offsets: vec![0].into(),
        }
    }

    /// The type of the values.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// The logical length.
    pub fn len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of chunks.
    pub fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    /// The chunks in order.
    pub fn chunks(&self) -> &[Array] {
        &self.chunks
    }

    /// The chunk holding logical index `index`, and the index within that chunk.
    ///
    /// Empty chunks are skipped.
    pub fn find_chunk_idx(&self, index: usize) -> (usize, usize) {
        // Search from the right so that empty chunks (repeated offsets) are passed over.
        let chunk = self.offsets.partition_point(|&offset| offset <= index) - 1;
        (chunk, index - self.offsets[chunk])
    }

    /// The value at logical index `index`.
    pub fn scalar_at(&self, index: usize) -> QuarryResult<Scalar> {
        if index >= self.len() {
            quarry_bail!(OutOfBounds: index, 0, self.len());
        }
        let (chunk, offset) = self.find_chunk_idx(index);
        let scalar = self.chunks[chunk].scalar_at(offset)?;
        Ok(match self.dtype.is_nullable() {
            true => scalar.into_nullable(),
            false => scalar,
        })
    }

    /// Iterate over the values as scalars.
    pub fn scalars(&self) -> impl Iterator<Item = QuarryResult<Scalar>> + '_ {
        (0..self.len()).map(|idx| self.scalar_at(idx))
    }

    /// A view over the slots `start..stop`, made of slices of the chunks it spans.
    pub fn slice(&self, start: usize, stop: usize) -> QuarryResult<Self> {
        if start > stop {
            quarry_bail!("slice start {} is after stop {}", start, stop);
        }
        if stop > self.len() {
            quarry_bail!(OutOfBounds: stop, 0, self.len());
        }
        let mut chunks = Vec::new();
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let (chunk_start, chunk_stop) = (self.offsets[idx], self.offsets[idx + 1]);
            if chunk_stop <= start || chunk_start >= stop {
                continue;
            }
            let (from, to) = (
                start.saturating_sub(chunk_start),
                stop.min(chunk_stop) - chunk_start,
            );
            chunks.push(if from == 0 && to == chunk.len() {
                chunk.clone()
            } else {
                chunk.slice(from, to)?
            });
        }
        Self::try_new(chunks, self.dtype.clone())
    }

    /// A new chunked array with `chunk` appended. The chunks of `self` are shared.
    pub fn with_chunk(&self, chunk: Array) -> QuarryResult<Self> {
        let mut chunks = self.chunks.to_vec();
        chunks.push(chunk);
        Self::try_new(chunks, self.dtype.clone())
    }

    /// A new chunked array holding the chunks of `self` followed by those of `other`.
    pub fn append(&self, other: &ChunkedArray) -> QuarryResult<Self> {
        Self::concat(&[self.clone(), other.clone()])
    }

    /// Join chunked arrays end to end without copying any chunk.
    ///
    /// The result is nullable if any input is. Inputs must share a type ignoring nullability.
    pub fn concat(arrays: &[ChunkedArray]) -> QuarryResult<Self> {
        let Some(first) = arrays.first() else {
            quarry_bail!("cannot concatenate zero chunked arrays");
        };
        let nullable = arrays.iter().any(|a| a.dtype.is_nullable());
        let dtype = first.dtype.with_nullability(nullable.into());
        let chunks = arrays
            .iter()
            .flat_map(|a| a.chunks.iter().cloned())
            .collect_vec();
        Self::try_new(chunks, dtype)
    }

    /// Consolidate the chunks into one contiguous array by copying.
    pub fn to_array(&self) -> QuarryResult<Array> {
        match self.chunks.len() {
            0 => Array::empty(&self.dtype),
            1 if self.chunks[0].dtype() == &self.dtype => Ok(self.chunks[0].clone()),
            _ => {
                let array = concat(&self.chunks)?;
                if array.dtype() == &self.dtype {
                    Ok(array)
                } else {
                    cast(&array, &self.dtype)
                }
            }
        }
    }

    /// The number of null slots across all chunks.
    pub fn null_count(&self) -> usize {
        self.chunks.iter().map(Array::null_count).sum()
    }

    /// The same chunks with each converted by [`cast`].
    pub fn cast(&self, dtype: &DType) -> QuarryResult<Self> {
        let chunks = self.chunks.iter().map(|c| cast(c, dtype)).try_collect()?;
        Self::try_new(chunks, dtype.clone())
    }

    /// A single chunk holding the same values.
    pub fn rechunk(&self) -> QuarryResult<Self> {
        Ok(Self::from_array(self.to_array()?))
    }
}

impl From<Array> for ChunkedArray {
    fn from(array: Array) -> Self {
        Self::from_array(array)
    }
}

impl PartialEq for ChunkedArray {
    /// Equal when type, length and every value match, however the values are chunked.
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.len() == other.len()
            && self
                .scalars()
                .zip(other.scalars())
                .all(|(a, b)| matches!((a, b), (Ok(a), Ok(b)) if a == b))
    }
}

impl Display for ChunkedArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.chunks.iter().join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::Nullability::{NonNullable, Nullable};
    use quarry_dtype::PType;
    use quarry_error::ErrorKind;
    use rstest::rstest;

    use super::*;
    use crate::IntoArray;
    use crate::arrays::{PrimitiveArray, VarBinArray};

    fn chunked() -> ChunkedArray {
        ChunkedArray::try_new(
            vec![
                PrimitiveArray::from_iter([0i32, 1, 2]).into_array(),
                PrimitiveArray::from_iter::<i32, _>([]).into_array(),
                PrimitiveArray::from_iter([3i32, 4]).into_array(),
                PrimitiveArray::from_iter([5i32]).into_array(),
            ],
            DType::Primitive(PType::I32, NonNullable),
        )
        .unwrap()
    }

    #[test]
    fn chunk_boundaries_are_invisible() {
        let array = chunked();
        assert_eq!(array.len(), 6);
        for i in 0..6 {
            assert_eq!(array.scalar_at(i).unwrap(), Scalar::from(i as i32));
        }
        assert_eq!(
            array.scalar_at(6).unwrap_err().kind(),
            ErrorKind::OutOfBounds
        );
        assert_eq!(array, ChunkedArray::from_array(array.to_array().unwrap()));
    }

    #[rstest]
    #[case(0, 6)]
    #[case(1, 4)]
    #[case(3, 3)]
    #[case(2, 6)]
    #[case(5, 6)]
    fn slices_span_chunks(#[case] start: usize, #[case] stop: usize) {
        let array = chunked();
        let sliced = array.slice(start, stop).unwrap();
        assert_eq!(sliced.len(), stop - start);
        for i in 0..sliced.len() {
            assert_eq!(sliced.scalar_at(i).unwrap(), array.scalar_at(start + i).unwrap());
        }
    }

    #[test]
    fn find_chunk_skips_empty_chunks() {
        let array = chunked();
        assert_eq!(array.find_chunk_idx(2), (0, 2));
        assert_eq!(array.find_chunk_idx(3), (2, 0));
        assert_eq!(array.find_chunk_idx(5), (3, 0));
    }

    #[test]
    fn mismatched_chunks_are_rejected() {
        let err = ChunkedArray::try_new(
            vec![
                PrimitiveArray::from_iter([0i32]).into_array(),
                VarBinArray::from_strs(["a"]).into_array(),
            ],
            DType::Primitive(PType::I32, NonNullable),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn appending_shares_chunks() {
        let array = chunked();
        let appended = array
            .with_chunk(PrimitiveArray::from_iter([6i32]).into_array())
            .unwrap();
        assert_eq!(array.len(), 6);
        assert_eq!(appended.len(), 7);
        assert_eq!(appended.nchunks(), 5);
        let (a, b) = (array.chunks()[0].as_primitive().unwrap(), appended.chunks()[0].as_primitive().unwrap());
        assert_eq!(a.as_slice::<i32>().as_ptr(), b.as_slice::<i32>().as_ptr());
    }

    #[test]
    fn concat_widens_nullability() {
        let nullable = ChunkedArray::from_array(
            PrimitiveArray::from_option_iter([None, Some(7i32)]).into_array(),
        );
        let joined = ChunkedArray::concat(&[chunked(), nullable]).unwrap();
        assert_eq!(joined.dtype(), &DType::Primitive(PType::I32, Nullable));
        assert_eq!(joined.len(), 8);
        assert_eq!(joined.scalar_at(0).unwrap(), Scalar::from(Some(0i32)));
        assert!(joined.scalar_at(6).unwrap().is_null());
        let flat = joined.to_array().unwrap();
        assert_eq!(flat.dtype(), &DType::Primitive(PType::I32, Nullable));
        assert_eq!(flat.null_count(), 1);
    }
}
