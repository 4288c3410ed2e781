use std::cmp::Ordering;
use std::ops::Range;

use quarry_dtype::{DType, Schema};
use quarry_error::{QuarryResult, quarry_bail};
use quarry_expr::pruning::ColumnStats;
use quarry_scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::page::PageStatistics;
use crate::stats::{decode_scalar, encode_scalar};
use crate::{MAGIC_BYTES, PAGE_HEADER_SIZE};

/// The trailer of a file: its schema and where every row group lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub version: u16,
    pub schema: Schema,
    pub num_rows: u64,
    pub row_groups: Vec<RowGroupMetadata>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowGroupMetadata {
    pub num_rows: u64,
    /// One chunk per schema field, in schema order.
    pub columns: Vec<ColumnChunkMetadata>,
}

/// The pages of one column within one row group. They are stored back to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChunkMetadata {
    pub offset: u64,
    pub length: u64,
    pub pages: Vec<PageLocation>,
    pub statistics: Option<ColumnStatistics>,
}

impl ColumnChunkMetadata {
    /// The absolute byte range of the chunk.
    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    pub offset: u64,
    pub length: u64,
    pub num_values: u64,
}

/// Statistics of a column chunk. Bounds are held in their plain encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub min: Option<Vec<u8>>,
    pub max: Option<Vec<u8>>,
    pub null_count: u64,
}

impl ColumnStatistics {
    /// Decode the statistics of a `dtype` column covering `num_rows` rows.
    pub fn to_column_stats(&self, dtype: &DType, num_rows: u64) -> QuarryResult<ColumnStats> {
        let decode = |bytes: &Option<Vec<u8>>| {
            bytes
                .as_deref()
                .map(|bytes| decode_scalar(dtype, bytes))
                .transpose()
        };
        Ok(ColumnStats {
            min: decode(&self.min)?,
            max: decode(&self.max)?,
            null_count: Some(self.null_count),
            num_rows,
        })
    }
}

/// Folds page statistics into the statistics of their chunk.
///
/// Bounds are only kept when every page holding a valid value recorded them.
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    min: Option<Scalar>,
    max: Option<Scalar>,
    null_count: u64,
    bounds_complete: bool,
    pages: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            bounds_complete: true,
            ..Default::default()
        }
    }

    pub fn push_page(&mut self, page: PageStatistics) {
        self.pages += 1;
        self.null_count += page.null_count;
        if page.null_count == page.num_values {
            return;
        }
        match (page.min, page.max) {
            (Some(min), Some(max)) => {
                if self.min.as_ref().is_none_or(|cur| compare(&min, cur).is_lt()) {
                    self.min = Some(min);
                }
                if self.max.as_ref().is_none_or(|cur| compare(&max, cur).is_gt()) {
                    self.max = Some(max);
                }
            }
            _ => self.bounds_complete = false,
        }
    }

    pub fn finish(self, write_statistics: bool) -> Option<ColumnStatistics> {
        if !write_statistics || self.pages == 0 {
            return None;
        }
        let (min, max) = if self.bounds_complete {
            (
                self.min.as_ref().and_then(encode_scalar),
                self.max.as_ref().and_then(encode_scalar),
            )
        } else {
            (None, None)
        };
        Some(ColumnStatistics {
            min,
            max,
            null_count: self.null_count,
        })
    }
}

fn compare(a: &Scalar, b: &Scalar) -> Ordering {
    a.value().partial_cmp(b.value()).unwrap_or(Ordering::Equal)
}

impl FileMetadata {
    /// Check that the trailer describes a well-formed file whose data ends at `data_end`.
    pub fn validate(&self, data_end: u64) -> QuarryResult<()> {
        let data_start = MAGIC_BYTES.len() as u64;
        let mut total_rows = 0u64;
        for (rg_idx, row_group) in self.row_groups.iter().enumerate() {
            if row_group.columns.len() != self.schema.len() {
                quarry_bail!(
                    FormatError: "row group {} has {} columns but the schema has {}",
                    rg_idx,
                    row_group.columns.len(),
                    self.schema.len()
                );
            }
            for (col_idx, chunk) in row_group.columns.iter().enumerate() {
                let end = chunk.offset.checked_add(chunk.length);
                if chunk.offset < data_start || end.is_none_or(|end| end > data_end) {
                    quarry_bail!(
                        FormatError: "column {} of row group {} spans {}+{}, outside the data region {}..{}",
                        col_idx,
                        rg_idx,
                        chunk.offset,
                        chunk.length,
                        data_start,
                        data_end
                    );
                }
                let mut values = 0u64;
                let mut cursor = chunk.offset;
                for page in &chunk.pages {
                    if page.offset != cursor || page.length < PAGE_HEADER_SIZE as u64 {
                        quarry_bail!(
                            FormatError: "page at {} of column {} in row group {} is misplaced",
                            page.offset,
                            col_idx,
                            rg_idx
                        );
                    }
                    cursor += page.length;
                    values += page.num_values;
                }
                if cursor != chunk.offset + chunk.length {
                    quarry_bail!(
                        FormatError: "pages of column {} in row group {} do not fill the chunk",
                        col_idx,
                        rg_idx
                    );
                }
                if values != row_group.num_rows {
                    quarry_bail!(
                        FormatError: "column {} of row group {} holds {} values, expected {}",
                        col_idx,
                        rg_idx,
                        values,
                        row_group.num_rows
                    );
                }
            }
            total_rows += row_group.num_rows;
        }
        if total_rows != self.num_rows {
            quarry_bail!(
                FormatError: "row groups hold {} rows but the file declares {}",
                total_rows,
                self.num_rows
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::PType;

    use super::*;

    fn page(min: i64, max: i64, nulls: u64) -> PageStatistics {
        PageStatistics {
            min: Some(Scalar::from(min)),
            max: Some(Scalar::from(max)),
            null_count: nulls,
            num_values: 10,
        }
    }

    #[test]
    fn merges_page_bounds() {
        let mut acc = StatsAccumulator::new();
        acc.push_page(page(5, 9, 1));
        acc.push_page(page(-3, 4, 0));
        acc.push_page(PageStatistics {
            null_count: 10,
            num_values: 10,
            ..Default::default()
        });
        let stats = acc.finish(true).unwrap();
        assert_eq!(stats.null_count, 11);
        let decoded = stats.to_column_stats(&DType::from(PType::I64), 30).unwrap();
        assert_eq!(decoded.min, Some(Scalar::from(-3i64)));
        assert_eq!(decoded.max, Some(Scalar::from(9i64)));
        assert_eq!(decoded.null_count, Some(11));
    }

    #[test]
    fn missing_page_bounds_drop_chunk_bounds() {
        let mut acc = StatsAccumulator::new();
        acc.push_page(page(1, 2, 0));
        acc.push_page(PageStatistics {
            num_values: 10,
            ..Default::default()
        });
        let stats = acc.finish(true).unwrap();
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert!(StatsAccumulator::new().finish(false).is_none());
    }
}
