use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use itertools::Itertools;
use log::{debug, trace};
use quarry_array::compute::concat;
use quarry_array::{Array, RecordBatch, Table};
use quarry_buffer::ByteBuffer;
use quarry_dtype::{DType, FieldName, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_expr::Expr;
use quarry_expr::pruning::{ColumnStats, can_prune};
use quarry_io::{LocalFile, ReadAt, read_ranges};
use rayon::prelude::*;

use crate::page::decode_page;
use crate::{
    ColumnChunkMetadata, FOOTER_SIZE, FileMetadata, Footer, MAGIC_BYTES, ReadOptions,
    RowGroupMetadata,
};

/// An open Quarry file. Cloning is cheap and clones share the decoded trailer.
#[derive(Clone)]
pub struct FileReader {
    inner: Arc<Inner>,
}

struct Inner {
    read: Arc<dyn ReadAt>,
    footer: Footer,
    metadata: FileMetadata,
}

impl FileReader {
    /// Open a file by reading its footer and trailer. No column data is read.
    pub fn open(read: Arc<dyn ReadAt>) -> QuarryResult<Self> {
        let file_size = read.size()?;
        let min_size = (MAGIC_BYTES.len() + FOOTER_SIZE) as u64;
        if file_size < min_size {
            quarry_bail!(
                FormatError: "file of {} bytes is too small to be a Quarry file",
                file_size
            );
        }

        let footer_bytes = read.read_byte_range(file_size - FOOTER_SIZE as u64..file_size)?;
        let footer = Footer::parse(&footer_bytes, file_size)?;

        let trailer_range =
            footer.metadata_offset..footer.metadata_offset + u64::from(footer.metadata_length);
        let trailer = read.read_byte_range(trailer_range)?;
        if trailer.len() != footer.metadata_length as usize {
            quarry_bail!(
                FormatError: "short read of the trailer: {} of {} bytes",
                trailer.len(),
                footer.metadata_length
            );
        }
        let metadata: FileMetadata = flexbuffers::from_slice(&trailer)
            .map_err(|err| quarry_err!(FormatError: "undecodable trailer: {}", err))?;
        if metadata.version != footer.version {
            quarry_bail!(
                FormatError: "trailer version {} does not match footer version {}",
                metadata.version,
                footer.version
            );
        }
        metadata.validate(footer.metadata_offset)?;

        trace!(
            "opened file of {} bytes: {} rows in {} row groups, created by {}",
            file_size,
            metadata.num_rows,
            metadata.row_groups.len(),
            metadata.created_by
        );
        Ok(Self {
            inner: Arc::new(Inner {
                read,
                footer,
                metadata,
            }),
        })
    }

    /// Open a file on the local file system.
    pub fn open_path(path: impl AsRef<Path>) -> QuarryResult<Self> {
        Self::open(Arc::new(LocalFile::open(path)?))
    }

    pub fn footer(&self) -> &Footer {
        &self.inner.footer
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.inner.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.metadata.schema
    }

    pub fn num_rows(&self) -> u64 {
        self.inner.metadata.num_rows
    }

    pub fn num_row_groups(&self) -> usize {
        self.inner.metadata.row_groups.len()
    }

    /// The decoded statistics of a column in a row group, if they were recorded.
    pub fn column_statistics(&self, row_group: usize, name: &str) -> Option<ColumnStats> {
        let idx = self.schema().index_of(name)?;
        let row_group = self.inner.metadata.row_groups.get(row_group)?;
        column_stats(row_group, &row_group.columns[idx], self.schema().fields()[idx].dtype())
    }

    /// Start a lazy pass over the file.
    ///
    /// Fails with `SchemaError` when the projection or the predicate names a column the file
    /// does not have.
    pub fn read(&self, options: ReadOptions) -> QuarryResult<RecordBatchIter> {
        let schema = self.schema();
        let output_names: Vec<FieldName> = match options.projection {
            Some(names) => names,
            None => schema.names().cloned().collect(),
        };
        let mut needed: Vec<usize> = output_names
            .iter()
            .map(|name| {
                schema
                    .index_of(name)
                    .ok_or_else(|| quarry_err!(SchemaError: "column {} not found in file schema {}", name, schema))
            })
            .try_collect()?;
        let output_schema = schema.project(&output_names)?;

        if let Some(predicate) = &options.predicate {
            for name in predicate.references() {
                let idx = schema.index_of(&name).ok_or_else(|| {
                    quarry_err!(SchemaError: "predicate column {} not found in file schema {}", name, schema)
                })?;
                if !needed.contains(&idx) {
                    needed.push(idx);
                }
            }
        }
        let read_schema = Schema::try_new(
            needed
                .iter()
                .map(|&idx| schema.fields()[idx].clone())
                .collect(),
        )?;
        if let Some(predicate) = &options.predicate {
            let dtype = predicate.return_dtype(&read_schema)?;
            if !matches!(dtype, DType::Bool(_) | DType::Null) {
                quarry_bail!(TypeError: "predicate {} has type {}, expected bool", predicate, dtype);
            }
        }

        Ok(RecordBatchIter {
            reader: self.clone(),
            plan: ReadPlan {
                needed,
                read_schema,
                output_names,
                output_schema,
                predicate: options.predicate,
                parallel: options.parallel,
            },
            next_row_group: 0,
            done: false,
        })
    }

    fn is_pruned(&self, row_group: &RowGroupMetadata, predicate: &Expr) -> bool {
        let schema = self.schema();
        can_prune(predicate, &|name: &str| {
            let idx = schema.index_of(name)?;
            column_stats(row_group, &row_group.columns[idx], schema.fields()[idx].dtype())
        })
    }

    fn read_row_group(&self, row_group: &RowGroupMetadata, plan: &ReadPlan) -> QuarryResult<RecordBatch> {
        let chunks = plan
            .needed
            .iter()
            .map(|&idx| &row_group.columns[idx])
            .collect_vec();
        let ranges = chunks.iter().map(|chunk| chunk.byte_range()).collect_vec();
        let buffers = read_ranges(self.inner.read.as_ref(), &ranges, 0)?;

        let dtypes = plan.read_schema.fields().iter().map(|f| f.dtype()).collect_vec();
        let columns: Vec<Array> = if plan.parallel {
            buffers
                .into_par_iter()
                .zip(chunks.par_iter())
                .zip(dtypes.par_iter())
                .map(|((bytes, chunk), dtype)| decode_chunk(bytes, chunk, dtype))
                .collect::<QuarryResult<_>>()?
        } else {
            buffers
                .into_iter()
                .zip(&chunks)
                .zip(&dtypes)
                .map(|((bytes, chunk), dtype)| decode_chunk(bytes, chunk, dtype))
                .try_collect()?
        };

        let batch = RecordBatch::try_new_with_len(
            plan.read_schema.clone(),
            columns,
            row_group.num_rows as usize,
        )?;
        match &plan.predicate {
            None => Ok(batch),
            Some(predicate) => {
                let mask = predicate.evaluate_predicate(&batch)?;
                batch.filter(&mask)?.project(&plan.output_names)
            }
        }
    }
}

fn column_stats(
    row_group: &RowGroupMetadata,
    chunk: &ColumnChunkMetadata,
    dtype: &DType,
) -> Option<ColumnStats> {
    let stats = chunk.statistics.as_ref()?;
    match stats.to_column_stats(dtype, row_group.num_rows) {
        Ok(stats) => Some(stats),
        Err(err) => {
            debug!("ignoring undecodable statistics: {}", err);
            None
        }
    }
}

fn decode_chunk(bytes: Bytes, chunk: &ColumnChunkMetadata, dtype: &DType) -> QuarryResult<Array> {
    let buffer = ByteBuffer::from_bytes(bytes);
    if buffer.len() as u64 != chunk.length {
        quarry_bail!(
            FormatError: "short read of a column chunk: {} of {} bytes",
            buffer.len(),
            chunk.length
        );
    }
    let pages: Vec<Array> = chunk
        .pages
        .iter()
        .map(|page| {
            let start = (page.offset - chunk.offset) as usize;
            let array = decode_page(&buffer.slice(start..start + page.length as usize), dtype)?;
            if array.len() as u64 != page.num_values {
                quarry_bail!(
                    FormatError: "page at {} holds {} values, the trailer says {}",
                    page.offset,
                    array.len(),
                    page.num_values
                );
            }
            Ok(array)
        })
        .try_collect()?;
    if pages.is_empty() {
        return Array::empty(dtype);
    }
    concat(&pages)
}

struct ReadPlan {
    /// File column indices to read: the output columns, then any extra predicate columns.
    needed: Vec<usize>,
    read_schema: Schema,
    output_names: Vec<FieldName>,
    output_schema: Schema,
    predicate: Option<Expr>,
    parallel: bool,
}

/// A lazy iterator over the surviving row groups of a file, one batch per row group.
///
/// Iteration stops after the first error.
pub struct RecordBatchIter {
    reader: FileReader,
    plan: ReadPlan,
    next_row_group: usize,
    done: bool,
}

impl RecordBatchIter {
    /// The schema of every batch.
    pub fn schema(&self) -> &Schema {
        &self.plan.output_schema
    }

    /// Collect the remaining batches.
    pub fn into_table(self) -> QuarryResult<Table> {
        let schema = self.plan.output_schema.clone();
        let batches: Vec<RecordBatch> = self.try_collect()?;
        Table::from_batches(schema, batches)
    }
}

impl Iterator for RecordBatchIter {
    type Item = QuarryResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let idx = self.next_row_group;
            let row_group = self.reader.inner.metadata.row_groups.get(idx)?;
            self.next_row_group += 1;

            if let Some(predicate) = &self.plan.predicate {
                if self.reader.is_pruned(row_group, predicate) {
                    debug!("pruned row group {} by {}", idx, predicate);
                    continue;
                }
            }

            let result = self.reader.read_row_group(row_group, &self.plan);
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
        None
    }
}
