use std::collections::VecDeque;
use std::io::Write;

use itertools::Itertools;
use log::debug;
use quarry_array::compute::concat;
use quarry_array::{Array, RecordBatch, Table};
use quarry_dtype::Schema;
use quarry_error::{QuarryResult, quarry_bail, quarry_err};

use crate::metadata::StatsAccumulator;
use crate::page::encode_page;
use crate::{
    CREATED_BY, ColumnChunkMetadata, FileMetadata, Footer, MAGIC_BYTES, PageLocation,
    RowGroupMetadata, VERSION, WriteOptions,
};

/// Writes record batches of one schema as a Quarry file.
///
/// Rows are buffered until a row group is full. Nothing describing the file is written until
/// [`FileWriter::finish`], so a writer that is dropped early leaves an unreadable file.
pub struct FileWriter<W: Write> {
    write: W,
    position: u64,
    schema: Schema,
    options: WriteOptions,
    pending: VecDeque<RecordBatch>,
    pending_rows: usize,
    row_groups: Vec<RowGroupMetadata>,
    num_rows: u64,
}

impl<W: Write> FileWriter<W> {
    /// Start a file, writing the leading magic bytes.
    pub fn new(mut write: W, schema: Schema, options: WriteOptions) -> QuarryResult<Self> {
        write.write_all(&MAGIC_BYTES)?;
        Ok(Self {
            write,
            position: MAGIC_BYTES.len() as u64,
            schema,
            options,
            pending: VecDeque::new(),
            pending_rows: 0,
            row_groups: Vec::new(),
            num_rows: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The number of bytes handed to the underlying writer so far.
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    /// Buffer a batch, flushing every row group it completes.
    ///
    /// A batch may declare a column non-nullable where the file schema is nullable, but not the
    /// reverse.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> QuarryResult<()> {
        self.check_schema(batch.schema())?;
        if batch.num_rows() == 0 {
            return Ok(());
        }
        self.pending_rows += batch.num_rows();
        self.pending.push_back(batch.clone());
        while self.pending_rows >= self.options.row_group_rows {
            let group = self.take_pending(self.options.row_group_rows)?;
            self.write_row_group(group)?;
        }
        Ok(())
    }

    /// Write every chunk of `table`.
    pub fn write_table(&mut self, table: &Table) -> QuarryResult<()> {
        for batch in table.to_batches()? {
            self.write_batch(&batch)?;
        }
        Ok(())
    }

    /// Flush the last row group and write the trailer and footer, returning the writer.
    pub fn finish(mut self) -> QuarryResult<W> {
        if self.pending_rows > 0 {
            let group = self.take_pending(self.pending_rows)?;
            self.write_row_group(group)?;
        }

        let metadata = FileMetadata {
            version: VERSION,
            schema: self.schema.clone(),
            num_rows: self.num_rows,
            row_groups: std::mem::take(&mut self.row_groups),
            created_by: CREATED_BY.to_string(),
        };
        let trailer = flexbuffers::to_vec(&metadata)?;
        let trailer_len = u32::try_from(trailer.len())
            .map_err(|_| quarry_err!(FormatError: "trailer of {} bytes is too large", trailer.len()))?;
        let footer = Footer::new(self.position, trailer_len);
        self.write_all(&trailer)?;
        self.write_all(&footer.to_bytes())?;
        self.write.flush()?;

        debug!(
            "wrote {} rows in {} row groups, {} bytes",
            metadata.num_rows,
            metadata.row_groups.len(),
            self.position
        );
        Ok(self.write)
    }

    fn check_schema(&self, schema: &Schema) -> QuarryResult<()> {
        let matches = schema.len() == self.schema.len()
            && schema
                .fields()
                .iter()
                .zip(self.schema.fields())
                .all(|(actual, expected)| {
                    actual.name() == expected.name()
                        && actual.dtype().eq_ignore_nullability(expected.dtype())
                        && (!actual.dtype().is_nullable() || expected.dtype().is_nullable())
                });
        if !matches {
            quarry_bail!(
                SchemaError: "batch schema {} does not match the file schema {}",
                schema,
                self.schema
            );
        }
        Ok(())
    }

    /// Remove exactly `rows` rows from the front of the pending batches.
    fn take_pending(&mut self, rows: usize) -> QuarryResult<Vec<RecordBatch>> {
        let mut taken = Vec::new();
        let mut remaining = rows;
        while remaining > 0 {
            let Some(batch) = self.pending.pop_front() else {
                break;
            };
            if batch.num_rows() <= remaining {
                remaining -= batch.num_rows();
                taken.push(batch);
            } else {
                taken.push(batch.slice(0, remaining)?);
                self.pending.push_front(batch.slice(remaining, batch.num_rows())?);
                remaining = 0;
            }
        }
        self.pending_rows -= rows - remaining;
        Ok(taken)
    }

    fn write_row_group(&mut self, batches: Vec<RecordBatch>) -> QuarryResult<()> {
        let num_rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let mut columns = Vec::with_capacity(self.schema.len());
        for col_idx in 0..self.schema.len() {
            let parts = batches
                .iter()
                .map(|batch| batch.columns()[col_idx].clone())
                .collect_vec();
            let array = concat(&parts)?;
            columns.push(self.write_column(&array)?);
        }
        debug!(
            "flushed row group {} with {} rows",
            self.row_groups.len(),
            num_rows
        );
        self.row_groups.push(RowGroupMetadata {
            num_rows: num_rows as u64,
            columns,
        });
        self.num_rows += num_rows as u64;
        Ok(())
    }

    fn write_column(&mut self, array: &Array) -> QuarryResult<ColumnChunkMetadata> {
        let offset = self.position;
        let len = array.len();
        let bytes_per_row = array.nbytes().div_ceil(len.max(1)).max(1);
        let rows_per_page = (self.options.page_bytes / bytes_per_row).max(1);

        let mut pages = Vec::with_capacity(len.div_ceil(rows_per_page));
        let mut stats = StatsAccumulator::new();
        let mut start = 0;
        while start < len {
            let stop = (start + rows_per_page).min(len);
            let (page, page_stats) =
                encode_page(&array.slice(start, stop)?, self.options.write_statistics)?;
            pages.push(PageLocation {
                offset: self.position,
                length: page.len() as u64,
                num_values: (stop - start) as u64,
            });
            self.write_all(&page)?;
            stats.push_page(page_stats);
            start = stop;
        }

        Ok(ColumnChunkMetadata {
            offset,
            length: self.position - offset,
            pages,
            statistics: stats.finish(self.options.write_statistics),
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> QuarryResult<()> {
        self.write.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}
