//! Tables: named chunked columns of equal length.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use quarry_dtype::{Field, Schema};
use quarry_error::{QuarryError, QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

use crate::{Array, ChunkedArray, RecordBatch};

/// An immutable collection of named [`ChunkedArray`]s of equal length.
///
/// Cloning a table shares its columns.
#[derive(Clone, Debug)]
pub struct Table {
    schema: Schema,
    columns: Arc<[ChunkedArray]>,
    num_rows: usize,
}

impl Table {
    /// Create a table from named columns.
    ///
    /// When `schema` is given it must describe exactly these columns, in this order. Fails with
    /// `SchemaError` when column lengths differ, a name repeats, or the schema disagrees.
    pub fn try_new<S: AsRef<str>>(
        columns: Vec<(S, ChunkedArray)>,
        schema: Option<Schema>,
    ) -> QuarryResult<Self> {
        let derived = Schema::try_new(
            columns
                .iter()
                .map(|(name, array)| Field::new(name.as_ref(), array.dtype().clone()))
                .collect(),
        )?;
        let schema = match schema {
            Some(schema) if schema != derived => quarry_bail!(
                SchemaError: "columns {} do not match the declared schema {}",
                derived,
                schema
            ),
            Some(schema) => schema,
            None => derived,
        };
        let columns = columns.into_iter().map(|(_, array)| array).collect_vec();
        Self::from_parts(schema, columns)
    }

    fn from_parts(schema: Schema, columns: Vec<ChunkedArray>) -> QuarryResult<Self> {
        let num_rows = columns.first().map_or(0, ChunkedArray::len);
        if let Some((field, column)) = schema
            .fields()
            .iter()
            .zip(&columns)
            .find(|(_, column)| column.len() != num_rows)
        {
            quarry_bail!(
                SchemaError: "column {} has {} rows, expected {}",
                field.name(),
                column.len(),
                num_rows
            );
        }
        Ok(Self {
            schema,
            columns: columns.into(),
            num_rows,
        })
    }

    /// Create a table from named contiguous arrays, each becoming a single-chunk column.
    pub fn try_from_arrays<S: AsRef<str>>(columns: Vec<(S, Array)>) -> QuarryResult<Self> {
        Self::try_new(
            columns
                .into_iter()
                .map(|(name, array)| (name, ChunkedArray::from_array(array)))
                .collect(),
            None,
        )
    }

    /// A table without rows.
    pub fn empty(schema: Schema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ChunkedArray::empty(f.dtype().clone()))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Create a table whose columns have one chunk per batch. Every batch must carry `schema`.
    pub fn from_batches(schema: Schema, batches: impl IntoIterator<Item = RecordBatch>) -> QuarryResult<Self> {
        let mut chunks: Vec<Vec<Array>> = vec![Vec::new(); schema.len()];
        for batch in batches {
            if batch.schema() != &schema {
                quarry_bail!(
                    SchemaError: "batch schema {} does not match table schema {}",
                    batch.schema(),
                    schema
                );
            }
            for (column, array) in chunks.iter_mut().zip(batch.columns()) {
                column.push(array.clone());
            }
        }
        let columns = schema
            .fields()
            .iter()
            .zip(chunks)
            .map(|(field, chunks)| ChunkedArray::try_new(chunks, field.dtype().clone()))
            .try_collect()?;
        Self::from_parts(schema, columns)
    }

    /// Split the table into record batches along its chunk boundaries.
    ///
    /// Every batch column is a zero-copy view of exactly one chunk.
    pub fn to_batches(&self) -> QuarryResult<Vec<RecordBatch>> {
        let boundaries = self
            .columns
            .iter()
            .flat_map(|c| {
                c.chunks()
                    .iter()
                    .scan(0, |acc, chunk| {
                        *acc += chunk.len();
                        Some(*acc)
                    })
                    .collect_vec()
            })
            .chain([0, self.num_rows])
            .sorted()
            .dedup()
            .collect_vec();
        boundaries
            .iter()
            .tuple_windows()
            .map(|(&start, &stop)| self.slice(start, stop)?.to_record_batch())
            .collect()
    }

    /// Join tables end to end. All schemas must be equal.
    pub fn concat(tables: &[Table]) -> QuarryResult<Self> {
        let Some(first) = tables.first() else {
            quarry_bail!("cannot concatenate zero tables");
        };
        if let Some(other) = tables.iter().find(|t| !t.schema.is_compatible(&first.schema)) {
            quarry_bail!(
                SchemaError: "cannot concatenate tables with schemas {} and {}",
                first.schema,
                other.schema
            );
        }
        let columns = (0..first.schema.len())
            .map(|idx| {
                ChunkedArray::concat(&tables.iter().map(|t| t.columns[idx].clone()).collect_vec())
            })
            .try_collect()?;
        Self::from_parts(first.schema.clone(), columns)
    }

    /// The schema of the table.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// The number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The columns in schema order.
    pub fn columns(&self) -> &[ChunkedArray] {
        &self.columns
    }

    /// The column named `name`.
    pub fn column(&self, name: &str) -> Option<&ChunkedArray> {
        self.schema.index_of(name).map(|idx| &self.columns[idx])
    }

    /// The column named `name`, failing with `SchemaError` when there is none.
    pub fn column_or_err(&self, name: &str) -> QuarryResult<&ChunkedArray> {
        self.column(name)
            .ok_or_else(|| quarry_err!(SchemaError: "no column named {} in {}", name, self.schema))
    }

    /// A table of the named columns, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> QuarryResult<Self> {
        let schema = self.schema.project(names)?;
        let columns = names
            .iter()
            .map(|name| self.column_or_err(name.as_ref()).cloned())
            .try_collect()?;
        let mut table = Self::from_parts(schema, columns)?;
        table.num_rows = self.num_rows;
        Ok(table)
    }

    /// A table with `column` added under `name`, replacing a column of the same name in place.
    pub fn with_column(&self, name: &str, column: ChunkedArray) -> QuarryResult<Self> {
        if !self.columns.is_empty() && column.len() != self.num_rows {
            quarry_bail!(
                SchemaError: "column {} has {} rows, expected {}",
                name,
                column.len(),
                self.num_rows
            );
        }
        let mut columns = self.columns.to_vec();
        let schema = match self.schema.index_of(name) {
            Some(idx) => {
                let schema = self.schema.with_field_dtype(name, column.dtype().clone())?;
                columns[idx] = column;
                schema
            }
            None => {
                let schema = self.schema.with_field(Field::new(name, column.dtype().clone()))?;
                columns.push(column);
                schema
            }
        };
        Self::from_parts(schema, columns)
    }

    /// A view over the rows `start..stop`. Columns are sliced without copying.
    pub fn slice(&self, start: usize, stop: usize) -> QuarryResult<Self> {
        if start > stop || stop > self.num_rows {
            quarry_bail!(OutOfBounds: stop, start, self.num_rows);
        }
        let columns = self
            .columns
            .iter()
            .map(|c| c.slice(start, stop))
            .try_collect()?;
        let mut table = Self::from_parts(self.schema.clone(), columns)?;
        table.num_rows = stop - start;
        Ok(table)
    }

    /// The values of row `index`, in schema order.
    pub fn row(&self, index: usize) -> QuarryResult<Vec<Scalar>> {
        if index >= self.num_rows {
            quarry_bail!(OutOfBounds: index, 0, self.num_rows);
        }
        self.columns.iter().map(|c| c.scalar_at(index)).try_collect()
    }

    /// Coerce every column to the type `schema` declares for it.
    ///
    /// `schema` must name the same columns; the result takes its column order. Casts that are
    /// undefined or lose values fail with `TypeMismatch` naming the column and both types.
    pub fn with_schema(&self, schema: &Schema) -> QuarryResult<Self> {
        if schema.len() != self.schema.len() {
            quarry_bail!(
                SchemaError: "cannot apply schema {} to a table with schema {}",
                schema,
                self.schema
            );
        }
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                let column = self.column_or_err(field.name())?;
                if column.dtype() == field.dtype() {
                    return Ok(column.clone());
                }
                debug!("casting column {} from {} to {}", field.name(), column.dtype(), field.dtype());
                column.cast(field.dtype()).map_err(|err| match err.kind() {
                    quarry_error::ErrorKind::Type => quarry_err!(
                        TypeMismatch: field.name(),
                        column.dtype(),
                        field.dtype(),
                        "{}",
                        err
                    ),
                    _ => err,
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        let mut table = Self::from_parts(schema.clone(), columns)?;
        table.num_rows = self.num_rows;
        Ok(table)
    }

    /// A table with every column consolidated into one chunk.
    pub fn combine_chunks(&self) -> QuarryResult<Self> {
        let columns = self.columns.iter().map(ChunkedArray::rechunk).try_collect()?;
        let mut table = Self::from_parts(self.schema.clone(), columns)?;
        table.num_rows = self.num_rows;
        Ok(table)
    }

    /// The whole table as a single record batch, copying columns with more than one chunk.
    pub fn to_record_batch(&self) -> QuarryResult<RecordBatch> {
        let columns = self
            .columns
            .iter()
            .map(ChunkedArray::to_array)
            .try_collect()?;
        RecordBatch::try_new_with_len(self.schema.clone(), columns, self.num_rows)
            .map_err(|err: QuarryError| err.with_context("materializing table"))
    }
}

impl From<RecordBatch> for Table {
    fn from(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema().clone(),
            columns: batch
                .columns()
                .iter()
                .cloned()
                .map(ChunkedArray::from_array)
                .collect(),
            num_rows: batch.num_rows(),
        }
    }
}

impl PartialEq for Table {
    /// Equal when schemas match and every column holds the same values, however it is chunked.
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.num_rows == other.num_rows
            && self.columns.iter().zip(other.columns.iter()).all(|(a, b)| a == b)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let header = self
            .schema
            .fields()
            .iter()
            .map(|field| format!("{}: {}", field.name(), field.dtype()))
            .collect_vec();
        let rows = (0..self.num_rows)
            .map(|idx| {
                self.columns
                    .iter()
                    .map(|c| match c.scalar_at(idx) {
                        Ok(scalar) if scalar.is_null() => "null".to_string(),
                        Ok(scalar) => scalar.value().to_string(),
                        Err(_) => "<error>".to_string(),
                    })
                    .collect_vec()
            })
            .collect_vec();
        let widths = (0..header.len())
            .map(|col| {
                rows.iter()
                    .map(|row| row[col].len())
                    .chain([header[col].len()])
                    .max()
                    .unwrap_or(0)
            })
            .collect_vec();
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .join(" | ")
        };
        writeln!(f, "{}", line(&header))?;
        writeln!(f, "{}", widths.iter().map(|w| "-".repeat(*w)).join("-+-"))?;
        for row in &rows {
            writeln!(f, "{}", line(row))?;
        }
        Ok(())
    }
}
