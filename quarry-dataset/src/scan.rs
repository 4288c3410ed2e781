use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use quarry_array::compute::cast;
use quarry_array::{Array, RecordBatch, Table};
use quarry_dtype::{DType, FieldName, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_expr::Expr;

use crate::{BatchIterator, Dataset, FileFragment, FileReadOptions};

/// Options for a scan of a dataset.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// The columns to produce, in output order. `None` produces every column.
    pub projection: Option<Vec<FieldName>>,
    /// Only rows for which the predicate is true are produced.
    pub predicate: Option<Expr>,
    /// Let each file decode its columns in parallel.
    pub parallel: bool,
}

impl ScanOptions {
    pub fn with_projection<S: Into<FieldName>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_predicate(mut self, predicate: Expr) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputColumn {
    /// An index into the read schema.
    Data(usize),
    /// An index into the partition values of the file.
    Partition(usize),
}

#[derive(Debug)]
struct ScanFile {
    fragment: usize,
    /// What is left of the predicate once the file's partition values are substituted.
    residual: Option<Expr>,
}

#[derive(Debug)]
struct ScanPlan {
    output_schema: Schema,
    output: Vec<OutputColumn>,
    /// The stored columns to read: projected ones, then those only the predicate needs.
    read_schema: Schema,
    files: Vec<ScanFile>,
    parallel: bool,
}

/// A planned scan. Files surviving partition pruning are only opened while iterating.
#[derive(Debug, Clone)]
pub struct Scan {
    dataset: Dataset,
    plan: Arc<ScanPlan>,
}

impl Dataset {
    /// Plan a scan.
    ///
    /// Projected and predicate columns must be in the dataset schema, otherwise this fails with
    /// `SchemaError`. Files whose partition values rule out the predicate are dropped here,
    /// without any I/O.
    pub fn scan(&self, options: ScanOptions) -> QuarryResult<Scan> {
        let schema = self.schema();
        let output_names: Vec<FieldName> = match options.projection {
            Some(names) => names,
            None => schema.names().cloned().collect(),
        };
        let output_schema = schema.project(&output_names)?;

        let mut read_names = output_names
            .iter()
            .filter(|name| self.data_schema().index_of(name).is_some())
            .cloned()
            .collect_vec();
        if let Some(predicate) = &options.predicate {
            let dtype = predicate.return_dtype(schema)?;
            if !matches!(dtype, DType::Bool(_) | DType::Null) {
                quarry_bail!(TypeError: "predicate {} has type {}, expected bool", predicate, dtype);
            }
            for name in predicate.references() {
                if self.data_schema().index_of(&name).is_some() && !read_names.contains(&name) {
                    read_names.push(name);
                }
            }
        }
        let read_schema = self.data_schema().project(&read_names)?;

        let output: Vec<OutputColumn> = output_names
            .iter()
            .map(|name| match read_schema.index_of(name) {
                Some(idx) => Ok(OutputColumn::Data(idx)),
                None => self
                    .partition_schema()
                    .index_of(name)
                    .map(OutputColumn::Partition)
                    .ok_or_else(|| quarry_err!(SchemaError: "column {} not found in {}", name, schema)),
            })
            .try_collect()?;

        let mut files = Vec::new();
        for (fragment_idx, fragment) in self.files().iter().enumerate() {
            let residual = match &options.predicate {
                None => None,
                Some(predicate) => {
                    let residual = predicate
                        .substitute(&|name: &str| fragment.partition_value(name).cloned())
                        .simplify();
                    if residual.is_unsatisfiable() {
                        debug!("pruned {} by its partition values", fragment.path);
                        continue;
                    }
                    let always_true = residual
                        .as_literal()
                        .is_some_and(|value| matches!(value.as_bool(), Ok(Some(true))));
                    (!always_true).then_some(residual)
                }
            };
            files.push(ScanFile {
                fragment: fragment_idx,
                residual,
            });
        }
        debug!(
            "scan of {} reads {} of {} files",
            self.root(),
            files.len(),
            self.files().len()
        );

        Ok(Scan {
            dataset: self.clone(),
            plan: Arc::new(ScanPlan {
                output_schema,
                output,
                read_schema,
                files,
                parallel: options.parallel,
            }),
        })
    }
}

impl Scan {
    /// The schema of every batch.
    pub fn schema(&self) -> &Schema {
        &self.plan.output_schema
    }

    /// The files the scan will read.
    pub fn fragments(&self) -> impl Iterator<Item = &FileFragment> + '_ {
        self.plan
            .files
            .iter()
            .map(|file| &self.dataset.files()[file.fragment])
    }

    /// Start a pass over the surviving files. Every call starts again from the first file.
    pub fn iter(&self) -> DatasetScanIter {
        DatasetScanIter {
            dataset: self.dataset.clone(),
            plan: self.plan.clone(),
            next_file: 0,
            current: None,
        }
    }

    /// Read every batch into a table.
    pub fn to_table(&self) -> QuarryResult<Table> {
        let batches: Vec<RecordBatch> = self.iter().try_collect()?;
        Table::from_batches(self.plan.output_schema.clone(), batches)
    }
}

impl IntoIterator for &Scan {
    type Item = QuarryResult<RecordBatch>;
    type IntoIter = DatasetScanIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy)]
enum ColumnSource {
    File { index: usize, cast: bool },
    Missing,
}

struct OpenFile {
    fragment: usize,
    batches: BatchIterator,
    /// One source per read schema field.
    sources: Vec<ColumnSource>,
    /// Set when the format did not apply the residual itself.
    filter: Option<Expr>,
}

/// Iterates the batches of a scan, holding at most one file open at a time.
///
/// An error reading a file is yielded once, after which the scan moves on to the next file.
pub struct DatasetScanIter {
    dataset: Dataset,
    plan: Arc<ScanPlan>,
    next_file: usize,
    current: Option<OpenFile>,
}

impl DatasetScanIter {
    fn fragment(&self, idx: usize) -> &FileFragment {
        &self.dataset.files()[idx]
    }

    fn open(&self, file: &ScanFile) -> QuarryResult<OpenFile> {
        let fragment = self.fragment(file.fragment);
        let read = self.dataset.inner.storage.open(&fragment.path)?;
        let opened = self.dataset.inner.format.read(
            read,
            FileReadOptions {
                projection: self.plan.read_schema.names().cloned().collect(),
                predicate: file.residual.clone(),
                parallel: self.plan.parallel,
                schema: self.plan.read_schema.clone(),
            },
        )?;

        let sources: Vec<ColumnSource> = self
            .plan
            .read_schema
            .fields()
            .iter()
            .map(|field| match opened.schema.index_of(field.name()) {
                None if field.dtype().is_nullable() => Ok(ColumnSource::Missing),
                None => Err(quarry_err!(
                    SchemaError: "file lacks the non-nullable column {}",
                    field.name()
                )),
                Some(index) => {
                    let stored = opened.schema.fields()[index].dtype();
                    if stored == field.dtype() {
                        Ok(ColumnSource::File { index, cast: false })
                    } else if widens_to(stored, field.dtype()) {
                        Ok(ColumnSource::File { index, cast: true })
                    } else {
                        Err(quarry_err!(
                            TypeMismatch: field.name(),
                            stored,
                            field.dtype(),
                            "the file stores the column as {}",
                            stored
                        ))
                    }
                }
            })
            .try_collect()?;

        Ok(OpenFile {
            fragment: file.fragment,
            batches: opened.batches,
            sources,
            filter: file.residual.clone().filter(|_| !opened.predicate_applied),
        })
    }

    fn conform(&self, file: &OpenFile, batch: RecordBatch) -> QuarryResult<RecordBatch> {
        let len = batch.num_rows();
        let columns: Vec<Array> = file
            .sources
            .iter()
            .zip(self.plan.read_schema.fields())
            .map(|(source, field)| match *source {
                ColumnSource::Missing => Array::nulls(field.dtype(), len),
                ColumnSource::File { index, cast: false } => Ok(batch.columns()[index].clone()),
                ColumnSource::File { index, cast: true } => {
                    let column = &batch.columns()[index];
                    cast(column, field.dtype()).map_err(|err| {
                        quarry_err!(
                            TypeMismatch: field.name(),
                            column.dtype(),
                            field.dtype(),
                            "{}",
                            err
                        )
                    })
                }
            })
            .try_collect()?;
        let mut data = RecordBatch::try_new_with_len(self.plan.read_schema.clone(), columns, len)?;
        if let Some(filter) = &file.filter {
            data = data.filter(&filter.evaluate_predicate(&data)?)?;
        }

        let fragment = self.fragment(file.fragment);
        let columns: Vec<Array> = self
            .plan
            .output
            .iter()
            .map(|column| match *column {
                OutputColumn::Data(idx) => Ok(data.columns()[idx].clone()),
                OutputColumn::Partition(idx) => {
                    Array::from_scalar(&fragment.partition_values[idx].1, data.num_rows())
                }
            })
            .try_collect()?;
        RecordBatch::try_new_with_len(self.plan.output_schema.clone(), columns, data.num_rows())
    }
}

/// Whether values stored as `from` can be read losslessly as `to`.
fn widens_to(from: &DType, to: &DType) -> bool {
    (to.is_nullable() || !from.is_nullable())
        && from.widen(to).is_ok_and(|widened| widened.eq_ignore_nullability(to))
}

impl Iterator for DatasetScanIter {
    type Item = QuarryResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(mut file) = self.current.take() {
                match file.batches.next() {
                    Some(Ok(batch)) => {
                        let result = self.conform(&file, batch);
                        let path = &self.fragment(file.fragment).path;
                        let result = result.map_err(|err| quarry_err!(err, "reading {}", path));
                        // A file whose batches fail to conform is abandoned.
                        if result.is_ok() {
                            self.current = Some(file);
                        }
                        return Some(result);
                    }
                    Some(Err(err)) => {
                        let path = &self.fragment(file.fragment).path;
                        return Some(Err(quarry_err!(err, "reading {}", path)));
                    }
                    None => continue,
                }
            }

            let plan = self.plan.clone();
            let file = plan.files.get(self.next_file)?;
            self.next_file += 1;
            match self.open(file) {
                Ok(open) => self.current = Some(open),
                Err(err) => {
                    let path = &self.fragment(file.fragment).path;
                    return Some(Err(quarry_err!(err, "opening {}", path)));
                }
            }
        }
    }
}
