use std::fmt::Debug;
use std::sync::Arc;

use itertools::Itertools;
use quarry_array::RecordBatch;
use quarry_dtype::{FieldName, Schema};
use quarry_error::QuarryResult;
use quarry_expr::Expr;
use quarry_file::{FILE_EXTENSION, FileReader, ReadOptions};
use quarry_io::ReadAt;

/// A lazy stream of batches read from one file.
pub type BatchIterator = Box<dyn Iterator<Item = QuarryResult<RecordBatch>> + Send>;

/// What a dataset asks of one file.
#[derive(Debug, Clone, Default)]
pub struct FileReadOptions {
    /// Columns to read. Columns the file does not have are skipped.
    pub projection: Vec<FieldName>,
    /// A filter the format may apply while reading.
    pub predicate: Option<Expr>,
    pub parallel: bool,
    /// The dataset types of the projected columns.
    pub schema: Schema,
}

/// The batches of one file and how far the predicate was applied to them.
pub struct FileBatches {
    /// The schema of every batch, in the file's own types.
    pub schema: Schema,
    pub batches: BatchIterator,
    /// Whether the batches are already filtered by [`FileReadOptions::predicate`].
    pub predicate_applied: bool,
}

/// A file format a dataset can be made of.
pub trait FileFormat: Debug + Send + Sync {
    /// The extension, without the dot, of files in this format.
    fn extension(&self) -> &str;

    /// Read the schema of a file.
    fn infer_schema(&self, read: Arc<dyn ReadAt>) -> QuarryResult<Schema>;

    /// Start reading a file.
    fn read(&self, read: Arc<dyn ReadAt>, options: FileReadOptions) -> QuarryResult<FileBatches>;
}

/// Files written by `quarry-file`.
///
/// The predicate is pushed into the reader, where it prunes row groups by their statistics,
/// whenever every column it references is stored in the file with its dataset type.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuarryFormat;

impl FileFormat for QuarryFormat {
    fn extension(&self) -> &str {
        FILE_EXTENSION
    }

    fn infer_schema(&self, read: Arc<dyn ReadAt>) -> QuarryResult<Schema> {
        Ok(FileReader::open(read)?.schema().clone())
    }

    fn read(&self, read: Arc<dyn ReadAt>, options: FileReadOptions) -> QuarryResult<FileBatches> {
        let reader = FileReader::open(read)?;
        let file_schema = reader.schema();
        let projection = options
            .projection
            .into_iter()
            .filter(|name| file_schema.index_of(name).is_some())
            .collect_vec();
        let predicate = options.predicate.filter(|predicate| {
            predicate.references().iter().all(|name| {
                match (file_schema.field(name), options.schema.field(name)) {
                    (Some(stored), Some(expected)) => {
                        stored.dtype().eq_ignore_nullability(expected.dtype())
                    }
                    _ => false,
                }
            })
        });
        let predicate_applied = predicate.is_some();

        let batches = reader.read(ReadOptions {
            projection: Some(projection),
            predicate,
            parallel: options.parallel,
        })?;
        Ok(FileBatches {
            schema: batches.schema().clone(),
            batches: Box::new(batches),
            predicate_applied,
        })
    }
}
