use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace, warn};
use quarry_dtype::{FieldName, Schema};
use quarry_error::{ErrorKind, QuarryResult, quarry_bail, quarry_err};
use quarry_io::{LocalFileSystem, ObjectPath, ObjectStorage};
use quarry_scalar::Scalar;

use crate::{FileFormat, Partitioning, QuarryFormat, infer_partition_columns};

/// What to do with a file whose schema cannot be unified with the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail to open the dataset.
    #[default]
    Fail,
    /// Leave the file out of the dataset, logging a warning.
    SkipFile,
}

#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub format: Arc<dyn FileFormat>,
    /// Read the schema of every file and unify them, rather than trusting the first file.
    pub unify_schemas: bool,
    /// Only consulted when `unify_schemas` is set.
    pub conflict_policy: ConflictPolicy,
    pub partitioning: Partitioning,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            format: Arc::new(QuarryFormat),
            unify_schemas: false,
            conflict_policy: ConflictPolicy::default(),
            partitioning: Partitioning::default(),
        }
    }
}

impl DatasetOptions {
    pub fn with_format(mut self, format: Arc<dyn FileFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn with_unify_schemas(mut self, unify_schemas: bool) -> Self {
        self.unify_schemas = unify_schemas;
        self
    }

    pub fn with_conflict_policy(mut self, conflict_policy: ConflictPolicy) -> Self {
        self.conflict_policy = conflict_policy;
        self
    }

    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }
}

/// One file of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFragment {
    pub path: ObjectPath,
    /// The partition values parsed from the file's directories, in partition schema order.
    pub partition_values: Vec<(FieldName, Scalar)>,
}

impl FileFragment {
    pub fn partition_value(&self, name: &str) -> Option<&Scalar> {
        self.partition_values
            .iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value)
    }
}

/// A directory of files read as one table.
///
/// Cloning is cheap. The file list and schema are fixed when the dataset is opened.
#[derive(Clone)]
pub struct Dataset {
    pub(crate) inner: Arc<DatasetInner>,
}

pub(crate) struct DatasetInner {
    pub(crate) storage: Arc<dyn ObjectStorage>,
    pub(crate) root: ObjectPath,
    pub(crate) format: Arc<dyn FileFormat>,
    pub(crate) files: Vec<FileFragment>,
    pub(crate) data_schema: Schema,
    pub(crate) partition_schema: Schema,
    pub(crate) schema: Schema,
    pub(crate) unified: bool,
}

impl Dataset {
    /// Discover the files below `root` and resolve the dataset schema.
    ///
    /// Only objects with the format's extension are files of the dataset; anything with a path
    /// segment starting with `_` or `.` is ignored. With [`Partitioning::Hive`] every file must
    /// sit below the same partition keys, in the same order.
    pub fn open(
        storage: Arc<dyn ObjectStorage>,
        root: impl Into<ObjectPath>,
        options: DatasetOptions,
    ) -> QuarryResult<Self> {
        let root = root.into();
        let mut paths = Vec::new();
        let mut raw_values = Vec::new();
        let mut keys: Option<Vec<FieldName>> = None;

        for path in storage.list(&root)? {
            let Some(segments) = path.strip_prefix(&root) else {
                continue;
            };
            let segments = segments.collect_vec();
            let Some((_, directories)) = segments.split_last() else {
                continue;
            };
            if segments.iter().any(|s| s.starts_with('_') || s.starts_with('.')) {
                trace!("ignoring hidden object {}", path);
                continue;
            }
            if path.extension() != Some(options.format.extension()) {
                trace!("ignoring {}, not a .{} file", path, options.format.extension());
                continue;
            }

            let partition = options
                .partitioning
                .parse(directories)
                .map_err(|err| quarry_err!(err, "partitioning {}", path))?;
            let (file_keys, values): (Vec<FieldName>, Vec<Option<String>>) =
                partition.into_iter().unzip();
            match &keys {
                None => keys = Some(file_keys),
                Some(expected) if *expected != file_keys => quarry_bail!(
                    PartitionError: "{} is partitioned by [{}] but {} is partitioned by [{}]",
                    path,
                    file_keys.iter().join(", "),
                    paths.first().map(ObjectPath::as_str).unwrap_or_default(),
                    expected.iter().join(", ")
                ),
                Some(_) => {}
            }
            raw_values.push(values);
            paths.push(path.clone());
        }

        let keys = keys.unwrap_or_default();
        let (partition_schema, partition_values) = infer_partition_columns(&keys, &raw_values)?;
        let files = paths
            .into_iter()
            .zip(partition_values)
            .map(|(path, values)| FileFragment {
                path,
                partition_values: keys.iter().cloned().zip(values).collect(),
            })
            .collect_vec();

        let (files, data_schema) = if options.unify_schemas {
            unify_file_schemas(storage.as_ref(), options.format.as_ref(), files, options.conflict_policy)?
        } else {
            let data_schema = match files.first() {
                Some(first) => options
                    .format
                    .infer_schema(storage.open(&first.path)?)
                    .map_err(|err| quarry_err!(err, "reading the schema of {}", first.path))?,
                None => Schema::empty(),
            };
            (files, data_schema)
        };

        for field in partition_schema.fields() {
            if data_schema.field(field.name()).is_some() {
                quarry_bail!(
                    SchemaConflict: "partition key {} is also a column stored in the files",
                    field.name()
                );
            }
        }
        let schema = Schema::try_new(
            data_schema
                .fields()
                .iter()
                .chain(partition_schema.fields())
                .cloned()
                .collect(),
        )?;

        debug!(
            "opened dataset {} with {} files and schema {}",
            root,
            files.len(),
            schema
        );
        Ok(Self {
            inner: Arc::new(DatasetInner {
                storage,
                root,
                format: options.format,
                files,
                data_schema,
                partition_schema,
                schema,
                unified: options.unify_schemas,
            }),
        })
    }

    /// Open a dataset rooted at a local directory.
    pub fn open_local(root: impl Into<PathBuf>, options: DatasetOptions) -> QuarryResult<Self> {
        Self::open(
            Arc::new(LocalFileSystem::new(root)),
            ObjectPath::new(""),
            options,
        )
    }

    pub fn root(&self) -> &ObjectPath {
        &self.inner.root
    }

    pub fn format(&self) -> &Arc<dyn FileFormat> {
        &self.inner.format
    }

    /// The files of the dataset, in path order.
    pub fn files(&self) -> &[FileFragment] {
        &self.inner.files
    }

    /// The stored columns followed by the partition columns.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The columns stored in the files.
    pub fn data_schema(&self) -> &Schema {
        &self.inner.data_schema
    }

    pub fn partition_schema(&self) -> &Schema {
        &self.inner.partition_schema
    }

    /// Whether the schema was unified across every file.
    pub fn unified(&self) -> bool {
        self.inner.unified
    }
}

impl Debug for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("root", &self.inner.root)
            .field("files", &self.inner.files.len())
            .field("schema", &self.inner.schema)
            .field("format", &self.inner.format)
            .finish()
    }
}

fn unify_file_schemas(
    storage: &dyn ObjectStorage,
    format: &dyn FileFormat,
    files: Vec<FileFragment>,
    policy: ConflictPolicy,
) -> QuarryResult<(Vec<FileFragment>, Schema)> {
    let mut unified: Option<Schema> = None;
    let mut kept = Vec::with_capacity(files.len());
    for file in files {
        let file_schema = format
            .infer_schema(storage.open(&file.path)?)
            .map_err(|err| quarry_err!(err, "reading the schema of {}", file.path))?;
        let next = match &unified {
            None => Ok(file_schema),
            Some(schema) => schema.unify(&file_schema),
        };
        match next {
            Ok(schema) => {
                unified = Some(schema);
                kept.push(file);
            }
            Err(err) if err.kind() == ErrorKind::SchemaConflict && policy == ConflictPolicy::SkipFile => {
                warn!("leaving {} out of the dataset: {}", file.path, err);
            }
            Err(err) => return Err(quarry_err!(err, "unifying the schema of {}", file.path)),
        }
    }
    Ok((kept, unified.unwrap_or_else(Schema::empty)))
}
