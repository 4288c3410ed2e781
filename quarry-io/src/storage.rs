use std::fmt::{Display, Formatter};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use quarry_error::{QuarryResult, quarry_bail, quarry_err};

use crate::{LocalFile, ReadAt};

/// The location of an object relative to a storage root, with `/` separated segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(Arc<str>);

impl ObjectPath {
    /// Create a path, normalizing away empty segments and leading or trailing separators.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(
            path.as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/")
                .into(),
        )
    }

    /// The path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// The extension of the last segment, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.')
            .filter(|&idx| idx > 0)
            .map(|idx| &name[idx + 1..])
    }

    /// Whether `prefix` is this path or one of its ancestor directories.
    pub fn starts_with(&self, prefix: &ObjectPath) -> bool {
        prefix.0.is_empty()
            || self.0 == prefix.0
            || (self.0.starts_with(prefix.as_str())
                && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// The segments after `prefix`, or `None` when `prefix` is not an ancestor.
    pub fn strip_prefix<'a>(&'a self, prefix: &ObjectPath) -> Option<impl Iterator<Item = &'a str>> {
        self.starts_with(prefix)
            .then(|| self.segments().skip(prefix.segments().count()))
    }

    /// This path extended by one segment.
    pub fn child(&self, segment: &str) -> Self {
        Self::new(format!("{}/{}", self.0, segment))
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<&str> for ObjectPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A hierarchical store of immutable objects, such as a directory tree or a bucket.
pub trait ObjectStorage: Send + Sync {
    /// Every object under `prefix`, recursively, sorted by path.
    fn list(&self, prefix: &ObjectPath) -> QuarryResult<Vec<ObjectPath>>;

    /// Open an object for positional reads.
    fn open(&self, path: &ObjectPath) -> QuarryResult<Arc<dyn ReadAt>>;

    /// Read the bytes in `range` of an object.
    fn open_range(&self, path: &ObjectPath, range: Range<u64>) -> QuarryResult<Bytes> {
        Ok(self.open(path)?.read_byte_range(range)?)
    }
}

impl<S: ObjectStorage + ?Sized> ObjectStorage for Arc<S> {
    fn list(&self, prefix: &ObjectPath) -> QuarryResult<Vec<ObjectPath>> {
        S::list(self, prefix)
    }

    fn open(&self, path: &ObjectPath) -> QuarryResult<Arc<dyn ReadAt>> {
        S::open(self, path)
    }

    fn open_range(&self, path: &ObjectPath, range: Range<u64>) -> QuarryResult<Bytes> {
        S::open_range(self, path, range)
    }
}

/// Objects stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Serve the files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file system location of an object.
    pub fn path_to(&self, path: &ObjectPath) -> PathBuf {
        path.segments().fold(self.root.clone(), |p, s| p.join(s))
    }

    fn walk(&self, dir: &Path, prefix: &ObjectPath, out: &mut Vec<ObjectPath>) -> QuarryResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                quarry_bail!("file name {:?} under {} is not UTF-8", name, dir.display());
            };
            let path = prefix.child(name);
            if entry.file_type()?.is_dir() {
                self.walk(&entry.path(), &path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl ObjectStorage for LocalFileSystem {
    fn list(&self, prefix: &ObjectPath) -> QuarryResult<Vec<ObjectPath>> {
        let dir = self.path_to(prefix);
        let mut paths = Vec::new();
        if dir.is_file() {
            paths.push(prefix.clone());
        } else {
            self.walk(&dir, prefix, &mut paths)
                .map_err(|err| quarry_err!(err, "listing {}", dir.display()))?;
        }
        paths.sort();
        debug!("listed {} objects under {}", paths.len(), dir.display());
        Ok(paths)
    }

    fn open(&self, path: &ObjectPath) -> QuarryResult<Arc<dyn ReadAt>> {
        let file = LocalFile::open(self.path_to(path))
            .map_err(|err| quarry_err!(err.into(), "opening {}", path))?;
        Ok(Arc::new(file))
    }
}
