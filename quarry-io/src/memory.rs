use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use quarry_error::{QuarryResult, quarry_err};

use crate::{ObjectPath, ObjectStorage, ReadAt};

/// Objects held in memory, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    objects: Arc<RwLock<BTreeMap<ObjectPath, Bytes>>>,
}

impl InMemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` at `path`, replacing any previous object.
    pub fn put(&self, path: impl Into<ObjectPath>, bytes: impl Into<Bytes>) {
        self.objects.write().insert(path.into(), bytes.into());
    }

    /// Remove the object at `path`.
    pub fn delete(&self, path: &ObjectPath) -> Option<Bytes> {
        self.objects.write().remove(path)
    }

    /// The number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStorage for InMemoryStorage {
    fn list(&self, prefix: &ObjectPath) -> QuarryResult<Vec<ObjectPath>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn open(&self, path: &ObjectPath) -> QuarryResult<Arc<dyn ReadAt>> {
        let bytes = self
            .objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| quarry_err!(InvalidArgument: "no object at {}", path))?;
        Ok(Arc::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_list_open() {
        let storage = InMemoryStorage::new();
        storage.put("t/x=1/a.qry", Bytes::from_static(b"abc"));
        storage.put("t/x=2/b.qry", Bytes::from_static(b"defg"));
        storage.put("u/c.qry", Bytes::from_static(b"h"));

        let listed = storage.list(&ObjectPath::new("t")).unwrap();
        assert_eq!(
            listed.iter().map(ObjectPath::as_str).collect::<Vec<_>>(),
            vec!["t/x=1/a.qry", "t/x=2/b.qry"]
        );
        let reader = storage.open(&ObjectPath::new("t/x=2/b.qry")).unwrap();
        assert_eq!(reader.size().unwrap(), 4);
        assert!(storage.open(&ObjectPath::new("t/missing")).is_err());
        assert_eq!(storage.delete(&ObjectPath::new("u/c.qry")).unwrap().len(), 1);
        assert_eq!(storage.len(), 2);
    }
}
