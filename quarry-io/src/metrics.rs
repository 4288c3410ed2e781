use std::fmt::{Debug, Formatter};
use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use log::trace;
use quarry_error::QuarryResult;
use witchcraft_metrics::{Counter, MetricRegistry};

use crate::{ObjectPath, ObjectStorage, ReadAt};

/// Counters of storage activity, shared between a storage wrapper and its readers.
pub struct IoMetrics {
    registry: MetricRegistry,
    objects_opened: Arc<Counter>,
    read_requests: Arc<Counter>,
    bytes_read: Arc<Counter>,
}

impl IoMetrics {
    /// Fresh zeroed counters in their own registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_registry(MetricRegistry::default()))
    }

    /// Counters registered in `registry`.
    pub fn with_registry(registry: MetricRegistry) -> Self {
        Self {
            objects_opened: registry.counter("quarry.io.objects.opened"),
            read_requests: registry.counter("quarry.io.read.requests"),
            bytes_read: registry.counter("quarry.io.read.bytes"),
            registry,
        }
    }

    /// The registry holding the counters.
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// The number of objects opened.
    pub fn objects_opened(&self) -> u64 {
        count(&self.objects_opened)
    }

    /// The number of positional reads issued.
    pub fn read_requests(&self) -> u64 {
        count(&self.read_requests)
    }

    /// The total number of bytes returned by reads.
    pub fn bytes_read(&self) -> u64 {
        count(&self.bytes_read)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.objects_opened.clear();
        self.read_requests.clear();
        self.bytes_read.clear();
    }

    fn record_open(&self) {
        self.objects_opened.inc();
    }

    fn record_read(&self, len: usize) {
        self.read_requests.inc();
        if let Ok(len) = len.try_into() {
            self.bytes_read.add(len);
        }
    }
}

impl Default for IoMetrics {
    fn default() -> Self {
        Self::with_registry(MetricRegistry::default())
    }
}

impl Debug for IoMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoMetrics")
            .field("objects_opened", &self.objects_opened())
            .field("read_requests", &self.read_requests())
            .field("bytes_read", &self.bytes_read())
            .finish()
    }
}

fn count(counter: &Counter) -> u64 {
    counter.count().try_into().unwrap_or_default()
}

/// A reader that records each read in [`IoMetrics`].
#[derive(Clone)]
pub struct InstrumentedReadAt<R> {
    inner: R,
    metrics: Arc<IoMetrics>,
}

impl<R: ReadAt> InstrumentedReadAt<R> {
    /// Wrap `inner`, recording into `metrics`.
    pub fn new(inner: R, metrics: Arc<IoMetrics>) -> Self {
        Self { inner, metrics }
    }

    /// The counters being recorded into.
    pub fn metrics(&self) -> &Arc<IoMetrics> {
        &self.metrics
    }
}

impl<R: ReadAt> ReadAt for InstrumentedReadAt<R> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let bytes = self.inner.read_byte_range(range.clone())?;
        trace!("read {:?} ({} bytes)", range, bytes.len());
        self.metrics.record_read(bytes.len());
        Ok(bytes)
    }

    fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }
}

/// A storage whose opens and reads are recorded in [`IoMetrics`].
#[derive(Clone)]
pub struct InstrumentedStorage<S> {
    inner: S,
    metrics: Arc<IoMetrics>,
}

impl<S: ObjectStorage> InstrumentedStorage<S> {
    /// Wrap `inner` with fresh counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            metrics: IoMetrics::new(),
        }
    }

    /// The counters being recorded into.
    pub fn metrics(&self) -> &Arc<IoMetrics> {
        &self.metrics
    }

    /// The wrapped storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: ObjectStorage> ObjectStorage for InstrumentedStorage<S> {
    fn list(&self, prefix: &ObjectPath) -> QuarryResult<Vec<ObjectPath>> {
        self.inner.list(prefix)
    }

    fn open(&self, path: &ObjectPath) -> QuarryResult<Arc<dyn ReadAt>> {
        let reader = self.inner.open(path)?;
        self.metrics.record_open();
        Ok(Arc::new(InstrumentedReadAt::new(reader, self.metrics.clone())))
    }
}
