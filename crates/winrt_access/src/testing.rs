// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory storage and log capture for tests.
//!
//! [`MemoryStorage`] serves files from memory under three separate namespaces
//! (paths, shared-access tokens and future-access tokens), records every
//! operation it performs, and can be told to fail operations on demand.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing_subscriber::fmt::MakeWriter;

use crate::source::{SourceReader, SourceStream};
use crate::storage::{RandomAccessStream, ReaderOptions, StorageBroker, StorageFile, StreamReader};
use crate::{Error, ErrorKind, Result};

/// An operation performed by [`MemoryStorage`] or one of its streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StorageOp {
    /// A path was resolved to a file.
    ResolvePath(String),
    /// A shared-access token was redeemed.
    RedeemSharedToken(String),
    /// A token was looked up in the future-access list.
    LookupFutureAccess(String),
    /// A resolved file was opened; carries the path or token it was resolved from.
    OpenRead(String),
    /// A stream handle was cloned.
    CloneStream,
    /// A stream handle was moved to an absolute offset.
    Seek(u64),
    /// A reader loaded bytes from its stream.
    Load {
        /// The requested byte count.
        max_bytes: u32,
    },
}

impl StorageOp {
    fn failure_kind(&self) -> ErrorKind {
        match self {
            Self::ResolvePath(_) | Self::RedeemSharedToken(_) | Self::LookupFutureAccess(_) => ErrorKind::Resolve,
            Self::OpenRead(_) => ErrorKind::Open,
            Self::CloneStream | Self::Seek(_) | Self::Load { .. } => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Path,
    SharedAccess,
    FutureAccess,
}

type FailurePredicate = Box<dyn Fn(&StorageOp) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    files: RwLock<HashMap<(Namespace, String), Bytes>>,
    operations: Mutex<Vec<StorageOp>>,
    fail_when: Mutex<Option<FailurePredicate>>,
    broken_handles: Mutex<u32>,
}

impl State {
    /// Records `op` and returns the injected failure for it, if any.
    fn perform(&self, op: StorageOp) -> Result<()> {
        let failed = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let kind = op.failure_kind();
        self.operations.lock().push(op);

        if failed {
            return Err(Error::caused_by(kind, "injected failure"));
        }

        Ok(())
    }

    fn take_broken_handle(&self) -> bool {
        let mut broken = self.broken_handles.lock();
        if *broken == 0 {
            return false;
        }

        *broken -= 1;
        true
    }
}

/// An in-memory [`StorageBroker`] with operation recording and fault injection.
///
/// Clones share the same files, records and injected failures.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use winrt_access::testing::{MemoryStorage, StorageOp};
/// use winrt_access::{ErrorKind, RandomAccessStream, Resolver};
///
/// let storage = MemoryStorage::new().with_path("clip.mkv", vec![0; 16]);
/// let stream = block_on(Resolver::Path.resolve(&storage, "clip.mkv")).unwrap();
/// assert_eq!(stream.size(), 16);
///
/// storage.fail_when(|op| matches!(op, StorageOp::ResolvePath(_)));
/// let error = block_on(Resolver::Path.resolve(&storage, "clip.mkv")).unwrap_err();
/// assert_eq!(error.kind(), ErrorKind::Resolve);
/// ```
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<State>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file reachable through [`StorageBroker::file_from_path`].
    #[must_use]
    pub fn with_path(self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(Namespace::Path, path.into(), data.into())
    }

    /// Adds a file reachable through [`StorageBroker::redeem_shared_token`].
    #[must_use]
    pub fn with_shared_token(self, token: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(Namespace::SharedAccess, token.into(), data.into())
    }

    /// Adds a file reachable through [`StorageBroker::future_access_file`].
    #[must_use]
    pub fn with_future_access_token(self, token: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(Namespace::FutureAccess, token.into(), data.into())
    }

    fn insert(self, namespace: Namespace, key: String, data: Bytes) -> Self {
        self.state.files.write().insert((namespace, key), data);
        self
    }

    /// Returns every operation performed so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.state.operations.lock().clone()
    }

    /// Fails every subsequent operation for which `predicate` returns `true`.
    ///
    /// Resolution operations fail with [`ErrorKind::Resolve`], opens with
    /// [`ErrorKind::Open`] and stream operations with [`ErrorKind::Io`].
    /// Failed operations are still recorded.
    pub fn fail_when(&self, predicate: impl Fn(&StorageOp) -> bool + Send + Sync + 'static) {
        *self.state.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Makes the next `count` loads fail with [`ErrorKind::StaleHandle`], as
    /// though the handle had been closed underneath the reader.
    pub fn break_handles(&self, count: u32) {
        *self.state.broken_handles.lock() = count;
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        *self.state.fail_when.lock() = None;
        *self.state.broken_handles.lock() = 0;
    }

    fn lookup(&self, namespace: Namespace, key: &str, op: StorageOp) -> Result<MemoryFile> {
        self.state.perform(op)?;

        let data = self
            .state
            .files
            .read()
            .get(&(namespace, key.to_owned()))
            .cloned()
            .ok_or_else(|| Error::caused_by(ErrorKind::Resolve, format!("'{key}' not found")))?;

        Ok(MemoryFile {
            state: Arc::clone(&self.state),
            key: key.to_owned(),
            data,
        })
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("files", &self.state.files.read().len())
            .field("operations", &self.state.operations.lock().len())
            .finish_non_exhaustive()
    }
}

impl StorageBroker for MemoryStorage {
    type File = MemoryFile;

    async fn file_from_path(&self, path: &str) -> Result<Self::File> {
        self.lookup(Namespace::Path, path, StorageOp::ResolvePath(path.to_owned()))
    }

    async fn redeem_shared_token(&self, token: &str) -> Result<Self::File> {
        self.lookup(Namespace::SharedAccess, token, StorageOp::RedeemSharedToken(token.to_owned()))
    }

    async fn future_access_file(&self, token: &str) -> Result<Self::File> {
        self.lookup(Namespace::FutureAccess, token, StorageOp::LookupFutureAccess(token.to_owned()))
    }
}

/// A file resolved by [`MemoryStorage`].
pub struct MemoryFile {
    state: Arc<State>,
    key: String,
    data: Bytes,
}

impl fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFile")
            .field("key", &self.key)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl StorageFile for MemoryFile {
    type Stream = MemoryStream;

    async fn open_read(&self) -> Result<Self::Stream> {
        self.state.perform(StorageOp::OpenRead(self.key.clone()))?;

        Ok(MemoryStream {
            state: Arc::clone(&self.state),
            inner: SourceStream::new(Arc::new(self.data.clone())),
        })
    }
}

/// A stream opened from a [`MemoryFile`].
pub struct MemoryStream {
    state: Arc<State>,
    inner: SourceStream<Bytes>,
}

impl fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStream").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl RandomAccessStream for MemoryStream {
    type Reader = MemoryReader;

    fn clone_stream(&self) -> Result<Self> {
        self.state.perform(StorageOp::CloneStream)?;

        Ok(Self {
            state: Arc::clone(&self.state),
            inner: self.inner.clone_stream()?,
        })
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.state.perform(StorageOp::Seek(position))?;
        self.inner.seek(position)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn reader(&self, options: ReaderOptions) -> Self::Reader {
        MemoryReader {
            state: Arc::clone(&self.state),
            inner: self.inner.reader(options),
        }
    }
}

/// The reader bound to a [`MemoryStream`].
pub struct MemoryReader {
    state: Arc<State>,
    inner: SourceReader<Bytes>,
}

impl fmt::Debug for MemoryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReader").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl StreamReader for MemoryReader {
    async fn load(&mut self, max_bytes: u32) -> Result<u32> {
        self.state.perform(StorageOp::Load { max_bytes })?;

        if self.state.take_broken_handle() {
            return Err(Error::caused_by(ErrorKind::StaleHandle, "handle closed underneath the reader"));
        }

        self.inner.load(max_bytes).await
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.inner.read_bytes(buffer)
    }
}

/// Captures formatted log output into a shared buffer.
///
/// Install the capturing subscriber for the current thread with
/// `log_capture.subscriber().set_default()`, then inspect the output.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured log output as a string.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Asserts that the captured log output contains `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the captured output does not contain `expected`.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a subscriber that writes to this capture buffer.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        use tracing_subscriber::layer::SubscriberExt;

        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Writer that appends to a [`LogCapture`] buffer.
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(MemoryStorage: Send, Sync, Clone);
    assert_impl_all!(MemoryStream: Send, Sync);
    assert_impl_all!(MemoryReader: Send, Sync);

    fn open(storage: &MemoryStorage) -> MemoryStream {
        let file = block_on(storage.file_from_path("a")).unwrap();
        block_on(file.open_read()).unwrap()
    }

    #[test]
    fn broken_handles_fail_loads_then_recover() {
        let storage = MemoryStorage::new().with_path("a", vec![1, 2, 3]);
        let stream = open(&storage);
        let mut reader = stream.reader(ReaderOptions::new());

        storage.break_handles(2);
        for _ in 0..2 {
            let error = block_on(reader.load(3)).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::StaleHandle);
        }

        assert_eq!(block_on(reader.load(3)).unwrap(), 3);
        assert_eq!(stream.position(), 3);
    }

    #[test]
    fn failed_operations_are_recorded() {
        let storage = MemoryStorage::new().with_path("a", vec![0; 8]);
        let mut stream = open(&storage);

        storage.fail_when(|op| matches!(op, StorageOp::Seek(_)));
        assert_eq!(stream.seek(4).unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(stream.position(), 0);
        assert_eq!(storage.operations().last(), Some(&StorageOp::Seek(4)));

        storage.clear_failures();
        stream.seek(4).unwrap();
        assert_eq!(stream.position(), 4);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone().with_shared_token("t", vec![0; 2]);

        assert!(block_on(storage.redeem_shared_token("t")).is_ok());
        assert_eq!(clone.operations(), vec![StorageOp::RedeemSharedToken("t".to_string())]);
    }

    #[test]
    fn log_capture_collects_events() {
        use tracing_subscriber::util::SubscriberInitExt;

        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        tracing::info!(answer = 42, "captured");
        log_capture.assert_contains("captured");
        log_capture.assert_contains("answer=42");
    }
}
