// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A [`StorageBroker`] over the local filesystem.
//!
//! [`FsStorage`] keeps its own future-access list and shared-token table, so
//! applications can hand out tokens for files they have been granted and later
//! open them through the same access paths the host uses. Every operation
//! completes before its future is first polled.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::source::{ByteSource, SourceStream};
use crate::storage::{StorageBroker, StorageFile};
use crate::{Error, ErrorKind, Result};

/// Filesystem storage with token tables.
///
/// # Examples
///
/// ```no_run
/// use winrt_access::fs::FsStorage;
/// use winrt_access::token::{TokenKind, classify};
///
/// let storage = FsStorage::new();
/// let token = storage.add_future_access("C:\\media\\clip.mkv");
/// assert_eq!(classify(&token), TokenKind::FutureAccess);
/// ```
#[derive(Debug, Default)]
pub struct FsStorage {
    future_access: DashMap<String, PathBuf>,
    shared_access: DashMap<String, PathBuf>,
}

impl FsStorage {
    /// Creates storage with empty token tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` to the future-access list and returns its braced token.
    pub fn add_future_access(&self, path: impl AsRef<Path>) -> String {
        let token = Uuid::new_v4().braced().to_string();
        self.future_access.insert(token.clone(), path.as_ref().to_path_buf());
        token
    }

    /// Removes a token from the future-access list.
    ///
    /// Returns `true` if the token was present.
    pub fn remove_future_access(&self, token: &str) -> bool {
        self.future_access.remove(token).is_some()
    }

    /// Issues a shared-access token for `path`.
    pub fn add_shared_access(&self, path: impl AsRef<Path>) -> String {
        let token = Uuid::new_v4().hyphenated().to_string();
        self.shared_access.insert(token.clone(), path.as_ref().to_path_buf());
        token
    }

    /// Revokes a shared-access token.
    ///
    /// Returns `true` if the token was present.
    pub fn remove_shared_access(&self, token: &str) -> bool {
        self.shared_access.remove(token).is_some()
    }

    fn lookup(table: &DashMap<String, PathBuf>, token: &str) -> Result<FsFile> {
        let path = table
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::caused_by(ErrorKind::Resolve, format!("unknown token '{token}'")))?;

        Ok(FsFile { path })
    }
}

impl StorageBroker for FsStorage {
    type File = FsFile;

    async fn file_from_path(&self, path: &str) -> Result<Self::File> {
        let metadata = std::fs::metadata(path).map_err(|error| Error::from_io(ErrorKind::Resolve, error))?;
        if !metadata.is_file() {
            return Err(Error::caused_by(ErrorKind::Resolve, format!("'{path}' is not a file")));
        }

        Ok(FsFile { path: PathBuf::from(path) })
    }

    async fn redeem_shared_token(&self, token: &str) -> Result<Self::File> {
        Self::lookup(&self.shared_access, token)
    }

    async fn future_access_file(&self, token: &str) -> Result<Self::File> {
        Self::lookup(&self.future_access, token)
    }
}

/// A file resolved by [`FsStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsFile {
    path: PathBuf,
}

impl FsFile {
    /// Returns the path this file was resolved to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageFile for FsFile {
    type Stream = SourceStream<FileSource>;

    async fn open_read(&self) -> Result<Self::Stream> {
        let file = File::open(&self.path).map_err(|error| Error::from_io(ErrorKind::Open, error))?;
        let len = file
            .metadata()
            .map_err(|error| Error::from_io(ErrorKind::Open, error))?
            .len();

        tracing::debug!(path = %self.path.display(), len, "opened file");

        Ok(SourceStream::new(Arc::new(FileSource {
            file: Mutex::new(file),
            len,
        })))
    }
}

/// An open file read at arbitrary offsets.
///
/// The length is taken when the file is opened.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if offset >= self.len || buffer.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|error| Error::from_io(ErrorKind::Io, error))?;
        file.read(buffer).map_err(|error| Error::from_io(ErrorKind::Io, error))
    }
}
