// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Streams and readers over positional byte sources.
//!
//! A [`ByteSource`] only knows how to read at an offset. [`SourceStream`] adds
//! a cursor and cheap cloning on top of it, and [`SourceReader`] adds the load
//! buffer the access engine reads through. Every clone of a stream shares the
//! source but owns its cursor; a reader shares the cursor of the stream it was
//! created from.

use core::sync::atomic::{AtomicU64, Ordering};
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::storage::{RandomAccessStream, ReaderOptions, StreamReader};
use crate::{Error, ErrorKind, Result};

/// A byte source that supports reads at arbitrary offsets.
pub trait ByteSource: Send + Sync {
    /// Returns the length of the source in bytes.
    fn len(&self) -> u64;

    /// Returns `true` if the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads into `buffer` starting at `offset`, returning the number of bytes
    /// read. Returns zero at or past the end of the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<usize>;
}

impl ByteSource for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(remaining) = self.get(start..) else {
            return Ok(0);
        };

        let count = remaining.len().min(buffer.len());
        buffer[..count].copy_from_slice(&remaining[..count]);
        Ok(count)
    }
}

/// A seekable stream over a shared [`ByteSource`].
pub struct SourceStream<S> {
    source: Arc<S>,
    cursor: Arc<AtomicU64>,
}

impl<S: ByteSource> SourceStream<S> {
    /// Creates a stream positioned at the start of `source`.
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            cursor: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the source this stream reads from.
    #[must_use]
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

impl<S> fmt::Debug for SourceStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("position", &self.cursor.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<S: ByteSource> RandomAccessStream for SourceStream<S> {
    type Reader = SourceReader<S>;

    fn clone_stream(&self) -> Result<Self> {
        Ok(Self {
            source: Arc::clone(&self.source),
            cursor: Arc::new(AtomicU64::new(self.position())),
        })
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.cursor.store(position, Ordering::Release);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.source.len()
    }

    fn position(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    fn reader(&self, options: ReaderOptions) -> Self::Reader {
        SourceReader {
            source: Arc::clone(&self.source),
            cursor: Arc::clone(&self.cursor),
            options,
            loaded: BytesMut::new(),
        }
    }
}

/// The reader bound to a [`SourceStream`].
///
/// Partial readers issue a single source read per load; otherwise a load keeps
/// reading until the request is satisfied or the source is exhausted. The
/// read-ahead flag is accepted but sources are always read on demand.
pub struct SourceReader<S> {
    source: Arc<S>,
    cursor: Arc<AtomicU64>,
    options: ReaderOptions,
    loaded: BytesMut,
}

impl<S> fmt::Debug for SourceReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceReader")
            .field("options", &self.options)
            .field("loaded", &self.loaded.len())
            .finish_non_exhaustive()
    }
}

impl<S: ByteSource> StreamReader for SourceReader<S> {
    async fn load(&mut self, max_bytes: u32) -> Result<u32> {
        let requested = max_bytes as usize;
        let start = self.loaded.len();
        self.loaded.resize(start + requested, 0);

        let mut filled = 0;
        let outcome = loop {
            let offset = self.cursor.load(Ordering::Acquire);
            match self.source.read_at(offset, &mut self.loaded[start + filled..start + requested]) {
                Ok(0) => break Ok(()),
                Ok(count) => {
                    self.cursor.fetch_add(count as u64, Ordering::AcqRel);
                    filled += count;
                    if filled == requested || self.options.is_partial() {
                        break Ok(());
                    }
                }
                Err(error) => break Err(error),
            }
        };

        // Bytes that arrived before a failure stay loaded; the cursor already covers them.
        self.loaded.truncate(start + filled);
        outcome?;

        // filled never exceeds max_bytes
        Ok(u32::try_from(filled).unwrap_or(max_bytes))
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() > self.loaded.len() {
            return Err(Error::caused_by(
                ErrorKind::Io,
                format!("requested {} bytes but only {} are loaded", buffer.len(), self.loaded.len()),
            ));
        }

        let chunk = self.loaded.split_to(buffer.len());
        buffer.copy_from_slice(&chunk);
        Ok(())
    }
}
