// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use crate::Result;
use crate::storage::{RandomAccessStream, ReaderOptions, StreamReader};

/// The open stream handle of an access instance together with its reader.
///
/// The handle and the reader are only ever replaced as a pair, through
/// [`set_stream`](Self::set_stream), so a reader is never bound to a handle
/// other than the one installed next to it.
pub(crate) struct StreamSession<S: RandomAccessStream> {
    // Declared before `stream` so the reader is released first.
    reader: S::Reader,
    stream: S,
    options: ReaderOptions,
}

impl<S: RandomAccessStream> StreamSession<S> {
    pub fn new(stream: S, options: ReaderOptions) -> Self {
        Self {
            reader: stream.reader(options),
            stream,
            options,
        }
    }

    /// Installs `stream` with a freshly bound reader, releasing the previous pair.
    pub fn set_stream(&mut self, stream: S) {
        self.reader = stream.reader(self.options);
        self.stream = stream;
    }

    /// Returns a clone of the current handle moved to `position`.
    ///
    /// The installed pair is untouched; the caller decides whether to swap the
    /// clone in.
    pub fn fork_at(&self, position: u64) -> Result<S> {
        let mut clone = self.stream.clone_stream()?;
        clone.seek(position)?;
        Ok(clone)
    }

    /// Loads at most `buffer.len()` bytes and copies exactly the loaded count
    /// into the front of `buffer`.
    pub async fn load_into(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let max_bytes = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        let loaded = (self.reader.load(max_bytes).await? as usize).min(buffer.len());
        self.reader.read_bytes(&mut buffer[..loaded])?;
        Ok(loaded)
    }

    pub fn size(&self) -> u64 {
        self.stream.size()
    }

    /// Returns `true` once the handle has reached its end.
    pub fn is_at_end(&self) -> bool {
        self.stream.position() >= self.stream.size()
    }

    #[cfg(test)]
    pub fn stream(&self) -> &S {
        &self.stream
    }
}

impl<S: RandomAccessStream> fmt::Debug for StreamSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("position", &self.stream.position())
            .field("size", &self.stream.size())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
