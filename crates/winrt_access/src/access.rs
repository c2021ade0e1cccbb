// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use futures::executor::block_on;
use recoverable::{Recovery, RecoveryKind};
use tracing::Level;

use crate::control::{ControlQuery, ControlReply};
use crate::location::OpenTarget;
use crate::options::AccessOptions;
use crate::resolver::Resolver;
use crate::session::StreamSession;
use crate::storage::{BrokerStream, RandomAccessStream, StorageBroker};
use crate::{Error, ErrorKind, Result};

/// An open input stream served to the host.
///
/// Every operation blocks the calling thread until the underlying asynchronous
/// work has completed. The host drives one instance from one thread at a time.
///
/// `Access` keeps the logical position the host observes. The stream handle
/// underneath may be replaced by a seek or by a reattachment after a stale
/// handle, and is always moved to the logical position before control returns.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use std::sync::Arc;
///
/// use winrt_access::fs::FsStorage;
/// use winrt_access::{Access, AccessOptions, ControlQuery, ControlReply, OpenTarget};
///
/// let mut file = tempfile::NamedTempFile::new().unwrap();
/// file.write_all(&[0; 100]).unwrap();
///
/// let storage = Arc::new(FsStorage::new());
/// let token = storage.add_shared_access(file.path());
/// let target = OpenTarget::from_host("winrt", &token, None).unwrap();
///
/// let mut access = Access::open(storage, &target, AccessOptions::default()).unwrap();
/// let mut buffer = [0; 64];
/// assert_eq!(access.read(&mut buffer), 64);
/// assert_eq!(access.control(ControlQuery::GetSize).unwrap(), ControlReply::Size(100));
/// ```
pub struct Access<B: StorageBroker> {
    broker: Arc<B>,
    options: AccessOptions,
    location: String,
    session: StreamSession<BrokerStream<B>>,
    position: u64,
    eof: bool,
    retries: u32,
}

impl<B: StorageBroker> Access<B> {
    /// Resolves `target` and opens it for reading.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if the token or path cannot be resolved or
    /// the resulting file cannot be opened. The error is also logged.
    pub fn open(broker: Arc<B>, target: &OpenTarget, options: AccessOptions) -> Result<Self> {
        let stream = block_on(target.resolver().resolve(broker.as_ref(), target.target())).inspect_err(|error| {
            tracing::event!(
                name: "winrt_access.open",
                Level::WARN,
                access.resolver = ?target.resolver(),
                access.location = target.location(),
                error = %error,
                "failed to open file"
            );
        })?;

        let session = StreamSession::new(stream, options.get_reader_options());
        let eof = session.is_at_end();

        tracing::debug!(resolver = ?target.resolver(), size = session.size(), "opened stream");

        Ok(Self {
            broker,
            options,
            location: target.location().to_owned(),
            session,
            position: 0,
            eof,
            retries: 0,
        })
    }

    /// Returns the logical byte offset observed by the host.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns `true` once the stream has been read or moved to its end.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Returns the number of reattachments made since the last successful read.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the total size of the stream in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.session.size()
    }

    /// Returns the host's original location string.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Moves the stream to an absolute byte offset.
    ///
    /// The current handle is cloned and the clone repositioned, so a failure
    /// leaves the instance exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be cloned or repositioned.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        let stream = self.session.fork_at(position).inspect_err(|error| {
            tracing::warn!(position, error = %error, "failed to seek");
        })?;

        self.session.set_stream(stream);
        self.position = position;
        self.eof = self.session.is_at_end();
        Ok(())
    }

    /// Moves the stream forward by `len` bytes without reading them.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying seek fails.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.seek(self.position.saturating_add(len))
    }

    /// Reads up to `buffer.len()` bytes into the front of `buffer`.
    ///
    /// Returns the number of bytes read. Zero means either the end of the
    /// stream or an unrecoverable failure; the two are not distinguished.
    ///
    /// A stale handle is recovered by reopening the original location as a
    /// path and seeking back to the logical position, up to the configured
    /// number of reattachments.
    ///
    /// The reattachment count belongs to the instance, not to a single call:
    /// only a successful read resets it. After a read has used up the budget,
    /// later reads give up on the first stale handle until one succeeds.
    pub fn read(&mut self, buffer: &mut [u8]) -> usize {
        match self.read_with_reattach(buffer) {
            Ok(read) => read,
            Err(error) => {
                tracing::warn!(position = self.position, error = %error, "failure while reading block");
                0
            }
        }
    }

    fn read_with_reattach(&mut self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            let error = match block_on(self.session.load_into(buffer)) {
                Ok(read) => {
                    self.position += read as u64;
                    self.eof = self.session.is_at_end();
                    self.retries = 0;
                    if self.eof {
                        tracing::debug!(position = self.position, "end of file reached");
                    }
                    return Ok(read);
                }
                Err(error) => error,
            };

            if error.recovery().kind() != RecoveryKind::Retry {
                return Err(error);
            }

            if self.retries >= self.options.get_max_reattach_attempts() {
                tracing::warn!(retries = self.retries, "stream handle closed too many times, giving up");
                return Err(error);
            }

            self.retries += 1;
            tracing::event!(
                name: "winrt_access.reattach",
                Level::WARN,
                access.location = %self.location,
                access.position = self.position,
                access.attempt = self.retries,
                error = %error,
                "stream handle closed, reattaching"
            );

            self.reattach().inspect_err(|error| {
                tracing::warn!(error = %error, "failed to reopen file");
            })?;
        }
    }

    /// Reopens the original location as a path and moves the fresh handle to
    /// the logical position before installing it.
    fn reattach(&mut self) -> Result<()> {
        let mut stream = block_on(Resolver::Path.resolve(self.broker.as_ref(), &self.location))?;
        stream.seek(self.position)?;

        self.session.set_stream(stream);
        self.eof = self.session.is_at_end();
        Ok(())
    }

    /// Answers a capability or parameter query.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unsupported`] for queries this module does not handle.
    pub fn control(&self, query: ControlQuery) -> Result<ControlReply> {
        match query {
            ControlQuery::CanSeek | ControlQuery::CanFastSeek | ControlQuery::CanPause | ControlQuery::CanControlPace => {
                Ok(ControlReply::Flag(true))
            }
            ControlQuery::GetSize => Ok(ControlReply::Size(self.session.size())),
            ControlQuery::GetPtsDelay => Ok(ControlReply::Delay(self.options.get_pts_delay())),
            ControlQuery::SetPauseState(_) => Ok(ControlReply::Done),
            other => {
                tracing::debug!(query = ?other, "unsupported control query");
                Err(Error::caused_by(ErrorKind::Unsupported, format!("{other:?}")))
            }
        }
    }
}

impl<B: StorageBroker> fmt::Debug for Access<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Access")
            .field("location", &self.location)
            .field("position", &self.position)
            .field("eof", &self.eof)
            .field("retries", &self.retries)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
