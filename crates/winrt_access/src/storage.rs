// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Interfaces to the storage broker and stream primitives this crate consumes.
//!
//! The access engine never touches the operating system directly. Files are
//! obtained from a [`StorageBroker`], opened into a [`RandomAccessStream`], and
//! read through a [`StreamReader`] bound to that stream. The `fs` module and the
//! `testing` module provide implementations; platform integrations supply their
//! own.

use crate::Result;

/// Resolves paths and access tokens into files.
///
/// Each method is one asynchronous step of an acquisition chain. The access
/// engine awaits them to completion before returning to its caller.
pub trait StorageBroker: Send + Sync {
    /// The file type produced by this broker.
    type File: StorageFile;

    /// Resolves a file directly from a filesystem path.
    fn file_from_path(&self, path: &str) -> impl Future<Output = Result<Self::File>> + Send;

    /// Redeems a shared-access token for the file it was issued for.
    fn redeem_shared_token(&self, token: &str) -> impl Future<Output = Result<Self::File>> + Send;

    /// Looks up a token in the future-access list.
    fn future_access_file(&self, token: &str) -> impl Future<Output = Result<Self::File>> + Send;
}

/// A resolved file that can be opened for reading.
pub trait StorageFile: Send {
    /// The stream type produced when the file is opened.
    type Stream: RandomAccessStream;

    /// Opens the file for read access.
    fn open_read(&self) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// An open, randomly seekable byte source.
///
/// Reads happen through a [`StreamReader`] obtained from [`reader`](Self::reader);
/// reading advances the stream position.
pub trait RandomAccessStream: Send + Sync + Sized {
    /// The reader type bound to this stream.
    type Reader: StreamReader;

    /// Creates an independent handle over the same underlying resource.
    ///
    /// The clone starts at this stream's position and moves independently.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource can no longer be duplicated.
    fn clone_stream(&self) -> Result<Self>;

    /// Moves the stream to an absolute byte offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource rejects the position.
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Returns the total length of the stream in bytes.
    fn size(&self) -> u64;

    /// Returns the current byte offset of the stream.
    fn position(&self) -> u64;

    /// Creates a buffered reader bound to this stream.
    fn reader(&self, options: ReaderOptions) -> Self::Reader;
}

/// A buffered reader bound to a single [`RandomAccessStream`].
pub trait StreamReader: Send + Sync {
    /// Loads up to `max_bytes` from the stream into the reader's buffer.
    ///
    /// Returns the number of bytes loaded, which is zero at the end of the
    /// stream and may be less than requested when the reader is partial.
    fn load(&mut self, max_bytes: u32) -> impl Future<Output = Result<u32>> + Send;

    /// Moves exactly `buffer.len()` loaded bytes out of the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `buffer.len()` bytes are loaded.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<()>;
}

/// Options applied to a [`StreamReader`] when it is bound to a stream.
///
/// # Examples
///
/// ```
/// use winrt_access::ReaderOptions;
///
/// let options = ReaderOptions::new().partial(true).read_ahead(true);
/// assert!(options.is_partial());
/// assert!(options.is_read_ahead());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReaderOptions {
    partial: bool,
    read_ahead: bool,
}

impl ReaderOptions {
    /// Creates options with every flag cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partial: false,
            read_ahead: false,
        }
    }

    /// Lets a load complete with fewer bytes than requested.
    #[must_use]
    pub const fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Allows the reader to fetch more than requested from the stream.
    #[must_use]
    pub const fn read_ahead(mut self, read_ahead: bool) -> Self {
        self.read_ahead = read_ahead;
        self
    }

    /// Returns `true` if loads may complete with fewer bytes than requested.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial
    }

    /// Returns `true` if the reader may read ahead of requests.
    #[must_use]
    pub const fn is_read_ahead(&self) -> bool {
        self.read_ahead
    }
}

/// The stream type a broker's files open into.
pub type BrokerStream<B> = <<B as StorageBroker>::File as StorageFile>::Stream;
