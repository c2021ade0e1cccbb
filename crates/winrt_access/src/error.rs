// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for stream access operations.

use std::fmt::{Display, Formatter};

use recoverable::{Recovery, RecoveryInfo};

/// Windows error code reported when an opportunistic lock break closes a handle
/// underneath an open stream.
const ERROR_OPLOCK_HANDLE_CLOSED: i32 = 803;

/// The kind of failure behind an [`Error`].
///
/// Only [`ErrorKind::StaleHandle`] is recoverable: the access engine reattaches
/// to the file and retries the read. Every other kind is terminal for the
/// operation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The host object does not name a usable location.
    InvalidLocation,
    /// The location looked like a token but matches neither token shape.
    InvalidToken,
    /// A token or path could not be resolved to a file.
    Resolve,
    /// A resolved file could not be opened for reading.
    Open,
    /// The stream handle was closed underneath the reader.
    StaleHandle,
    /// Any other read or seek failure.
    Io,
    /// The control query is not supported by this module.
    Unsupported,
    /// The host referred to an instance that is not open.
    UnknownInstance,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocation => write!(f, "invalid location"),
            Self::InvalidToken => write!(f, "invalid access token"),
            Self::Resolve => write!(f, "resolve failed"),
            Self::Open => write!(f, "open failed"),
            Self::StaleHandle => write!(f, "stale handle"),
            Self::Io => write!(f, "i/o failure"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::UnknownInstance => write!(f, "unknown instance"),
        }
    }
}

/// An error from a storage or stream operation.
///
/// Collaborator implementations construct errors with [`Error::from_kind`] or
/// [`Error::from_cause`], picking the [`ErrorKind`] that describes the failure.
///
/// # Examples
///
/// ```
/// use recoverable::{Recovery, RecoveryKind};
/// use winrt_access::{Error, ErrorKind};
///
/// let error = Error::from_cause(ErrorKind::StaleHandle, "handle closed by oplock break");
/// assert_eq!(error.kind(), ErrorKind::StaleHandle);
/// assert_eq!(error.recovery().kind(), RecoveryKind::Retry);
/// ```
#[ohno::error]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error of the given kind without an underlying cause.
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind)
    }

    /// Creates an error of the given kind wrapping an underlying cause.
    #[must_use]
    pub fn from_cause(kind: ErrorKind, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(kind, cause)
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Converts an I/O error, keeping `fallback` as the kind unless the OS
    /// reports a stale handle.
    #[must_use]
    pub fn from_io(fallback: ErrorKind, error: std::io::Error) -> Self {
        let kind = if is_stale_handle(&error) { ErrorKind::StaleHandle } else { fallback };
        Self::caused_by(kind, error)
    }
}

impl Recovery for Error {
    fn recovery(&self) -> RecoveryInfo {
        match self.kind {
            ErrorKind::StaleHandle => RecoveryInfo::retry(),
            _ => RecoveryInfo::never(),
        }
    }
}

fn is_stale_handle(error: &std::io::Error) -> bool {
    cfg!(windows) && error.raw_os_error() == Some(ERROR_OPLOCK_HANDLE_CLOSED)
}

/// A specialized [`Result`] type for stream access operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use recoverable::RecoveryKind;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, std::error::Error);
    assert_impl_all!(ErrorKind: Copy, Send, Sync, std::hash::Hash);

    #[test]
    fn only_stale_handle_is_retried() {
        assert_eq!(Error::new(ErrorKind::StaleHandle).recovery().kind(), RecoveryKind::Retry);

        for kind in [
            ErrorKind::InvalidLocation,
            ErrorKind::InvalidToken,
            ErrorKind::Resolve,
            ErrorKind::Open,
            ErrorKind::Io,
            ErrorKind::Unsupported,
            ErrorKind::UnknownInstance,
        ] {
            assert_eq!(Error::new(kind).recovery().kind(), RecoveryKind::Never, "{kind}");
        }
    }

    #[test]
    fn from_io_keeps_fallback_kind() {
        let error = Error::from_io(ErrorKind::Open, std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(error.kind(), ErrorKind::Open);
    }

    #[cfg(windows)]
    #[test]
    fn from_io_detects_oplock_break() {
        let error = Error::from_io(ErrorKind::Io, std::io::Error::from_raw_os_error(ERROR_OPLOCK_HANDLE_CLOSED));
        assert_eq!(error.kind(), ErrorKind::StaleHandle);
    }

    #[test]
    fn display_contains_cause() {
        let error = Error::caused_by(ErrorKind::Resolve, "token not in list");
        let display = format!("{error}");
        assert!(display.contains("token not in list"), "got: {display}");
    }
}
