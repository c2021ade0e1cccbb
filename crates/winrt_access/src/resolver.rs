// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dispatch from a classified location to its acquisition procedure.

use crate::storage::{BrokerStream, StorageBroker, StorageFile};
use crate::token::{TokenKind, classify};
use crate::{Error, ErrorKind, Result};

/// The procedure used to turn a location into an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolver {
    /// Redeem a shared-access token, then open the file.
    SharedAccess,
    /// Look up a future-access token, then open the file.
    FutureAccess,
    /// Resolve a filesystem path, then open the file.
    Path,
    /// Fail without touching the broker.
    ///
    /// Used when a token was expected but the location matches neither token
    /// shape, so malformed tokens never reach the storage layer.
    Reject,
}

impl Resolver {
    /// Picks the resolver for a location that is expected to be a token.
    ///
    /// # Examples
    ///
    /// ```
    /// use winrt_access::Resolver;
    ///
    /// assert_eq!(Resolver::for_token("{01234567-89ab-cdef-0123-456789abcdef}"), Resolver::FutureAccess);
    /// assert_eq!(Resolver::for_token("notaguid"), Resolver::Reject);
    /// ```
    #[must_use]
    pub fn for_token(token: &str) -> Self {
        match classify(token) {
            TokenKind::SharedAccess => Self::SharedAccess,
            TokenKind::FutureAccess => Self::FutureAccess,
            TokenKind::Path => Self::Reject,
        }
    }

    /// Resolves `target` through `broker` and opens the resulting file.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidToken`] for [`Resolver::Reject`], or the
    /// broker's error if resolution or opening fails.
    pub async fn resolve<B: StorageBroker>(self, broker: &B, target: &str) -> Result<BrokerStream<B>> {
        let file = match self {
            Self::SharedAccess => broker.redeem_shared_token(target).await?,
            Self::FutureAccess => broker.future_access_file(target).await?,
            Self::Path => broker.file_from_path(target).await?,
            Self::Reject => return Err(Error::new(ErrorKind::InvalidToken)),
        };

        file.open_read().await
    }
}
