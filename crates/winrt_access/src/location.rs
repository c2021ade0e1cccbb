// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Interpretation of the host's location fields.
//!
//! The host matches this module through one of two shortcuts. With `winrt`
//! the location itself is an access token. With `file` the file path is used
//! as-is, unless it embeds a `winrt:\\` marker, in which case whatever follows
//! the marker is treated as a token.

use crate::resolver::Resolver;
use crate::{Error, ErrorKind, Result};

/// Shortcut under which locations are access tokens.
pub const WINRT_SHORTCUT: &str = "winrt";

/// Shortcut under which locations are file paths.
pub const FILE_SHORTCUT: &str = "file";

const TOKEN_MARKER: &str = "winrt:\\\\";

/// The host's opaque identifier for one access instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// The stream object the host passes when opening an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessObject {
    /// Identifies the instance in later calls.
    pub id: InstanceId,
    /// The shortcut the host matched this module with.
    pub shortcut: String,
    /// The location part of the input.
    pub location: String,
    /// The local path the host derived from the location, if any.
    pub filepath: Option<String>,
}

impl AccessObject {
    /// Creates a stream object without a file path.
    pub fn new(id: InstanceId, shortcut: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id,
            shortcut: shortcut.into(),
            location: location.into(),
            filepath: None,
        }
    }

    /// Sets the local file path.
    #[must_use]
    pub fn with_filepath(mut self, filepath: impl Into<String>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }
}

/// What an open request resolves, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTarget {
    resolver: Resolver,
    target: String,
    location: String,
}

impl OpenTarget {
    /// Interprets the fields of a host stream object.
    ///
    /// `shortcut` is the name the host matched the module with, `location` the
    /// location part of the input, and `filepath` the local path the host
    /// derived from it, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidLocation`] for an unknown shortcut or a
    /// `file` request without a path, and [`ErrorKind::InvalidToken`] when a
    /// token was expected but the string matches neither token shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use winrt_access::{OpenTarget, Resolver};
    ///
    /// let target = OpenTarget::from_host("file", "/C:/clip.mkv", Some("C:\\clip.mkv")).unwrap();
    /// assert_eq!(target.resolver(), Resolver::Path);
    /// assert_eq!(target.target(), "C:\\clip.mkv");
    /// ```
    pub fn from_host(shortcut: &str, location: &str, filepath: Option<&str>) -> Result<Self> {
        let (resolver, target) = if shortcut.starts_with(WINRT_SHORTCUT) {
            (Resolver::for_token(location), location)
        } else if shortcut.starts_with(FILE_SHORTCUT) {
            let filepath = filepath.ok_or_else(|| Error::caused_by(ErrorKind::InvalidLocation, "no file path"))?;
            match embedded_token(filepath) {
                Some(token) => (Resolver::for_token(token), token),
                None => (Resolver::Path, filepath),
            }
        } else {
            return Err(Error::caused_by(
                ErrorKind::InvalidLocation,
                format!("unsupported shortcut '{shortcut}'"),
            ));
        };

        if resolver == Resolver::Reject {
            return Err(Error::caused_by(ErrorKind::InvalidToken, format!("'{target}' is not an access token")));
        }

        Ok(Self {
            resolver,
            target: target.to_owned(),
            location: location.to_owned(),
        })
    }

    /// Interprets a host stream object.
    ///
    /// # Errors
    ///
    /// See [`from_host`](Self::from_host).
    pub fn from_object(object: &AccessObject) -> Result<Self> {
        Self::from_host(&object.shortcut, &object.location, object.filepath.as_deref())
    }

    /// Returns the acquisition procedure for this target.
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        self.resolver
    }

    /// Returns the token or path handed to the resolver.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the host's original location string.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Returns the text after the first `winrt:\\` marker, if any follows it.
fn embedded_token(filepath: &str) -> Option<&str> {
    let start = filepath.find(TOKEN_MARKER)? + TOKEN_MARKER.len();
    let token = &filepath[start..];
    (!token.is_empty()).then_some(token)
}
