// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Classification of location strings into access tokens and plain paths.
//!
//! Both token shapes are the canonical text form of a GUID: shared-access
//! tokens without braces (`01234567-89ab-cdef-0123-456789abcdef`) and
//! future-access tokens with them (`{01234567-89ab-cdef-0123-456789abcdef}`).

const SHARED_TOKEN_LEN: usize = 36;
const FUTURE_TOKEN_LEN: usize = 38;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// The shape of a location string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A token redeemable against the shared storage access manager.
    SharedAccess,
    /// A token naming an entry of the future-access list.
    FutureAccess,
    /// Anything else, treated as a filesystem path.
    Path,
}

/// Classifies `location`, checking the shared-access shape first, then the
/// future-access shape.
///
/// # Examples
///
/// ```
/// use winrt_access::token::{TokenKind, classify};
///
/// assert_eq!(classify("01234567-89ab-cdef-0123-456789abcdef"), TokenKind::SharedAccess);
/// assert_eq!(classify("{01234567-89AB-CDEF-0123-456789ABCDEF}"), TokenKind::FutureAccess);
/// assert_eq!(classify("C:\\media\\clip.mkv"), TokenKind::Path);
/// ```
#[must_use]
pub fn classify(location: &str) -> TokenKind {
    if is_shared_access_token(location) {
        TokenKind::SharedAccess
    } else if is_future_access_token(location) {
        TokenKind::FutureAccess
    } else {
        TokenKind::Path
    }
}

/// Returns `true` if `token` is a GUID without braces.
#[must_use]
pub fn is_shared_access_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == SHARED_TOKEN_LEN
        && bytes.iter().enumerate().all(|(index, byte)| {
            if HYPHEN_POSITIONS.contains(&index) {
                *byte == b'-'
            } else {
                byte.is_ascii_hexdigit()
            }
        })
}

/// Returns `true` if `token` is a GUID wrapped in braces.
#[must_use]
pub fn is_future_access_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() != FUTURE_TOKEN_LEN || bytes[0] != b'{' || bytes[FUTURE_TOKEN_LEN - 1] != b'}' {
        return false;
    }

    // Both braces are single-byte characters, so the interior is a valid slice.
    is_shared_access_token(&token[1..FUTURE_TOKEN_LEN - 1])
}
