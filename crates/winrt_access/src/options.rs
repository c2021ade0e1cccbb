// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::time::Duration;

use crate::storage::ReaderOptions;

const DEFAULT_MAX_REATTACH_ATTEMPTS: u32 = 3;
const DEFAULT_PTS_DELAY: Duration = Duration::from_millis(300);

/// Configuration for access instances.
///
/// The defaults match what the host expects from a local file input: up to
/// three reattachments per read after a stale handle, a 300 ms latency hint,
/// and partial reads with read-ahead.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use winrt_access::AccessOptions;
///
/// let options = AccessOptions::new().max_reattach_attempts(5).pts_delay(Duration::from_millis(100));
/// assert_eq!(options.get_max_reattach_attempts(), 5);
/// assert_eq!(options.get_pts_delay(), Duration::from_millis(100));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessOptions {
    max_reattach_attempts: u32,
    pts_delay: Duration,
    reader_options: ReaderOptions,
}

// Setters use plain names and getters the `get_` prefix, as setters are the common case.
impl AccessOptions {
    /// Creates the default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_reattach_attempts: DEFAULT_MAX_REATTACH_ATTEMPTS,
            pts_delay: DEFAULT_PTS_DELAY,
            reader_options: ReaderOptions::new().partial(true).read_ahead(true),
        }
    }

    /// Sets how many times a single read may reattach after a stale handle.
    ///
    /// Zero disables reattachment.
    #[must_use]
    pub const fn max_reattach_attempts(mut self, attempts: u32) -> Self {
        self.max_reattach_attempts = attempts;
        self
    }

    /// Sets the latency hint reported to the host.
    #[must_use]
    pub const fn pts_delay(mut self, delay: Duration) -> Self {
        self.pts_delay = delay;
        self
    }

    /// Sets the options every reader is bound with.
    #[must_use]
    pub const fn reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader_options = options;
        self
    }

    /// Returns the reattachment ceiling.
    #[must_use]
    pub const fn get_max_reattach_attempts(&self) -> u32 {
        self.max_reattach_attempts
    }

    /// Returns the latency hint.
    #[must_use]
    pub const fn get_pts_delay(&self) -> Duration {
        self.pts_delay
    }

    /// Returns the reader options.
    #[must_use]
    pub const fn get_reader_options(&self) -> ReaderOptions {
        self.reader_options
    }
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = AccessOptions::default();
        assert_eq!(options.get_max_reattach_attempts(), 3);
        assert_eq!(options.get_pts_delay(), Duration::from_millis(300));
        assert!(options.get_reader_options().is_partial());
        assert!(options.get_reader_options().is_read_ahead());
    }

    #[test]
    fn reader_options_are_replaced() {
        let options = AccessOptions::new().reader_options(ReaderOptions::new());
        assert_eq!(options.get_reader_options(), ReaderOptions::new());
    }
}
