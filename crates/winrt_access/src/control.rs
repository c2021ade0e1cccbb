// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::time::Duration;

/// A capability or parameter query from the host.
///
/// Queries the module does not answer are listed so the host can forward them;
/// they are rejected with [`ErrorKind::Unsupported`](crate::ErrorKind::Unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ControlQuery {
    /// Whether the stream can be repositioned.
    CanSeek,
    /// Whether repositioning is cheap.
    CanFastSeek,
    /// Whether the stream can be paused.
    CanPause,
    /// Whether the host may control the pace of reads.
    CanControlPace,
    /// The total size of the stream in bytes.
    GetSize,
    /// The latency hint for the presentation clock.
    GetPtsDelay,
    /// Pauses or resumes the stream.
    SetPauseState(bool),
    /// Title information.
    GetTitleInfo,
    /// Stream metadata.
    GetMeta,
    /// The MIME type of the content.
    GetContentType,
    /// Signal strength and quality.
    GetSignal,
    /// Selects a title.
    SetTitle(u32),
    /// Selects a seekpoint.
    SetSeekpoint(u32),
}

/// The answer to a [`ControlQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlReply {
    /// A capability flag.
    Flag(bool),
    /// A size in bytes.
    Size(u64),
    /// A latency hint.
    Delay(Duration),
    /// The query was applied and has nothing to report.
    Done,
}
