// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Seekable media input access over storage broker tokens and file paths.
//!
//! This crate is the input-access module of a media-playback host. The host
//! hands it a location that is either a plain filesystem path or an opaque
//! token issued by a storage permission broker, and reads the result as a
//! seekable byte stream.
//!
//! # Overview
//!
//! - [`token`] classifies a string as a shared-access token, a future-access
//!   token or a path.
//! - [`OpenTarget`] interprets the host's location fields and picks a [`Resolver`].
//! - [`Resolver::resolve`] runs the matching acquisition chain against a
//!   [`StorageBroker`] and opens the file as a [`RandomAccessStream`].
//! - [`Access`] serves reads, seeks and control queries on the open stream,
//!   reattaching to the file when the handle is closed underneath it.
//! - [`AccessModule`] owns the open instances and implements the host's
//!   [`AccessEntryPoints`]; [`register`] hands it over with [`DESCRIPTOR`].
//!
//! Storage is consumed through traits. The `fs` feature (on by default)
//! provides [`fs::FsStorage`] over the local filesystem, and the `test-util`
//! feature provides an in-memory broker with fault injection in `testing`.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! use winrt_access::fs::FsStorage;
//! use winrt_access::{AccessEntryPoints, AccessModule, AccessObject, ControlQuery, ControlReply, InstanceId, Status};
//!
//! let mut file = tempfile::NamedTempFile::new().unwrap();
//! file.write_all(&[1; 100]).unwrap();
//!
//! let storage = Arc::new(FsStorage::new());
//! let token = storage.add_future_access(file.path());
//!
//! let module = AccessModule::new(storage);
//! let id = InstanceId(1);
//! assert_eq!(module.open(&AccessObject::new(id, "winrt", token)), Status::Success);
//! assert_eq!(module.control(id, ControlQuery::GetSize), Some(ControlReply::Size(100)));
//!
//! let mut buffer = [0; 60];
//! assert_eq!(module.read(id, Some(&mut buffer), 60), 60);
//! assert_eq!(module.read(id, Some(&mut buffer), 60), 40);
//! module.close(id);
//! ```
//!
//! # Stale handles
//!
//! A read that fails with [`ErrorKind::StaleHandle`] reopens the original
//! location as a path, seeks back to the last position and tries again, up to
//! [`AccessOptions::get_max_reattach_attempts`] times. The counter resets after
//! every successful read.

mod access;
mod control;
mod error;
mod location;
mod module;
mod options;
mod resolver;
mod session;
pub mod source;
mod storage;
pub mod token;

#[cfg(feature = "fs")]
#[cfg_attr(docsrs, doc(cfg(feature = "fs")))]
pub mod fs;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[doc(inline)]
pub use access::Access;
#[doc(inline)]
pub use control::{ControlQuery, ControlReply};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use location::{AccessObject, FILE_SHORTCUT, InstanceId, OpenTarget, WINRT_SHORTCUT};
#[doc(inline)]
pub use module::{
    AccessEntryPoints, AccessModule, Category, DESCRIPTOR, ModuleDescriptor, ModuleRegistry, Status, Subcategory, register,
};
#[doc(inline)]
pub use options::AccessOptions;
#[doc(inline)]
pub use resolver::Resolver;
#[doc(inline)]
pub use storage::{BrokerStream, RandomAccessStream, ReaderOptions, StorageBroker, StorageFile, StreamReader};
