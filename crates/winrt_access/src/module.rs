// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The surface the host plugin framework sees.
//!
//! [`DESCRIPTOR`] describes the module and [`AccessModule`] implements the
//! entry points. [`register`] hands both to the host's registry. Instances are
//! owned by the module and addressed by the opaque [`InstanceId`] the host
//! supplies on open.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::access::Access;
use crate::control::{ControlQuery, ControlReply};
use crate::location::{AccessObject, FILE_SHORTCUT, InstanceId, OpenTarget, WINRT_SHORTCUT};
use crate::options::AccessOptions;
use crate::storage::StorageBroker;
use crate::ErrorKind;

/// Outcome of an entry point, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation succeeded.
    Success,
    /// The operation failed.
    Failure,
}

impl Status {
    /// Returns the host status code: `0` for success and `-1` for failure.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => -1,
        }
    }

    /// Returns `true` for [`Status::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<T, E> From<Result<T, E>> for Status {
    fn from(result: Result<T, E>) -> Self {
        if result.is_ok() { Self::Success } else { Self::Failure }
    }
}

/// Module category in the host's plugin tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Category {
    /// Input modules.
    Input,
}

/// Module subcategory in the host's plugin tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Subcategory {
    /// Input modules that provide raw byte access.
    InputAccess,
}

/// Static metadata the host uses to pick a module for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Short module name.
    pub shortname: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Category in the plugin tree.
    pub category: Category,
    /// Subcategory in the plugin tree.
    pub subcategory: Subcategory,
    /// Capability the module provides.
    pub capability: &'static str,
    /// Priority among modules with the same capability.
    pub priority: u32,
    /// Location prefixes the module answers to.
    pub shortcuts: &'static [&'static str],
}

/// The descriptor of this module.
pub static DESCRIPTOR: ModuleDescriptor = ModuleDescriptor {
    shortname: "WinRTInput",
    description: "WinRT input",
    category: Category::Input,
    subcategory: Subcategory::InputAccess,
    capability: "access",
    priority: 80,
    shortcuts: &[WINRT_SHORTCUT, FILE_SHORTCUT],
};

/// The entry points the host calls.
///
/// The host calls into one instance from one thread at a time, but different
/// instances may be driven from different threads concurrently.
pub trait AccessEntryPoints: Send + Sync {
    /// Opens the input described by `object` under `object.id`.
    fn open(&self, object: &AccessObject) -> Status;

    /// Releases the instance. Unknown ids are ignored.
    fn close(&self, id: InstanceId);

    /// Reads up to `size` bytes into `buffer`, or skips `size` bytes forward
    /// when `buffer` is `None`.
    ///
    /// Returns the number of bytes transferred or skipped; zero means end of
    /// stream or failure.
    fn read(&self, id: InstanceId, buffer: Option<&mut [u8]>, size: usize) -> usize;

    /// Moves the instance to an absolute byte offset.
    fn seek(&self, id: InstanceId, position: u64) -> Status;

    /// Answers a control query, or returns `None` if it cannot be answered.
    fn control(&self, id: InstanceId, query: ControlQuery) -> Option<ControlReply>;
}

/// The host's registration interface.
pub trait ModuleRegistry {
    /// Registers a module with its entry points.
    fn register(&mut self, descriptor: &'static ModuleDescriptor, entry_points: Arc<dyn AccessEntryPoints>) -> Status;
}

/// Registers `module` under [`DESCRIPTOR`].
pub fn register<R, B>(registry: &mut R, module: Arc<AccessModule<B>>) -> Status
where
    R: ModuleRegistry + ?Sized,
    B: StorageBroker + 'static,
{
    let status = registry.register(&DESCRIPTOR, module);
    tracing::debug!(module = DESCRIPTOR.shortname, status = ?status, "registered module");
    status
}

/// The access module: owns every open instance and serves the entry points.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use winrt_access::fs::FsStorage;
/// use winrt_access::{AccessEntryPoints, AccessModule, AccessObject, InstanceId, Status};
///
/// let module = AccessModule::new(Arc::new(FsStorage::new()));
/// let object = AccessObject::new(InstanceId(1), "winrt", "notaguid");
///
/// assert_eq!(module.open(&object), Status::Failure);
/// assert_eq!(module.instance_count(), 0);
/// ```
pub struct AccessModule<B: StorageBroker> {
    broker: Arc<B>,
    options: AccessOptions,
    instances: DashMap<InstanceId, Arc<Mutex<Access<B>>>>,
}

impl<B: StorageBroker> AccessModule<B> {
    /// Creates a module with default options.
    #[must_use]
    pub fn new(broker: Arc<B>) -> Self {
        Self::with_options(broker, AccessOptions::default())
    }

    /// Creates a module whose instances use `options`.
    #[must_use]
    pub fn with_options(broker: Arc<B>, options: AccessOptions) -> Self {
        Self {
            broker,
            options,
            instances: DashMap::new(),
        }
    }

    /// Returns the number of open instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if `id` names an open instance.
    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Runs `f` against the instance, without holding the registry lock.
    fn with_instance<R>(&self, id: InstanceId, f: impl FnOnce(&mut Access<B>) -> R) -> Option<R> {
        let Some(instance) = self.instances.get(&id).map(|entry| Arc::clone(entry.value())) else {
            tracing::warn!(
                instance = id.0,
                error.kind = %ErrorKind::UnknownInstance,
                "call on an instance that is not open"
            );
            return None;
        };

        let mut access = instance.lock();
        Some(f(&mut access))
    }
}

impl<B: StorageBroker> AccessEntryPoints for AccessModule<B> {
    fn open(&self, object: &AccessObject) -> Status {
        if self.contains(object.id) {
            tracing::warn!(instance = object.id.0, "instance is already open");
            return Status::Failure;
        }

        let target = match OpenTarget::from_object(object) {
            Ok(target) => target,
            Err(error) => {
                tracing::warn!(
                    instance = object.id.0,
                    shortcut = %object.shortcut,
                    location = %object.location,
                    error = %error,
                    "rejected location"
                );
                return Status::Failure;
            }
        };

        let Ok(access) = Access::open(Arc::clone(&self.broker), &target, self.options) else {
            return Status::Failure;
        };

        match self.instances.entry(object.id) {
            Entry::Occupied(_) => {
                tracing::warn!(instance = object.id.0, "instance was opened concurrently");
                Status::Failure
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(access)));
                Status::Success
            }
        }
    }

    fn close(&self, id: InstanceId) {
        if self.instances.remove(&id).is_some() {
            tracing::debug!(instance = id.0, "closed instance");
        }
    }

    fn read(&self, id: InstanceId, buffer: Option<&mut [u8]>, size: usize) -> usize {
        self.with_instance(id, |access| match buffer {
            Some(buffer) => {
                let len = size.min(buffer.len());
                access.read(&mut buffer[..len])
            }
            None => match access.skip(size as u64) {
                Ok(()) => size,
                Err(_) => 0,
            },
        })
        .unwrap_or(0)
    }

    fn seek(&self, id: InstanceId, position: u64) -> Status {
        self.with_instance(id, |access| Status::from(access.seek(position)))
            .unwrap_or(Status::Failure)
    }

    fn control(&self, id: InstanceId, query: ControlQuery) -> Option<ControlReply> {
        self.with_instance(id, |access| access.control(query).ok()).flatten()
    }
}

impl<B: StorageBroker> fmt::Debug for AccessModule<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessModule")
            .field("options", &self.options)
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::testing::{LogCapture, MemoryStorage, StorageOp};

    assert_impl_all!(AccessModule<MemoryStorage>: Send, Sync, fmt::Debug);

    const FUTURE: &str = "{01234567-89ab-cdef-0123-456789abcdef}";

    fn module() -> (Arc<MemoryStorage>, AccessModule<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new().with_future_access_token(FUTURE, vec![5; 64]));
        let module = AccessModule::new(Arc::clone(&storage));
        (storage, module)
    }

    #[derive(Default)]
    struct RecordingRegistry {
        registered: Vec<&'static ModuleDescriptor>,
    }

    impl ModuleRegistry for RecordingRegistry {
        fn register(&mut self, descriptor: &'static ModuleDescriptor, _entry_points: Arc<dyn AccessEntryPoints>) -> Status {
            self.registered.push(descriptor);
            Status::Success
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::Failure.code(), -1);
        assert_eq!(Status::from(Ok::<_, ()>(1)), Status::Success);
        assert!(!Status::from(Err::<(), _>(())).is_success());
    }

    #[test]
    fn descriptor_values() {
        assert_eq!(DESCRIPTOR.shortname, "WinRTInput");
        assert_eq!(DESCRIPTOR.description, "WinRT input");
        assert_eq!(DESCRIPTOR.capability, "access");
        assert_eq!(DESCRIPTOR.priority, 80);
        assert_eq!(DESCRIPTOR.shortcuts, &["winrt", "file"]);
    }

    #[test]
    fn register_hands_over_descriptor() {
        let (_, module) = module();
        let mut registry = RecordingRegistry::default();

        assert_eq!(register(&mut registry, Arc::new(module)), Status::Success);
        assert_eq!(registry.registered, vec![&DESCRIPTOR]);
    }

    #[test]
    fn open_read_close() {
        let (_, module) = module();
        let id = InstanceId(1);

        assert_eq!(module.open(&AccessObject::new(id, "winrt", FUTURE)), Status::Success);
        assert!(module.contains(id));

        let mut buffer = [0; 16];
        assert_eq!(module.read(id, Some(&mut buffer), 10), 10);
        assert_eq!(buffer[..10], [5; 10]);
        assert_eq!(buffer[10..], [0; 6]);

        module.close(id);
        assert!(!module.contains(id));
        assert_eq!(module.read(id, Some(&mut buffer), 10), 0);
    }

    #[test]
    fn duplicate_id_is_refused() {
        let (storage, module) = module();
        let object = AccessObject::new(InstanceId(3), "winrt", FUTURE);

        assert_eq!(module.open(&object), Status::Success);
        let before = storage.operations().len();
        assert_eq!(module.open(&object), Status::Failure);
        assert_eq!(storage.operations().len(), before);
        assert_eq!(module.instance_count(), 1);
    }

    #[test]
    fn failed_open_retains_nothing() {
        let (storage, module) = module();
        storage.fail_when(|op| matches!(op, StorageOp::OpenRead(_)));

        assert_eq!(module.open(&AccessObject::new(InstanceId(1), "winrt", FUTURE)), Status::Failure);
        assert_eq!(module.instance_count(), 0);
    }

    #[test]
    fn null_buffer_skips_forward() {
        let (_, module) = module();
        let id = InstanceId(1);
        assert_eq!(module.open(&AccessObject::new(id, "winrt", FUTURE)), Status::Success);

        assert_eq!(module.read(id, None, 20), 20);
        assert_eq!(module.read(id, None, 20), 20);

        let mut buffer = [0; 64];
        assert_eq!(module.read(id, Some(&mut buffer), 64), 24);
    }

    #[test]
    fn unknown_instance_fails_everywhere() {
        let (_, module) = module();
        let id = InstanceId(9);

        assert_eq!(module.seek(id, 0), Status::Failure);
        assert_eq!(module.read(id, None, 4), 0);
        assert_eq!(module.control(id, ControlQuery::CanSeek), None);
        module.close(id);
    }

    #[test]
    fn unknown_instance_is_logged() {
        use tracing_subscriber::util::SubscriberInitExt;

        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        let (_, module) = module();
        assert_eq!(module.seek(InstanceId(42), 0), Status::Failure);

        log_capture.assert_contains("instance=42");
        log_capture.assert_contains("error.kind=unknown instance");
    }

    #[test]
    fn control_maps_errors_to_none() {
        let (_, module) = module();
        let id = InstanceId(1);
        assert_eq!(module.open(&AccessObject::new(id, "winrt", FUTURE)), Status::Success);

        assert_eq!(module.control(id, ControlQuery::GetSize), Some(ControlReply::Size(64)));
        assert_eq!(module.control(id, ControlQuery::GetMeta), None);
    }
}
