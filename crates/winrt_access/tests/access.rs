// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the access engine and the module entry points.

use std::sync::Arc;

use winrt_access::testing::{MemoryStorage, StorageOp};
use winrt_access::{
    Access, AccessEntryPoints, AccessModule, AccessObject, AccessOptions, ControlQuery, ControlReply, InstanceId, OpenTarget,
    Status,
};

const FUTURE: &str = "{01234567-89AB-cdef-0123-456789abcdef}";
const SHARED: &str = "fedcba98-7654-3210-fedc-ba9876543210";
const PATH: &str = "D:\\media\\clip.mkv";

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn path_ops(storage: &MemoryStorage) -> usize {
    storage
        .operations()
        .iter()
        .filter(|op| matches!(op, StorageOp::ResolvePath(_)))
        .count()
}

fn open_path(storage: &Arc<MemoryStorage>) -> Access<MemoryStorage> {
    // Reattachment reopens the host location as a path, so it must be the path itself.
    let target = OpenTarget::from_host("file", PATH, Some(PATH)).unwrap();
    Access::open(Arc::clone(storage), &target, AccessOptions::default()).unwrap()
}

#[test]
fn future_token_end_to_end() {
    let storage = Arc::new(MemoryStorage::new().with_future_access_token(FUTURE, pattern(100)));
    let target = OpenTarget::from_host("winrt", FUTURE, None).unwrap();
    let mut access = Access::open(storage, &target, AccessOptions::default()).unwrap();

    assert_eq!(access.control(ControlQuery::GetSize).unwrap(), ControlReply::Size(100));

    let mut buffer = [0; 60];
    assert_eq!(access.read(&mut buffer[..50]), 50);
    assert_eq!(access.position(), 50);
    assert!(!access.is_eof());

    assert_eq!(access.read(&mut buffer), 50);
    assert_eq!(access.position(), 100);
    assert!(access.is_eof());
    assert_eq!(buffer[..50], pattern(100)[50..]);
}

#[test]
fn shared_token_through_the_module() {
    let storage = Arc::new(MemoryStorage::new().with_shared_token(SHARED, pattern(32)));
    let module = AccessModule::new(Arc::clone(&storage));
    let id = InstanceId(11);

    assert_eq!(module.open(&AccessObject::new(id, "winrt", SHARED)), Status::Success);
    assert_eq!(
        storage.operations()[..2],
        [
            StorageOp::RedeemSharedToken(SHARED.to_string()),
            StorageOp::OpenRead(SHARED.to_string())
        ]
    );

    let mut buffer = [0; 32];
    assert_eq!(module.read(id, Some(&mut buffer), 32), 32);
    assert_eq!(buffer.to_vec(), pattern(32));
    module.close(id);
    assert_eq!(module.instance_count(), 0);
}

#[test]
fn token_embedded_in_file_path() {
    let storage = Arc::new(MemoryStorage::new().with_future_access_token(FUTURE, pattern(8)));
    let module = AccessModule::new(Arc::clone(&storage));
    let object = AccessObject::new(InstanceId(1), "file", "/winrt").with_filepath(format!("C:\\winrt:\\\\{FUTURE}"));

    assert_eq!(module.open(&object), Status::Success);
    assert_eq!(storage.operations()[0], StorageOp::LookupFutureAccess(FUTURE.to_string()));
}

#[test]
fn unresolvable_path_retains_no_session() {
    let storage = Arc::new(MemoryStorage::new());
    let module = AccessModule::new(Arc::clone(&storage));
    let object = AccessObject::new(InstanceId(1), "file", "notaguid").with_filepath("notaguid");

    assert_eq!(module.open(&object), Status::Failure);
    assert_eq!(Status::Failure.code(), -1);
    assert_eq!(module.instance_count(), 0);
    assert_eq!(storage.operations(), vec![StorageOp::ResolvePath("notaguid".to_string())]);
}

#[test]
fn malformed_token_never_reaches_storage() {
    let storage = Arc::new(MemoryStorage::new());
    let module = AccessModule::new(Arc::clone(&storage));

    assert_eq!(module.open(&AccessObject::new(InstanceId(1), "winrt", "notaguid")), Status::Failure);
    assert!(storage.operations().is_empty());
    assert_eq!(module.instance_count(), 0);
}

#[test]
fn four_stale_handles_give_three_reattachments_then_zero() {
    let storage = Arc::new(MemoryStorage::new().with_path(PATH, pattern(64)));
    let mut access = open_path(&storage);
    let opens = path_ops(&storage);

    storage.break_handles(4);
    let mut buffer = [0; 16];
    assert_eq!(access.read(&mut buffer), 0);
    assert_eq!(path_ops(&storage) - opens, 3);
}

#[test]
fn three_stale_handles_are_recovered() {
    let storage = Arc::new(MemoryStorage::new().with_path(PATH, pattern(64)));
    let mut access = open_path(&storage);
    let mut buffer = [0; 16];
    assert_eq!(access.read(&mut buffer), 16);

    storage.break_handles(3);
    assert_eq!(access.read(&mut buffer), 16);
    assert_eq!(buffer.to_vec(), pattern(64)[16..32]);
    assert_eq!(access.position(), 32);
}

#[test]
fn retry_counter_resets_after_success() {
    let storage = Arc::new(MemoryStorage::new().with_path(PATH, pattern(64)));
    let mut access = open_path(&storage);
    let mut buffer = [0; 8];

    storage.break_handles(2);
    assert_eq!(access.read(&mut buffer), 8);
    assert_eq!(access.retries(), 0);

    // A fresh budget of three, not the one left over from the previous read.
    storage.break_handles(3);
    assert_eq!(access.read(&mut buffer), 8);
    assert_eq!(access.position(), 16);
}

#[test]
fn null_buffer_read_matches_seek() {
    let storage = Arc::new(MemoryStorage::new().with_future_access_token(FUTURE, pattern(200)));
    let module = AccessModule::new(Arc::clone(&storage));
    let skipping = InstanceId(1);
    let seeking = InstanceId(2);
    assert_eq!(module.open(&AccessObject::new(skipping, "winrt", FUTURE)), Status::Success);
    assert_eq!(module.open(&AccessObject::new(seeking, "winrt", FUTURE)), Status::Success);

    let mut buffer = [0; 30];
    assert_eq!(module.read(skipping, Some(&mut buffer), 30), 30);
    assert_eq!(module.read(seeking, Some(&mut buffer), 30), 30);

    assert_eq!(module.read(skipping, None, 45), 45);
    assert_eq!(module.seek(seeking, 75), Status::Success);

    let mut skipped = [0; 20];
    let mut sought = [0; 20];
    assert_eq!(module.read(skipping, Some(&mut skipped), 20), 20);
    assert_eq!(module.read(seeking, Some(&mut sought), 20), 20);
    assert_eq!(skipped, sought);
    assert_eq!(skipped.to_vec(), pattern(200)[75..95]);
}

#[test]
fn size_is_invariant_across_seeks() {
    let storage = Arc::new(MemoryStorage::new().with_path(PATH, pattern(500)));
    let mut access = open_path(&storage);

    for position in [0, 499, 500, 1000, 3] {
        access.seek(position).unwrap();
        assert_eq!(access.control(ControlQuery::GetSize).unwrap(), ControlReply::Size(500));
    }
}

#[test]
fn seek_then_read_returns_same_bytes() {
    let storage = Arc::new(MemoryStorage::new().with_path(PATH, pattern(300)));
    let mut access = open_path(&storage);

    access.seek(120).unwrap();
    let mut first = [0; 40];
    assert_eq!(access.read(&mut first), 40);

    access.seek(10).unwrap();
    let mut detour = [0; 5];
    assert_eq!(access.read(&mut detour), 5);

    access.seek(120).unwrap();
    let mut second = [0; 40];
    assert_eq!(access.read(&mut second), 40);
    assert_eq!(first, second);
}

#[test]
fn instances_are_independent() {
    let storage = Arc::new(
        MemoryStorage::new()
            .with_future_access_token(FUTURE, vec![1; 10])
            .with_shared_token(SHARED, vec![2; 10]),
    );
    let module = Arc::new(AccessModule::new(storage));

    let handles: Vec<_> = [(InstanceId(1), FUTURE, 1), (InstanceId(2), SHARED, 2)]
        .into_iter()
        .map(|(id, token, byte)| {
            let module = Arc::clone(&module);
            std::thread::spawn(move || {
                assert_eq!(module.open(&AccessObject::new(id, "winrt", token)), Status::Success);
                let mut buffer = [0; 10];
                assert_eq!(module.read(id, Some(&mut buffer), 10), 10);
                assert_eq!(buffer, [byte; 10]);
                module.close(id);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(module.instance_count(), 0);
}
