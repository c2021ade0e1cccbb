// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reading a file through the module entry points, once by path and once by token.
//!
//! Usage: `cargo run --example read_file -- <path>`

use std::sync::Arc;

use winrt_access::fs::FsStorage;
use winrt_access::{
    AccessEntryPoints, AccessModule, AccessObject, ControlQuery, InstanceId, ModuleDescriptor, ModuleRegistry, Status,
};

/// A registry that just remembers the registered entry points.
#[derive(Default)]
struct Host {
    modules: Vec<(&'static ModuleDescriptor, Arc<dyn AccessEntryPoints>)>,
}

impl ModuleRegistry for Host {
    fn register(&mut self, descriptor: &'static ModuleDescriptor, entry_points: Arc<dyn AccessEntryPoints>) -> Status {
        println!(
            "registered {} ({}), shortcuts {:?}, priority {}",
            descriptor.shortname, descriptor.description, descriptor.shortcuts, descriptor.priority
        );
        self.modules.push((descriptor, entry_points));
        Status::Success
    }
}

fn drain(module: &dyn AccessEntryPoints, object: &AccessObject) -> Option<usize> {
    if !module.open(object).is_success() {
        return None;
    }

    println!("size reported by the module: {:?}", module.control(object.id, ControlQuery::GetSize));

    let mut total = 0;
    let mut buffer = vec![0; 64 * 1024];
    let len = buffer.len();
    loop {
        let read = module.read(object.id, Some(&mut buffer), len);
        if read == 0 {
            break;
        }
        total += read;
    }

    module.close(object.id);
    Some(total)
}

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: read_file <path>");
        return;
    };

    let storage = Arc::new(FsStorage::new());
    let token = storage.add_future_access(&path);

    let mut host = Host::default();
    let status = winrt_access::register(&mut host, Arc::new(AccessModule::new(Arc::clone(&storage))));
    if !status.is_success() {
        eprintln!("module registration failed with status {}", status.code());
        return;
    }
    let (_, module) = &host.modules[0];

    let by_path = AccessObject::new(InstanceId(1), "file", path.clone()).with_filepath(path);
    println!("read by path: {:?}", drain(module.as_ref(), &by_path));

    let by_token = AccessObject::new(InstanceId(2), "winrt", token);
    println!("read by token: {:?}", drain(module.as_ref(), &by_token));
}
