// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Registry integration tests: identity, sharing and concurrent resolution

mod common;

use common::MemoryHost;
use rayon::prelude::*;
use spacey_modules::{ModuleEntries, ModuleId};
use std::sync::Arc;

#[test]
fn test_resolution_is_idempotent() {
    let host = MemoryHost::new();
    host.module("a", ModuleEntries::new().with_request("./shared.js"))
        .module("b", ModuleEntries::new().with_request("shared.js"))
        .module("shared.js", ModuleEntries::new());

    let engine = host.engine();
    let a = engine.resolve(None, "a").unwrap();
    let b = engine.resolve(None, "b").unwrap();

    let from_a = engine.resolve(Some(a.id()), "./shared.js").unwrap();
    let from_b = engine.resolve(Some(b.id()), "shared.js").unwrap();
    let again = engine.resolve(Some(a.id()), "./shared.js").unwrap();

    assert!(Arc::ptr_eq(&from_a, &from_b));
    assert!(Arc::ptr_eq(&from_a, &again));
    assert_eq!(host.loads(), 3);
}

#[test]
fn test_engines_share_registry() {
    let host = MemoryHost::new();
    host.module("lib", ModuleEntries::new().with_local_export("x", "x"))
        .body("lib", |scope| {
            scope.store("x", "shared");
            Ok(())
        });

    let first = host.engine();
    let second = host.engine();
    first.run("lib").unwrap();

    assert!(second.is_loaded("lib"));
    assert_eq!(second.run("lib").unwrap(), first.resolve(None, "lib").unwrap().id());
    assert_eq!(second.export_value("lib", "x").unwrap(), "shared".into());
    assert_eq!(host.execution_count("lib"), 1);
}

#[test]
fn test_concurrent_resolution_yields_one_record() {
    let host = MemoryHost::new();
    for i in 0..16 {
        host.module(&format!("m{}", i), ModuleEntries::new());
    }

    let engines: Vec<_> = (0..4).map(|_| host.engine()).collect();
    let ids: Vec<(usize, ModuleId)> = (0..512)
        .into_par_iter()
        .map(|n| {
            let engine = &engines[n % engines.len()];
            let module = n % 16;
            let id = engine.resolve(None, &format!("m{}", module)).unwrap().id();
            (module, id)
        })
        .collect();

    for module in 0..16 {
        let key = format!("m{}", module);
        let registered = host.registry().get_by_key(&key).unwrap().id();
        assert!(
            ids.iter()
                .filter(|(m, _)| *m == module)
                .all(|(_, id)| *id == registered),
            "{}",
            key
        );
    }
    assert_eq!(host.registry().len(), 16);
}

#[test]
fn test_unload_replaces_record() {
    let host = MemoryHost::new();
    host.module("patch", ModuleEntries::new().with_local_export("v", "v"))
        .body("patch", |scope| {
            scope.store("v", 1);
            Ok(())
        });

    let engine = host.engine();
    let old = engine.run("patch").unwrap();
    let old_record = engine.record(old).unwrap();

    host.body("patch", |scope| {
        scope.store("v", 2);
        Ok(())
    });
    let removed = engine.unload("patch").unwrap();
    assert!(Arc::ptr_eq(&removed, &old_record));
    assert!(engine.record(old).is_err());

    engine.run("patch").unwrap();
    assert_eq!(engine.export_value("patch", "v").unwrap(), 2.into());
    // The old record keeps its own state
    assert_eq!(old_record.local("v"), Some(1.into()));
}
