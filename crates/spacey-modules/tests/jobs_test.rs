// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dynamic imports and the re-entrancy guard

mod common;

use common::MemoryHost;
use spacey_modules::{ModuleEngine, ModuleEntries, ModuleError, Value};
use std::sync::{Arc, OnceLock};

#[test]
fn test_dynamic_imports_run_in_order() {
    let host = MemoryHost::new();
    host.module("main", ModuleEntries::new())
        .module("first", ModuleEntries::new())
        .module("second", ModuleEntries::new())
        .module("nested", ModuleEntries::new())
        .body("main", |scope| {
            scope.enqueue_dynamic_import("./first");
            scope.enqueue_dynamic_import("./second");
            Ok(())
        })
        .body("first", |scope| {
            scope.enqueue_dynamic_import("./nested");
            Ok(())
        });

    let engine = host.engine();
    engine.run("main").unwrap();
    assert_eq!(engine.pending_jobs(), 2);

    let imported = engine.run_pending_jobs().unwrap();
    assert_eq!(imported.len(), 3);
    assert_eq!(host.executions(), vec!["main", "first", "second", "nested"]);
    assert!(engine.run_pending_jobs().unwrap().is_empty());
}

#[test]
fn test_dynamic_import_of_evaluated_module_is_cheap() {
    let host = MemoryHost::new();
    host.module("main", ModuleEntries::new().with_request("dep"))
        .module("dep", ModuleEntries::new())
        .body("main", |scope| {
            scope.enqueue_dynamic_import("dep");
            Ok(())
        });

    let engine = host.engine();
    engine.run("main").unwrap();
    let imported = engine.run_pending_jobs().unwrap();

    assert_eq!(imported, vec![engine.registry().get_by_key("dep").unwrap().id()]);
    assert_eq!(host.execution_count("dep"), 1);
}

#[test]
fn test_nested_evaluation_is_refused() {
    let host = MemoryHost::new();
    let slot: Arc<OnceLock<Arc<ModuleEngine>>> = Arc::new(OnceLock::new());

    let inner = Arc::clone(&slot);
    host.module("outer", ModuleEntries::new())
        .module("other", ModuleEntries::new())
        .body("outer", move |_| {
            let engine = inner.get().ok_or_else(|| ModuleError::thrown("no engine"))?;
            let other = engine.resolve(None, "other")?;
            engine.instantiate(other.id())?;
            engine.evaluate(other.id())
        });

    let engine = Arc::new(host.engine());
    assert!(slot.set(Arc::clone(&engine)).is_ok());

    let err = engine.run("outer").unwrap_err();
    assert!(matches!(err.root_cause(), ModuleError::Reentrant(_)));
    assert_eq!(host.execution_count("other"), 0);

    // The guard is released once the failed pass is over
    let other = engine.registry().get_by_key("other").unwrap();
    engine.evaluate(other.id()).unwrap();
    assert_eq!(host.execution_count("other"), 1);
}

#[test]
fn test_nested_drain_is_refused() {
    let host = MemoryHost::new();
    let slot: Arc<OnceLock<Arc<ModuleEngine>>> = Arc::new(OnceLock::new());

    let inner = Arc::clone(&slot);
    host.module("main", ModuleEntries::new())
        .module("lazy", ModuleEntries::new())
        .body("main", |scope| {
            scope.enqueue_dynamic_import("lazy");
            Ok(())
        })
        .body("lazy", move |scope| {
            let engine = inner.get().ok_or_else(|| ModuleError::thrown("no engine"))?;
            let refused = matches!(engine.run_pending_jobs(), Err(ModuleError::Reentrant(_)));
            scope.store("refused", refused);
            Ok(())
        });

    let engine = Arc::new(host.engine());
    assert!(slot.set(Arc::clone(&engine)).is_ok());

    engine.run("main").unwrap();
    engine.run_pending_jobs().unwrap();
    let lazy = engine.registry().get_by_key("lazy").unwrap();
    assert_eq!(lazy.local("refused"), Some(Value::from(true)));
}
