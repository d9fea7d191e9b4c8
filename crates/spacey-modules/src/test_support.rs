// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory host for unit tests.
//!
//! Specifiers are used verbatim as file names. Modules can be added after an
//! engine has been created, and every engine built from one host shares its
//! registry. Integration tests under `tests/` cannot see this module and
//! keep their own host in `tests/common`.

use crate::config::EngineConfig;
use crate::engine::ModuleEngine;
use crate::error::Result;
use crate::host::{
    CompiledUnit, Executor, Extractor, Host, Loader, Locator, NativeKind, NativeModule, PathResolver,
    UnitFormat,
};
use crate::record::{ModuleEntries, ModuleKey};
use crate::registry::ModuleRegistry;
use crate::scope::ModuleScope;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Body = Arc<dyn Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync>;

enum Source {
    Module(ModuleEntries),
    CommonJs,
    Json(String),
}

#[derive(Default)]
pub(crate) struct TestHost {
    registry: Arc<ModuleRegistry>,
    sources: Mutex<FxHashMap<String, Source>>,
    natives: Mutex<FxHashMap<(NativeKind, String), Value>>,
    native_paths: Mutex<Vec<Option<String>>>,
    bodies: Mutex<FxHashMap<String, Body>>,
    executions: Mutex<Vec<String>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn module(&self, name: &str, entries: ModuleEntries) {
        self.sources.lock().insert(name.to_string(), Source::Module(entries));
    }

    pub fn commonjs(&self, name: &str) {
        self.sources.lock().insert(name.to_string(), Source::CommonJs);
    }

    pub fn json(&self, name: &str, text: &str) {
        self.sources.lock().insert(name.to_string(), Source::Json(text.to_string()));
    }

    pub fn native(&self, kind: NativeKind, name: &str, exports: Value) {
        self.natives.lock().insert((kind, name.to_string()), exports);
    }

    pub fn body<F>(&self, name: &str, body: F)
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.bodies.lock().insert(name.to_string(), Arc::new(body));
    }

    /// Keys of executed modules, in execution order
    pub fn executions(&self) -> Vec<String> {
        self.executions.lock().clone()
    }

    /// Library paths passed to `load_native`, in call order
    pub fn native_paths(&self) -> Vec<Option<String>> {
        self.native_paths.lock().clone()
    }

    pub fn execution_count(&self, name: &str) -> usize {
        self.executions.lock().iter().filter(|key| *key == name).count()
    }

    pub fn engine(self: &Arc<Self>) -> ModuleEngine {
        ModuleEngine::new(
            Arc::clone(&self.registry),
            Host::from_shared(Arc::clone(self)),
            EngineConfig::default(),
        )
    }
}

impl PathResolver for TestHost {
    fn resolve(&self, _base: &Locator, _referencing: &ModuleKey, specifier: &str) -> Result<Locator> {
        Ok(Locator::file(specifier))
    }
}

impl Loader for TestHost {
    fn load(&self, locator: &Locator) -> Option<Arc<CompiledUnit>> {
        let format = match self.sources.lock().get(&locator.file)? {
            Source::Module(_) => UnitFormat::Module,
            Source::CommonJs => UnitFormat::CommonJs,
            Source::Json(text) => UnitFormat::Json(text.clone()),
        };
        Some(Arc::new(CompiledUnit::new(locator.clone(), format)))
    }
}

impl Extractor for TestHost {
    fn extract(&self, unit: &CompiledUnit) -> Result<ModuleEntries> {
        match self.sources.lock().get(&unit.locator.file) {
            Some(Source::Module(entries)) => Ok(entries.clone()),
            _ => Ok(ModuleEntries::default()),
        }
    }
}

impl Executor for TestHost {
    fn execute(&self, _unit: &CompiledUnit, scope: &mut ModuleScope<'_>) -> Result<()> {
        let key = scope.module_key().to_string();
        self.executions.lock().push(key.clone());
        let body = self.bodies.lock().get(&key).cloned();
        match body {
            Some(body) => body(scope),
            None => Ok(()),
        }
    }

    fn load_native(&self, module: &NativeModule) -> Option<Value> {
        self.native_paths.lock().push(module.path.clone());
        self.natives.lock().get(&(module.kind, module.name.clone())).cloned()
    }
}
