// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared in-memory host for the integration tests
//!
//! Specifiers are file names, optionally prefixed with `./`. A
//! `bundle#entry` specifier addresses one entry point inside a bundle file.

#![allow(dead_code)]

use parking_lot::Mutex;
use spacey_modules::{
    CompiledUnit, EngineConfig, Executor, Extractor, Host, Loader, Locator, ModuleEngine, ModuleEntries,
    ModuleKey, ModuleRegistry, ModuleScope, NativeKind, NativeModule, PathResolver, Result, UnitFormat,
    Value, logging,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Body = Arc<dyn Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync>;

enum Source {
    Module(ModuleEntries),
    CommonJs,
    Json(String),
}

/// Modules, bodies and native exports keyed by locator key
#[derive(Default)]
pub struct MemoryHost {
    registry: Arc<ModuleRegistry>,
    sources: Mutex<HashMap<String, Source>>,
    natives: Mutex<HashMap<(NativeKind, String), Value>>,
    bodies: Mutex<HashMap<String, Body>>,
    executions: Mutex<Vec<String>>,
    loads: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Arc<Self> {
        logging::init("spacey_modules=debug");
        Arc::new(Self::default())
    }

    pub fn module(&self, name: &str, entries: ModuleEntries) -> &Self {
        self.sources.lock().insert(name.to_string(), Source::Module(entries));
        self
    }

    pub fn commonjs(&self, name: &str) -> &Self {
        self.sources.lock().insert(name.to_string(), Source::CommonJs);
        self
    }

    pub fn json(&self, name: &str, text: &str) -> &Self {
        self.sources.lock().insert(name.to_string(), Source::Json(text.to_string()));
        self
    }

    pub fn native(&self, kind: NativeKind, name: &str, exports: Value) -> &Self {
        self.natives.lock().insert((kind, name.to_string()), exports);
        self
    }

    pub fn body<F>(&self, name: &str, body: F) -> &Self
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.bodies.lock().insert(name.to_string(), Arc::new(body));
        self
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn executions(&self) -> Vec<String> {
        self.executions.lock().clone()
    }

    pub fn execution_count(&self, name: &str) -> usize {
        self.executions.lock().iter().filter(|key| *key == name).count()
    }

    /// Number of units handed out by the loader
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn engine(self: &Arc<Self>) -> ModuleEngine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(self: &Arc<Self>, config: EngineConfig) -> ModuleEngine {
        ModuleEngine::new(Arc::clone(&self.registry), Host::from_shared(Arc::clone(self)), config)
    }
}

impl PathResolver for MemoryHost {
    fn resolve(&self, _base: &Locator, _referencing: &ModuleKey, specifier: &str) -> Result<Locator> {
        let specifier = specifier.trim_start_matches("./");
        Ok(match specifier.split_once('#') {
            Some((file, entry)) => Locator::new(file, entry),
            None => Locator::file(specifier),
        })
    }
}

impl Loader for MemoryHost {
    fn load(&self, locator: &Locator) -> Option<Arc<CompiledUnit>> {
        let key = locator.module_key();
        let format = match self.sources.lock().get(key.as_str())? {
            Source::Module(_) => UnitFormat::Module,
            Source::CommonJs => UnitFormat::CommonJs,
            Source::Json(text) => UnitFormat::Json(text.clone()),
        };
        self.loads.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(CompiledUnit::new(locator.clone(), format)))
    }
}

impl Extractor for MemoryHost {
    fn extract(&self, unit: &CompiledUnit) -> Result<ModuleEntries> {
        match self.sources.lock().get(unit.locator.module_key().as_str()) {
            Some(Source::Module(entries)) => Ok(entries.clone()),
            _ => Ok(ModuleEntries::default()),
        }
    }
}

impl Executor for MemoryHost {
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
        self.natives.lock().get(&(module.kind, module.name.clone())).cloned()
    }
}
