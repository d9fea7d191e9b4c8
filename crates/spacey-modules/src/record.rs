// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records
//!
//! A [`ModuleRecord`] is created once per distinct (file, entry point) pair
//! and lives in the [`ModuleRegistry`](crate::ModuleRegistry) until unloaded.
//! Records never own each other: every cross-module reference is a
//! [`ModuleId`] looked up through the registry, so import cycles are plain
//! data.

use crate::error::ModuleError;
use crate::exports::ResolvedBinding;
use crate::host::{CompiledUnit, Locator, NativeModule};
use crate::namespace::ModuleNamespace;
use crate::value::Value;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Import name used by `import * as ns` and `export * as ns`.
pub const NAMESPACE_IMPORT: &str = "*";

/// Name of the default export.
pub const DEFAULT_EXPORT: &str = "default";

/// Arena handle of a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw arena index
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized registry key of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(Arc<str>);

impl ModuleKey {
    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for ModuleKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl Borrow<str> for ModuleKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a module record.
///
/// Moves forward only, except that a failed link rolls every module of the
/// failed pass back to `Unlinked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleStatus {
    /// Loaded, imports not yet bound
    Unlinked,
    /// On the stack of a running link pass
    Linking,
    /// Every import bound
    Linked,
    /// On the stack of a running evaluation pass
    Evaluating,
    /// Body has run (or failed, see [`ModuleRecord::evaluation_error`])
    Evaluated,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleStatus::Unlinked => "unlinked",
            ModuleStatus::Linking => "linking",
            ModuleStatus::Linked => "linked",
            ModuleStatus::Evaluating => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
        };
        f.write_str(name)
    }
}

/// `import { importName as localName } from "moduleRequest"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Request specifier
    pub module_request: String,
    /// Exported name in the target, or `*` for a namespace import
    pub import_name: String,
    /// Local binding name
    pub local_name: String,
}

impl ImportEntry {
    /// `import { import_name as local_name } from module_request`
    pub fn named(
        module_request: impl Into<String>,
        import_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            module_request: module_request.into(),
            import_name: import_name.into(),
            local_name: local_name.into(),
        }
    }

    /// `import * as local_name from module_request`
    pub fn namespace(module_request: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::named(module_request, NAMESPACE_IMPORT, local_name)
    }

    /// Whether this entry imports the whole namespace
    pub fn is_namespace_import(&self) -> bool {
        self.import_name == NAMESPACE_IMPORT
    }
}

/// `export { localName as exportName }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExportEntry {
    /// Exported name
    pub export_name: String,
    /// Local binding name
    pub local_name: String,
}

impl LocalExportEntry {
    /// `export { local_name as export_name }`
    pub fn new(export_name: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            export_name: export_name.into(),
            local_name: local_name.into(),
        }
    }
}

/// `export { importName as exportName } from "moduleRequest"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectExportEntry {
    /// Exported name
    pub export_name: String,
    /// Request specifier
    pub module_request: String,
    /// Name in the target, or `*` for `export * as exportName from`
    pub import_name: String,
}

impl IndirectExportEntry {
    /// `export { import_name as export_name } from module_request`
    pub fn new(
        export_name: impl Into<String>,
        module_request: impl Into<String>,
        import_name: impl Into<String>,
    ) -> Self {
        Self {
            export_name: export_name.into(),
            module_request: module_request.into(),
            import_name: import_name.into(),
        }
    }
}

/// `export * from "moduleRequest"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarExportEntry {
    /// Request specifier
    pub module_request: String,
}

impl StarExportEntry {
    /// `export * from module_request`
    pub fn new(module_request: impl Into<String>) -> Self {
        Self {
            module_request: module_request.into(),
        }
    }
}

/// Static import/export surface of a declarative module, as produced by an
/// [`Extractor`](crate::Extractor).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleEntries {
    /// Request specifiers in declaration order
    pub requested_modules: Vec<String>,
    /// Import entries
    pub import_entries: Vec<ImportEntry>,
    /// Local export entries
    pub local_export_entries: Vec<LocalExportEntry>,
    /// Indirect (re-)export entries
    pub indirect_export_entries: Vec<IndirectExportEntry>,
    /// Star export entries
    pub star_export_entries: Vec<StarExportEntry>,
}

impl ModuleEntries {
    /// Empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// `import "request"`, recorded once in declaration order
    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.add_request(request.into());
        self
    }

    /// `import { import_name as local_name } from "request"`
    pub fn with_import(
        mut self,
        request: impl Into<String>,
        import_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        let entry = ImportEntry::named(request, import_name, local_name);
        self.add_request(entry.module_request.clone());
        self.import_entries.push(entry);
        self
    }

    /// `import * as local_name from "request"`
    pub fn with_namespace_import(
        self,
        request: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        self.with_import(request, NAMESPACE_IMPORT, local_name)
    }

    /// `export { local_name as export_name }`
    pub fn with_local_export(
        mut self,
        export_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        self.local_export_entries
            .push(LocalExportEntry::new(export_name, local_name));
        self
    }

    /// `export { import_name as export_name } from "request"`
    pub fn with_indirect_export(
        mut self,
        export_name: impl Into<String>,
        request: impl Into<String>,
        import_name: impl Into<String>,
    ) -> Self {
        let entry = IndirectExportEntry::new(export_name, request, import_name);
        self.add_request(entry.module_request.clone());
        self.indirect_export_entries.push(entry);
        self
    }

    /// `export * from "request"`
    pub fn with_star_export(mut self, request: impl Into<String>) -> Self {
        let entry = StarExportEntry::new(request);
        self.add_request(entry.module_request.clone());
        self.star_export_entries.push(entry);
        self
    }

    fn add_request(&mut self, request: String) {
        if !self.requested_modules.contains(&request) {
            self.requested_modules.push(request);
        }
    }
}

/// The flavor of a module, carrying what each flavor needs.
#[derive(Debug, Clone)]
pub enum ModuleKind {
    /// ECMAScript module with a static import/export surface
    Declarative(ModuleEntries),
    /// CommonJS module; exports are only known after it runs
    CommonJs,
    /// JSON module; the document text
    Json(String),
    /// Host-native module, loaded through the executor
    Native(NativeModule),
}

impl ModuleKind {
    /// Short lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::Declarative(_) => "declarative",
            ModuleKind::CommonJs => "commonjs",
            ModuleKind::Json(_) => "json",
            ModuleKind::Native(_) => "native",
        }
    }

    /// Whether export shape is only known once the module has run
    pub fn has_dynamic_exports(&self) -> bool {
        matches!(self, ModuleKind::CommonJs | ModuleKind::Native(_))
    }
}

/// Mutable part of a record, written only by the link and evaluation
/// passes of the graph that owns it.
#[derive(Debug)]
pub(crate) struct ModuleState {
    pub status: ModuleStatus,
    pub dfs_index: Option<usize>,
    pub dfs_ancestor_index: Option<usize>,
    /// One slot per import entry
    pub environment: Vec<Option<ResolvedBinding>>,
    pub namespace: Option<Arc<ModuleNamespace>>,
    pub evaluation_error: Option<ModuleError>,
    /// The module's own bindings, written by its body
    pub locals: FxHashMap<String, Value>,
    /// `module.exports` of CommonJS and native modules
    pub exports: Value,
}

impl ModuleState {
    fn new() -> Self {
        Self {
            status: ModuleStatus::Unlinked,
            dfs_index: None,
            dfs_ancestor_index: None,
            environment: Vec::new(),
            namespace: None,
            evaluation_error: None,
            locals: FxHashMap::default(),
            exports: Value::Undefined,
        }
    }

    /// Enter a graph pass: record DFS numbering and move to `status`.
    pub fn enter(&mut self, status: ModuleStatus, index: usize) {
        self.status = status;
        self.dfs_index = Some(index);
        self.dfs_ancestor_index = Some(index);
    }

    /// Whether this module is the root of a completed strongly-connected component
    pub fn is_component_root(&self) -> bool {
        self.dfs_index.is_some() && self.dfs_index == self.dfs_ancestor_index
    }

    /// Roll back a failed link
    pub fn reset_link(&mut self) {
        self.status = ModuleStatus::Unlinked;
        self.dfs_index = None;
        self.dfs_ancestor_index = None;
        self.environment.clear();
        self.namespace = None;
    }
}

/// A loaded module and its lifecycle state.
#[derive(Debug)]
pub struct ModuleRecord {
    id: ModuleId,
    key: ModuleKey,
    locator: Option<Locator>,
    unit: Option<Arc<CompiledUnit>>,
    kind: ModuleKind,
    state: Mutex<ModuleState>,
    /// Request specifier -> resolved module, filled as requests are resolved
    loaded_modules: Mutex<FxHashMap<String, ModuleId>>,
}

impl ModuleRecord {
    /// Create an unlinked record
    pub(crate) fn new(
        id: ModuleId,
        key: ModuleKey,
        locator: Option<Locator>,
        unit: Option<Arc<CompiledUnit>>,
        kind: ModuleKind,
    ) -> Self {
        Self {
            id,
            key,
            locator,
            unit,
            kind,
            state: Mutex::new(ModuleState::new()),
            loaded_modules: Mutex::new(FxHashMap::default()),
        }
    }

    /// Arena handle
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Registry key
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// Concrete locator; `None` for native modules
    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    /// Compiled unit handed to the executor; `None` for native modules
    pub fn unit(&self) -> Option<&Arc<CompiledUnit>> {
        self.unit.as_ref()
    }

    /// Module flavor
    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// Static surface of a declarative module
    pub fn entries(&self) -> Option<&ModuleEntries> {
        match &self.kind {
            ModuleKind::Declarative(entries) => Some(entries),
            _ => None,
        }
    }

    /// Request specifiers in declaration order
    pub fn requested_modules(&self) -> &[String] {
        self.entries().map_or(&[], |e| e.requested_modules.as_slice())
    }

    /// Import entries
    pub fn import_entries(&self) -> &[ImportEntry] {
        self.entries().map_or(&[], |e| e.import_entries.as_slice())
    }

    /// Local export entries
    pub fn local_export_entries(&self) -> &[LocalExportEntry] {
        self.entries().map_or(&[], |e| e.local_export_entries.as_slice())
    }

    /// Indirect export entries
    pub fn indirect_export_entries(&self) -> &[IndirectExportEntry] {
        self.entries().map_or(&[], |e| e.indirect_export_entries.as_slice())
    }

    /// Star export entries
    pub fn star_export_entries(&self) -> &[StarExportEntry] {
        self.entries().map_or(&[], |e| e.star_export_entries.as_slice())
    }

    /// Current status
    pub fn status(&self) -> ModuleStatus {
        self.state.lock().status
    }

    /// DFS index of the last graph pass
    pub fn dfs_index(&self) -> Option<usize> {
        self.state.lock().dfs_index
    }

    /// DFS ancestor index of the last graph pass
    pub fn dfs_ancestor_index(&self) -> Option<usize> {
        self.state.lock().dfs_ancestor_index
    }

    /// Sticky evaluation error, if the body (or a dependency) failed
    pub fn evaluation_error(&self) -> Option<ModuleError> {
        self.state.lock().evaluation_error.clone()
    }

    /// Snapshot of the import binding table
    pub fn environment(&self) -> Vec<Option<ResolvedBinding>> {
        self.state.lock().environment.clone()
    }

    /// Current value of one of the module's own bindings
    pub fn local(&self, name: &str) -> Option<Value> {
        self.state.lock().locals.get(name).cloned()
    }

    /// `module.exports` of CommonJS and native modules
    pub fn exports(&self) -> Value {
        self.state.lock().exports.clone()
    }

    /// Whether the namespace object has been built
    pub fn has_namespace(&self) -> bool {
        self.state.lock().namespace.is_some()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock()
    }

    pub(crate) fn loaded_module(&self, request: &str) -> Option<ModuleId> {
        self.loaded_modules.lock().get(request).copied()
    }

    pub(crate) fn remember_loaded(&self, request: &str, id: ModuleId) {
        self.loaded_modules.lock().insert(request.to_string(), id);
    }
}
