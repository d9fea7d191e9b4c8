// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host collaborators
//!
//! The module system orchestrates loading, linking and evaluation, but it
//! neither finds files, parses source nor runs code. Those jobs belong to
//! the embedding host, which plugs them in through the traits below.

use crate::error::{ModuleError, Result};
use crate::record::{ModuleEntries, ModuleKey};
use crate::scope::ModuleScope;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Concrete location of a compiled unit: a file and an entry point within it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Locator {
    /// File (or bundle) path
    pub file: String,
    /// Entry point (record name) inside the file; empty for single-module files
    pub entry: String,
}

impl Locator {
    /// Locator for an entry point inside a file
    pub fn new(file: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            entry: entry.into(),
        }
    }

    /// Locator for a single-module file
    pub fn file(file: impl Into<String>) -> Self {
        Self::new(file, "")
    }

    /// Registry key for this locator: the entry name when present, else the file.
    pub fn module_key(&self) -> ModuleKey {
        if self.entry.is_empty() {
            ModuleKey::from(self.file.as_str())
        } else {
            ModuleKey::from(self.entry.as_str())
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entry.is_empty() {
            f.write_str(&self.file)
        } else {
            write!(f, "{}#{}", self.file, self.entry)
        }
    }
}

/// Family of a host-native module, picked by its request prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeKind {
    /// System module (`@ohos:`)
    Ohos,
    /// Application-bundled shared library (`@app:`)
    App,
    /// Runtime-internal module (`@native:`)
    Native,
}

impl NativeKind {
    /// Lowercase name, as used in configuration
    pub fn as_str(self) -> &'static str {
        match self {
            NativeKind::Ohos => "ohos",
            NativeKind::App => "app",
            NativeKind::Native => "native",
        }
    }
}

impl fmt::Display for NativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NativeKind {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ohos" => Ok(NativeKind::Ohos),
            "app" => Ok(NativeKind::App),
            "native" => Ok(NativeKind::Native),
            other => Err(ModuleError::config(format!("unknown native module kind '{}'", other))),
        }
    }
}

/// A host-native module request with its prefix stripped.
///
/// `@app:` names address a library inside the application bundle as
/// `<path>/<library>`; they are split at the last `/`, so `name` is the
/// library and `path` the directory part. Other kinds carry no path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeModule {
    /// Module family
    pub kind: NativeKind,
    /// Module (or library) name
    pub name: String,
    /// Bundle path of an `@app:` library
    pub path: Option<String>,
}

impl NativeModule {
    /// Build the descriptor for `name`, a request with its prefix removed.
    ///
    /// An `@app:` name without a `/` has no library part and is a
    /// reference error.
    pub fn parse(kind: NativeKind, name: &str) -> Result<Self> {
        match kind {
            NativeKind::App => match name.rsplit_once('/') {
                Some((path, library)) if !library.is_empty() => Ok(Self {
                    kind,
                    name: library.to_string(),
                    path: Some(path.to_string()),
                }),
                _ => Err(ModuleError::reference(format!(
                    "app module '{}' must be written as '<path>/<library>'",
                    name
                ))),
            },
            NativeKind::Ohos | NativeKind::Native => Ok(Self {
                kind,
                name: name.to_string(),
                path: None,
            }),
        }
    }
}

impl fmt::Display for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}/{}", self.kind, path, self.name),
            None => write!(f, "{}:{}", self.kind, self.name),
        }
    }
}

/// How a compiled unit is to be treated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitFormat {
    /// ECMAScript module
    Module,
    /// CommonJS module
    CommonJs,
    /// JSON document (the text)
    Json(String),
}

/// A loaded, parsed compilation unit.
pub struct CompiledUnit {
    /// Where the unit came from
    pub locator: Locator,
    /// Format classification
    pub format: UnitFormat,
    /// Host handle (bytecode, AST, ...), opaque to the module system
    pub payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl CompiledUnit {
    /// Create a unit without a host payload
    pub fn new(locator: Locator, format: UnitFormat) -> Self {
        Self {
            locator,
            format,
            payload: None,
        }
    }

    /// Attach a host payload
    pub fn with_payload(mut self, payload: Arc<dyn Any + Send + Sync>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Downcast the host payload
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("locator", &self.locator)
            .field("format", &self.format)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// Turns a request specifier into a concrete locator.
///
/// Must be deterministic for a given (base, referencing, specifier) triple.
/// Failures should be `ModuleError::Reference`; other errors are converted.
pub trait PathResolver: Send + Sync {
    /// Resolve `specifier` as requested by the module at `base`/`referencing`.
    fn resolve(&self, base: &Locator, referencing: &ModuleKey, specifier: &str) -> Result<Locator>;
}

/// Loads and parses compiled units.
pub trait Loader: Send + Sync {
    /// Load the unit at `locator`. `None` means it could not be found or parsed.
    fn load(&self, locator: &Locator) -> Option<Arc<CompiledUnit>>;
}

/// Reads the static import/export surface out of a declarative unit.
pub trait Extractor: Send + Sync {
    /// Extract the entry lists of `unit`. Invoked once per new record.
    fn extract(&self, unit: &CompiledUnit) -> Result<ModuleEntries>;
}

/// Runs module bodies.
pub trait Executor: Send + Sync {
    /// Run the top-level code of `unit` exactly once.
    ///
    /// Imports are read and own bindings written through `scope`. A thrown
    /// exception is reported as `ModuleError::Thrown`.
    fn execute(&self, unit: &CompiledUnit, scope: &mut ModuleScope<'_>) -> Result<()>;

    /// Produce the exports object of a host-native module.
    ///
    /// `None` means the host has no such module.
    fn load_native(&self, module: &NativeModule) -> Option<Value> {
        let _ = module;
        None
    }
}

/// The set of host collaborators used by a [`ModuleEngine`](crate::ModuleEngine).
#[derive(Clone)]
pub struct Host {
    /// Specifier to locator resolution
    pub paths: Arc<dyn PathResolver>,
    /// Compiled unit loading
    pub loader: Arc<dyn Loader>,
    /// Static surface extraction
    pub extractor: Arc<dyn Extractor>,
    /// Body execution
    pub executor: Arc<dyn Executor>,
}

impl Host {
    /// Bundle the four collaborators
    pub fn new(
        paths: Arc<dyn PathResolver>,
        loader: Arc<dyn Loader>,
        extractor: Arc<dyn Extractor>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            paths,
            loader,
            extractor,
            executor,
        }
    }

    /// Use one object for every collaborator
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: PathResolver + Loader + Extractor + Executor + 'static,
    {
        Self {
            paths: host.clone(),
            loader: host.clone(),
            extractor: host.clone(),
            executor: host,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
