// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-modules
//!
//! ECMAScript module resolution, linking and evaluation for Spacey.
//!
//! ## Overview
//!
//! This crate decides *when* module bodies run and *which* binding an import
//! refers to. It handles:
//! - A process-wide registry of module records, safe to share across engines
//! - Static export resolution with `export *` ambiguity detection
//! - Cycle-tolerant linking and evaluation (Tarjan-style SCC passes)
//! - Declarative, CommonJS, JSON and host-native modules in one state machine
//! - Late rebinding of imports from CommonJS and native modules
//!
//! Parsing, path lookup and executing bytecode are left to the host, through
//! the [`PathResolver`], [`Loader`], [`Extractor`] and [`Executor`] traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_modules::{EngineConfig, Host, ModuleEngine, ModuleRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ModuleRegistry::new());
//! let engine = ModuleEngine::new(registry, Host::from_shared(my_host), EngineConfig::default());
//! engine.run("./main.js")?;
//! println!("{}", engine.export_value("main.js", "default")?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod exports;
mod graph;
pub mod host;
pub mod jobs;
pub mod linker;
pub mod logging;
pub mod namespace;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use config::{EngineConfig, NativePrefix};
pub use engine::ModuleEngine;
pub use error::{ModuleError, Result};
pub use exports::{BindingName, Resolution, ResolvedBinding};
pub use host::{
    CompiledUnit, Executor, Extractor, Host, Loader, Locator, NativeKind, NativeModule, PathResolver,
    UnitFormat,
};
pub use jobs::PendingJob;
pub use namespace::ModuleNamespace;
pub use record::{
    ImportEntry, IndirectExportEntry, LocalExportEntry, ModuleEntries, ModuleId, ModuleKey, ModuleKind,
    ModuleRecord, ModuleStatus, StarExportEntry,
};
pub use registry::ModuleRegistry;
pub use scope::ModuleScope;
pub use value::Value;
