// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export resolution
//!
//! Maps `(module, export name)` to the binding that actually holds the
//! value, following re-exports and `export *` chains.

use crate::error::Result;
use crate::record::{DEFAULT_EXPORT, ModuleId, ModuleKind, ModuleRecord, NAMESPACE_IMPORT};
use crate::resolver::ModuleResolver;
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

/// Which slot of the target module a binding reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingName {
    /// A local binding of a declarative module (or the `default` slot of a
    /// JSON module)
    Local(String),
    /// The target's namespace object
    Namespace,
    /// Placeholder for an export of a CommonJS or native module, validated
    /// once the module has run
    Deferred(String),
    /// The whole `module.exports` value
    Exports,
    /// A property of `module.exports`
    Property(String),
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingName::Local(name) => write!(f, "{}", name),
            BindingName::Namespace => write!(f, "*namespace*"),
            BindingName::Deferred(name) => write!(f, "{} (pending)", name),
            BindingName::Exports => write!(f, "module.exports"),
            BindingName::Property(name) => write!(f, "module.exports.{}", name),
        }
    }
}

/// A concrete binding: a slot in a specific module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedBinding {
    /// Module owning the slot
    pub module: ModuleId,
    /// The slot
    pub binding: BindingName,
}

impl ResolvedBinding {
    /// Binding to `binding` in `module`
    pub fn new(module: ModuleId, binding: BindingName) -> Self {
        Self { module, binding }
    }
}

/// Outcome of resolving an export name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No such export (or a circular request along this path)
    Null,
    /// Reachable through `export *` paths that disagree
    Ambiguous,
    /// Resolved to a concrete binding
    Resolved(ResolvedBinding),
}

impl Resolution {
    fn resolved(module: ModuleId, binding: BindingName) -> Self {
        Resolution::Resolved(ResolvedBinding::new(module, binding))
    }

    /// The binding, if resolved
    pub fn binding(&self) -> Option<&ResolvedBinding> {
        match self {
            Resolution::Resolved(binding) => Some(binding),
            _ => None,
        }
    }

    /// Whether the export resolved
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// `(module, export name)` pairs already requested during one resolution
pub type ResolveSet = FxHashSet<(ModuleId, String)>;

/// Resolve `export_name` of `module`.
///
/// A request already present in `resolve_set` is a circular import and
/// yields [`Resolution::Null`]. Loading a re-export target may fail with a
/// `ReferenceError`.
pub fn resolve_export(
    resolver: &ModuleResolver,
    module: &Arc<ModuleRecord>,
    export_name: &str,
    resolve_set: &mut ResolveSet,
) -> Result<Resolution> {
    if !resolve_set.insert((module.id(), export_name.to_string())) {
        return Ok(Resolution::Null);
    }

    match module.kind() {
        ModuleKind::CommonJs | ModuleKind::Native(_) => {
            return Ok(Resolution::resolved(
                module.id(),
                BindingName::Deferred(export_name.to_string()),
            ));
        }
        ModuleKind::Json(_) => {
            return Ok(if export_name == DEFAULT_EXPORT {
                Resolution::resolved(module.id(), BindingName::Local(DEFAULT_EXPORT.to_string()))
            } else {
                Resolution::Null
            });
        }
        ModuleKind::Declarative(_) => {}
    }

    if let Some(entry) = module
        .local_export_entries()
        .iter()
        .find(|e| e.export_name == export_name)
    {
        return Ok(Resolution::resolved(
            module.id(),
            BindingName::Local(entry.local_name.clone()),
        ));
    }

    if let Some(entry) = module
        .indirect_export_entries()
        .iter()
        .find(|e| e.export_name == export_name)
    {
        let target = resolver.resolve(Some(module), &entry.module_request)?;
        if entry.import_name == NAMESPACE_IMPORT {
            return Ok(Resolution::resolved(target.id(), BindingName::Namespace));
        }
        return resolve_export(resolver, &target, &entry.import_name, resolve_set);
    }

    // `export *` never provides a default export
    if export_name == DEFAULT_EXPORT {
        return Ok(Resolution::Null);
    }

    let mut star_resolution: Option<ResolvedBinding> = None;
    for entry in module.star_export_entries() {
        let target = resolver.resolve(Some(module), &entry.module_request)?;
        match resolve_export(resolver, &target, export_name, resolve_set)? {
            Resolution::Ambiguous => return Ok(Resolution::Ambiguous),
            Resolution::Null => {}
            Resolution::Resolved(binding) => match &star_resolution {
                None => star_resolution = Some(binding),
                Some(existing) if *existing == binding => {}
                Some(_) => return Ok(Resolution::Ambiguous),
            },
        }
    }

    Ok(star_resolution.map_or(Resolution::Null, Resolution::Resolved))
}

/// Resolve an export of a CommonJS or native module against the value its
/// body actually produced.
pub fn resolve_export_object(module: ModuleId, exports: &Value, export_name: &str) -> Resolution {
    if export_name == DEFAULT_EXPORT {
        Resolution::resolved(module, BindingName::Exports)
    } else if exports.has_property(export_name) {
        Resolution::resolved(module, BindingName::Property(export_name.to_string()))
    } else {
        Resolution::Null
    }
}

/// Names exported by `module`, following `export *` chains.
///
/// Star exports contribute every name except `default`; duplicates are
/// dropped. Modules already in `export_star_set` contribute nothing.
pub fn exported_names(
    resolver: &ModuleResolver,
    module: &Arc<ModuleRecord>,
    export_star_set: &mut FxHashSet<ModuleId>,
) -> Result<Vec<String>> {
    if !export_star_set.insert(module.id()) {
        return Ok(Vec::new());
    }
    if !matches!(module.kind(), ModuleKind::Declarative(_)) {
        return Ok(vec![DEFAULT_EXPORT.to_string()]);
    }

    let mut seen = FxHashSet::default();
    let mut names = Vec::new();
    let own = module
        .local_export_entries()
        .iter()
        .map(|e| &e.export_name)
        .chain(module.indirect_export_entries().iter().map(|e| &e.export_name));
    for name in own {
        if seen.insert(name.clone()) {
            names.push(name.clone());
        }
    }

    for entry in module.star_export_entries() {
        let target = resolver.resolve(Some(module), &entry.module_request)?;
        for name in exported_names(resolver, &target, export_star_set)? {
            if name != DEFAULT_EXPORT && seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    Ok(names)
}
