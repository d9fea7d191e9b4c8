// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module namespace objects (`import * as ns`)

use crate::environment;
use crate::error::{ModuleError, Result};
use crate::exports::{self, ResolveSet, Resolution, ResolvedBinding};
use crate::record::{ModuleId, ModuleKey, ModuleRecord, ModuleStatus};
use crate::resolver::ModuleResolver;
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::trace;

/// Read-only view of a module's resolvable exports.
///
/// Not extensible, and every property is non-configurable: the exposed
/// names are fixed when the namespace is built. Values are live and always
/// read through to the owning module.
#[derive(Debug)]
pub struct ModuleNamespace {
    module: ModuleId,
    key: ModuleKey,
    /// Sorted by name
    exports: Vec<(String, ResolvedBinding)>,
}

impl ModuleNamespace {
    /// Module this namespace belongs to
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Exported names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|(name, _)| name.as_str())
    }

    /// Number of exported names
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether nothing is exported
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Whether `name` is exported
    pub fn has(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    /// The binding behind `name`
    pub fn binding(&self, name: &str) -> Option<&ResolvedBinding> {
        self.exports
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| &self.exports[i].1)
    }

    /// Current value of export `name`; `undefined` if not exported.
    pub fn get(&self, resolver: &ModuleResolver, name: &str) -> Result<Value> {
        match self.binding(name) {
            Some(binding) => environment::read_binding(resolver, binding),
            None => Ok(Value::Undefined),
        }
    }

    /// `Symbol.toStringTag`
    pub fn to_string_tag(&self) -> &'static str {
        "Module"
    }

    /// Namespaces are never extensible
    pub fn is_extensible(&self) -> bool {
        false
    }

    /// Assignment always fails
    pub fn set(&self, name: &str, _value: Value) -> Result<()> {
        Err(ModuleError::type_error(format!(
            "Cannot assign to read only property '{}' of module namespace '{}'",
            name, self.key
        )))
    }

    /// Property definition always fails
    pub fn define_property(&self, name: &str, _value: Value) -> Result<()> {
        Err(ModuleError::type_error(format!(
            "Cannot redefine property '{}' of module namespace '{}'",
            name, self.key
        )))
    }

    /// Deleting an exported name fails; deleting anything else is a no-op.
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.has(name) {
            Err(ModuleError::type_error(format!(
                "Cannot delete property '{}' of module namespace '{}'",
                name, self.key
            )))
        } else {
            Ok(())
        }
    }
}

/// The namespace of `module`, built on first request.
pub fn get_namespace(resolver: &ModuleResolver, module: &Arc<ModuleRecord>) -> Result<Arc<ModuleNamespace>> {
    {
        let state = module.state();
        if state.status == ModuleStatus::Unlinked {
            return Err(ModuleError::InvalidState {
                module: module.key().to_string(),
                status: state.status,
                operation: "build the namespace of",
            });
        }
        if let Some(namespace) = &state.namespace {
            return Ok(Arc::clone(namespace));
        }
    }

    let names = exports::exported_names(resolver, module, &mut FxHashSet::default())?;
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if let Resolution::Resolved(binding) =
            exports::resolve_export(resolver, module, &name, &mut ResolveSet::default())?
        {
            resolved.push((name, binding));
        }
    }
    resolved.sort_by(|a, b| a.0.cmp(&b.0));
    trace!("Built namespace of {} with {} names", module.key(), resolved.len());

    let namespace = Arc::new(ModuleNamespace {
        module: module.id(),
        key: module.key().clone(),
        exports: resolved,
    });
    let mut state = module.state();
    Ok(Arc::clone(state.namespace.get_or_insert(namespace)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModuleEngine;
    use crate::record::ModuleEntries;
    use crate::test_support::TestHost;

    fn linked(engine: &ModuleEngine, names: &[&str]) -> Vec<Arc<ModuleRecord>> {
        names
            .iter()
            .map(|name| {
                let record = engine.resolve(None, name).unwrap();
                record.state().status = ModuleStatus::Linked;
                record
            })
            .collect()
    }

    #[test]
    fn test_namespace_excludes_ambiguous_and_sorts() {
        let host = TestHost::new();
        host.module(
            "a",
            ModuleEntries::new()
                .with_local_export("zeta", "z")
                .with_local_export("alpha", "a")
                .with_star_export("b")
                .with_star_export("c"),
        );
        host.module("b", ModuleEntries::new().with_local_export("dup", "d").with_local_export("only_b", "o"));
        host.module("c", ModuleEntries::new().with_local_export("dup", "d"));

        let engine = host.engine();
        let records = linked(&engine, &["a", "b", "c"]);
        let ns = get_namespace(engine.resolver(), &records[0]).unwrap();
        let names: Vec<&str> = ns.names().collect();
        assert_eq!(names, vec!["alpha", "only_b", "zeta"]);
        assert!(!ns.has("dup"));
    }

    #[test]
    fn test_namespace_is_memoized() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new().with_local_export("x", "x"));
        let engine = host.engine();
        let records = linked(&engine, &["a"]);

        let first = get_namespace(engine.resolver(), &records[0]).unwrap();
        let second = get_namespace(engine.resolver(), &records[0]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_namespace_is_read_only() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new().with_local_export("x", "x"));
        let engine = host.engine();
        let records = linked(&engine, &["a"]);
        let ns = get_namespace(engine.resolver(), &records[0]).unwrap();

        assert!(ns.set("x", Value::from(1)).unwrap_err().is_type_error());
        assert!(ns.define_property("y", Value::Null).unwrap_err().is_type_error());
        assert!(ns.delete("x").is_err());
        assert!(ns.delete("missing").is_ok());
        assert!(!ns.is_extensible());
        assert_eq!(ns.to_string_tag(), "Module");
    }

    #[test]
    fn test_namespace_reads_live_values() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new().with_local_export("x", "x"));
        let engine = host.engine();
        let records = linked(&engine, &["a"]);
        let ns = get_namespace(engine.resolver(), &records[0]).unwrap();

        assert!(ns.get(engine.resolver(), "x").is_err());
        records[0].state().locals.insert("x".into(), Value::from(1));
        assert_eq!(ns.get(engine.resolver(), "x").unwrap(), Value::from(1));
        records[0].state().locals.insert("x".into(), Value::from(2));
        assert_eq!(ns.get(engine.resolver(), "x").unwrap(), Value::from(2));
        assert_eq!(ns.get(engine.resolver(), "nope").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_unlinked_module_has_no_namespace() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new());
        let engine = host.engine();
        let a = engine.resolve(None, "a").unwrap();
        assert!(matches!(
            get_namespace(engine.resolver(), &a),
            Err(ModuleError::InvalidState { .. })
        ));
    }
}
