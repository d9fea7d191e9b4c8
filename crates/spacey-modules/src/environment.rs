// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import binding environments
//!
//! Binding happens in two phases. While linking, every import entry is
//! resolved statically; imports from CommonJS and native modules get a
//! [`BindingName::Deferred`] placeholder because their export shape is
//! unknown. Once such a dependency has run, [`rebind_after_execution`]
//! re-resolves those placeholders against its real `module.exports`.

use crate::error::{ModuleError, Result};
use crate::exports::{self, BindingName, ResolveSet, Resolution, ResolvedBinding};
use crate::namespace;
use crate::record::{DEFAULT_EXPORT, ModuleKind, ModuleRecord, ModuleStatus};
use crate::resolver::ModuleResolver;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, trace};

fn unresolved_import(request: &str, name: &str, importer: &ModuleRecord, ambiguous: bool) -> ModuleError {
    let what = if ambiguous {
        "provides an ambiguous export named"
    } else {
        "does not provide an export named"
    };
    ModuleError::syntax(format!(
        "the requested module '{}' {} '{}' imported by '{}'",
        request,
        what,
        name,
        importer.key()
    ))
}

/// Check that every indirect export of `module` resolves to a concrete binding.
pub fn check_resolved_bindings(resolver: &ModuleResolver, module: &Arc<ModuleRecord>) -> Result<()> {
    for entry in module.indirect_export_entries() {
        let resolution =
            exports::resolve_export(resolver, module, &entry.export_name, &mut ResolveSet::default())?;
        if !resolution.is_resolved() {
            let what = if resolution == Resolution::Ambiguous {
                "provides an ambiguous export named"
            } else {
                "does not provide an export named"
            };
            return Err(ModuleError::syntax(format!(
                "the requested module '{}' {} '{}' re-exported by '{}'",
                entry.module_request,
                what,
                entry.import_name,
                module.key()
            )));
        }
    }
    Ok(())
}

/// Build the import binding table of `module`.
///
/// Fails with a `SyntaxError` if an import does not resolve or resolves
/// ambiguously. The table is only stored once every entry is bound.
pub fn initialize_environment(resolver: &ModuleResolver, module: &Arc<ModuleRecord>) -> Result<()> {
    if !matches!(module.kind(), ModuleKind::Declarative(_)) {
        return Ok(());
    }
    check_resolved_bindings(resolver, module)?;

    let trace_bindings = resolver.config().trace_bindings;
    let mut environment = Vec::with_capacity(module.import_entries().len());
    for entry in module.import_entries() {
        let target = resolver.resolve(Some(module), &entry.module_request)?;

        let binding = if entry.is_namespace_import() {
            namespace::get_namespace(resolver, &target)?;
            ResolvedBinding::new(target.id(), BindingName::Namespace)
        } else {
            match exports::resolve_export(resolver, &target, &entry.import_name, &mut ResolveSet::default())? {
                Resolution::Resolved(binding) => binding,
                Resolution::Null => {
                    return Err(unresolved_import(&entry.module_request, &entry.import_name, module, false));
                }
                Resolution::Ambiguous => {
                    return Err(unresolved_import(&entry.module_request, &entry.import_name, module, true));
                }
            }
        };

        if trace_bindings {
            debug!("{}: {} -> {} in {}", module.key(), entry.local_name, binding.binding, target.key());
        } else {
            trace!("{}: {} -> {} in {}", module.key(), entry.local_name, binding.binding, target.key());
        }
        environment.push(Some(binding));
    }

    module.state().environment = environment;
    Ok(())
}

/// Re-resolve the bindings of `importer` that target `dependency`, a
/// CommonJS or native module that has finished running, against the
/// exports value it produced.
///
/// `default` binds the whole exports value; any other name must be a
/// property of it, else this fails with a `SyntaxError`.
pub fn rebind_after_execution(importer: &ModuleRecord, dependency: &ModuleRecord) -> Result<()> {
    if !dependency.kind().has_dynamic_exports() {
        return Ok(());
    }
    let exports = {
        let state = dependency.state();
        if state.status != ModuleStatus::Evaluated || state.evaluation_error.is_some() {
            return Ok(());
        }
        state.exports.clone()
    };
    if exports.is_undefined() && matches!(dependency.kind(), ModuleKind::Native(_)) {
        // Native module failed to materialize; placeholders read as undefined
        return Ok(());
    }

    let mut state = importer.state();
    for (slot, entry) in importer.import_entries().iter().enumerate() {
        let Some(Some(binding)) = state.environment.get(slot) else {
            continue;
        };
        if binding.module != dependency.id() {
            continue;
        }
        let name = match &binding.binding {
            BindingName::Deferred(name) | BindingName::Property(name) => name.clone(),
            BindingName::Exports => DEFAULT_EXPORT.to_string(),
            BindingName::Local(_) | BindingName::Namespace => continue,
        };

        match exports::resolve_export_object(dependency.id(), &exports, &name) {
            Resolution::Resolved(rebound) => {
                trace!("{}: rebound {} -> {}", importer.key(), entry.local_name, rebound.binding);
                state.environment[slot] = Some(rebound);
            }
            _ => {
                return Err(unresolved_import(&entry.module_request, &name, importer, false));
            }
        }
    }
    Ok(())
}

/// Read the current value of a binding.
///
/// Reading a local binding its module has not initialized yet is a
/// `ReferenceError`.
pub fn read_binding(resolver: &ModuleResolver, binding: &ResolvedBinding) -> Result<Value> {
    let target = resolver.registry().get(binding.module).ok_or_else(|| {
        ModuleError::reference(format!("module {} is no longer loaded", binding.module))
    })?;

    match &binding.binding {
        BindingName::Local(name) => target.local(name).ok_or_else(|| {
            ModuleError::reference(format!(
                "cannot access '{}' of module '{}' before initialization",
                name,
                target.key()
            ))
        }),
        BindingName::Namespace => Ok(Value::Namespace(namespace::get_namespace(resolver, &target)?)),
        BindingName::Exports => Ok(target.exports()),
        BindingName::Deferred(name) if name == DEFAULT_EXPORT => Ok(target.exports()),
        BindingName::Deferred(name) | BindingName::Property(name) => {
            Ok(target.exports().get_property(name).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModuleEntries;
    use crate::test_support::TestHost;

    #[test]
    fn test_environment_slots_follow_import_entries() {
        let host = TestHost::new();
        host.module(
            "a",
            ModuleEntries::new()
                .with_import("b", "x", "x")
                .with_namespace_import("b", "ns"),
        );
        host.module("b", ModuleEntries::new().with_local_export("x", "inner"));

        let engine = host.engine();
        let a = engine.resolve(None, "a").unwrap();
        let b = engine.resolve(None, "b").unwrap();
        b.state().status = ModuleStatus::Linking;
        initialize_environment(engine.resolver(), &a).unwrap();

        let env = a.environment();
        assert_eq!(env.len(), 2);
        assert_eq!(
            env[0],
            Some(ResolvedBinding::new(b.id(), BindingName::Local("inner".into())))
        );
        assert_eq!(env[1], Some(ResolvedBinding::new(b.id(), BindingName::Namespace)));
        assert!(b.has_namespace());
    }

    #[test]
    fn test_missing_import_is_syntax_error() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new().with_import("b", "nope", "nope"));
        host.module("b", ModuleEntries::new());

        let engine = host.engine();
        let a = engine.resolve(None, "a").unwrap();
        let err = initialize_environment(engine.resolver(), &a).unwrap_err();
        assert!(err.is_syntax_error());
        assert_eq!(
            err.to_string(),
            "SyntaxError: the requested module 'b' does not provide an export named 'nope' imported by 'a'"
        );
        assert!(a.environment().is_empty());
    }

    #[test]
    fn test_unresolvable_reexport_fails_precheck() {
        let host = TestHost::new();
        host.module("a", ModuleEntries::new().with_indirect_export("y", "b", "x"));
        host.module("b", ModuleEntries::new());

        let engine = host.engine();
        let a = engine.resolve(None, "a").unwrap();
        let err = check_resolved_bindings(engine.resolver(), &a).unwrap_err();
        assert!(err.to_string().contains("re-exported by 'a'"));
    }

    #[test]
    fn test_rebind_after_execution() {
        let host = TestHost::new();
        host.module(
            "n",
            ModuleEntries::new()
                .with_import("m", "default", "m")
                .with_import("m", "x", "x"),
        );
        host.commonjs("m");

        let engine = host.engine();
        let n = engine.resolve(None, "n").unwrap();
        let m = engine.resolve(None, "m").unwrap();
        initialize_environment(engine.resolver(), &n).unwrap();
        assert_eq!(
            n.environment()[1],
            Some(ResolvedBinding::new(m.id(), BindingName::Deferred("x".into())))
        );

        {
            let mut state = m.state();
            state.status = ModuleStatus::Evaluated;
            state.exports = Value::object([("x", Value::from(2))]);
        }
        rebind_after_execution(&n, &m).unwrap();
        let env = n.environment();
        assert_eq!(env[0], Some(ResolvedBinding::new(m.id(), BindingName::Exports)));
        assert_eq!(env[1], Some(ResolvedBinding::new(m.id(), BindingName::Property("x".into()))));
        assert_eq!(
            read_binding(engine.resolver(), env[1].as_ref().unwrap()).unwrap(),
            Value::from(2)
        );
    }

    #[test]
    fn test_rebind_missing_property_is_syntax_error() {
        let host = TestHost::new();
        host.module("n", ModuleEntries::new().with_import("m", "x", "x"));
        host.commonjs("m");

        let engine = host.engine();
        let n = engine.resolve(None, "n").unwrap();
        let m = engine.resolve(None, "m").unwrap();
        initialize_environment(engine.resolver(), &n).unwrap();

        {
            let mut state = m.state();
            state.status = ModuleStatus::Evaluated;
            state.exports = Value::from(42);
        }
        let err = rebind_after_execution(&n, &m).unwrap_err();
        assert!(err.is_syntax_error());
        assert!(err.to_string().contains("'m' does not provide an export named 'x'"));
    }

    #[test]
    fn test_read_uninitialized_local_is_reference_error() {
        let host = TestHost::new();
        host.module("b", ModuleEntries::new().with_local_export("x", "x"));

        let engine = host.engine();
        let b = engine.resolve(None, "b").unwrap();
        let binding = ResolvedBinding::new(b.id(), BindingName::Local("x".into()));
        assert!(read_binding(engine.resolver(), &binding).unwrap_err().is_reference_error());

        b.state().locals.insert("x".into(), Value::from(1));
        assert_eq!(read_binding(engine.resolver(), &binding).unwrap(), Value::from(1));
    }
}
