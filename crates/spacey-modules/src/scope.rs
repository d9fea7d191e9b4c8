// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Binding access for a running module body

use crate::engine::ModuleEngine;
use crate::environment;
use crate::error::{ModuleError, Result};
use crate::jobs::PendingJob;
use crate::namespace::{self, ModuleNamespace};
use crate::record::{ModuleKey, ModuleKind, ModuleRecord};
use crate::value::Value;
use std::sync::Arc;

/// What an [`Executor`](crate::Executor) sees of the module it is running.
///
/// Imports are live: every read goes through the import binding table to
/// the exporting module's current value.
pub struct ModuleScope<'a> {
    engine: &'a ModuleEngine,
    module: &'a Arc<ModuleRecord>,
}

impl<'a> ModuleScope<'a> {
    pub(crate) fn new(engine: &'a ModuleEngine, module: &'a Arc<ModuleRecord>) -> Self {
        Self { engine, module }
    }

    /// Key of the running module
    pub fn module_key(&self) -> &ModuleKey {
        self.module.key()
    }

    /// Flavor of the running module
    pub fn kind(&self) -> &ModuleKind {
        self.module.kind()
    }

    /// Read the import bound to `local_name`.
    pub fn import(&self, local_name: &str) -> Result<Value> {
        let index = self
            .module
            .import_entries()
            .iter()
            .position(|e| e.local_name == local_name)
            .ok_or_else(|| {
                ModuleError::reference(format!(
                    "'{}' is not imported by module '{}'",
                    local_name,
                    self.module.key()
                ))
            })?;
        self.import_at(index)
    }

    /// Read the import in environment slot `index`.
    pub fn import_at(&self, index: usize) -> Result<Value> {
        let binding = self
            .module
            .state()
            .environment
            .get(index)
            .cloned()
            .flatten()
            .ok_or_else(|| {
                ModuleError::reference(format!(
                    "import slot {} of module '{}' is not bound",
                    index,
                    self.module.key()
                ))
            })?;
        environment::read_binding(self.engine.resolver(), &binding)
    }

    /// Write one of the module's own bindings.
    pub fn store(&mut self, local_name: &str, value: impl Into<Value>) {
        self.module
            .state()
            .locals
            .insert(local_name.to_string(), value.into());
    }

    /// Current value of one of the module's own bindings
    pub fn local(&self, local_name: &str) -> Option<Value> {
        self.module.local(local_name)
    }

    /// `module.exports`
    pub fn exports(&self) -> Value {
        self.module.exports()
    }

    /// `module.exports = value`
    pub fn set_exports(&mut self, value: impl Into<Value>) {
        self.module.state().exports = value.into();
    }

    /// `exports.name = value`. Replaces a non-object `module.exports` with a
    /// fresh object.
    pub fn set_export_property(&mut self, name: &str, value: impl Into<Value>) {
        let mut state = self.module.state();
        match &mut state.exports {
            Value::Object(props) => {
                Arc::make_mut(props).insert(name.to_string(), value.into());
            }
            other => *other = Value::object([(name, value.into())]),
        }
    }

    /// Namespace of a module requested by the running module
    pub fn namespace(&self, request: &str) -> Result<Arc<ModuleNamespace>> {
        let target = self.engine.resolver().resolve(Some(self.module), request)?;
        namespace::get_namespace(self.engine.resolver(), &target)
    }

    /// Queue `import(specifier)`; it runs once the current pass is over.
    pub fn enqueue_dynamic_import(&self, specifier: &str) {
        self.engine.enqueue_job(PendingJob::DynamicImport {
            referrer: Some(self.module.id()),
            specifier: specifier.to_string(),
        });
    }
}

impl std::fmt::Debug for ModuleScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleScope")
            .field("module", self.module.key())
            .finish()
    }
}
