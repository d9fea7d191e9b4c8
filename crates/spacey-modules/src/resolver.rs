// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module request resolution
//!
//! Turns `(referencing module, request specifier)` into a registered
//! [`ModuleRecord`], loading and registering it on first use.

use crate::config::EngineConfig;
use crate::error::{ModuleError, Result};
use crate::host::{Extractor, Loader, Locator, NativeKind, NativeModule, PathResolver, UnitFormat};
use crate::record::{ModuleKey, ModuleKind, ModuleRecord};
use crate::registry::ModuleRegistry;
use std::sync::Arc;
use tracing::{debug, trace};

/// Resolves request specifiers against the registry and the host.
pub struct ModuleResolver {
    registry: Arc<ModuleRegistry>,
    paths: Arc<dyn PathResolver>,
    loader: Arc<dyn Loader>,
    extractor: Arc<dyn Extractor>,
    config: EngineConfig,
}

impl ModuleResolver {
    /// Create a resolver over `registry`
    pub fn new(
        registry: Arc<ModuleRegistry>,
        paths: Arc<dyn PathResolver>,
        loader: Arc<dyn Loader>,
        extractor: Arc<dyn Extractor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            paths,
            loader,
            extractor,
            config,
        }
    }

    /// The registry records are published to
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check if a request names a host-native module
    pub fn is_native(&self, specifier: &str) -> bool {
        self.config.native_module(specifier).is_some()
    }

    /// Resolve `specifier` as requested by `referencing` (or by the host,
    /// for entry modules).
    ///
    /// Repeated resolution of the same target yields the same record.
    pub fn resolve(
        &self,
        referencing: Option<&ModuleRecord>,
        specifier: &str,
    ) -> Result<Arc<ModuleRecord>> {
        if let Some(referrer) = referencing {
            if let Some(id) = referrer.loaded_module(specifier) {
                if let Some(record) = self.registry.get(id) {
                    return Ok(record);
                }
            }
        }

        let record = match self.config.native_module(specifier) {
            Some((kind, name)) => self.resolve_native(specifier, kind, name)?,
            None => self.resolve_unit(referencing, specifier)?,
        };

        if let Some(referrer) = referencing {
            referrer.remember_loaded(specifier, record.id());
        }
        Ok(record)
    }

    fn resolve_native(
        &self,
        specifier: &str,
        kind: NativeKind,
        name: &str,
    ) -> Result<Arc<ModuleRecord>> {
        if let Some(existing) = self.registry.get_by_key(specifier) {
            return Ok(existing);
        }
        let native = NativeModule::parse(kind, name)?;
        debug!("Registering native module {} as {}", specifier, native);
        let record = ModuleRecord::new(
            self.registry.next_id(),
            ModuleKey::from(specifier),
            None,
            None,
            ModuleKind::Native(native),
        );
        Ok(self.registry.insert_or_get(record))
    }

    fn resolve_unit(
        &self,
        referencing: Option<&ModuleRecord>,
        specifier: &str,
    ) -> Result<Arc<ModuleRecord>> {
        let empty = Locator::default();
        let (base, referencing_key) = match referencing {
            Some(referrer) => (referrer.locator().unwrap_or(&empty), referrer.key().clone()),
            None => (&empty, ModuleKey::from("")),
        };

        let locator = self
            .paths
            .resolve(base, &referencing_key, specifier)
            .map_err(|err| match err {
                reference @ ModuleError::Reference(_) => reference,
                other => ModuleError::reference(format!(
                    "cannot resolve '{}' from '{}': {}",
                    specifier, referencing_key, other
                )),
            })?;

        let key = locator.module_key();
        if let Some(existing) = self.registry.get_by_key(key.as_str()) {
            trace!("Cache hit for {}", key);
            return Ok(existing);
        }

        let unit = self.loader.load(&locator).ok_or_else(|| {
            ModuleError::reference(format!(
                "cannot load module entry '{}' from '{}'",
                locator.entry, locator.file
            ))
        })?;

        let kind = match &unit.format {
            UnitFormat::Module => ModuleKind::Declarative(self.extractor.extract(&unit)?),
            UnitFormat::CommonJs => ModuleKind::CommonJs,
            UnitFormat::Json(text) => ModuleKind::Json(text.clone()),
        };
        debug!("Loaded {} module {} from {}", kind.name(), key, locator);

        let record = ModuleRecord::new(self.registry.next_id(), key, Some(locator), Some(unit), kind);
        Ok(self.registry.insert_or_get(record))
    }
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
