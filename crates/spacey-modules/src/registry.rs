// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide module registry

use crate::record::{ModuleId, ModuleKey, ModuleRecord};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

/// Thread-safe arena of module records, indexed by key.
///
/// May be shared by several engines resolving unrelated graphs. A key is
/// published at most once: concurrent resolvers racing on the same key all
/// end up with the same record.
pub struct ModuleRegistry {
    /// Key -> arena handle
    keys: DashMap<ModuleKey, ModuleId>,
    /// Arena of records
    records: DashMap<ModuleId, Arc<ModuleRecord>>,
    next_id: AtomicU32,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            keys: DashMap::new(),
            records: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Allocate a handle for a record about to be built
    pub(crate) fn next_id(&self) -> ModuleId {
        ModuleId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish `record` under its key, or return the record already published
    /// there. The losing record of a race is dropped.
    pub(crate) fn insert_or_get(&self, record: ModuleRecord) -> Arc<ModuleRecord> {
        let record = Arc::new(record);
        match self.keys.entry(record.key().clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(existing) = self.records.get(entry.get()) {
                    trace!("Registry already holds {}", record.key());
                    return Arc::clone(existing.value());
                }
                // Key left behind by a concurrent unload
                self.records.insert(record.id(), Arc::clone(&record));
                entry.insert(record.id());
                record
            }
            Entry::Vacant(entry) => {
                trace!("Registering {} as {}", record.key(), record.id());
                self.records.insert(record.id(), Arc::clone(&record));
                entry.insert(record.id());
                record
            }
        }
    }

    /// Get a record by handle
    pub fn get(&self, id: ModuleId) -> Option<Arc<ModuleRecord>> {
        self.records.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Get a record by key
    pub fn get_by_key(&self, key: &str) -> Option<Arc<ModuleRecord>> {
        let id = *self.keys.get(key)?;
        self.get(id)
    }

    /// Check if a module is loaded
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Remove a module, e.g. to replace it with a patched version.
    ///
    /// Importers that already resolved the old record keep its handle; it no
    /// longer resolves through the registry.
    pub fn remove(&self, key: &str) -> Option<Arc<ModuleRecord>> {
        let (_, id) = self.keys.remove(key)?;
        self.records.remove(&id).map(|(_, record)| record)
    }

    /// Remove every record
    pub fn clear(&self) {
        self.keys.clear();
        self.records.clear();
    }

    /// Get all registered keys
    pub fn keys(&self) -> Vec<ModuleKey> {
        self.keys.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of registered modules
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.keys.len())
            .finish()
    }
}
