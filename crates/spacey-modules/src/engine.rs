// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The embedder-facing module engine.

use crate::config::EngineConfig;
use crate::environment;
use crate::error::{ModuleError, Result};
use crate::evaluator;
use crate::exports::{self, ResolveSet, Resolution};
use crate::host::{Executor, Host};
use crate::jobs::{JobQueue, PendingJob, RunGuard};
use crate::linker;
use crate::namespace::{self, ModuleNamespace};
use crate::record::{ModuleId, ModuleRecord};
use crate::registry::ModuleRegistry;
use crate::resolver::ModuleResolver;
use crate::value::Value;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{debug, instrument};

/// Drives resolution, linking and evaluation of module graphs.
///
/// Several engines may share one [`ModuleRegistry`]; each graph is still
/// linked and evaluated by a single engine at a time.
///
/// ```rust,ignore
/// let engine = ModuleEngine::new(registry, host, EngineConfig::default());
/// let main = engine.run("./main.js")?;
/// engine.run_pending_jobs()?;
/// let answer = engine.export_value("main.js", "answer")?;
/// ```
pub struct ModuleEngine {
    registry: Arc<ModuleRegistry>,
    resolver: ModuleResolver,
    executor: Arc<dyn Executor>,
    jobs: JobQueue,
    evaluating: AtomicBool,
}

impl ModuleEngine {
    /// Create an engine publishing records to `registry`.
    pub fn new(registry: Arc<ModuleRegistry>, host: Host, config: EngineConfig) -> Self {
        let resolver = ModuleResolver::new(
            Arc::clone(&registry),
            host.paths,
            host.loader,
            host.extractor,
            config,
        );
        Self {
            registry,
            resolver,
            executor: host.executor,
            jobs: JobQueue::new(),
            evaluating: AtomicBool::new(false),
        }
    }

    /// Create an engine with a private registry and default configuration.
    pub fn with_host(host: Host) -> Self {
        Self::new(Arc::new(ModuleRegistry::new()), host, EngineConfig::default())
    }

    /// The registry shared with other engines
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The request resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        self.resolver.config()
    }

    pub(crate) fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Look up a registered record by id.
    pub fn record(&self, id: ModuleId) -> Result<Arc<ModuleRecord>> {
        self.registry
            .get(id)
            .ok_or_else(|| ModuleError::reference(format!("module {} is not loaded", id)))
    }

    fn record_by_key(&self, key: &str) -> Result<Arc<ModuleRecord>> {
        self.registry
            .get_by_key(key)
            .ok_or_else(|| ModuleError::reference(format!("module '{}' is not loaded", key)))
    }

    /// Resolve `specifier` as requested by `referencing`, or as an entry
    /// module when `referencing` is `None`.
    #[instrument(skip(self))]
    pub fn resolve(&self, referencing: Option<ModuleId>, specifier: &str) -> Result<Arc<ModuleRecord>> {
        let referrer = referencing.map(|id| self.record(id)).transpose()?;
        self.resolver.resolve(referrer.as_deref(), specifier)
    }

    /// Link a module and its dependencies.
    #[instrument(skip(self))]
    pub fn instantiate(&self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        linker::instantiate(&self.resolver, &record)
    }

    /// Evaluate a linked module and its dependencies.
    ///
    /// Fails with [`ModuleError::Reentrant`] when called from inside a
    /// running evaluation.
    #[instrument(skip(self))]
    pub fn evaluate(&self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        let _guard =
            RunGuard::acquire(&self.evaluating).ok_or(ModuleError::Reentrant("module evaluation"))?;
        evaluator::evaluate(self, &record)
    }

    /// Evaluate the dependencies of a linked module whose own body will
    /// run on a concurrent task.
    ///
    /// The module keeps its status; CommonJS and native dependencies are
    /// rebound into its environment. Shares the re-entrancy guard with
    /// [`evaluate`](Self::evaluate).
    #[instrument(skip(self))]
    pub fn evaluate_for_concurrent(&self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        let _guard =
            RunGuard::acquire(&self.evaluating).ok_or(ModuleError::Reentrant("module evaluation"))?;
        evaluator::evaluate_dependencies(self, &record)
    }

    /// Resolve, link and evaluate an entry module.
    #[instrument(skip(self))]
    pub fn run(&self, specifier: &str) -> Result<ModuleId> {
        let id = self.resolve(None, specifier)?.id();
        self.instantiate(id)?;
        self.evaluate(id)?;
        Ok(id)
    }

    /// Check if a module with `key` is registered
    pub fn is_loaded(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    /// Namespace object of the module registered under `key`
    pub fn namespace(&self, key: &str) -> Result<Arc<ModuleNamespace>> {
        let record = self.record_by_key(key)?;
        namespace::get_namespace(&self.resolver, &record)
    }

    /// Current value of export `name` of the module registered under `key`.
    pub fn export_value(&self, key: &str, name: &str) -> Result<Value> {
        let record = self.record_by_key(key)?;
        match exports::resolve_export(&self.resolver, &record, name, &mut ResolveSet::default())? {
            Resolution::Resolved(binding) => environment::read_binding(&self.resolver, &binding),
            Resolution::Null => Err(ModuleError::syntax(format!(
                "module '{}' does not provide an export named '{}'",
                key, name
            ))),
            Resolution::Ambiguous => Err(ModuleError::syntax(format!(
                "module '{}' provides an ambiguous export named '{}'",
                key, name
            ))),
        }
    }

    /// Read property `name` of a namespace object
    pub fn namespace_get(&self, namespace: &ModuleNamespace, name: &str) -> Result<Value> {
        namespace.get(&self.resolver, name)
    }

    /// Drop the module registered under `key` so that the next resolution
    /// of it loads a fresh record.
    #[instrument(skip(self))]
    pub fn unload(&self, key: &str) -> Option<Arc<ModuleRecord>> {
        let removed = self.registry.remove(key);
        if removed.is_some() {
            debug!("Unloaded {}", key);
        }
        removed
    }

    /// Queue a job to run on the next [`run_pending_jobs`](Self::run_pending_jobs).
    pub fn enqueue_job(&self, job: PendingJob) {
        self.jobs.push(job);
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Run queued jobs in order, including jobs queued while draining.
    ///
    /// Returns the modules imported by the jobs. Stops at the first failing
    /// job; later jobs stay queued.
    #[instrument(skip(self))]
    pub fn run_pending_jobs(&self) -> Result<Vec<ModuleId>> {
        let _guard = self
            .jobs
            .begin_drain()
            .ok_or(ModuleError::Reentrant("job queue"))?;

        let mut imported = Vec::new();
        while let Some(job) = self.jobs.pop() {
            match job {
                PendingJob::DynamicImport { referrer, specifier } => {
                    debug!("Dynamic import of {}", specifier);
                    let id = self.resolve(referrer, &specifier)?.id();
                    self.instantiate(id)?;
                    self.evaluate(id)?;
                    imported.push(id);
                }
            }
        }
        Ok(imported)
    }
}

impl std::fmt::Debug for ModuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEngine")
            .field("registry", &self.registry)
            .field("pending_jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}
