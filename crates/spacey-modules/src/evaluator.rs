// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Evaluation
//!
//! Second walk over the linked graph, shaped like the link pass: modules
//! go `Linked -> Evaluating -> Evaluated`, one component at a time, and each
//! body runs exactly once, after its dependencies.
//!
//! Differences from linking:
//! - an `Evaluated` module with a recorded error re-raises that error;
//! - JSON and native dependencies are materialized on the spot instead of
//!   being walked;
//! - once a CommonJS or native dependency has run, the importer's
//!   placeholder bindings to it are rebound against its real exports.
//!
//! A failure marks every module on the component stack `Evaluated` with the
//! same sticky error; nothing is rolled back.
//!
//! [`evaluate_dependencies`] runs the same walk for a root whose own body is
//! executed elsewhere (a concurrent task): the root is neither entered nor
//! executed and keeps its status, while its dependencies are evaluated and
//! its environment rebound. A dependency that cycles back into the root
//! still evaluates it as part of that cycle.

use crate::engine::ModuleEngine;
use crate::environment;
use crate::error::{ModuleError, Result};
use crate::graph::{self, Frame};
use crate::record::{DEFAULT_EXPORT, ModuleKind, ModuleRecord, ModuleStatus};
use crate::scope::ModuleScope;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Evaluate `root` and everything it transitively requests.
pub fn evaluate(engine: &ModuleEngine, root: &Arc<ModuleRecord>) -> Result<()> {
    check_evaluable(root, "evaluate")?;
    debug!("Evaluating {}", root.key());
    run_pass(engine, root, true)
}

/// Evaluate everything `root` requests without running `root` itself.
pub fn evaluate_dependencies(engine: &ModuleEngine, root: &Arc<ModuleRecord>) -> Result<()> {
    check_evaluable(root, "evaluate dependencies")?;
    {
        let state = root.state();
        if state.status == ModuleStatus::Evaluated {
            return state.evaluation_error.clone().map_or(Ok(()), Err);
        }
    }
    if !matches!(root.kind(), ModuleKind::Declarative(_)) {
        return Ok(());
    }
    debug!("Evaluating dependencies of {}", root.key());
    run_pass(engine, root, false)
}

fn check_evaluable(root: &ModuleRecord, operation: &'static str) -> Result<()> {
    let status = root.status();
    if matches!(status, ModuleStatus::Linked | ModuleStatus::Evaluated) {
        Ok(())
    } else {
        Err(ModuleError::InvalidState {
            module: root.key().to_string(),
            status,
            operation,
        })
    }
}

fn run_pass(engine: &ModuleEngine, root: &Arc<ModuleRecord>, run_root: bool) -> Result<()> {
    let mut stack = Vec::new();
    match inner_module_evaluation(engine, root, &mut stack, 0, run_root) {
        Ok(_) => {
            debug_assert!(stack.is_empty());
            debug!("Evaluated {}", root.key());
            Ok(())
        }
        Err(err) => {
            for module in stack.drain(..) {
                let mut state = module.state();
                state.status = ModuleStatus::Evaluated;
                state.evaluation_error = Some(err.clone());
                trace!("{}: evaluating -> evaluated (failed)", module.key());
            }
            debug!("Evaluating {} failed: {}", root.key(), err);
            Err(err)
        }
    }
}

/// Start evaluating `module` if it is linked. An already evaluated module
/// re-raises its sticky error.
fn enter(module: &Arc<ModuleRecord>, stack: &mut Vec<Arc<ModuleRecord>>, index: &mut usize) -> Result<bool> {
    {
        let state = module.state();
        match state.status {
            ModuleStatus::Evaluated => {
                return match &state.evaluation_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(false),
                };
            }
            ModuleStatus::Evaluating => return Ok(false),
            ModuleStatus::Linked => {}
            status @ (ModuleStatus::Unlinked | ModuleStatus::Linking) => {
                return Err(ModuleError::InvalidState {
                    module: module.key().to_string(),
                    status,
                    operation: "evaluate",
                });
            }
        }
    }
    Ok(graph::try_enter(
        module,
        ModuleStatus::Linked,
        ModuleStatus::Evaluating,
        stack,
        index,
    ))
}

/// Compute the value of a JSON or native module once and mark it evaluated.
fn materialize(engine: &ModuleEngine, module: &Arc<ModuleRecord>) -> Result<()> {
    {
        let state = module.state();
        if state.status == ModuleStatus::Evaluated {
            return state.evaluation_error.clone().map_or(Ok(()), Err);
        }
    }

    let outcome = match module.kind() {
        ModuleKind::Json(text) => serde_json::from_str::<serde_json::Value>(text)
            .map(|json| Value::from_json(&json))
            .map_err(|e| {
                ModuleError::syntax(format!("invalid JSON in module '{}': {}", module.key(), e))
            }),
        ModuleKind::Native(native) => Ok(engine.executor().load_native(native).unwrap_or_else(|| {
            warn!("Cannot load native module {} ({})", module.key(), native);
            Value::Undefined
        })),
        ModuleKind::Declarative(_) | ModuleKind::CommonJs => return Ok(()),
    };

    let mut state = module.state();
    state.status = ModuleStatus::Evaluated;
    trace!("{}: materialized", module.key());
    match outcome {
        Ok(value) => {
            if matches!(module.kind(), ModuleKind::Json(_)) {
                state.locals.insert(DEFAULT_EXPORT.to_string(), value);
            } else {
                state.exports = value;
            }
            Ok(())
        }
        Err(err) => {
            state.evaluation_error = Some(err.clone());
            Err(err)
        }
    }
}

/// Entry key followed by each request specifier leading to the top frame
fn request_chain(frames: &[Frame]) -> Vec<String> {
    let mut chain = Vec::with_capacity(frames.len());
    if let Some(first) = frames.first() {
        chain.push(first.module.key().to_string());
    }
    let parents = &frames[..frames.len().saturating_sub(1)];
    chain.extend(
        parents
            .iter()
            .filter_map(Frame::current_request)
            .map(String::from),
    );
    chain
}

/// Run the body of the module on top of `frames`.
fn execute(engine: &ModuleEngine, module: &Arc<ModuleRecord>, frames: &[Frame]) -> Result<()> {
    let unit = module.unit().ok_or_else(|| {
        ModuleError::reference(format!("module '{}' has no compiled unit", module.key()))
    })?;
    if matches!(module.kind(), ModuleKind::CommonJs) {
        module.state().exports = Value::empty_object();
    }

    trace!("{}: executing", module.key());
    let mut scope = ModuleScope::new(engine, module);
    engine
        .executor()
        .execute(unit, &mut scope)
        .map_err(|err| ModuleError::Evaluation {
            module: module.key().to_string(),
            request_chain: request_chain(frames),
            source: Box::new(err),
        })
}

/// Bookkeeping after `module` has finished visiting `required`.
fn dependency_done(module: &ModuleRecord, required: &ModuleRecord) -> Result<()> {
    graph::inherit_ancestor(module, required, ModuleStatus::Evaluating);
    environment::rebind_after_execution(module, required)
}

fn inner_module_evaluation(
    engine: &ModuleEngine,
    root: &Arc<ModuleRecord>,
    stack: &mut Vec<Arc<ModuleRecord>>,
    mut index: usize,
    run_root: bool,
) -> Result<usize> {
    if matches!(root.kind(), ModuleKind::Json(_) | ModuleKind::Native(_)) {
        materialize(engine, root)?;
        return Ok(index);
    }
    if run_root && !enter(root, stack, &mut index)? {
        return Ok(index);
    }

    let resolver = engine.resolver();
    let mut frames = vec![Frame::new(Arc::clone(root))];
    while let Some(frame) = frames.last_mut() {
        let module = Arc::clone(&frame.module);

        if let Some(request) = module.requested_modules().get(frame.next_request) {
            frame.next_request += 1;
            let required = resolver.resolve(Some(&module), request)?;

            if matches!(required.kind(), ModuleKind::Json(_) | ModuleKind::Native(_)) {
                materialize(engine, &required)?;
                environment::rebind_after_execution(&module, &required)?;
            } else if enter(&required, stack, &mut index)? {
                frames.push(Frame::new(required));
            } else {
                dependency_done(&module, &required)?;
            }
            continue;
        }

        if !run_root && frames.len() == 1 {
            // Root body runs elsewhere
            frames.pop();
            continue;
        }
        execute(engine, &module, &frames)?;
        graph::complete_component(&module, stack, ModuleStatus::Evaluated);
        frames.pop();
        if let Some(parent) = frames.last() {
            dependency_done(&parent.module, &module)?;
        }
    }
    Ok(index)
}
