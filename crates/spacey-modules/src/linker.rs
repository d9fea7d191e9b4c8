// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking
//!
//! Depth-first walk over requested modules that numbers modules Tarjan
//! style (`dfs_index` / `dfs_ancestor_index`) and binds every import.
//! Modules of one strongly-connected component move to
//! [`ModuleStatus::Linked`] together, when the walk leaves the component
//! root. The walk keeps its own frame stack, so deep import chains cannot
//! exhaust the native stack.
//!
//! If anything fails, every module still on the component stack rolls back
//! to `Unlinked`, so linking can be retried once the cause is fixed.

use crate::environment;
use crate::error::Result;
use crate::graph::{self, Frame};
use crate::record::{ModuleRecord, ModuleStatus};
use crate::resolver::ModuleResolver;
use std::sync::Arc;
use tracing::{debug, trace};

/// Link `root` and everything it transitively requests.
pub fn instantiate(resolver: &ModuleResolver, root: &Arc<ModuleRecord>) -> Result<()> {
    debug!("Linking {}", root.key());
    let mut stack = Vec::new();
    match link_module(resolver, root, &mut stack, 0) {
        Ok(_) => {
            debug_assert!(stack.is_empty());
            debug!("Linked {}", root.key());
            Ok(())
        }
        Err(err) => {
            for module in stack.drain(..) {
                trace!("{}: linking -> unlinked (rollback)", module.key());
                module.state().reset_link();
            }
            debug!("Linking {} failed: {}", root.key(), err);
            Err(err)
        }
    }
}

fn enter(module: &Arc<ModuleRecord>, stack: &mut Vec<Arc<ModuleRecord>>, index: &mut usize) -> bool {
    graph::try_enter(module, ModuleStatus::Unlinked, ModuleStatus::Linking, stack, index)
}

fn link_module(
    resolver: &ModuleResolver,
    root: &Arc<ModuleRecord>,
    stack: &mut Vec<Arc<ModuleRecord>>,
    mut index: usize,
) -> Result<usize> {
    // Linking, linked and evaluated modules are already handled
    if !enter(root, stack, &mut index) {
        return Ok(index);
    }

    let mut frames = vec![Frame::new(Arc::clone(root))];
    while let Some(frame) = frames.last_mut() {
        let module = Arc::clone(&frame.module);

        if let Some(request) = module.requested_modules().get(frame.next_request) {
            frame.next_request += 1;
            let required = resolver.resolve(Some(&module), request)?;
            if enter(&required, stack, &mut index) {
                frames.push(Frame::new(required));
            } else {
                graph::inherit_ancestor(&module, &required, ModuleStatus::Linking);
            }
            continue;
        }

        environment::initialize_environment(resolver, &module)?;
        graph::complete_component(&module, stack, ModuleStatus::Linked);
        frames.pop();
        if let Some(parent) = frames.last() {
            graph::inherit_ancestor(&parent.module, &module, ModuleStatus::Linking);
        }
    }
    Ok(index)
}
