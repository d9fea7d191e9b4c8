// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Strongly-connected-component bookkeeping shared by the link and
//! evaluation passes.

use crate::record::{ModuleRecord, ModuleStatus};
use std::sync::Arc;
use tracing::trace;

/// A module being walked and the index of its next request
pub(crate) struct Frame {
    pub module: Arc<ModuleRecord>,
    pub next_request: usize,
}

impl Frame {
    pub fn new(module: Arc<ModuleRecord>) -> Self {
        Self {
            module,
            next_request: 0,
        }
    }

    /// The request this frame is currently descending into
    pub fn current_request(&self) -> Option<&str> {
        self.frame_request(self.next_request.checked_sub(1)?)
    }

    fn frame_request(&self, index: usize) -> Option<&str> {
        self.module.requested_modules().get(index).map(String::as_str)
    }
}

/// Move `module` from `from` to `active`, number it and push it on the
/// component stack. Returns `false` (and does nothing) if it is in any
/// other status.
pub(crate) fn try_enter(
    module: &Arc<ModuleRecord>,
    from: ModuleStatus,
    active: ModuleStatus,
    stack: &mut Vec<Arc<ModuleRecord>>,
    index: &mut usize,
) -> bool {
    let mut state = module.state();
    if state.status != from {
        return false;
    }
    state.enter(active, *index);
    trace!("{}: {} -> {} (dfs {})", module.key(), from, active, *index);
    *index += 1;
    drop(state);
    stack.push(Arc::clone(module));
    true
}

/// If `required` is still `active` (part of the cycle being walked), pull
/// `module`'s ancestor index down to `required`'s.
pub(crate) fn inherit_ancestor(module: &ModuleRecord, required: &ModuleRecord, active: ModuleStatus) {
    let (status, ancestor) = {
        let state = required.state();
        (state.status, state.dfs_ancestor_index)
    };
    if status != active {
        return;
    }
    let mut state = module.state();
    if let (Some(own), Some(theirs)) = (state.dfs_ancestor_index, ancestor) {
        state.dfs_ancestor_index = Some(own.min(theirs));
    }
}

/// If `module` roots a finished component, pop the component off `stack`
/// and move every member to `done`.
pub(crate) fn complete_component(
    module: &Arc<ModuleRecord>,
    stack: &mut Vec<Arc<ModuleRecord>>,
    done: ModuleStatus,
) {
    if !module.state().is_component_root() {
        return;
    }
    while let Some(member) = stack.pop() {
        member.state().status = done;
        trace!("{}: -> {}", member.key(), done);
        if Arc::ptr_eq(&member, module) {
            break;
        }
    }
}
