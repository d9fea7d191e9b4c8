// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pending module jobs and the re-entrancy guard around evaluation

use crate::record::ModuleId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Work deferred until the current evaluation pass has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingJob {
    /// `import(specifier)` issued by `referrer` (or by the host)
    DynamicImport {
        /// Requesting module
        referrer: Option<ModuleId>,
        /// Request specifier
        specifier: String,
    },
}

/// FIFO queue of pending jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<PendingJob>>,
    draining: AtomicBool,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job
    pub fn push(&self, job: PendingJob) {
        self.jobs.lock().push_back(job);
    }

    /// Take the oldest job
    pub fn pop(&self) -> Option<PendingJob> {
        self.jobs.lock().pop_front()
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Claim the right to drain the queue; `None` if a drain is in progress.
    pub fn begin_drain(&self) -> Option<RunGuard<'_>> {
        RunGuard::acquire(&self.draining)
    }
}

/// Holds a non re-entrant flag for as long as it lives.
#[derive(Debug)]
pub struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    /// Set `flag`, or return `None` if it is already set.
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
