// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Logging setup for hosts embedding the module system.

use crate::config::EngineConfig;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `filter`.
///
/// Returns `false` if a global subscriber was already installed. An invalid
/// directive falls back to `warn`.
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Install a global subscriber using `config.log_filter`.
pub fn init_from_config(config: &EngineConfig) -> bool {
    init(&config.log_filter)
}
