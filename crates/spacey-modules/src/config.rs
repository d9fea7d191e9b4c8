// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration.

use crate::error::{ModuleError, Result};
use crate::host::NativeKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "SPACEY_MODULES_";

/// A request prefix that marks a host-native module of one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativePrefix {
    /// Literal prefix, e.g. `@ohos:`
    pub prefix: String,
    /// Family of the modules it selects
    pub kind: NativeKind,
}

impl NativePrefix {
    /// Create a prefix entry
    pub fn new(prefix: impl Into<String>, kind: NativeKind) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
        }
    }
}

/// Configuration for a [`ModuleEngine`](crate::ModuleEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Request prefixes that mark a host-native module, checked in order
    pub native_prefixes: Vec<NativePrefix>,

    /// `tracing` filter directive used by [`logging::init_from_config`](crate::logging::init_from_config)
    pub log_filter: String,

    /// Log every resolved import binding at debug level
    pub trace_bindings: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            native_prefixes: vec![
                NativePrefix::new("@ohos:", NativeKind::Ohos),
                NativePrefix::new("@app:", NativeKind::App),
                NativePrefix::new("@native:", NativeKind::Native),
            ],
            log_filter: "warn".to_string(),
            trace_bindings: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional TOML file, then apply
    /// `SPACEY_MODULES_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.load_from_env();
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML configuration text. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ModuleError::config(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn load_from_env(&mut self) {
        self.apply_env(std::env::vars());
    }

    /// Apply overrides from `(name, value)` pairs; names without the
    /// `SPACEY_MODULES_` prefix are ignored.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value by its dashed name.
    ///
    /// `native-prefixes` takes comma-separated `kind=prefix` pairs, e.g.
    /// `ohos=@ohos:,native=@sys:`. Malformed pairs are skipped.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "native-prefixes" => {
                self.native_prefixes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .filter_map(|pair| match parse_prefix(pair) {
                        Ok(prefix) => Some(prefix),
                        Err(e) => {
                            warn!("Ignoring native prefix '{}': {}", pair, e);
                            None
                        }
                    })
                    .collect();
            }
            "log" | "log-filter" => self.log_filter = value.to_string(),
            "trace-bindings" => self.trace_bindings = value == "true" || value == "1",
            _ => {}
        }
    }

    /// Classify `specifier` as a native request: its family and the name
    /// left after stripping the first matching prefix.
    pub fn native_module<'a>(&self, specifier: &'a str) -> Option<(NativeKind, &'a str)> {
        self.native_prefixes.iter().find_map(|entry| {
            specifier
                .strip_prefix(entry.prefix.as_str())
                .map(|name| (entry.kind, name))
        })
    }
}

fn parse_prefix(pair: &str) -> Result<NativePrefix> {
    let (kind, prefix) = pair
        .split_once('=')
        .ok_or_else(|| ModuleError::config("expected kind=prefix"))?;
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(ModuleError::config("empty prefix"));
    }
    Ok(NativePrefix::new(prefix, kind.parse()?))
}
