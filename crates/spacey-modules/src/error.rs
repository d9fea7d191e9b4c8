// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution, linking and evaluation

use crate::record::ModuleStatus;
use crate::value::Value;
use thiserror::Error;

/// Result type for module system operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors raised while resolving, linking or evaluating a module graph.
///
/// Errors are `Clone` because an evaluation failure is recorded on every
/// module that was on the evaluation stack and re-raised verbatim later.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// Module or file could not be located or loaded, or a binding was read
    /// before its module initialized it
    #[error("ReferenceError: {0}")]
    Reference(String),

    /// An import or re-export does not resolve, or resolves ambiguously
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// Invalid operation on a module namespace object
    #[error("TypeError: {0}")]
    Type(String),

    /// Exception thrown by a module body
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// A module body failed; recorded on every module of the failed pass
    #[error("{source}\n    while evaluating module '{module}' (imported via {})", .request_chain.join(" -> "))]
    Evaluation {
        /// Key of the module whose body failed
        module: String,
        /// Entry module key followed by each request specifier leading to `module`
        request_chain: Vec<String>,
        /// The underlying failure
        source: Box<ModuleError>,
    },

    /// An operation was attempted on a module in the wrong status
    #[error("cannot {operation} module '{module}' in status {status}")]
    InvalidState {
        /// Module key
        module: String,
        /// Status the module was found in
        status: ModuleStatus,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A non re-entrant entry point was entered while already running
    #[error("{0} is already running")]
    Reentrant(&'static str),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModuleError {
    /// Create a new ReferenceError
    pub fn reference(msg: impl Into<String>) -> Self {
        Self::Reference(msg.into())
    }

    /// Create a new SyntaxError
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Wrap a value thrown by a module body
    pub fn thrown(value: impl Into<Value>) -> Self {
        Self::Thrown(value.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The innermost error, looking through evaluation wrappers
    pub fn root_cause(&self) -> &ModuleError {
        match self {
            Self::Evaluation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The value thrown by a module body, if this error came from one
    pub fn thrown_value(&self) -> Option<&Value> {
        match self.root_cause() {
            Self::Thrown(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the root cause is a ReferenceError
    pub fn is_reference_error(&self) -> bool {
        matches!(self.root_cause(), Self::Reference(_))
    }

    /// Whether the root cause is a SyntaxError
    pub fn is_syntax_error(&self) -> bool {
        matches!(self.root_cause(), Self::Syntax(_))
    }

    /// Whether the root cause is a TypeError
    pub fn is_type_error(&self) -> bool {
        matches!(self.root_cause(), Self::Type(_))
    }
}
