//! # rpcengine CLI
//!
//! Command-line front end for the rpcengine workspace.
//!
//! - **demo**: wires two engines together in memory and walks through calls,
//!   failures, timeouts and event subscriptions
//! - **stdio**: serves the demo service over newline-delimited JSON on
//!   stdin/stdout, one message per line
//!
//! Engine settings come from the `RPCENGINE_*` environment variables, with
//! command-line flags taking precedence.

pub mod demo;
pub mod service;
pub mod stdio;

use std::time::Duration;

use anyhow::Result;
use rpcengine::EngineConfig;

/// Engine settings given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineFlags {
    pub timeout_ms: Option<u64>,
    pub object_mode: bool,
    pub delimiter: Option<String>,
    pub redact_internal_errors: bool,
}

impl EngineFlags {
    /// Layers the flags over `base`. Switches can only turn settings on.
    pub fn apply(&self, mut base: EngineConfig) -> Result<EngineConfig> {
        if let Some(ms) = self.timeout_ms {
            base.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if self.object_mode {
            base.object_mode = true;
        }
        if let Some(delimiter) = &self.delimiter {
            base.path_delimiter = delimiter.clone();
        }
        if self.redact_internal_errors {
            base.redact_internal_errors = true;
        }
        base.validate()?;
        Ok(base)
    }

    /// Environment overlaid with the flags.
    pub fn resolve(&self) -> Result<EngineConfig> {
        self.apply(EngineConfig::from_env()?)
    }
}
