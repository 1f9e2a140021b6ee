//! Engine configuration
//!
//! Settings are fixed when an [`Engine`](crate::Engine) is built. They can be
//! set with the `with_*` builders or loaded from the environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `RPCENGINE_OBJECT_MODE` | send/receive a single params object (`true`/`false`) |
//! | `RPCENGINE_PATH_DELIMITER` | separator between mount path and method name |
//! | `RPCENGINE_TIMEOUT_MS` | default call timeout in milliseconds, `0` disables |
//! | `RPCENGINE_REDACT_INTERNAL_ERRORS` | hide uncoded handler error messages from peers |

use std::time::Duration;

use rpcengine_common::{EngineError, Result};

pub const ENV_OBJECT_MODE: &str = "RPCENGINE_OBJECT_MODE";
pub const ENV_PATH_DELIMITER: &str = "RPCENGINE_PATH_DELIMITER";
pub const ENV_TIMEOUT_MS: &str = "RPCENGINE_TIMEOUT_MS";
pub const ENV_REDACT_INTERNAL_ERRORS: &str = "RPCENGINE_REDACT_INTERNAL_ERRORS";

const DEFAULT_DELIMITER: &str = ".";
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Send the first argument as the whole params value, and hand inbound
    /// params to handlers as a single argument
    pub object_mode: bool,
    /// Separator between an interface's mount path and a method name
    pub path_delimiter: String,
    /// Default deadline for outbound calls; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Replace handler errors that carry no code with a generic internal
    /// error before they reach the peer
    pub redact_internal_errors: bool,
    /// Buffer size of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            object_mode: false,
            path_delimiter: DEFAULT_DELIMITER.to_string(),
            timeout: None,
            redact_internal_errors: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_mode(mut self, enabled: bool) -> Self {
        self.object_mode = enabled;
        self
    }

    pub fn with_path_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.path_delimiter = delimiter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_redact_internal_errors(mut self, enabled: bool) -> Self {
        self.redact_internal_errors = enabled;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Defaults overlaid with the `RPCENGINE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Applies settings found through `lookup` on top of `self`.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_OBJECT_MODE) {
            self.object_mode = parse_bool(ENV_OBJECT_MODE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PATH_DELIMITER) {
            self.path_delimiter = raw;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                EngineError::Config(format!("{}: expected milliseconds, got {:?}", ENV_TIMEOUT_MS, raw))
            })?;
            self.timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(raw) = lookup(ENV_REDACT_INTERNAL_ERRORS) {
            self.redact_internal_errors = parse_bool(ENV_REDACT_INTERNAL_ERRORS, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(EngineError::Config("event_capacity must be at least 1".into()));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(EngineError::Config("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(EngineError::Config(format!(
            "{}: expected a boolean, got {:?}",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.object_mode);
        assert_eq!(config.path_delimiter, ".");
        assert_eq!(config.timeout, None);
        assert!(!config.redact_internal_errors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_object_mode(true)
            .with_path_delimiter("/")
            .with_timeout(Duration::from_millis(50))
            .with_redact_internal_errors(true);
        assert!(config.object_mode);
        assert_eq!(config.path_delimiter, "/");
        assert_eq!(config.timeout, Some(Duration::from_millis(50)));
        assert_eq!(config.clone().without_timeout().timeout, None);
    }

    #[test]
    fn test_overlay() {
        let config = EngineConfig::default()
            .overlay(lookup(&[
                (ENV_OBJECT_MODE, "yes"),
                (ENV_PATH_DELIMITER, "::"),
                (ENV_TIMEOUT_MS, "250"),
                (ENV_REDACT_INTERNAL_ERRORS, "1"),
            ]))
            .unwrap();
        assert!(config.object_mode);
        assert_eq!(config.path_delimiter, "::");
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
        assert!(config.redact_internal_errors);
    }

    #[test]
    fn test_overlay_zero_timeout_disables() {
        let config = EngineConfig::default()
            .with_timeout(Duration::from_secs(1))
            .overlay(lookup(&[(ENV_TIMEOUT_MS, "0")]))
            .unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let err = EngineConfig::default()
            .overlay(lookup(&[(ENV_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = EngineConfig::default()
            .overlay(lookup(&[(ENV_OBJECT_MODE, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_OBJECT_MODE));
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::default().with_event_capacity(0).validate().is_err());
        assert!(EngineConfig::default().with_timeout(Duration::ZERO).validate().is_err());
    }
}
