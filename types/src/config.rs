//! Execution configuration passed through to the pool and the transport.
//!
//! [`ExecutionConfig`] is a map of option name to JSON value. Nothing
//! in the bridge interprets it beyond the typed accessors below; the pool reads
//! `concurrency`, the bridge reads `on_error`, and the transport reads the
//! request options. Unknown keys are carried along untouched.
//!
//! ```toml
//! concurrency = 8
//! on_error = "continue"
//! timeout = 2.5
//! http_errors = false
//!
//! [headers]
//! user-agent = "snakepit"
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::policy::ErrorPolicy;

/// Pool width used when `concurrency` is not configured.
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Option names understood by the workspace crates.
pub mod options {
    /// Maximum number of operations in flight (pool).
    pub const CONCURRENCY: &str = "concurrency";
    /// `"fail_fast"` or `"continue"` (bridge).
    pub const ON_ERROR: &str = "on_error";
    /// Total request timeout in seconds, `0` disables it (transport).
    pub const TIMEOUT: &str = "timeout";
    /// Connect timeout in seconds, `0` disables it (transport).
    pub const CONNECT_TIMEOUT: &str = "connect_timeout";
    /// Table of header name to value added to every request (transport).
    pub const HEADERS: &str = "headers";
    /// Treat 4xx/5xx responses as failures (transport).
    pub const HTTP_ERRORS: &str = "http_errors";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option `{name}` must be {expected} (got {found})")]
    InvalidOption {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("failed to parse execution config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(name: &str, expected: &'static str, found: &Value) -> Self {
        ConfigError::InvalidOption {
            name: name.to_string(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Opaque option mapping shared read-only by every operation in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionConfig(Map<String, Value>);

impl ExecutionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: ExecutionConfig) {
        for (name, value) in other.0 {
            self.0.insert(name, value);
        }
    }

    /// Parse a TOML document whose top-level keys become options.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(Self(toml::from_str(content)?))
    }

    /// Maximum number of operations in flight. Defaults to [`DEFAULT_CONCURRENCY`].
    pub fn concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        let Some(value) = self.get(options::CONCURRENCY) else {
            return Ok(NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN));
        };
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::invalid(options::CONCURRENCY, "a positive integer", value))
    }

    pub fn error_policy(&self) -> Result<ErrorPolicy, ConfigError> {
        let Some(value) = self.get(options::ON_ERROR) else {
            return Ok(ErrorPolicy::default());
        };
        value
            .as_str()
            .and_then(|s| ErrorPolicy::parse(s).ok())
            .ok_or_else(|| {
                ConfigError::invalid(options::ON_ERROR, "\"fail_fast\" or \"continue\"", value)
            })
    }

    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.seconds(options::TIMEOUT)
    }

    pub fn connect_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.seconds(options::CONNECT_TIMEOUT)
    }

    /// Headers to add to every request, sorted by name.
    pub fn headers(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let Some(value) = self.get(options::HEADERS) else {
            return Ok(Vec::new());
        };
        let expected = "a table of string values";
        let table = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid(options::HEADERS, expected, value))?;
        table
            .iter()
            .map(|(name, v)| {
                v.as_str()
                    .map(|s| (name.clone(), s.to_string()))
                    .ok_or_else(|| ConfigError::invalid(options::HEADERS, expected, value))
            })
            .collect()
    }

    /// Whether 4xx/5xx responses count as failures. Defaults to `true`.
    pub fn http_errors(&self) -> Result<bool, ConfigError> {
        match self.get(options::HTTP_ERRORS) {
            None => Ok(true),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| ConfigError::invalid(options::HTTP_ERRORS, "a boolean", value)),
        }
    }

    fn seconds(&self, name: &str) -> Result<Option<Duration>, ConfigError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let secs = value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .ok_or_else(|| ConfigError::invalid(name, "a non-negative number of seconds", value))?;
        if secs == 0.0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs_f64(secs)))
        }
    }
}
