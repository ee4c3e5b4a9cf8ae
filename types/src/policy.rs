//! Failure handling policy for a processing run.

use std::fmt;

use thiserror::Error;

const POLICY_PARSE_VALUES: &[&str] = &["fail_fast", "fail-fast", "continue", "keep_going"];

/// What the bridge does when a single operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorPolicy {
    /// The first failure ends the run. It is yielded after every result that
    /// settled before it, then the sequence ends.
    #[default]
    FailFast,
    /// Failures are yielded in settlement order like any other element and the
    /// run carries on with the remaining operations.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid error policy '{raw}'; expected one of: {expected:?}")]
pub struct PolicyParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl PolicyParseError {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl ErrorPolicy {
    pub fn parse(s: &str) -> Result<Self, PolicyParseError> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "fail_fast" | "fail-fast" => Ok(ErrorPolicy::FailFast),
            "continue" | "keep_going" | "keep-going" => Ok(ErrorPolicy::Continue),
            _ => Err(PolicyParseError {
                raw: trimmed.to_string(),
                expected: POLICY_PARSE_VALUES,
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorPolicy::FailFast => "fail_fast",
            ErrorPolicy::Continue => "continue",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
