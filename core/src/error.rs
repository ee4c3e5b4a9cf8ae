//! Failures surfaced through the response sequence.

use std::io;

use snakepit_types::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PitError {
    /// The descriptor at `index` is neither a request, a ready handle, nor a
    /// factory. Raised when the pool reaches it, never earlier.
    #[error("descriptor {index} is not an operation: {value}")]
    ContractViolation { index: usize, value: String },

    /// The transport or factory failed for the descriptor at `index`.
    #[error("operation {index} failed: {source}")]
    Upstream {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("responses were already processed")]
    AlreadyProcessed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start driver runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The consumer went away. Only used to stop the pool; never yielded.
    #[error("response consumer is gone")]
    Cancelled,

    #[error("driver task panicked: {0}")]
    Driver(String),
}

impl PitError {
    /// Source position of the descriptor this failure belongs to, if any.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            PitError::ContractViolation { index, .. } | PitError::Upstream { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}
