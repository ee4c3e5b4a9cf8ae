use reqwest::{StatusCode, Url};
use snakepit_types::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },
    /// 4xx/5xx response while `http_errors` is enabled.
    #[error("{url} returned {status}{}", preview(.body))]
    Status {
        status: StatusCode,
        url: Url,
        body: String,
    },
}

impl TransportError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn preview(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
