use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use snakepit_types::{ConfigError, ExecutionConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config at {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

impl ConfigFileError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigFileError::Read { path, .. } | ConfigFileError::Parse { path, .. } => path,
        }
    }
}

/// `~/.snakepit/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".snakepit").join("config.toml"))
}

/// Load the execution config.
///
/// An explicit path must exist. Without one the default location is tried,
/// and a missing file yields an empty config.
pub fn load(explicit: Option<&Path>) -> Result<ExecutionConfig, ConfigFileError> {
    if let Some(path) = explicit {
        return load_from(path);
    }
    match config_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(ExecutionConfig::new()),
    }
}

pub fn load_from(path: &Path) -> Result<ExecutionConfig, ConfigFileError> {
    let content = fs::read_to_string(path).map_err(|source| {
        tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
        ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let config = ExecutionConfig::from_toml_str(&content).map_err(|source| {
        tracing::warn!(path = %path.display(), error = %source, "Failed to parse config");
        ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    tracing::debug!(path = %path.display(), options = config.len(), "Loaded config");
    Ok(config)
}
