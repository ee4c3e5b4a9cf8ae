//! Core domain types for Snakepit.
//!
//! This crate contains the execution configuration shared by the pool, the
//! transport and the response bridge. No IO, no async, minimal dependencies.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod config;
mod policy;

pub use config::{ConfigError, DEFAULT_CONCURRENCY, ExecutionConfig, options};
pub use policy::{ErrorPolicy, PolicyParseError};
