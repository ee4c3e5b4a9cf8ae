//! The contract between the bridge and whatever performs an operation.

use futures_util::future::BoxFuture;
use snakepit_types::ExecutionConfig;

/// Pending result of one operation.
pub type Handle<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Turns a raw request into a pending result.
///
/// The config is the run's shared [`ExecutionConfig`], passed unmodified; the
/// transport picks the options it understands and ignores the rest.
pub trait Transport: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    fn send(&self, request: Self::Request, config: &ExecutionConfig) -> Handle<Self::Response>;
}
