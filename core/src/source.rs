//! Operation descriptors and their adaptation into pool tasks.
//!
//! A source is any iterator of [`Descriptor`]s. It is handed to the pool as a
//! lazy adapter: nothing here enumerates it, and a descriptor is only turned
//! into a running operation when the pool has a free slot for it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};
use snakepit_types::ExecutionConfig;

use crate::error::PitError;
use crate::transport::{Handle, Transport};

/// One unit of work submitted to the bridge.
pub enum Descriptor<R, T> {
    /// Raw request, dispatched through [`Transport::send`] with the shared config.
    Request(R),
    /// Already pending result.
    Ready(Handle<T>),
    /// Produces the pending result when the pool admits it.
    Factory(Box<dyn FnOnce() -> Handle<T> + Send>),
    /// Something that is not an operation; carries a rendering of the value.
    Unrecognized(String),
}

impl<R, T> Descriptor<R, T> {
    pub fn request(request: R) -> Self {
        Descriptor::Request(request)
    }

    pub fn ready<F>(handle: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Descriptor::Ready(handle.boxed())
    }

    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Descriptor::Factory(Box::new(move || factory().boxed()))
    }

    pub fn unrecognized(value: impl fmt::Debug) -> Self {
        Descriptor::Unrecognized(format!("{value:?}"))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Descriptor::Request(_) => "request",
            Descriptor::Ready(_) => "ready",
            Descriptor::Factory(_) => "factory",
            Descriptor::Unrecognized(_) => "unrecognized",
        }
    }
}

impl<R: fmt::Debug, T> fmt::Debug for Descriptor<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Request(request) => f.debug_tuple("Request").field(request).finish(),
            Descriptor::Ready(_) => f.write_str("Ready(..)"),
            Descriptor::Factory(_) => f.write_str("Factory(..)"),
            Descriptor::Unrecognized(value) => {
                f.debug_tuple("Unrecognized").field(value).finish()
            }
        }
    }
}

/// Wrap the descriptor at `index` into a pool task.
///
/// The returned closure does nothing until the pool invokes it. Failures are
/// tagged with `index` so they can be traced back to the source position.
pub(crate) fn adapt<Tr: Transport>(
    index: usize,
    descriptor: Descriptor<Tr::Request, Tr::Response>,
    transport: Arc<Tr>,
    config: Arc<ExecutionConfig>,
) -> impl FnOnce() -> BoxFuture<'static, Result<Tr::Response, PitError>> + Send {
    move || {
        let handle = match descriptor {
            Descriptor::Request(request) => transport.send(request, &config),
            Descriptor::Ready(handle) => handle,
            Descriptor::Factory(factory) => factory(),
            Descriptor::Unrecognized(value) => {
                tracing::debug!(index, %value, "Descriptor is not an operation");
                return future::ready(Err(PitError::ContractViolation { index, value })).boxed();
            }
        };
        handle
            .map_err(move |source| PitError::Upstream { index, source })
            .boxed()
    }
}
