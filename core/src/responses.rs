//! Consumer side of the bridge.
//!
//! [`Responses`] is what [`Pit::process`](crate::Pit::process) hands back. It
//! is a blocking [`Iterator`] for synchronous code; [`Responses::into_stream`]
//! turns it into a [`Stream`] for async code. Both pull one settlement at a
//! time from the driver and release the suspended completion hook only when
//! the next element is requested.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use futures_util::future::AbortHandle;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

use crate::error::PitError;

/// Message from the driver to the consumer.
pub(crate) enum Signal<T> {
    /// A hook is suspended on `resume` until the consumer pulls again.
    Settled {
        index: usize,
        outcome: Result<T, PitError>,
        resume: oneshot::Sender<()>,
    },
    /// The pool stopped on an unrecovered failure.
    Failed(PitError),
}

#[derive(Debug)]
enum BridgeState {
    /// Waiting for the next settlement.
    Started,
    /// An element was handed out; its hook waits for `resume`.
    Yielding { index: usize, resume: oneshot::Sender<()> },
    /// The channel closed; only the driver's exit status is left to collect.
    Closing,
    Done,
    Failed,
}

/// Lazy sequence of operation results in settlement order.
///
/// Iterating blocks the calling thread until the next settlement, and panics
/// when done from inside an async context; use [`into_stream`](Self::into_stream)
/// there. Dropping it aborts the driver along with every operation still in
/// flight.
pub struct Responses<T> {
    settlements: mpsc::Receiver<Signal<T>>,
    state: BridgeState,
    driver: Option<JoinHandle<()>>,
    abort_handle: AbortHandle,
    handle: Handle,
    /// Set when no runtime was current at `process()` time.
    runtime: Option<Runtime>,
    yielded: usize,
}

impl<T> Responses<T> {
    pub(crate) fn new(
        settlements: mpsc::Receiver<Signal<T>>,
        driver: JoinHandle<()>,
        abort_handle: AbortHandle,
        handle: Handle,
        runtime: Option<Runtime>,
    ) -> Self {
        Self {
            settlements,
            state: BridgeState::Started,
            driver: Some(driver),
            abort_handle,
            handle,
            runtime,
            yielded: 0,
        }
    }

    /// Number of elements handed out so far, failures included.
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// True once the sequence ended, normally or after a failure.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, BridgeState::Done | BridgeState::Failed)
    }

    /// Handle that aborts the driver from anywhere, e.g. another thread.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Stop the run. In-flight operations are dropped and the sequence ends
    /// without an error.
    ///
    /// Aborting through [`abort_handle`](Self::abort_handle) instead ends the
    /// sequence as well, but a settlement already queued for the consumer is
    /// still delivered first.
    pub fn cancel(&mut self) {
        tracing::debug!(yielded = self.yielded, "Response bridge cancelled");
        self.abort_handle.abort();
        self.state = BridgeState::Done;
    }

    #[must_use]
    pub fn into_stream(self) -> ResponseStream<T> {
        ResponseStream { inner: self }
    }

    /// Release the hook suspended on the previously yielded element.
    ///
    /// Returns false when the sequence is over.
    fn resume(&mut self) -> bool {
        match mem::replace(&mut self.state, BridgeState::Started) {
            BridgeState::Yielding { index, resume } => {
                tracing::trace!(index, "Resuming completion hook");
                // The hook is gone if the driver was aborted.
                let _ = resume.send(());
                true
            }
            state @ (BridgeState::Done | BridgeState::Failed) => {
                self.state = state;
                false
            }
            state => {
                self.state = state;
                true
            }
        }
    }

    fn accept(&mut self, signal: Signal<T>) -> Result<T, PitError> {
        self.yielded += 1;
        match signal {
            Signal::Settled {
                index,
                outcome,
                resume,
            } => {
                self.state = BridgeState::Yielding { index, resume };
                outcome
            }
            Signal::Failed(e) => {
                self.state = BridgeState::Failed;
                Err(e)
            }
        }
    }

    /// Turn the driver's exit status into the final element, if any.
    fn conclude(&mut self, joined: Result<(), JoinError>) -> Option<Result<T, PitError>> {
        self.driver = None;
        match joined {
            Err(e) if e.is_panic() => {
                tracing::warn!(error = %e, "Response driver panicked");
                self.state = BridgeState::Failed;
                self.yielded += 1;
                Some(Err(PitError::Driver(e.to_string())))
            }
            _ => {
                tracing::debug!(yielded = self.yielded, "Response sequence finished");
                self.state = BridgeState::Done;
                None
            }
        }
    }

    fn poll_settlement(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<T, PitError>>> {
        if !self.resume() {
            return Poll::Ready(None);
        }

        if !matches!(self.state, BridgeState::Closing) {
            if let Some(signal) = ready!(self.settlements.poll_recv(cx)) {
                return Poll::Ready(Some(self.accept(signal)));
            }
            self.state = BridgeState::Closing;
        }

        let joined = match self.driver.as_mut() {
            Some(driver) => ready!(Pin::new(driver).poll(cx)),
            None => Ok(()),
        };
        Poll::Ready(self.conclude(joined))
    }
}

impl<T> Iterator for Responses<T> {
    type Item = Result<T, PitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.resume() {
            return None;
        }

        if !matches!(self.state, BridgeState::Closing) {
            if let Some(signal) = self.settlements.blocking_recv() {
                return Some(self.accept(signal));
            }
            self.state = BridgeState::Closing;
        }

        let joined = match self.driver.take() {
            Some(driver) => self.handle.block_on(driver),
            None => Ok(()),
        };
        self.conclude(joined)
    }
}

/// [`Responses`] as a [`Stream`], for consumers running inside a runtime.
pub struct ResponseStream<T> {
    inner: Responses<T>,
}

impl<T> ResponseStream<T> {
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.inner.yielded()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.inner.abort_handle()
    }

    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}

impl<T> Stream for ResponseStream<T> {
    type Item = Result<T, PitError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_settlement(cx)
    }
}

impl<T> fmt::Debug for ResponseStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseStream").field(&self.inner).finish()
    }
}

impl<T> Drop for Responses<T> {
    fn drop(&mut self) {
        self.abort_handle.abort();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl<T> fmt::Debug for Responses<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responses")
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .field("owns_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}
