//! Bounded-concurrency task pool.
//!
//! [`Pool`] takes a lazy stream of task factories and runs them with at most
//! `concurrency` in flight. Factories are pulled from the stream only when a
//! slot is free, so unbounded sources are fine. While the pool waits for the
//! source to yield, tasks already in flight keep running and their
//! settlements are delivered. Every settlement is handed to a completion hook;
//! the pool does not observe further settlements and does not refill the
//! freed slot until that hook returns.
//!
//! The future returned by [`Pool::run`] is the aggregate completion: it
//! resolves once every task settled, or as soon as a hook reports an error.
//! Tasks still in flight at that point are dropped.
//!
//! All tasks are polled from the task that awaits [`Pool::run`]; the pool never
//! spawns.

use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::pin;

use futures_util::FutureExt;
use futures_util::future::{self, Either};
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use snakepit_types::{ConfigError, ExecutionConfig};

pub struct Pool<S> {
    tasks: S,
    concurrency: NonZeroUsize,
}

/// One turn of the run loop.
enum Step<P, O> {
    Pulled(Option<P>),
    Settled(Option<O>),
}

impl<S: Stream> Pool<S> {
    /// Build a pool over `tasks`, reading the width from the `concurrency` option.
    pub fn new(tasks: S, config: &ExecutionConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_concurrency(tasks, config.concurrency()?))
    }

    pub fn with_concurrency(tasks: S, concurrency: NonZeroUsize) -> Self {
        Self { tasks, concurrency }
    }

    #[must_use]
    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    /// Drive every task to settlement.
    ///
    /// `on_settled` receives the task's position in the source and its outcome,
    /// in settlement order. Returning `Err` from the hook ends the run with that
    /// error.
    pub async fn run<F, T, E, H, HF>(self, mut on_settled: H) -> Result<(), E>
    where
        S::Item: FnOnce() -> F,
        F: Future<Output = Result<T, E>>,
        H: FnMut(usize, Result<T, E>) -> HF,
        HF: Future<Output = Result<(), E>>,
    {
        let limit = self.concurrency.get();
        let mut tasks = pin!(self.tasks.enumerate().fuse());
        let mut in_flight = FuturesUnordered::new();
        let mut exhausted = false;
        let mut settled = 0usize;

        loop {
            let step = if exhausted || in_flight.len() >= limit {
                Step::Settled(in_flight.next().await)
            } else if in_flight.is_empty() {
                Step::Pulled(tasks.next().await)
            } else {
                // A source that is slow to yield must not hold back settlements.
                match future::select(tasks.next(), in_flight.next()).await {
                    Either::Left((pulled, _)) => Step::Pulled(pulled),
                    Either::Right((settlement, _)) => Step::Settled(settlement),
                }
            };

            match step {
                Step::Pulled(Some((index, task))) => {
                    in_flight.push(task().map(move |outcome| (index, outcome)));
                    tracing::trace!(index, in_flight = in_flight.len(), "Task admitted");
                }
                Step::Pulled(None) => {
                    exhausted = true;
                    tracing::trace!(in_flight = in_flight.len(), "Source exhausted");
                }
                Step::Settled(None) => {
                    tracing::debug!(settled, "Pool drained");
                    return Ok(());
                }
                Step::Settled(Some((index, outcome))) => {
                    settled += 1;
                    tracing::trace!(
                        index,
                        ok = outcome.is_ok(),
                        in_flight = in_flight.len(),
                        "Task settled"
                    );

                    if let Err(e) = on_settled(index, outcome).await {
                        tracing::debug!(
                            index,
                            settled,
                            abandoned = in_flight.len(),
                            "Completion hook failed; stopping pool"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}
