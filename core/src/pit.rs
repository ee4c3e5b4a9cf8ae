//! Producer side of the bridge: the driver task and its completion hook.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable, BoxFuture};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use snakepit_pool::Pool;
use snakepit_types::{ErrorPolicy, ExecutionConfig};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, oneshot};

use crate::error::PitError;
use crate::responses::{Responses, Signal};
use crate::source::{Descriptor, adapt};
use crate::transport::Transport;

/// At most one settlement waits for the consumer at a time.
const SETTLEMENT_CHANNEL_CAPACITY: usize = 1;

const DRIVER_THREAD_NAME: &str = "snakepit-driver";

/// Runs a source of operations through a bounded pool and hands the results
/// out one at a time, in the order they settle.
///
/// The source is pulled on the driver task. An iterator given to
/// [`Pit::new`] must not block in `next`; a source that has to wait for its
/// items, such as lines typed on a terminal, belongs in [`Pit::from_stream`].
///
/// ```no_run
/// # use snakepit_core::{Descriptor, Pit, Transport};
/// # use snakepit_types::ExecutionConfig;
/// # fn demo<Tr: Transport>(transport: Tr, requests: Vec<Tr::Request>) -> anyhow::Result<()> {
/// let config = ExecutionConfig::new().with("concurrency", 4);
/// let mut pit = Pit::new(transport, requests.into_iter().map(Descriptor::request), config);
/// for response in pit.process()? {
///     let _response = response?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pit<Tr: Transport> {
    transport: Arc<Tr>,
    requests: Option<BoxStream<'static, Descriptor<Tr::Request, Tr::Response>>>,
    config: Arc<ExecutionConfig>,
}

impl<Tr: Transport> Pit<Tr> {
    pub fn new<I>(transport: Tr, requests: I, config: ExecutionConfig) -> Self
    where
        I: IntoIterator<Item = Descriptor<Tr::Request, Tr::Response>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(transport, stream::iter(requests), config)
    }

    /// Like [`Pit::new`], for sources that produce descriptors asynchronously.
    ///
    /// Tasks already in flight keep settling, and their results keep flowing
    /// to the consumer, while the stream has nothing ready.
    pub fn from_stream<S>(transport: Tr, requests: S, config: ExecutionConfig) -> Self
    where
        S: Stream<Item = Descriptor<Tr::Request, Tr::Response>> + Send + 'static,
    {
        Self {
            transport: Arc::new(transport),
            requests: Some(requests.boxed()),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Start the run and return the response sequence.
    ///
    /// The driver runs on the current tokio runtime when there is one, otherwise
    /// on a dedicated single-worker runtime owned by the returned [`Responses`].
    /// A `Pit` can be processed once; later calls fail with
    /// [`PitError::AlreadyProcessed`]. Invalid pool options are reported here,
    /// before the source is touched.
    pub fn process(&mut self) -> Result<Responses<Tr::Response>, PitError> {
        let concurrency = self.config.concurrency()?;
        let policy = self.config.error_policy()?;
        let requests = self.requests.take().ok_or(PitError::AlreadyProcessed)?;

        let transport = Arc::clone(&self.transport);
        let config = Arc::clone(&self.config);
        let tasks = requests.enumerate().map(move |(index, descriptor)| {
            adapt(index, descriptor, Arc::clone(&transport), Arc::clone(&config))
        });
        let pool = Pool::with_concurrency(tasks, concurrency);

        let (handle, runtime) = driver_runtime()?;
        let (tx, rx) = mpsc::channel(SETTLEMENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        tracing::debug!(
            concurrency = concurrency.get(),
            policy = %policy,
            owns_runtime = runtime.is_some(),
            "Starting response bridge"
        );

        let driver = Abortable::new(drive(pool, policy, tx), abort_registration);
        let join_handle = handle.spawn(async move {
            if driver.await.is_err() {
                tracing::debug!("Response driver aborted");
            }
        });

        Ok(Responses::new(rx, join_handle, abort_handle, handle, runtime))
    }
}

impl<Tr: Transport> fmt::Debug for Pit<Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pit")
            .field("config", &self.config)
            .field("processed", &self.requests.is_none())
            .finish_non_exhaustive()
    }
}

fn driver_runtime() -> Result<(Handle, Option<Runtime>), PitError> {
    if let Ok(handle) = Handle::try_current() {
        return Ok((handle, None));
    }
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(DRIVER_THREAD_NAME)
        .enable_all()
        .build()
        .map_err(PitError::Runtime)?;
    Ok((runtime.handle().clone(), Some(runtime)))
}

/// Await the pool's aggregate completion, surfacing every settlement.
async fn drive<S, F, T>(pool: Pool<S>, policy: ErrorPolicy, tx: mpsc::Sender<Signal<T>>)
where
    S: Stream<Item = F>,
    F: FnOnce() -> BoxFuture<'static, Result<T, PitError>>,
{
    let hook_tx = tx.clone();
    let outcome = pool
        .run(move |index, outcome| surface(hook_tx.clone(), policy, index, outcome))
        .await;

    match outcome {
        Ok(()) | Err(PitError::Cancelled) => {}
        Err(e) => {
            tracing::debug!(error = %e, "Pool stopped on failure");
            // The consumer may already be gone.
            let _ = tx.send(Signal::Failed(e)).await;
        }
    }
}

/// Completion hook: hand one settlement to the consumer and wait until it asks
/// for the next element.
///
/// Under [`ErrorPolicy::FailFast`] a failure is returned to the pool instead,
/// which ends the run.
async fn surface<T>(
    tx: mpsc::Sender<Signal<T>>,
    policy: ErrorPolicy,
    index: usize,
    outcome: Result<T, PitError>,
) -> Result<(), PitError> {
    if outcome.is_err() && policy == ErrorPolicy::FailFast {
        return outcome.map(drop);
    }
    if let Err(e) = &outcome {
        tracing::debug!(index, error = %e, "Operation failed; continuing");
    }

    let (resume_tx, resume_rx) = oneshot::channel();
    let signal = Signal::Settled {
        index,
        outcome,
        resume: resume_tx,
    };
    if tx.send(signal).await.is_err() {
        return Err(PitError::Cancelled);
    }

    tracing::trace!(index, "Suspended until next pull");
    resume_rx.await.map_err(|_| PitError::Cancelled)
}
