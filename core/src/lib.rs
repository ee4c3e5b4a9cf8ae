//! Pull-based response bridge over a bounded-concurrency pool.
//!
//! # Architecture
//!
//! ```text
//! source ──adapt──> Pool (≤ N in flight) ──hook──> channel(1) ──> Responses
//!                        ^                                            │
//!                        └──────────── resume on next pull ───────────┘
//! ```
//!
//! - [`Descriptor`] - One unit of work: a raw request, a ready handle, or a factory
//! - [`Transport`] - Turns raw requests into pending results
//! - [`Pit`] - Owns the source and starts the run
//! - [`Responses`] - Blocking iterator over results in settlement order
//! - [`ResponseStream`] - The same sequence as a `Stream`
//!
//! The source is handed to the pool as a lazy adapter, so it is pulled only as
//! fast as slots free up. Each settlement is intercepted by a completion hook
//! running inside the pool; the hook passes the value to the consumer and then
//! waits until the consumer asks for the next element. While it waits, the pool
//! neither observes further settlements nor admits new work, which keeps the
//! consumer in control of the pace.
//!
//! # Error Handling
//!
//! Failures are yielded as `Err` elements in the position where they settle.
//! With the default `fail_fast` policy the first failure is also the last
//! element; with `on_error = "continue"` the run carries on.

mod error;
mod pit;
mod responses;
mod source;
mod transport;

pub use error::PitError;
pub use pit::Pit;
pub use responses::{ResponseStream, Responses};
pub use source::Descriptor;
pub use transport::{Handle, Transport};

pub use snakepit_types::{ErrorPolicy, ExecutionConfig};
