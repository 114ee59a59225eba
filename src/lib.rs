//! # Prometheus Job Queue
//!
//! An in-memory job queue with a bounded worker pool and cooperative
//! cancellation.
//!
//! Clients submit jobs carrying an opaque, serializable payload. A dispatcher
//! runs a fixed number of workers that claim queued jobs, hand them to a
//! caller-supplied [`core::Processor`], and record whether each job finished or
//! failed along with its resulting payload.
//!
//! ## Key Features
//!
//! - **Exactly-once claims**: every queued job is handed to one worker only
//! - **Bounded parallelism**: `run(cancel, n)` never executes more than `n` jobs at once
//! - **Clean shutdown**: cancelling stops intake; `run` returns after in-flight jobs end
//! - **Failure isolation**: errors, panics, and timeouts fail only their own job
//! - **Opaque payloads**: any type implementing [`core::Payload`] can be carried
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prometheus_job_queue::core::{AppResult, JobHandle, JobState, Processor};
//! use tokio_util::sync::CancellationToken;
//!
//! let (client, dispatcher) = prometheus_job_queue::new(MyProcessor);
//! let cancel = CancellationToken::new();
//!
//! client.create_job(&cancel, "j-0", &MyData { total: 100 })?;
//!
//! let worker_cancel = cancel.clone();
//! let workers = tokio::spawn(async move { dispatcher.run(worker_cancel, 4).await });
//!
//! // Poll until the job is terminal.
//! let job = client.get_job(&cancel, "j-0")?.expect("job exists");
//! if job.state() == JobState::Failed {
//!     eprintln!("{}", job.error());
//! }
//!
//! cancel.cancel();
//! workers.await??;
//! ```
//!
//! For complete examples, see:
//! - `tests/queue_scenarios_test.rs` - End-to-end scenarios
//! - `tests/pi_estimation_test.rs` - Monte-Carlo workload driven through the queue

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Queue engine: job records, store, processors, and the worker pool.
pub mod core;
/// Configuration models for the queue and its workers.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::core::{Client, Dispatcher, JobStore, Processor};

/// Create a queue with default configuration.
///
/// Returns the client used to push and poll jobs, and the dispatcher that runs
/// them with `processor`. Both share the same job store.
pub fn new<P: Processor>(processor: P) -> (Client, Dispatcher<P>) {
    let store = Arc::new(JobStore::new());
    let client = Client::new(Arc::clone(&store));
    let dispatcher = Dispatcher::new(store, processor, QueueConfig::default());
    (client, dispatcher)
}
