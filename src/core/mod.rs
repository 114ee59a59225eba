//! Queue engine: job records, the job store, and the worker pool.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod payload;
pub mod processor;
pub mod store;

pub use client::Client;
pub use dispatcher::{Dispatcher, DispatcherStats, ABORTED_MESSAGE};
pub use error::{AppResult, QueueError};
pub use job::{Job, JobState};
pub use payload::{Payload, PayloadError};
pub use processor::{JobHandle, Processor};
pub use store::{JobStore, StateCounts};
