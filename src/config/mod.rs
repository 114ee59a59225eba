//! Configuration models for the queue and its worker pool.

pub mod queue;

pub use queue::QueueConfig;
