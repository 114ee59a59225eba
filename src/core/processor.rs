//! Processing capability supplied by the embedding program.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::{AppResult, QueueError};
use super::job::JobState;
use super::payload::Payload;
use super::store::JobStore;

/// Access to a claimed job from inside a [`Processor`].
///
/// The handle only reaches the job through the store, so reads always see the
/// latest payload and writes are serialized with every other mutation.
pub struct JobHandle {
    store: Arc<JobStore>,
    id: String,
}

impl JobHandle {
    pub(crate) const fn new(store: Arc<JobStore>, id: String) -> Self {
        Self { store, id }
    }

    /// Job identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state of the job. `Processing` for as long as the processor runs.
    #[must_use]
    pub fn state(&self) -> Option<JobState> {
        self.store.state(&self.id)
    }

    /// Failure description of the job. Empty while it is being processed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.store.error(&self.id)
    }

    /// Decode the current payload into `data`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Serialization` if `data` rejects the bytes.
    pub fn get_data<D: Payload + ?Sized>(&self, data: &mut D) -> Result<(), QueueError> {
        self.store.read_payload_into(&self.id, data)
    }

    /// Replace the job payload with `data`.
    ///
    /// # Errors
    ///
    /// - `QueueError::Cancelled` if `cancel` fired before the write landed
    /// - `QueueError::Serialization` if `data` cannot be marshaled
    pub fn set_data<D: Payload + ?Sized>(
        &self,
        cancel: &CancellationToken,
        data: &D,
    ) -> Result<(), QueueError> {
        self.store.set_payload(cancel, &self.id, data)
    }
}

/// Business logic run by workers against each claimed job.
///
/// Returning `Ok(())` marks the job finished; returning an error marks it
/// failed with the error's description. Implementations should watch `cancel`
/// and return promptly once it fires; the dispatcher waits for them either way.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_job_queue::core::{AppResult, JobHandle, Processor};
/// use tokio_util::sync::CancellationToken;
///
/// struct Doubler;
///
/// #[async_trait]
/// impl Processor for Doubler {
///     async fn process(&self, cancel: &CancellationToken, job: &JobHandle) -> AppResult<()> {
///         let mut data = Numbers::default();
///         job.get_data(&mut data)?;
///         data.value *= 2;
///         job.set_data(cancel, &data)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Process one job.
    async fn process(&self, cancel: &CancellationToken, job: &JobHandle) -> AppResult<()>;
}

#[async_trait]
impl<T: Processor + ?Sized> Processor for Arc<T> {
    async fn process(&self, cancel: &CancellationToken, job: &JobHandle) -> AppResult<()> {
        (**self).process(cancel, job).await
    }
}
