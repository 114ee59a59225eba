//! Client facade for submitting and polling jobs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::QueueError;
use super::job::Job;
use super::payload::Payload;
use super::store::{JobStore, StateCounts};

/// Entry point for pushing jobs into the queue and reading their progress.
///
/// Cheap to clone; every clone talks to the same store.
#[derive(Clone)]
pub struct Client {
    store: Arc<JobStore>,
}

impl Client {
    pub(crate) const fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Queue a job under `id` with `initial` as its payload.
    ///
    /// # Errors
    ///
    /// - `QueueError::Cancelled` if `cancel` has already fired
    /// - `QueueError::DuplicateId` if `id` is taken
    /// - `QueueError::Serialization` if `initial` cannot be marshaled
    pub fn create_job<D: Payload + ?Sized>(
        &self,
        cancel: &CancellationToken,
        id: &str,
        initial: &D,
    ) -> Result<(), QueueError> {
        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        self.store.create(id, initial)
    }

    /// Queue a job under a freshly generated id and return that id.
    ///
    /// # Errors
    ///
    /// Same as [`Client::create_job`].
    pub fn submit<D: Payload + ?Sized>(
        &self,
        cancel: &CancellationToken,
        initial: &D,
    ) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        self.create_job(cancel, &id, initial)?;
        Ok(id)
    }

    /// Fetch a snapshot of a job.
    ///
    /// Returns `Ok(None)` when no job has this id; a missing job is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Cancelled` if `cancel` has already fired.
    pub fn get_job(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Option<Job>, QueueError> {
        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        Ok(self.store.get(id))
    }

    /// Tally of jobs by state.
    #[must_use]
    pub fn stats(&self) -> StateCounts {
        self.store.counts()
    }
}
