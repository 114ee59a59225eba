//! Concurrency-safe in-memory job store.
//!
//! Layout mirrors a mailbox result map:
//! - `RwLock` over the id map (read-heavy, write only on create)
//! - one `Mutex` per record so mutations of a single job never interleave
//! - a FIFO of unclaimed ids so each job is handed to exactly one worker

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::QueueError;
use super::job::{Job, JobRecord, JobState};
use super::payload::Payload;
use crate::util::clock::now_ms;

/// Message stored on a failed job when the caller supplies none.
const DEFAULT_FAILURE_MESSAGE: &str = "job failed";

type RecordCell = Arc<Mutex<JobRecord>>;

/// Per-state job tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Jobs waiting for a worker.
    pub queued: usize,
    /// Jobs currently running.
    pub processing: usize,
    /// Jobs that terminated with an error.
    pub failed: usize,
    /// Jobs that terminated successfully.
    pub finished: usize,
}

impl StateCounts {
    /// Total number of jobs counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.queued + self.processing + self.failed + self.finished
    }

    /// Number of jobs in a terminal state.
    #[must_use]
    pub const fn terminal(&self) -> usize {
        self.failed + self.finished
    }
}

/// Owner of every job record for the lifetime of the queue.
///
/// Records are never removed. All reads hand out copies, so no caller keeps a
/// reference into a record across concurrent mutation.
pub struct JobStore {
    jobs: RwLock<HashMap<String, RecordCell>>,
    pending: Mutex<VecDeque<String>>,
    work_ready: Notify,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            work_ready: Notify::new(),
        }
    }

    fn record(&self, id: &str) -> Option<RecordCell> {
        self.jobs.read().get(id).cloned()
    }

    /// Insert a new queued job with the marshaled `initial` payload.
    ///
    /// The payload is encoded before the store is touched, so a failed encode
    /// leaves no trace.
    ///
    /// # Errors
    ///
    /// - `QueueError::Serialization` if `initial` cannot be marshaled
    /// - `QueueError::DuplicateId` if `id` is already present
    pub fn create<D: Payload + ?Sized>(&self, id: &str, initial: &D) -> Result<(), QueueError> {
        let payload = initial.marshal()?;
        {
            let mut jobs = self.jobs.write();
            match jobs.entry(id.to_owned()) {
                Entry::Occupied(_) => return Err(QueueError::DuplicateId(id.to_owned())),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(Mutex::new(JobRecord::new(
                        id.to_owned(),
                        payload,
                        now_ms(),
                    ))));
                }
            }
            // Enqueue under the map lock so claim order follows creation order.
            self.pending.lock().push_back(id.to_owned());
        }
        self.work_ready.notify_one();
        debug!(job_id = id, "Job created");
        Ok(())
    }

    /// Snapshot of the job, or `None` if no job has this id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Job> {
        self.record(id).map(|cell| cell.lock().snapshot())
    }

    /// Decode the current payload of a job into `target`.
    ///
    /// # Errors
    ///
    /// - `QueueError::NotFound` if no job has this id
    /// - `QueueError::Serialization` if `target` rejects the bytes
    pub fn read_payload_into<D: Payload + ?Sized>(
        &self,
        id: &str,
        target: &mut D,
    ) -> Result<(), QueueError> {
        let cell = self
            .record(id)
            .ok_or_else(|| QueueError::NotFound(id.to_owned()))?;
        // Copy out so decoding runs without holding the record lock.
        let bytes = cell.lock().payload.clone();
        target.unmarshal(&bytes)?;
        Ok(())
    }

    /// Current state of a job.
    pub(crate) fn state(&self, id: &str) -> Option<JobState> {
        self.record(id).map(|cell| cell.lock().state)
    }

    /// Failure description of a job; empty unless it failed.
    pub(crate) fn error(&self, id: &str) -> Option<String> {
        self.record(id).map(|cell| cell.lock().error.clone())
    }

    /// Move a job to `new_state`, recording `error` when it fails.
    ///
    /// Entering `Failed` without a message stores a generic one; entering any
    /// other state clears the error.
    pub(crate) fn set_state(
        &self,
        id: &str,
        new_state: JobState,
        error: Option<String>,
    ) -> Result<(), QueueError> {
        let cell = self
            .record(id)
            .ok_or_else(|| QueueError::NotFound(id.to_owned()))?;
        let mut record = cell.lock();
        if !record.state.can_transition_to(new_state) {
            return Err(QueueError::InvalidTransition {
                id: id.to_owned(),
                from: record.state,
                to: new_state,
            });
        }
        record.state = new_state;
        record.error = if new_state == JobState::Failed {
            error
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_owned())
        } else {
            String::new()
        };
        match new_state {
            JobState::Processing => record.started_at_ms = Some(now_ms()),
            JobState::Finished | JobState::Failed => record.finished_at_ms = Some(now_ms()),
            JobState::Queued => {}
        }
        Ok(())
    }

    /// Replace the payload of a job, unless `cancel` has fired.
    ///
    /// The token is checked on entry and again under the record lock right
    /// before the write; on any error the record is unchanged.
    pub(crate) fn set_payload<D: Payload + ?Sized>(
        &self,
        cancel: &CancellationToken,
        id: &str,
        payload: &D,
    ) -> Result<(), QueueError> {
        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        let bytes = payload.marshal()?;
        let cell = self
            .record(id)
            .ok_or_else(|| QueueError::NotFound(id.to_owned()))?;
        let mut record = cell.lock();
        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        record.payload = bytes;
        Ok(())
    }

    /// Claim the oldest queued job, moving it to `Processing`.
    ///
    /// Each id is popped from the pending FIFO exactly once, so no two callers
    /// can claim the same job.
    pub(crate) fn claim_next(&self) -> Option<String> {
        loop {
            let id = self.pending.lock().pop_front()?;
            let Some(cell) = self.record(&id) else {
                continue;
            };
            let mut record = cell.lock();
            if record.state != JobState::Queued {
                continue;
            }
            record.state = JobState::Processing;
            record.started_at_ms = Some(now_ms());
            drop(record);
            return Some(id);
        }
    }

    /// Resolves when a job has been created since the last wake-up.
    pub(crate) async fn work_available(&self) {
        self.work_ready.notified().await;
    }

    /// Number of jobs not yet claimed by a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of jobs ever created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Whether no job has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Tally jobs by state.
    #[must_use]
    pub fn counts(&self) -> StateCounts {
        let jobs = self.jobs.read();
        let mut counts = StateCounts::default();
        for cell in jobs.values() {
            match cell.lock().state {
                JobState::Queued => counts.queued += 1,
                JobState::Processing => counts.processing += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Finished => counts.finished += 1,
            }
        }
        counts
    }
}
