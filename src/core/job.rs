//! Job records, read-only snapshots, and the job state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::payload::{Payload, PayloadError};

/// Lifecycle state of a job.
///
/// Jobs move strictly forward: `Queued -> Processing -> {Finished | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted and waiting for a worker.
    Queued,
    /// Claimed by a worker and running.
    Processing,
    /// Terminated with an error; see [`Job::error`].
    Failed,
    /// Terminated successfully.
    Finished,
}

impl JobState {
    /// Whether no further transitions can occur from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Finished)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Finished | Self::Failed)
        )
    }

    /// Lowercase name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable record owned by the job store. Always accessed under its mutex.
#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub id: String,
    pub state: JobState,
    pub payload: Vec<u8>,
    pub error: String,
    pub created_at_ms: u128,
    pub started_at_ms: Option<u128>,
    pub finished_at_ms: Option<u128>,
}

impl JobRecord {
    pub fn new(id: String, payload: Vec<u8>, created_at_ms: u128) -> Self {
        Self {
            id,
            state: JobState::Queued,
            payload,
            error: String::new(),
            created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }

    pub fn snapshot(&self) -> Job {
        Job {
            id: self.id.clone(),
            state: self.state,
            payload: self.payload.clone(),
            error: self.error.clone(),
            created_at_ms: self.created_at_ms,
            started_at_ms: self.started_at_ms,
            finished_at_ms: self.finished_at_ms,
        }
    }
}

/// Point-in-time copy of a job, returned by the client facade.
///
/// A snapshot owns its data; later changes to the stored job are not visible
/// through it. Fetch the job again to observe progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: String,
    state: JobState,
    payload: Vec<u8>,
    error: String,
    created_at_ms: u128,
    started_at_ms: Option<u128>,
    finished_at_ms: Option<u128>,
}

impl Job {
    /// Job identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// State at the time of the snapshot.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Failure description. Empty unless the job is [`JobState::Failed`].
    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Decode the payload into `data`.
    ///
    /// # Errors
    ///
    /// Returns the error reported by `data.unmarshal`.
    pub fn get_data<D: Payload + ?Sized>(&self, data: &mut D) -> Result<(), PayloadError> {
        data.unmarshal(&self.payload)
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the job had reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Creation time in milliseconds since the epoch.
    #[must_use]
    pub const fn created_at_ms(&self) -> u128 {
        self.created_at_ms
    }

    /// Time a worker claimed the job, if it has been claimed.
    #[must_use]
    pub const fn started_at_ms(&self) -> Option<u128> {
        self.started_at_ms
    }

    /// Time the job reached a terminal state, if it has.
    #[must_use]
    pub const fn finished_at_ms(&self) -> Option<u128> {
        self.finished_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobState::Queued.can_transition_to(JobState::Processing));
        assert!(JobState::Processing.can_transition_to(JobState::Finished));
        assert!(JobState::Processing.can_transition_to(JobState::Failed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!JobState::Queued.can_transition_to(JobState::Finished));
        assert!(!JobState::Queued.can_transition_to(JobState::Failed));
        assert!(!JobState::Queued.can_transition_to(JobState::Queued));
        assert!(!JobState::Processing.can_transition_to(JobState::Queued));
        assert!(!JobState::Processing.can_transition_to(JobState::Processing));
        for terminal in [JobState::Finished, JobState::Failed] {
            for next in [
                JobState::Queued,
                JobState::Processing,
                JobState::Finished,
                JobState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(
            serde_json::to_string(&JobState::Processing).unwrap(),
            "\"processing\""
        );
        let state: JobState = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(state, JobState::Finished);
        assert_eq!(JobState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut record = JobRecord::new("j-0".into(), b"{}".to_vec(), 10);
        let snapshot = record.snapshot();
        record.state = JobState::Processing;
        record.payload = b"[]".to_vec();
        assert_eq!(snapshot.state(), JobState::Queued);
        assert_eq!(snapshot.payload_bytes(), b"{}");
        assert_eq!(snapshot.error(), "");
        assert!(!snapshot.is_terminal());
        assert_eq!(snapshot.created_at_ms(), 10);
        assert_eq!(snapshot.started_at_ms(), None);
    }
}
