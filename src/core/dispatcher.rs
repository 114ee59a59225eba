//! Worker pool that drains the job store.
//!
//! `Dispatcher::run` launches a fixed number of tokio tasks on a `JoinSet`.
//! Each task loops claim -> process -> transition until the cancellation token
//! fires, and `run` joins every task before returning.
//!
//! # Design
//!
//! - **Exactly-once claims**: the store pops each queued id for one worker only
//! - **No busy polling**: idle workers park on the store's wake-up, with a
//!   slow poll as a fallback
//! - **Failure isolation**: processor errors, panics, and timeouts are recorded
//!   on the job and never stop other workers

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::QueueError;
use super::job::JobState;
use super::processor::{JobHandle, Processor};
use super::store::JobStore;
use crate::config::QueueConfig;

/// Statistics about dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Workers currently running (0 when `run` is not active).
    pub worker_count: usize,
    /// Jobs currently inside a processor.
    pub active_jobs: u64,
    /// Jobs claimed since the dispatcher was created.
    pub claimed_jobs: u64,
    /// Jobs that ended `Finished`.
    pub finished_jobs: u64,
    /// Jobs that ended `Failed`.
    pub failed_jobs: u64,
}

/// Internal counters for dispatcher statistics (thread-safe).
#[derive(Debug, Default)]
struct DispatchCounters {
    workers: AtomicUsize,
    active_jobs: AtomicU64,
    claimed_jobs: AtomicU64,
    finished_jobs: AtomicU64,
    failed_jobs: AtomicU64,
}

impl DispatchCounters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            worker_count: self.workers.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            claimed_jobs: self.claimed_jobs.load(Ordering::Relaxed),
            finished_jobs: self.finished_jobs.load(Ordering::Relaxed),
            failed_jobs: self.failed_jobs.load(Ordering::Relaxed),
        }
    }
}

/// Error recorded on a claimed job whose worker was dropped mid-flight.
pub const ABORTED_MESSAGE: &str = "aborted: dispatcher dropped";

/// Resets the running worker count when `run` returns or is dropped.
struct RunningWorkers<'a>(&'a DispatchCounters);

impl Drop for RunningWorkers<'_> {
    fn drop(&mut self) {
        self.0.workers.store(0, Ordering::Relaxed);
    }
}

/// Held while a claimed job is in flight. Dropped while still armed, it fails
/// the job so an aborted worker never leaves it in `Processing`.
struct ClaimGuard<'a> {
    store: &'a JobStore,
    counters: &'a DispatchCounters,
    job_id: &'a str,
    armed: bool,
}

impl ClaimGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
        self.counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
        match self
            .store
            .set_state(self.job_id, JobState::Failed, Some(ABORTED_MESSAGE.to_owned()))
        {
            Ok(()) => warn!(job_id = %self.job_id, "Job aborted before completion"),
            Err(e) => error!(
                job_id = %self.job_id,
                error = %e,
                "Failed to record aborted job"
            ),
        }
    }
}

/// Runs queued jobs through a [`Processor`] with bounded parallelism.
pub struct Dispatcher<P: Processor> {
    store: Arc<JobStore>,
    processor: Arc<P>,
    config: QueueConfig,
    counters: Arc<DispatchCounters>,
}

impl<P: Processor> Dispatcher<P> {
    pub(crate) fn new(store: Arc<JobStore>, processor: P, config: QueueConfig) -> Self {
        Self {
            store,
            processor: Arc::new(processor),
            config,
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    /// Process queued jobs with `workers` concurrent workers until `cancel`
    /// fires.
    ///
    /// Once cancelled, workers stop claiming jobs; jobs already running are
    /// allowed to finish. Returns only after every worker has exited. Jobs
    /// still queued at that point stay queued.
    ///
    /// Individual job failures are recorded on the jobs and are not reported
    /// here.
    ///
    /// Dropping the returned future aborts the workers. Jobs they had claimed
    /// are marked `Failed` with [`ABORTED_MESSAGE`].
    ///
    /// # Errors
    ///
    /// - `QueueError::InvalidConfiguration` if `workers` is 0
    /// - `QueueError::Join` if a worker task panicked outside a processor
    pub async fn run(&self, cancel: CancellationToken, workers: usize) -> Result<(), QueueError> {
        if workers == 0 {
            return Err(QueueError::InvalidConfiguration(
                "worker count must be greater than 0".into(),
            ));
        }

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                store: Arc::clone(&self.store),
                processor: Arc::clone(&self.processor),
                counters: Arc::clone(&self.counters),
                cancel: cancel.clone(),
                idle_poll: self.config.idle_poll_interval(),
                job_timeout: self.config.job_timeout(),
            };
            pool.spawn(worker.run());
        }
        self.counters.workers.store(workers, Ordering::Relaxed);
        let _running = RunningWorkers(&self.counters);

        info!(
            worker_count = workers,
            pending = self.store.pending(),
            "Dispatcher started"
        );

        let mut join_failure = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task did not exit cleanly");
                join_failure.get_or_insert_with(|| e.to_string());
            }
        }

        info!(
            worker_count = workers,
            pending = self.store.pending(),
            "Dispatcher stopped"
        );

        join_failure.map_or(Ok(()), |e| Err(QueueError::Join(e)))
    }

    /// Like [`Dispatcher::run`] with the configured worker count.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::run`].
    pub async fn run_configured(&self, cancel: CancellationToken) -> Result<(), QueueError> {
        self.run(cancel, self.config.worker_count).await
    }

    /// Get current dispatcher statistics.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }

    /// Configuration this dispatcher was built with.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }
}

/// One execution unit of the pool. Owns clones of everything it touches so it
/// can run as an independent task.
struct Worker<P: Processor> {
    id: usize,
    store: Arc<JobStore>,
    processor: Arc<P>,
    counters: Arc<DispatchCounters>,
    cancel: CancellationToken,
    idle_poll: Duration,
    job_timeout: Option<Duration>,
}

impl<P: Processor> Worker<P> {
    async fn run(self) {
        debug!(worker_id = self.id, "Worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Some(job_id) = self.store.claim_next() {
                self.execute(job_id).await;
                continue;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = self.store.work_available() => {}
                () = tokio::time::sleep(self.idle_poll) => {}
            }
        }

        debug!(worker_id = self.id, "Worker exiting");
    }

    async fn execute(&self, job_id: String) {
        self.counters.claimed_jobs.fetch_add(1, Ordering::Relaxed);
        self.counters.active_jobs.fetch_add(1, Ordering::Relaxed);
        debug!(worker_id = self.id, job_id = %job_id, "Worker executing job");

        let handle = JobHandle::new(Arc::clone(&self.store), job_id);
        let guard = ClaimGuard {
            store: &self.store,
            counters: &self.counters,
            job_id: handle.id(),
            armed: true,
        };
        let outcome = self.invoke(&handle).await;
        guard.disarm();

        let (state, failure) = match outcome {
            Ok(()) => (JobState::Finished, None),
            Err(e) => (JobState::Failed, Some(e.to_string())),
        };

        match &failure {
            None => debug!(worker_id = self.id, job_id = %handle.id(), "Job finished"),
            Some(reason) => debug!(
                worker_id = self.id,
                job_id = %handle.id(),
                error = %reason,
                "Job failed"
            ),
        }

        if let Err(e) = self.store.set_state(handle.id(), state, failure) {
            error!(
                worker_id = self.id,
                job_id = %handle.id(),
                error = %e,
                "Failed to record job outcome"
            );
        }

        self.counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
        let outcome = if state == JobState::Finished {
            &self.counters.finished_jobs
        } else {
            &self.counters.failed_jobs
        };
        outcome.fetch_add(1, Ordering::Relaxed);
    }

    /// Run the processor, turning errors, panics, and timeouts into
    /// `QueueError::Processing`.
    async fn invoke(&self, handle: &JobHandle) -> Result<(), QueueError> {
        let call = AssertUnwindSafe(self.processor.process(&self.cancel, handle)).catch_unwind();

        let outcome = match self.job_timeout {
            Some(limit) => {
                if let Ok(outcome) = tokio::time::timeout(limit, call).await {
                    outcome
                } else {
                    warn!(
                        worker_id = self.id,
                        job_id = %handle.id(),
                        timeout = ?limit,
                        "Job timed out"
                    );
                    return Err(QueueError::Processing(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )));
                }
            }
            None => call.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(QueueError::Processing(format!("{e:#}"))),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(
                    worker_id = self.id,
                    job_id = %handle.id(),
                    reason = %reason,
                    "Processor panicked"
                );
                Err(QueueError::Processing(format!("processor panicked: {reason}")))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
