//! Queue and worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`QueueConfig::worker_count`].
pub const ENV_WORKER_COUNT: &str = "JOBQ_WORKER_COUNT";
/// Environment variable overriding [`QueueConfig::idle_poll_interval_ms`].
pub const ENV_IDLE_POLL_MS: &str = "JOBQ_IDLE_POLL_MS";
/// Environment variable setting [`QueueConfig::job_timeout_secs`].
pub const ENV_JOB_TIMEOUT_SECS: &str = "JOBQ_JOB_TIMEOUT_SECS";

const DEFAULT_IDLE_POLL_MS: u64 = 50;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Workers launched by `Dispatcher::run_configured`.
    pub worker_count: usize,
    /// How long an idle worker sleeps before re-checking for work when no
    /// wake-up arrives.
    pub idle_poll_interval_ms: u64,
    /// Per-job time limit. Jobs exceeding it are marked failed.
    pub job_timeout_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            idle_poll_interval_ms: DEFAULT_IDLE_POLL_MS,
            job_timeout_secs: None,
        }
    }
}

impl QueueConfig {
    /// Default configuration: one worker per CPU, no job timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the idle poll interval in milliseconds.
    #[must_use]
    pub const fn with_idle_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.idle_poll_interval_ms = interval_ms;
        self
    }

    /// Set the per-job timeout in seconds.
    #[must_use]
    pub const fn with_job_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.job_timeout_secs = Some(timeout_secs);
        self
    }

    /// Idle poll interval as a `Duration`.
    #[must_use]
    pub const fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Per-job timeout as a `Duration`.
    #[must_use]
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.idle_poll_interval_ms == 0 {
            return Err("idle_poll_interval_ms must be greater than 0".into());
        }
        if self.job_timeout_secs == Some(0) {
            return Err("job_timeout_secs must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse queue configuration from a JSON string and validate.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading a `.env` file first
    /// if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or failed validation.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or failed validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_WORKER_COUNT) {
            cfg.worker_count = parse_var(ENV_WORKER_COUNT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_IDLE_POLL_MS) {
            cfg.idle_poll_interval_ms = parse_var(ENV_IDLE_POLL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_JOB_TIMEOUT_SECS) {
            cfg.job_timeout_secs = Some(parse_var(ENV_JOB_TIMEOUT_SECS, &raw)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("environment variable {name} has invalid value `{raw}`"))
}
