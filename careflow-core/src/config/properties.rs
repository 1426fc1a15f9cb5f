use careflow_common::prelude::*;
use serde::Deserialize;

/// Connection to the process engine's external-task API.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrokerProperties {
    /// Base URL of the engine REST API, e.g. `http://localhost:8080/engine-rest`
    pub base_url: String,
    /// Upper bound for one request to the engine.
    pub request_timeout_ms: u64,
    /// Long-polling window for fetch-and-lock. 0 disables long polling.
    pub async_response_timeout_ms: u64,
    /// Basic auth, both empty for anonymous access
    pub username: String,
    pub password: String,
}

impl Default for BrokerProperties {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/engine-rest".to_string(),
            request_timeout_ms: 30_000,
            async_response_timeout_ms: 0,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// How one worker claims and reports tasks.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkerProperties {
    pub worker_id: String,
    /// Tasks claimed per topic and poll.
    pub max_tasks: i32,
    /// Lease requested on every claim.
    pub lock_duration_ms: i64,
    /// Sleep after a cycle in which no topic yielded a task, and after a failed poll.
    pub idle_interval_ms: i64,
    /// Retry budget handed to the broker on business failures.
    pub retries: i32,
    pub retry_timeout_ms: i64,
}

impl Default for WorkerProperties {
    fn default() -> Self {
        Self {
            worker_id: "careflow-worker".to_string(),
            max_tasks: 1,
            lock_duration_ms: 30_000,
            idle_interval_ms: 5_000,
            retries: 3,
            retry_timeout_ms: 5_000,
        }
    }
}

impl WorkerProperties {
    pub fn validate(&self) -> CareResult<()> {
        if self.worker_id.trim().is_empty() {
            return str_err!(ConfigurationException, "worker_id must not be empty");
        }
        if self.max_tasks <= 0 {
            return fmt_err!(
                ConfigurationException,
                "max_tasks must be positive, got {}",
                self.max_tasks
            );
        }
        if self.lock_duration_ms <= 0 {
            return fmt_err!(
                ConfigurationException,
                "lock_duration_ms must be positive, got {}",
                self.lock_duration_ms
            );
        }
        if self.idle_interval_ms < 0 || self.retries < 0 || self.retry_timeout_ms < 0 {
            return str_err!(
                ConfigurationException,
                "idle_interval_ms, retries and retry_timeout_ms must not be negative"
            );
        }
        Ok(())
    }
}

/// Bounds for waiting on one remote job.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct JobPollerProperties {
    pub poll_interval_ms: i64,
    /// Wall-clock budget from job start; reaching it ends the wait as timed out.
    pub timeout_ms: i64,
    /// Lease extension requested while waiting, so the task outlives the job.
    pub lease_extension_ms: i64,
}

impl Default for JobPollerProperties {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            timeout_ms: 300_000,
            lease_extension_ms: 600_000,
        }
    }
}

impl JobPollerProperties {
    pub fn validate(&self) -> CareResult<()> {
        if self.poll_interval_ms <= 0 || self.timeout_ms <= 0 {
            return fmt_err!(
                ConfigurationException,
                "poll_interval_ms and timeout_ms must be positive, got {} and {}",
                self.poll_interval_ms,
                self.timeout_ms
            );
        }
        if self.lease_extension_ms < 0 {
            return str_err!(ConfigurationException, "lease_extension_ms must not be negative");
        }
        if self.lease_extension_ms > 0 && self.lease_extension_ms <= self.poll_interval_ms {
            return fmt_err!(
                ConfigurationException,
                "lease_extension_ms {} does not outlast poll_interval_ms {}",
                self.lease_extension_ms,
                self.poll_interval_ms
            );
        }
        Ok(())
    }
}
