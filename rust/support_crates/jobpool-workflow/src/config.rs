use std::time::Duration;

use jobpool_common::{Result, verify_arg};

/// Default number of workers in a pool.
pub const DEFAULT_NUM_WORKERS: usize = 3;

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "jobpool-worker";

/// Configuration of a [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    num_workers: usize,
    job_delay: Option<Duration>,
    thread_name_prefix: String,
}

impl PoolConfig {
    /// Creates a configuration with `num_workers` workers and default settings
    /// otherwise.
    pub fn new(num_workers: usize) -> Self {
        PoolConfig {
            num_workers,
            ..Default::default()
        }
    }

    /// Sets the number of workers spawned by the pool.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Sets a delay that every worker waits before processing each job.
    ///
    /// The delay stands in for real work latency; it has no effect on the results.
    pub fn with_job_delay(mut self, job_delay: Duration) -> Self {
        self.job_delay = (!job_delay.is_zero()).then_some(job_delay);
        self
    }

    /// Sets the prefix of worker thread names. Worker `k` is named `<prefix>-<k>`.
    /// An empty prefix leaves the threads unnamed.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn job_delay(&self) -> Option<Duration> {
        self.job_delay
    }

    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    /// Returns the thread name of the 1-based worker `worker_id`, or an empty string
    /// when thread naming is disabled.
    pub fn thread_name(&self, worker_id: usize) -> String {
        if self.thread_name_prefix.is_empty() {
            String::new()
        } else {
            format!("{}-{}", self.thread_name_prefix, worker_id)
        }
    }

    /// Checks that the configuration describes a runnable pool.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(num_workers, self.num_workers >= 1);
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            num_workers: DEFAULT_NUM_WORKERS,
            job_delay: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}
