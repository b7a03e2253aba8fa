//! Run command implementation

use anyhow::{Context, Result};
use std::io::Write;
use std::time::{Duration, Instant};

use jobpool_workflow::{PoolConfig, RunSummary};

/// The per-job work: doubles the job value.
pub fn double(job: u64) -> u64 {
    job * 2
}

/// Run the pool over jobs `1..=num_jobs`, printing results to stdout
pub fn run(num_jobs: u64, num_workers: usize, delay_ms: u64) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let start_time = Instant::now();
    let summary = run_to_writer(num_jobs, num_workers, delay_ms, &mut out)?;
    out.flush()?;

    log::info!(
        "Processed {} jobs with {} workers in {:.2?}",
        summary.results_collected,
        summary.workers.len(),
        start_time.elapsed()
    );
    for report in &summary.workers {
        log::debug!("worker {} processed {} jobs", report.worker_id, report.jobs_processed);
    }
    Ok(())
}

/// Runs the pool and writes one `Result: <value>` line per collected result to `out`.
pub fn run_to_writer(
    num_jobs: u64,
    num_workers: usize,
    delay_ms: u64,
    out: &mut impl Write,
) -> Result<RunSummary> {
    let config = PoolConfig::new(num_workers).with_job_delay(Duration::from_millis(delay_ms));

    // Write errors are kept aside so that the collector keeps draining.
    let mut write_error = None;
    let summary = jobpool_workflow::run(config, 1..=num_jobs, double, |result| {
        if write_error.is_none()
            && let Err(e) = writeln!(out, "Result: {result}")
        {
            write_error = Some(e);
        }
    })
    .with_context(|| format!("Worker pool run failed ({num_jobs} jobs, {num_workers} workers)"))?;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write results");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobpool_common::error::{Error, ErrorKind};

    #[test]
    fn test_run_prints_one_line_per_job() {
        let mut out = Vec::new();
        let summary = run_to_writer(10, 3, 0, &mut out).unwrap();
        assert_eq!(summary.results_collected, 10);

        let text = String::from_utf8(out).unwrap();
        let mut values: Vec<u64> = text
            .lines()
            .map(|line| line.strip_prefix("Result: ").unwrap().parse().unwrap())
            .collect();
        values.sort();
        assert_eq!(values, (1..=10).map(double).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_without_jobs_prints_nothing() {
        let mut out = Vec::new();
        let summary = run_to_writer(0, 3, 0, &mut out).unwrap();
        assert_eq!(summary.results_collected, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut out = Vec::new();
        let err = run_to_writer(5, 0, 0, &mut out).unwrap_err();
        let pool_err = err.downcast_ref::<Error>().expect("pool error");
        assert!(matches!(pool_err.kind(), ErrorKind::InvalidArgument { .. }));
    }
}
