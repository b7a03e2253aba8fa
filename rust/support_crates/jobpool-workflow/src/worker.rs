//! The worker loop: claim a job, transform it, emit the result, repeat until the
//! job queue is exhausted.

use std::{fmt::Debug, sync::Arc, thread, time::Duration};

use jobpool_common::{Result, error::Error};

use crate::{barrier::BarrierGuard, queue::BoundedQueue};

/// State shared by all workers of one pool run.
///
/// The context is constructed fresh for every run and handed to each worker behind
/// an `Arc`; there is no process-wide state.
pub struct WorkerContext<J, R, F> {
    jobs: BoundedQueue<J>,
    results: BoundedQueue<R>,
    transform: F,
    job_delay: Option<Duration>,
}

impl<J, R, F> WorkerContext<J, R, F>
where
    F: Fn(J) -> R,
{
    pub fn new(
        jobs: BoundedQueue<J>,
        results: BoundedQueue<R>,
        transform: F,
        job_delay: Option<Duration>,
    ) -> Self {
        WorkerContext {
            jobs,
            results,
            transform,
            job_delay,
        }
    }
}

/// Outcome of one worker that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    /// 1-based worker id.
    pub worker_id: usize,
    /// Number of jobs this worker claimed and turned into results.
    pub jobs_processed: usize,
}

/// A single worker of a pool.
///
/// The worker owns its [`BarrierGuard`] for its whole lifetime, so its
/// participant slot is released when [`run`](Self::run) returns or unwinds.
pub struct Worker<J, R, F> {
    id: usize,
    context: Arc<WorkerContext<J, R, F>>,
    _guard: BarrierGuard,
}

impl<J, R, F> Worker<J, R, F>
where
    J: Debug,
    F: Fn(J) -> R,
{
    pub fn new(id: usize, context: Arc<WorkerContext<J, R, F>>, guard: BarrierGuard) -> Self {
        Worker {
            id,
            context,
            _guard: guard,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs the claim loop until the job queue is closed and drained.
    ///
    /// Every claimed job yields exactly one result on the result queue. Returns an
    /// error only if the result queue was closed underneath the worker.
    pub fn run(self) -> Result<WorkerReport> {
        log::debug!("worker {} started", self.id);

        let context = &self.context;
        let mut jobs_processed = 0;
        while let Some(job) = context.jobs.claim() {
            log::info!("Worker {} processing job {:?}", self.id, job);

            if let Some(delay) = context.job_delay {
                thread::sleep(delay);
            }

            let result = (context.transform)(job);
            if context.results.enqueue(result).is_err() {
                log::error!(
                    "worker {}: result queue closed while the worker was still running",
                    self.id
                );
                return Err(Error::queue_closed("results"));
            }
            jobs_processed += 1;
        }

        log::debug!("worker {} exiting after {} jobs", self.id, jobs_processed);
        Ok(WorkerReport {
            worker_id: self.id,
            jobs_processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::CompletionBarrier;
    use jobpool_common::error::ErrorKind;

    fn double(x: u32) -> u32 {
        x * 2
    }

    fn context(
        jobs: &BoundedQueue<u32>,
        results: &BoundedQueue<u32>,
    ) -> Arc<WorkerContext<u32, u32, fn(u32) -> u32>> {
        Arc::new(WorkerContext::new(
            jobs.clone(),
            results.clone(),
            double as fn(u32) -> u32,
            None,
        ))
    }

    #[test]
    fn test_worker_drains_closed_queue() {
        let jobs = BoundedQueue::new(4);
        let results = BoundedQueue::new(4);
        for i in 1..=4 {
            jobs.enqueue(i).unwrap();
        }
        jobs.close();

        let barrier = CompletionBarrier::new();
        let worker = Worker::new(1, context(&jobs, &results), barrier.register());
        assert_eq!(worker.id(), 1);

        let report = worker.run().unwrap();
        assert_eq!(
            report,
            WorkerReport {
                worker_id: 1,
                jobs_processed: 4
            }
        );
        assert_eq!(barrier.outstanding(), 0);

        results.close();
        assert_eq!(results.drain().collect::<Vec<_>>(), vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_worker_exits_on_empty_closed_queue() {
        let jobs = BoundedQueue::new(1);
        let results = BoundedQueue::new(1);
        jobs.close();

        let barrier = CompletionBarrier::new();
        let report = Worker::new(7, context(&jobs, &results), barrier.register())
            .run()
            .unwrap();
        assert_eq!(report.jobs_processed, 0);
        assert_eq!(barrier.outstanding(), 0);
        assert!(results.is_empty());
    }

    #[test]
    fn test_worker_reports_closed_result_queue() {
        let jobs = BoundedQueue::new(1);
        let results = BoundedQueue::new(1);
        jobs.enqueue(1).unwrap();
        jobs.close();
        results.close();

        let barrier = CompletionBarrier::new();
        let err = Worker::new(1, context(&jobs, &results), barrier.register())
            .run()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::QueueClosed { .. }));
        // The guard is released on the error path as well.
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_worker_releases_barrier_on_panic() {
        let jobs = BoundedQueue::new(1);
        let results = BoundedQueue::<u32>::new(1);
        jobs.enqueue(13u32).unwrap();
        jobs.close();

        let barrier = CompletionBarrier::new();
        let context = Arc::new(WorkerContext::new(
            jobs.clone(),
            results.clone(),
            |x: u32| -> u32 { panic!("cannot process job {x}") },
            None,
        ));
        let worker = Worker::new(1, context, barrier.register());

        let handle = std::thread::spawn(move || worker.run());
        assert!(handle.join().is_err());
        assert_eq!(barrier.outstanding(), 0);
    }
}
