//! Pool coordinator: spawns a fixed set of workers, feeds them jobs and closes the
//! result queue once every worker has exited.
//!
//! The coordinator moves through four states:
//!
//! 1. [`PoolState::Initialized`]: queues and completion barrier exist, no workers yet.
//! 2. [`PoolState::Running`]: all workers are spawned and claiming jobs; the
//!    coordinator submits jobs.
//! 3. [`PoolState::Draining`]: the job queue is closed and the closer thread waits
//!    for the completion barrier to reach zero.
//! 4. [`PoolState::Closed`]: the closer has closed the result queue.
//!
//! The result queue is closed by a dedicated closer thread, never by the thread that
//! drains it. Draining and closing on the same thread would block the drain forever
//! on a queue whose closer is itself waiting behind the drain.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
};

use jobpool_common::{Result, error::Error, verify_arg};

use crate::{
    barrier::CompletionBarrier,
    collector::Collector,
    config::PoolConfig,
    queue::BoundedQueue,
    worker::{Worker, WorkerContext, WorkerReport},
};

/// Lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PoolState {
    Initialized = 0,
    Running = 1,
    Draining = 2,
    Closed = 3,
}

impl PoolState {
    fn from_u8(value: u8) -> PoolState {
        match value {
            0 => PoolState::Initialized,
            1 => PoolState::Running,
            2 => PoolState::Draining,
            _ => PoolState::Closed,
        }
    }
}

/// Pool state shared between the coordinator and its closer thread.
#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        SharedState(Arc::new(AtomicU8::new(PoolState::Initialized as u8)))
    }

    fn get(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: PoolState) {
        log::debug!("pool state -> {state:?}");
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A spawned worker thread.
struct WorkerHandle {
    worker_id: usize,
    handle: thread::JoinHandle<Result<WorkerReport>>,
}

impl WorkerHandle {
    /// Joins the worker thread, turning a panic into [`Error::worker_panicked`].
    fn join(self) -> Result<WorkerReport> {
        match self.handle.join() {
            Ok(res) => res,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("worker {} panicked: {}", self.worker_id, message);
                Err(Error::worker_panicked(self.worker_id, message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A fixed-size pool of workers draining one job queue into one result queue.
///
/// A pool runs once: construct it, [`start`](Self::start) the workers,
/// [`submit`](Self::submit) jobs, then call
/// [`finish_submitting`](Self::finish_submitting) and drain the results from the
/// returned [`Completion`].
///
/// Dropping a pool before `finish_submitting` closes the job queue so that already
/// spawned workers exit.
pub struct WorkerPool<J, R> {
    config: PoolConfig,
    jobs: BoundedQueue<J>,
    results: BoundedQueue<R>,
    barrier: CompletionBarrier,
    state: SharedState,
    workers: Vec<WorkerHandle>,
    jobs_submitted: usize,
}

impl<J, R> WorkerPool<J, R>
where
    J: Debug + Send + 'static,
    R: Send + 'static,
{
    /// Creates a pool in the [`PoolState::Initialized`] state.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool configuration; must have at least one worker.
    /// * `capacity` - Capacity of both the job and the result queue; must be at
    ///   least 1. Sizing it to the number of jobs means submission never blocks.
    pub fn new(config: PoolConfig, capacity: usize) -> Result<Self> {
        config.validate()?;
        verify_arg!(capacity, capacity >= 1);

        Ok(WorkerPool {
            jobs: BoundedQueue::new(capacity),
            results: BoundedQueue::new(capacity),
            barrier: CompletionBarrier::new(),
            state: SharedState::new(),
            workers: Vec::with_capacity(config.num_workers()),
            jobs_submitted: 0,
            config,
        })
    }

    pub fn state(&self) -> PoolState {
        self.state.get()
    }

    /// Returns a handle to the result queue.
    pub fn results(&self) -> BoundedQueue<R> {
        self.results.clone()
    }

    /// Number of spawned workers that have not exited yet.
    pub fn outstanding_workers(&self) -> usize {
        self.barrier.outstanding()
    }

    pub fn jobs_submitted(&self) -> usize {
        self.jobs_submitted
    }

    /// Spawns the workers, each applying `transform` to the jobs it claims.
    ///
    /// Each worker is registered with the completion barrier before its thread is
    /// spawned. If spawning fails part way, the already spawned workers are left
    /// running and exit when the pool is dropped.
    pub fn start<F>(&mut self, transform: F) -> Result<()>
    where
        F: Fn(J) -> R + Send + Sync + 'static,
    {
        if self.state() != PoolState::Initialized {
            return Err(Error::invalid_operation("start: pool already started"));
        }

        let context = Arc::new(WorkerContext::new(
            self.jobs.clone(),
            self.results.clone(),
            transform,
            self.config.job_delay(),
        ));

        for worker_id in 1..=self.config.num_workers() {
            let worker = Worker::new(worker_id, context.clone(), self.barrier.register());

            let mut builder = thread::Builder::new();
            let name = self.config.thread_name(worker_id);
            if !name.is_empty() {
                builder = builder.name(name);
            }
            let handle = builder
                .spawn(move || worker.run())
                .map_err(|e| Error::io(format!("spawn worker {worker_id}"), e))?;
            self.workers.push(WorkerHandle { worker_id, handle });
        }

        self.state.set(PoolState::Running);
        Ok(())
    }

    /// Submits one job. Blocks while the job queue is full.
    pub fn submit(&mut self, job: J) -> Result<()> {
        if self.state() != PoolState::Running {
            return Err(Error::invalid_operation("submit: pool is not running"));
        }
        self.jobs.enqueue(job).map_err(|_| Error::queue_closed("jobs"))?;
        self.jobs_submitted += 1;
        Ok(())
    }

    /// Submits every job of `jobs` in order.
    pub fn submit_all(&mut self, jobs: impl IntoIterator<Item = J>) -> Result<()> {
        for job in jobs {
            self.submit(job)?;
        }
        Ok(())
    }

    /// Closes the job queue and hands result-queue closure to a dedicated closer
    /// thread.
    ///
    /// The closer moves the pool to [`PoolState::Draining`], waits for every worker
    /// to release the completion barrier, closes the result queue and moves the pool
    /// to [`PoolState::Closed`]. The caller drains results through the returned
    /// [`Completion`] concurrently with the closer.
    pub fn finish_submitting(mut self) -> Result<Completion<R>> {
        if self.state() != PoolState::Running {
            return Err(Error::invalid_operation("finish_submitting: pool is not running"));
        }

        self.jobs.close();
        log::debug!("job queue closed after {} jobs", self.jobs_submitted);

        let workers = std::mem::take(&mut self.workers);
        let barrier = self.barrier.clone();
        let results = self.results.clone();
        let state = self.state.clone();

        let mut builder = thread::Builder::new();
        let prefix = self.config.thread_name_prefix();
        if !prefix.is_empty() {
            builder = builder.name(format!("{prefix}-closer"));
        }
        let closer = builder
            .spawn(move || {
                state.set(PoolState::Draining);
                barrier.wait();
                // No worker can send anymore: every guard has been released.
                results.close();
                state.set(PoolState::Closed);

                let mut reports = Vec::with_capacity(workers.len());
                let mut first_error = None;
                for worker in workers {
                    match worker.join() {
                        Ok(report) => reports.push(report),
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(reports),
                }
            })
            .map_err(|e| Error::io("spawn result queue closer", e))?;

        Ok(Completion {
            results: self.results.clone(),
            barrier: self.barrier.clone(),
            state: self.state.clone(),
            jobs_submitted: self.jobs_submitted,
            closer,
        })
    }
}

impl<J, R> Drop for WorkerPool<J, R> {
    fn drop(&mut self) {
        if !self.jobs.is_closed() {
            self.jobs.close();
        }
    }
}

/// The draining side of a pool whose job queue has been closed.
pub struct Completion<R> {
    results: BoundedQueue<R>,
    barrier: CompletionBarrier,
    state: SharedState,
    jobs_submitted: usize,
    closer: thread::JoinHandle<Result<Vec<WorkerReport>>>,
}

impl<R> Completion<R> {
    /// Returns a handle to the result queue.
    pub fn results(&self) -> &BoundedQueue<R> {
        &self.results
    }

    /// Returns a collector over the result queue.
    pub fn collector(&self) -> Collector<R> {
        Collector::new(self.results.clone())
    }

    pub fn state(&self) -> PoolState {
        self.state.get()
    }

    pub fn outstanding_workers(&self) -> usize {
        self.barrier.outstanding()
    }

    pub fn jobs_submitted(&self) -> usize {
        self.jobs_submitted
    }

    /// Waits for the closer thread and returns the per-worker reports.
    ///
    /// If a worker panicked or failed, the first such failure is returned. Results
    /// must be drained before (or concurrently with) this call when the result queue
    /// may fill up.
    pub fn wait(self) -> Result<Vec<WorkerReport>> {
        match self.closer.join() {
            Ok(res) => res,
            Err(payload) => Err(Error::invalid_operation(format!(
                "result queue closer panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Summary of a completed [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs_submitted: usize,
    pub results_collected: usize,
    pub workers: Vec<WorkerReport>,
}

/// Runs a complete pool cycle: spawn the workers, submit every job, close the job
/// queue, drain the results into `on_result` and wait for the pool to close.
///
/// Both queues are sized to the number of jobs, so submission never blocks. Returns
/// an error if a worker failed; in that case some results may be missing, and the
/// error names the worker.
pub fn run<J, R, F, C>(
    config: PoolConfig,
    jobs: impl IntoIterator<Item = J>,
    transform: F,
    on_result: C,
) -> Result<RunSummary>
where
    J: Debug + Send + 'static,
    R: Send + 'static,
    F: Fn(J) -> R + Send + Sync + 'static,
    C: FnMut(R),
{
    let jobs: Vec<J> = jobs.into_iter().collect();

    let mut pool = WorkerPool::new(config, jobs.len().max(1))?;
    pool.start(transform)?;
    pool.submit_all(jobs)?;
    let completion = pool.finish_submitting()?;

    let results_collected = completion.collector().drain(on_result);
    let jobs_submitted = completion.jobs_submitted();
    let workers = completion.wait()?;

    if results_collected != jobs_submitted {
        return Err(Error::result_count_mismatch(jobs_submitted, results_collected));
    }

    log::debug!(
        "pool run finished: {} jobs, {} results, {} workers",
        jobs_submitted,
        results_collected,
        workers.len()
    );
    Ok(RunSummary {
        jobs_submitted,
        results_collected,
        workers,
    })
}
