//! A fixed-size worker pool that drains a job queue into a result queue.
//!
//! This crate implements the coordination protocol of a classic worker pool:
//! job distribution, worker lifecycle, completion detection and result-queue
//! closure, composed so that the pool always terminates and never loses or
//! duplicates a job.
//!
//! # Key Components
//!
//! - [`queue::BoundedQueue`] - A bounded, blocking MPMC FIFO with an explicit,
//!   one-time close. Used for both the job queue and the result queue.
//! - [`barrier::CompletionBarrier`] - A counter of outstanding workers; each worker
//!   holds a [`barrier::BarrierGuard`] that releases it on every exit path.
//! - [`worker::Worker`] - Claims jobs, applies the transform and emits one result
//!   per job until the job queue is exhausted.
//! - [`pool::WorkerPool`] - The coordinator: spawns the workers, submits jobs,
//!   closes the job queue and delegates result-queue closure to a closer thread
//!   gated on the completion barrier.
//! - [`collector::Collector`] - Drains the result queue until it is closed.
//!
//! # Example
//!
//! ```rust,no_run
//! use jobpool_workflow::{PoolConfig, run};
//!
//! let summary = run(PoolConfig::default(), 1..=10u64, |x: u64| x * 2, |result| {
//!     println!("Result: {result}");
//! })
//! .unwrap();
//! assert_eq!(summary.results_collected, 10);
//! ```

pub mod barrier;
pub mod collector;
pub mod config;
pub mod pool;
pub mod queue;
pub mod worker;

pub use config::PoolConfig;
pub use pool::{Completion, PoolState, RunSummary, WorkerPool, run};
pub use worker::WorkerReport;
