//! The consumer side of a pool: drains the result queue until it is closed.

use crate::queue::BoundedQueue;

/// Drains a result queue.
///
/// The collector blocks between items and only returns once the queue is closed and
/// empty, so it observes every result enqueued before the close.
pub struct Collector<R> {
    results: BoundedQueue<R>,
}

impl<R> Collector<R> {
    pub fn new(results: BoundedQueue<R>) -> Self {
        Collector { results }
    }

    /// Passes every result to `f` and returns how many were consumed.
    pub fn drain(&self, mut f: impl FnMut(R)) -> usize {
        let mut count = 0;
        for result in self.results.drain() {
            f(result);
            count += 1;
        }
        log::debug!("collector drained {count} results");
        count
    }

    /// Gathers every result into a vector, in the order they were dequeued.
    pub fn collect_vec(&self) -> Vec<R> {
        let mut results = Vec::new();
        self.drain(|r| results.push(r));
        results
    }
}
