//! A bounded, blocking, multi-producer, multi-consumer FIFO queue with an explicit
//! close.
//!
//! [`BoundedQueue`] is used for both the job queue and the result queue of a
//! [`WorkerPool`](crate::pool::WorkerPool). Unlike a channel that disconnects when its
//! last sender is dropped, closing is an explicit, one-time operation performed by
//! whoever owns the producing side. After [`close`](BoundedQueue::close):
//!
//! - buffered items are still handed out by [`claim`](BoundedQueue::claim),
//! - once the buffer is drained, `claim` returns `None`,
//! - [`enqueue`](BoundedQueue::enqueue) fails and gives the item back.
//!
//! Every item is delivered to exactly one claimer.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// A shared handle to a bounded FIFO queue.
///
/// Cloning the handle does not create a new queue; all clones refer to the same
/// buffer and the same closed flag.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        BoundedQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a new open queue that buffers at most `capacity` items.
    ///
    /// The buffer grows on demand; `capacity` is only the bound.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert_ne!(capacity, 0, "BoundedQueue does not support zero capacity");

        let inner = Inner {
            state: Mutex::new(InnerState {
                queue: VecDeque::new(),
                capacity,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        };

        BoundedQueue {
            inner: Arc::new(inner),
        }
    }

    /// Enqueues an item at the back of the queue.
    ///
    /// - If the queue is full, this call blocks until a claimer makes space.
    /// - If the queue is closed, or gets closed while this call is blocked, the
    ///   item is returned inside [`QueueClosedError`].
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosedError<T>> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(QueueClosedError(item));
            }

            if state.queue.len() < state.capacity {
                break;
            }

            // Wait for a claimer to make space (or for a close).
            state = self
                .inner
                .not_full
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }

        state.queue.push_back(item);

        // Drop the lock before notifying to reduce contention.
        drop(state);
        self.inner.not_empty.notify_one();

        Ok(())
    }

    /// Attempts to enqueue an item without blocking.
    ///
    /// Returns [`TryEnqueueError::Full`] if the buffer is at capacity and
    /// [`TryEnqueueError::Closed`] if the queue has been closed. Both variants give
    /// the item back.
    pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        let mut state = self.lock();

        if state.closed {
            return Err(TryEnqueueError::Closed(item));
        }
        if state.queue.len() >= state.capacity {
            return Err(TryEnqueueError::Full(item));
        }

        state.queue.push_back(item);
        drop(state);
        self.inner.not_empty.notify_one();

        Ok(())
    }

    /// Closes the queue.
    ///
    /// The transition is irreversible. Claimers blocked on an empty queue wake up
    /// and observe exhaustion; enqueuers blocked on a full queue wake up and get
    /// their item back.
    ///
    /// # Panics
    ///
    /// Panics if the queue is already closed. Closing is the responsibility of a
    /// single owner and must happen exactly once.
    pub fn close(&self) {
        let mut state = self.lock();
        assert!(!state.closed, "BoundedQueue::close called more than once");
        state.closed = true;
        drop(state);

        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    /// Claims the item at the front of the queue.
    ///
    /// - If an item is buffered, it is removed and returned as `Some(item)`.
    /// - If the queue is empty and open, this call blocks until an item arrives or
    ///   the queue is closed.
    /// - If the queue is empty and closed, returns `None`. No more items will ever
    ///   be produced.
    pub fn claim(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.queue.pop_front() {
                drop(state);
                // Notify one waiting enqueuer that space is available.
                self.inner.not_full.notify_one();
                return Some(item);
            }

            if state.closed {
                return None;
            }

            state = self
                .inner
                .not_empty
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Attempts to claim the item at the front of the queue without blocking.
    pub fn try_claim(&self) -> Result<T, TryClaimError> {
        let mut state = self.lock();

        if let Some(item) = state.queue.pop_front() {
            drop(state);
            self.inner.not_full.notify_one();
            return Ok(item);
        }

        if state.closed {
            Err(TryClaimError::Closed)
        } else {
            Err(TryClaimError::Empty)
        }
    }

    /// Returns a blocking iterator that claims items until the queue is closed and
    /// drained.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    /// Returns the number of buffered items.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns `true` if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Returns the maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Locks the queue state.
    ///
    /// The state is never left inconsistent by a panicking holder (every critical
    /// section is a single `VecDeque` operation or a flag store), so a poisoned lock
    /// is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, InnerState<T>> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Blocking iterator returned by [`BoundedQueue::drain`].
pub struct Drain<'a, T> {
    queue: &'a BoundedQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.claim()
    }
}

/// An error returned from [`BoundedQueue::enqueue`] when the queue is closed.
///
/// Contains the item that could not be enqueued.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct QueueClosedError<T>(pub T);

impl<T> QueueClosedError<T> {
    /// Returns the item that was rejected.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::fmt::Debug for QueueClosedError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueueClosedError(..)")
    }
}

impl<T> std::fmt::Display for QueueClosedError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "enqueue on a closed queue")
    }
}

impl<T> std::error::Error for QueueClosedError<T> {}

/// An error returned from [`BoundedQueue::try_enqueue`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryEnqueueError<T> {
    /// The queue is at capacity.
    Full(T),
    /// The queue has been closed.
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    /// Returns the item that was rejected.
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(item) | TryEnqueueError::Closed(item) => item,
        }
    }
}

impl<T> std::fmt::Display for TryEnqueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryEnqueueError::Full(_) => write!(f, "queue is full"),
            TryEnqueueError::Closed(_) => write!(f, "queue is closed"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for TryEnqueueError<T> {}

/// An error returned from [`BoundedQueue::try_claim`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryClaimError {
    /// The queue is empty but still open.
    Empty,
    /// The queue is empty and closed, so no more items will ever arrive.
    Closed,
}

impl std::fmt::Display for TryClaimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryClaimError::Empty => write!(f, "queue is empty"),
            TryClaimError::Closed => write!(f, "queue is empty and closed"),
        }
    }
}

impl std::error::Error for TryClaimError {}

/// The state of the queue that is protected by the Mutex.
struct InnerState<T> {
    queue: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/// The shared core of the queue, containing the state and condition variables.
struct Inner<T> {
    state: Mutex<InnerState<T>>,
    not_empty: Condvar, // Signals claimers that an item was added or the queue closed.
    not_full: Condvar,  // Signals enqueuers that space is available or the queue closed.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_thread_enqueue_claim() {
        let q = BoundedQueue::new(5);
        q.enqueue("hello").unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.claim(), Some("hello"));
        assert!(q.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let q = BoundedQueue::new(100);
        for i in 0..100 {
            q.enqueue(i).unwrap();
        }
        q.close();
        let items: Vec<_> = q.drain().collect();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        BoundedQueue::<i32>::new(0);
    }

    #[test]
    fn test_close_drains_buffered_items_then_reports_exhaustion() {
        let q = BoundedQueue::new(5);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.close();

        assert!(q.is_closed());
        assert_eq!(q.claim(), Some(1));
        assert_eq!(q.claim(), Some(2));
        assert_eq!(q.claim(), None);
        assert_eq!(q.claim(), None);
    }

    #[test]
    fn test_enqueue_after_close_returns_item() {
        let q = BoundedQueue::new(5);
        q.close();
        let err = q.enqueue(42).unwrap_err();
        assert_eq!(err.into_inner(), 42);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_double_close_panics() {
        let q = BoundedQueue::<i32>::new(1);
        q.close();
        q.close();
    }

    #[test]
    fn test_claim_blocks_until_enqueue() {
        let q = BoundedQueue::new(1);
        let q_clone = q.clone();

        let handle = thread::spawn(move || q_clone.claim());

        // Give the spawned thread a moment to start and block on claim.
        thread::sleep(Duration::from_millis(50));
        q.enqueue("from other thread").unwrap();

        assert_eq!(handle.join().unwrap(), Some("from other thread"));
    }

    #[test]
    fn test_claim_blocks_until_close() {
        let q = BoundedQueue::<i32>::new(1);
        let q1 = q.clone();
        let q2 = q.clone();

        let handle1 = thread::spawn(move || q1.claim());
        let handle2 = thread::spawn(move || q2.claim());

        thread::sleep(Duration::from_millis(50));

        // Closing wakes up all blocked claimers.
        q.close();

        assert_eq!(handle1.join().unwrap(), None);
        assert_eq!(handle2.join().unwrap(), None);
    }

    #[test]
    fn test_enqueue_blocks_on_full_queue() {
        let q = BoundedQueue::new(1);
        q.enqueue("first").unwrap();

        let q_clone = q.clone();
        let handle = thread::spawn(move || {
            // This blocks because the queue is full.
            q_clone.enqueue("second").unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.len(), 1);

        assert_eq!(q.claim(), Some("first"));
        handle.join().unwrap();
        assert_eq!(q.claim(), Some("second"));
    }

    #[test]
    fn test_close_wakes_blocked_enqueuer() {
        let q = BoundedQueue::new(1);
        q.enqueue(1).unwrap();

        let q_clone = q.clone();
        let handle = thread::spawn(move || q_clone.enqueue(2));

        thread::sleep(Duration::from_millis(50));
        q.close();

        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.into_inner(), 2);
        // The item buffered before the close is still delivered.
        assert_eq!(q.claim(), Some(1));
        assert_eq!(q.claim(), None);
    }

    #[test]
    fn test_try_enqueue_and_try_claim() {
        let q = BoundedQueue::new(2);

        assert!(q.try_enqueue(1).is_ok());
        assert!(q.try_enqueue(2).is_ok());
        assert_eq!(q.try_enqueue(3), Err(TryEnqueueError::Full(3)));

        assert_eq!(q.try_claim(), Ok(1));
        assert_eq!(q.try_claim(), Ok(2));
        assert_eq!(q.try_claim(), Err(TryClaimError::Empty));

        q.close();
        assert_eq!(q.try_claim(), Err(TryClaimError::Closed));
        assert_eq!(q.try_enqueue(4), Err(TryEnqueueError::Closed(4)));
    }

    #[test]
    fn test_large_capacity_does_not_preallocate() {
        let q = BoundedQueue::new(usize::MAX / 4);
        assert_eq!(q.capacity(), usize::MAX / 4);
        q.enqueue(7u64).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.claim(), Some(7));
    }

    #[test]
    fn test_capacity() {
        let q = BoundedQueue::<u8>::new(7);
        assert_eq!(q.capacity(), 7);
        assert!(!q.is_closed());
    }

    #[test]
    fn test_multi_producer_multi_consumer() {
        const NUM_PRODUCERS: usize = 4;
        const NUM_CONSUMERS: usize = 3;
        const ITEMS_PER_PRODUCER: usize = 1000;
        const TOTAL_ITEMS: usize = NUM_PRODUCERS * ITEMS_PER_PRODUCER;

        // Small bound so that producers block regularly.
        let q = BoundedQueue::new(10);

        thread::scope(|s| {
            let consumers: Vec<_> = (0..NUM_CONSUMERS)
                .map(|_| {
                    let q = q.clone();
                    s.spawn(move || q.drain().collect::<Vec<_>>())
                })
                .collect();

            let producers: Vec<_> = (0..NUM_PRODUCERS)
                .map(|i| {
                    let q = q.clone();
                    s.spawn(move || {
                        for j in 0..ITEMS_PER_PRODUCER {
                            q.enqueue(i * ITEMS_PER_PRODUCER + j).unwrap();
                        }
                    })
                })
                .collect();

            for producer in producers {
                producer.join().unwrap();
            }
            q.close();

            let mut all_received = vec![];
            for consumer in consumers {
                all_received.extend(consumer.join().unwrap());
            }

            // Sorting exposes both missing and duplicated items.
            assert_eq!(all_received.len(), TOTAL_ITEMS);
            all_received.sort();
            assert_eq!(all_received, (0..TOTAL_ITEMS).collect::<Vec<_>>());
        });
    }
}
