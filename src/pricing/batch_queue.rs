//! Blocking SPMC hand-off of sealed instrument batches.
//!
//! One producer fills and pushes batches while many workers pop them:
//!
//! ```text
//! Producer Thread                 Worker Threads
//!       │                               │
//!       ├─ push() ────────────────────▶ pop()  (blocks while empty)
//!       │        BatchQueue             │
//!       │        (Mutex + Condvar)      │
//!       └─ close() ── wakes all ──────▶ pop() -> None
//! ```
//!
//! Depth is unbounded (the producer never blocks); granularity is bounded by
//! the batch capacity. `push` wakes exactly one parked worker, since pushes
//! are frequent and a broadcast per push would stampede the pool. `close` is
//! the one broadcast: workers parked before the final batch must all observe
//! the permanent done flag. Pop takes the most recently pushed batch so
//! removal never compacts the backing storage; consumers make no ordering
//! assumption.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::pricing::types::{Batch, BATCH_SIZE, MAX_NUM_INSTRUMENTS};

struct QueueState {
    batches: Vec<Batch>,
    done: bool,
}

/// Shared queue core. Create once, then hand out [`BatchProducer`] and
/// [`BatchConsumer`] handles to the pipeline threads.
pub struct BatchQueue {
    state: Mutex<QueueState>,
    available: Condvar,

    /// Total batches pushed.
    push_count: AtomicU64,

    /// Total batches popped. Equals `push_count` after a drained run: every
    /// pushed batch is consumed by exactly one worker.
    pop_count: AtomicU64,
}

impl BatchQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                batches: Vec::with_capacity(MAX_NUM_INSTRUMENTS / BATCH_SIZE),
                done: false,
            }),
            available: Condvar::new(),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
        })
    }

    /// Handle for the single producer thread.
    pub fn producer(self: &Arc<Self>) -> BatchProducer {
        BatchProducer {
            queue: Arc::clone(self),
        }
    }

    /// Handle for one worker thread. Workers compete for batches.
    pub fn consumer(self: &Arc<Self>) -> BatchConsumer {
        BatchConsumer {
            queue: Arc::clone(self),
        }
    }

    pub fn push_count(&self) -> u64 {
        self.push_count.load(Ordering::Relaxed)
    }

    pub fn pop_count(&self) -> u64 {
        self.pop_count.load(Ordering::Relaxed)
    }

    /// Current number of resident batches. Approximate under concurrency.
    pub fn depth(&self) -> usize {
        self.lock_state().batches.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().done
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // A worker that panicked mid-pop cannot corrupt the Vec; recover
        // instead of cascading the poison through the whole pool.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer-side handle: push sealed batches, then close exactly once.
#[derive(Clone)]
pub struct BatchProducer {
    queue: Arc<BatchQueue>,
}

impl BatchProducer {
    /// Transfer a sealed batch into the queue and wake one parked worker.
    pub fn push(&self, batch: Batch) {
        {
            let mut state = self.queue.lock_state();
            state.batches.push(batch);
        }
        self.queue.push_count.fetch_add(1, Ordering::Relaxed);
        self.queue.available.notify_one();
    }

    /// Mark production complete and wake every parked worker.
    ///
    /// The flag is monotonic: once set it is never cleared, so a worker that
    /// observes empty-and-done can terminate knowing no batch will ever
    /// appear again. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.queue.lock_state();
            state.done = true;
        }
        self.queue.available.notify_all();
    }
}

/// Consumer-side handle: blocking pop until the queue is drained and closed.
#[derive(Clone)]
pub struct BatchConsumer {
    queue: Arc<BatchQueue>,
}

impl BatchConsumer {
    /// Take one batch, parking while the queue is empty and still open.
    ///
    /// Returns `None` only when the queue is empty *and* production is
    /// complete; after that it never returns a batch again.
    pub fn pop(&self) -> Option<Batch> {
        let mut state = self.queue.lock_state();
        while state.batches.is_empty() && !state.done {
            state = self
                .queue
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        // Most recently pushed batch first: nothing shifts on removal.
        let batch = state.batches.pop();
        drop(state);

        if batch.is_some() {
            self.queue.pop_count.fetch_add(1, Ordering::Relaxed);
        }
        batch
    }
}
