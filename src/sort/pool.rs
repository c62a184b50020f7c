//! The lazily grown worker pool.
//!
//! The pool only decides *whether* another worker may start and keeps the
//! books on the ones that did. It knows nothing about sorting: the body a
//! worker runs is supplied by the caller. Workers are scoped threads, so the
//! enclosing `std::thread::scope` joins every one of them before the data
//! they borrow can go away.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Scope};

/// Worker counts, as seen at the time of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Workers started so far.
    pub spawned: usize,
    /// Workers whose body has not returned yet.
    pub running: usize,
    /// Workers whose body panicked.
    pub panicked: usize,
}

/// A bounded, grow-only set of worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    cap: usize,
    stack_size: Option<usize>,
    spawned: AtomicUsize,
    running: AtomicUsize,
    panicked: AtomicUsize,
}

/// Decrements `running` however the worker body ends.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl WorkerPool {
    /// Creates a pool that will never hold more than `cap` workers.
    pub fn new(cap: usize, stack_size: Option<usize>) -> Self {
        Self {
            cap,
            stack_size,
            spawned: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        }
    }

    /// Claims the right to start one more worker.
    ///
    /// Returns the new worker's index, or `None` once the cap is reached.
    pub fn try_reserve(&self) -> Option<usize> {
        self.spawned
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.cap).then_some(n + 1)
            })
            .ok()
    }

    /// Starts a worker running `body(index)` if the cap allows it.
    ///
    /// A panic in `body` is caught and counted; it never reaches the scope.
    /// Returns `true` if a thread was started.
    pub fn spawn_scoped<'scope, 'env, F>(&'scope self, scope: &'scope Scope<'scope, 'env>, body: F) -> bool
    where
        F: FnOnce(usize) + Send + 'scope,
    {
        let Some(index) = self.try_reserve() else {
            return false;
        };

        let mut builder = thread::Builder::new().name(format!("chunk-sort-worker-{index}"));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        self.running.fetch_add(1, Ordering::AcqRel);
        let spawned = builder.spawn_scoped(scope, move || {
            let _running = RunningGuard(&self.running);
            if panic::catch_unwind(AssertUnwindSafe(|| body(index))).is_err() {
                self.panicked.fetch_add(1, Ordering::AcqRel);
                #[cfg(feature = "tracing")]
                tracing::warn!(worker = index, "worker panicked, its chunk is abandoned");
            }
        });

        match spawned {
            Ok(_) => true,
            Err(_err) => {
                self.running.fetch_sub(1, Ordering::AcqRel);
                self.spawned.fetch_sub(1, Ordering::AcqRel);
                #[cfg(feature = "tracing")]
                tracing::warn!(worker = index, error = %_err, "failed to spawn worker, continuing without it");
                false
            }
        }
    }

    /// Current worker counts.
    pub fn report(&self) -> PoolReport {
        PoolReport {
            spawned: self.spawned.load(Ordering::Acquire),
            running: self.running.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
        }
    }
}
