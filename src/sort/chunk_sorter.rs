//! The per-request sorting engine.
//!
//! One `ChunkSorter` exists per sort call. It owns the shared chunk stack and
//! the worker pool; workers and the calling thread all pop from and push to
//! the same stack. A thread waiting for a chunk it published never idles: it
//! keeps popping and sorting whatever is pending, which is what keeps the
//! recursion from deadlocking once every worker is itself waiting.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Scope};

use crossbeam_utils::Backoff;

use crate::concurrency::oneshot::{self, Receiver, Sender, TryRecvError};
use crate::concurrency::{ConcurrentStack, HazardRegistry};
use crate::config::{IdlePolicy, SorterConfig};
use crate::error::{HazardError, SortError};
use crate::sort::partition::{split_at_pivot, Split};
use crate::sort::pool::{PoolReport, WorkerPool};

/// An unsorted partition plus the slot its sorted form goes to.
struct WorkChunk<T> {
    data: Vec<T>,
    done: Sender<Vec<T>>,
}

/// Who popped a chunk.
#[derive(Clone, Copy)]
enum Role {
    Worker,
    Helper,
}

/// Sets the end-of-work flag when the top-level call leaves its scope,
/// including by unwinding.
struct EndOfWork<'a>(&'a AtomicBool);

impl Drop for EndOfWork<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Hands the current thread's hazard slot back, including on unwind.
///
/// Scoped threads count as finished before their thread-locals are torn
/// down, so workers cannot rely on thread exit to release in time.
struct ReleaseSlot<'a>(&'a HazardRegistry);

impl Drop for ReleaseSlot<'_> {
    fn drop(&mut self) {
        self.0.release_current_thread();
    }
}

pub(crate) struct ChunkSorter<T, F> {
    chunks: ConcurrentStack<WorkChunk<T>>,
    pool: WorkerPool,
    end_of_work: AtomicBool,
    worker_failure: OnceLock<HazardError>,
    registrations: AtomicUsize,
    idle: IdlePolicy,
    less: F,
    by_workers: AtomicUsize,
    by_helpers: AtomicUsize,
}

impl<T, F> ChunkSorter<T, F>
where
    T: Send,
    F: Fn(&T, &T) -> bool + Sync,
{
    pub(crate) fn new(registry: HazardRegistry, config: &SorterConfig, less: F) -> Self {
        Self {
            chunks: ConcurrentStack::new(registry),
            pool: WorkerPool::new(config.worker_cap(), config.worker_stack_size),
            end_of_work: AtomicBool::new(false),
            worker_failure: OnceLock::new(),
            registrations: AtomicUsize::new(0),
            idle: config.idle,
            less,
            by_workers: AtomicUsize::new(0),
            by_helpers: AtomicUsize::new(0),
        }
    }

    /// Sorts `data` on the calling thread with help from lazily spawned workers.
    ///
    /// Every worker has been joined by the time this returns. The calling
    /// thread's hazard slot is released unless it was registered on entry.
    ///
    /// The calling thread and every spawned worker hold a slot at the same
    /// time, so a registry too small for them fails the whole call, however
    /// the threads happen to be scheduled.
    pub(crate) fn run(&self, data: Vec<T>) -> Result<Vec<T>, SortError> {
        let registry = self.chunks.registry();
        let _slot = (!registry.is_registered_current_thread()).then(|| ReleaseSlot(registry));
        registry.acquire_for_current_thread()?;
        let sorted = thread::scope(|scope| {
            let _end = EndOfWork(&self.end_of_work);
            self.do_sort(scope, data)
        })?;
        self.check_workers()?;
        Ok(sorted)
    }

    pub(crate) fn pool_report(&self) -> PoolReport {
        self.pool.report()
    }

    pub(crate) fn chunks_sorted(&self) -> (usize, usize) {
        (
            self.by_workers.load(Ordering::Relaxed),
            self.by_helpers.load(Ordering::Relaxed),
        )
    }

    fn check_workers(&self) -> Result<(), SortError> {
        match self.worker_failure.get() {
            Some(err) => Err(SortError::Hazard(*err)),
            None => Ok(()),
        }
    }

    fn do_sort<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        data: Vec<T>,
    ) -> Result<Vec<T>, SortError> {
        let Some(Split { lower, pivot, higher }) = split_at_pivot(data, &self.less) else {
            return Ok(Vec::new());
        };

        let (done, pending) = oneshot::channel();
        self.chunks.push(WorkChunk { data: lower, done });

        self.pool
            .spawn_scoped(scope, move |index| self.worker_loop(scope, index));

        let higher = self.do_sort(scope, higher)?;
        let mut sorted = self.await_chunk(scope, &pending)?;

        sorted.reserve(higher.len() + 1);
        sorted.push(pivot);
        sorted.extend(higher);
        Ok(sorted)
    }

    /// Waits for `pending`, sorting other chunks in the meantime.
    fn await_chunk<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        pending: &Receiver<Vec<T>>,
    ) -> Result<Vec<T>, SortError> {
        let backoff = Backoff::new();
        loop {
            match pending.try_recv() {
                Ok(sorted) => return Ok(sorted),
                Err(TryRecvError::Disconnected) => return Err(SortError::ChunkAbandoned),
                Err(TryRecvError::Empty) => {
                    self.check_workers()?;
                    if self.try_sort_chunk(scope, Role::Helper)? {
                        backoff.reset();
                    } else {
                        self.idle.pause(&backoff);
                    }
                }
            }
        }
    }

    fn worker_loop<'scope, 'env>(&'env self, scope: &'scope Scope<'scope, 'env>, index: usize) {
        #[cfg(feature = "tracing")]
        tracing::debug!(worker = index, "worker started");

        let _slot = ReleaseSlot(self.chunks.registry());
        // Register up front so a missing slot is reported even if the
        // sort finishes before this worker gets to pop.
        let registered = self.chunks.registry().acquire_for_current_thread();
        self.registrations.fetch_add(1, Ordering::AcqRel);

        match registered {
            Err(err) => self.fail_worker(index, err),
            Ok(_) => self.work(scope, index),
        }

        // Hold the slot until every worker has tried for one.
        let backoff = Backoff::new();
        while self.registrations.load(Ordering::Acquire) < self.pool.report().spawned {
            backoff.snooze();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(worker = index, "worker exited");
    }

    fn work<'scope, 'env>(&'env self, scope: &'scope Scope<'scope, 'env>, index: usize) {
        let backoff = Backoff::new();
        while !self.end_of_work.load(Ordering::Acquire) {
            match self.try_sort_chunk(scope, Role::Worker) {
                Ok(true) => backoff.reset(),
                Ok(false) => self.idle.pause(&backoff),
                Err(SortError::Hazard(err)) => {
                    self.fail_worker(index, err);
                    break;
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(worker = index, error = %_err, "chunk failed, keep working");
                }
            }
        }
    }

    fn fail_worker(&self, _index: usize, err: HazardError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(worker = _index, error = %err, "worker cannot pop, failing the sort");
        // Only the first failure is kept.
        let _ = self.worker_failure.set(err);
    }

    /// Pops and sorts one chunk. Returns `false` if the stack was empty.
    fn try_sort_chunk<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        role: Role,
    ) -> Result<bool, SortError> {
        let Some(chunk) = self.chunks.pop()? else {
            return Ok(false);
        };
        self.sort_chunk(scope, chunk)?;
        match role {
            Role::Worker => self.by_workers.fetch_add(1, Ordering::Relaxed),
            Role::Helper => self.by_helpers.fetch_add(1, Ordering::Relaxed),
        };
        Ok(true)
    }

    fn sort_chunk<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        chunk: WorkChunk<T>,
    ) -> Result<(), SortError> {
        let WorkChunk { data, done } = chunk;
        let sorted = self.do_sort(scope, data)?;
        if done.send(sorted).is_err() {
            #[cfg(feature = "tracing")]
            tracing::trace!("chunk result dropped, its waiter already gave up");
        }
        Ok(())
    }
}
