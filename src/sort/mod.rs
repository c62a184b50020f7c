//! Parallel quicksort over a shared lock-free chunk stack.
//!
//! The recursion splits on the first element, publishes the lower partition
//! as a chunk anyone may pick up, and keeps the higher partition for itself.
//! Worker threads are added one per partition step until the configured cap
//! is reached.
//!
//! ```
//! use hazard_sort::{Sorter, SorterConfig};
//!
//! let sorter = Sorter::new(SorterConfig::default().with_max_workers(2));
//! let outcome = sorter.execute(vec![3, 1, 2], |a, b| a < b).unwrap();
//! assert_eq!(outcome.sorted, vec![1, 2, 3]);
//! assert_eq!(outcome.report.workers_running, 0);
//! ```

pub mod partition;
pub mod pool;

mod chunk_sorter;

use core::cmp::Ordering;

use crate::concurrency::HazardRegistry;
use crate::config::SorterConfig;
use crate::error::SortError;

use chunk_sorter::ChunkSorter;

/// What happened during one sort call, sampled after teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortReport {
    /// Worker threads started for this call.
    pub workers_spawned: usize,
    /// Workers still running after the call; always zero.
    pub workers_running: usize,
    /// Workers that died on a comparator panic.
    pub workers_panicked: usize,
    /// Chunks popped and sorted by worker threads.
    pub chunks_by_workers: usize,
    /// Chunks popped and sorted by threads waiting on another chunk.
    pub chunks_by_helpers: usize,
    /// Hazard slots still owned once the call returned.
    pub hazard_slots_owned: usize,
}

/// A sorted sequence together with its [`SortReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOutcome<T> {
    /// The input, sorted.
    pub sorted: Vec<T>,
    /// Pool and reclamation figures for the call.
    pub report: SortReport,
}

/// Entry point holding the configuration and the hazard registry.
///
/// Each call builds a fresh chunk stack and worker pool and tears both down
/// before returning. The registry outlives calls and may be shared.
#[derive(Debug, Clone)]
pub struct Sorter {
    config: SorterConfig,
    registry: HazardRegistry,
}

impl Sorter {
    /// Creates a sorter with its own registry sized by `config.hazard_slots`.
    pub fn new(config: SorterConfig) -> Self {
        let registry = HazardRegistry::with_capacity(config.hazard_slots);
        Self { config, registry }
    }

    /// Creates a sorter that registers its threads in `registry`.
    ///
    /// `config.hazard_slots` is ignored in favour of the registry's capacity.
    pub fn with_registry(config: SorterConfig, registry: HazardRegistry) -> Self {
        Self { config, registry }
    }

    /// The configuration in use.
    #[inline]
    pub fn config(&self) -> &SorterConfig {
        &self.config
    }

    /// The registry threads register in.
    #[inline]
    pub fn registry(&self) -> &HazardRegistry {
        &self.registry
    }

    /// Sorts by `Ord`.
    ///
    /// # Errors
    /// See [`Sorter::execute`].
    pub fn sort<T>(&self, data: Vec<T>) -> Result<Vec<T>, SortError>
    where
        T: Ord + Send,
    {
        self.sort_by_less(data, |a, b| a < b)
    }

    /// Sorts with a three-way comparator.
    ///
    /// # Errors
    /// See [`Sorter::execute`].
    pub fn sort_by<T, C>(&self, data: Vec<T>, compare: C) -> Result<Vec<T>, SortError>
    where
        T: Send,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        self.sort_by_less(data, |a, b| compare(a, b) == Ordering::Less)
    }

    /// Sorts with a strict "less than" predicate.
    ///
    /// # Errors
    /// See [`Sorter::execute`].
    pub fn sort_by_less<T, L>(&self, data: Vec<T>, less: L) -> Result<Vec<T>, SortError>
    where
        T: Send,
        L: Fn(&T, &T) -> bool + Sync,
    {
        self.execute(data, less).map(|outcome| outcome.sorted)
    }

    /// Sorts with a strict "less than" predicate and reports on the run.
    ///
    /// Equal elements may be reordered. `less` must be a strict weak order;
    /// otherwise the output is some permutation of the input.
    ///
    /// # Errors
    /// [`SortError::Hazard`] if the calling thread or any worker cannot get
    /// a hazard slot, [`SortError::ChunkAbandoned`] if a worker died while
    /// holding a chunk. No partial result is returned in either case.
    ///
    /// # Panics
    /// A comparator panic on the calling thread is propagated once every
    /// worker has been joined.
    pub fn execute<T, L>(&self, data: Vec<T>, less: L) -> Result<SortOutcome<T>, SortError>
    where
        T: Send,
        L: Fn(&T, &T) -> bool + Sync,
    {
        if data.is_empty() {
            return Ok(SortOutcome {
                sorted: data,
                report: SortReport {
                    hazard_slots_owned: self.registry.owned_slots(),
                    ..SortReport::default()
                },
            });
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("chunk_sort", len = data.len()).entered();

        let engine = ChunkSorter::new(self.registry.clone(), &self.config, less);
        let sorted = engine.run(data)?;

        let pool = engine.pool_report();
        let (chunks_by_workers, chunks_by_helpers) = engine.chunks_sorted();
        let report = SortReport {
            workers_spawned: pool.spawned,
            workers_running: pool.running,
            workers_panicked: pool.panicked,
            chunks_by_workers,
            chunks_by_helpers,
            hazard_slots_owned: self.registry.owned_slots(),
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(?report, "sort finished");

        Ok(SortOutcome { sorted, report })
    }
}

impl Default for Sorter {
    fn default() -> Self {
        Self::new(SorterConfig::default())
    }
}
