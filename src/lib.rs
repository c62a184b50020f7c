//! # `hazard-sort` - Parallel Quicksort on a Hazard-Pointer Work Stack
//!
//! A recursive parallel quicksort whose unit of work is a *chunk*: an unsorted
//! partition plus a oneshot slot for its sorted form. Chunks travel through a
//! lock-free Treiber stack shared by the calling thread and a small, lazily
//! grown pool of workers.
//!
//! ## Safety Guarantees
//!
//! ### Memory Safety
//! - **Hazard pointers**: a popping thread publishes the node it is about to
//!   read before reading it; nodes are freed only once no slot names them.
//! - **Deferred reclamation**: still-protected nodes wait on a lock-free
//!   retirement list and are retried after every pop.
//! - **Scoped workers**: worker threads are `std::thread::scope` threads, so
//!   none can outlive the stack or the sort call that started it.
//!
//! ### Concurrency Safety
//! - **Lock-free**: every shared transition is a single-word CAS or swap.
//! - **No deadlock under a thread cap**: a thread awaiting a chunk keeps
//!   popping and sorting pending chunks instead of blocking.
//! - **Single hand-off**: each chunk is popped by exactly one thread and its
//!   result is read exactly once.
//!
//! ## Architecture
//!
//! 1. **Hazard registry** ([`HazardRegistry`]): a fixed table of per-thread
//!    slots, injected into every stack that uses it.
//! 2. **Reclamation list** ([`concurrency::ReclamationList`]): type-erased
//!    retired nodes awaiting a safe moment.
//! 3. **Concurrent stack** ([`ConcurrentStack`]): push/pop without locks.
//! 4. **Sorter** ([`Sorter`]): partitions, publishes, recurses and helps.
//!
//! ## Example
//!
//! ```rust
//! let sorted = hazard_sort::sort(vec![5, 3, 8, 1, 3]).unwrap();
//! assert_eq!(sorted, vec![1, 3, 3, 5, 8]);
//!
//! let words = hazard_sort::sort_by(vec!["pear", "fig", "apple"], |a, b| a.len().cmp(&b.len())).unwrap();
//! assert_eq!(words[0], "fig");
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod config;
pub mod error;
pub mod sort;

mod loom;

use core::cmp::Ordering;

pub use concurrency::{ConcurrentStack, HazardRegistry};
pub use config::{IdlePolicy, SorterConfig};
pub use error::{HazardError, SortError};
pub use sort::{SortOutcome, SortReport, Sorter};

/// Sorts `data` in ascending order with the default configuration.
///
/// # Errors
/// See [`Sorter::execute`].
pub fn sort<T>(data: Vec<T>) -> Result<Vec<T>, SortError>
where
    T: Ord + Send,
{
    Sorter::default().sort(data)
}

/// Sorts `data` with `compare` and the default configuration.
///
/// # Errors
/// See [`Sorter::execute`].
pub fn sort_by<T, C>(data: Vec<T>, compare: C) -> Result<Vec<T>, SortError>
where
    T: Send,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    Sorter::default().sort_by(data, compare)
}

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // The registry handle is a single `Arc`.
    assert!(mem::size_of::<HazardRegistry>() == mem::size_of::<usize>());

    // Idle policy travels by value through the hot loop.
    assert!(mem::size_of::<IdlePolicy>() == 1);
};
