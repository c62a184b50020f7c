//! Sorter configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use hazard_sort::{IdlePolicy, SorterConfig};
//!
//! let config = SorterConfig::from_json(r#"{ "max_workers": 2, "idle": "snooze" }"#).unwrap();
//! assert_eq!(config.max_workers, Some(2));
//! assert_eq!(config.idle, IdlePolicy::Snooze);
//! assert_eq!(config.hazard_slots, hazard_sort::concurrency::DEFAULT_HAZARD_SLOTS);
//! assert_eq!(config.worker_cap(), 2);
//! ```

use std::thread;

use crossbeam_utils::Backoff;
use serde::{Deserialize, Serialize};

use crate::concurrency::DEFAULT_HAZARD_SLOTS;

/// Default stack size for worker threads.
///
/// Recursion depth is bounded only by the input, not by the pivot, so
/// workers get more room than the platform default.
pub const DEFAULT_WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// What a thread does when it finds the work stack empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Give up the time slice on every miss.
    #[default]
    Yield,
    /// Spin with exponential backoff, never yielding.
    Spin,
    /// Spin first, then yield once backoff is exhausted.
    Snooze,
}

impl IdlePolicy {
    /// Pauses once according to the policy.
    #[inline]
    pub fn pause(self, backoff: &Backoff) {
        match self {
            Self::Yield => thread::yield_now(),
            Self::Spin => backoff.spin(),
            Self::Snooze => backoff.snooze(),
        }
    }
}

/// Tunables for a [`Sorter`](crate::Sorter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    /// Upper bound on worker threads; `None` means hardware parallelism − 1.
    pub max_workers: Option<usize>,
    /// Number of hazard slots, i.e. the most threads that may pop at once.
    pub hazard_slots: usize,
    /// Cadence of the worker loop and of helping while awaiting a chunk.
    pub idle: IdlePolicy,
    /// Stack size for worker threads; `None` keeps the platform default.
    pub worker_stack_size: Option<usize>,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            hazard_slots: DEFAULT_HAZARD_SLOTS,
            idle: IdlePolicy::default(),
            worker_stack_size: Some(DEFAULT_WORKER_STACK_SIZE),
        }
    }
}

impl SorterConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed input or unknown variants.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets [`max_workers`](Self::max_workers).
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Sets [`hazard_slots`](Self::hazard_slots).
    #[must_use]
    pub fn with_hazard_slots(mut self, hazard_slots: usize) -> Self {
        self.hazard_slots = hazard_slots;
        self
    }

    /// Sets [`idle`](Self::idle).
    #[must_use]
    pub fn with_idle(mut self, idle: IdlePolicy) -> Self {
        self.idle = idle;
        self
    }

    /// The worker cap this configuration resolves to.
    ///
    /// Without an explicit bound this is the available parallelism minus the
    /// calling thread, or zero when parallelism cannot be queried.
    pub fn worker_cap(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get() - 1)
                .unwrap_or(0)
        })
    }
}
