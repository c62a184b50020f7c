//! Error types.

use core::fmt;

/// Failure to obtain a hazard slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardError {
    /// Every slot of the registry is owned by another thread.
    Exhausted {
        /// Size of the registry that ran out.
        capacity: usize,
    },
    /// The handle outlived its thread's registration.
    Released,
}

impl fmt::Display for HazardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { capacity } => {
                write!(f, "no hazard slot available (capacity {capacity})")
            }
            Self::Released => f.write_str("hazard slot was released by its thread"),
        }
    }
}

impl std::error::Error for HazardError {}

/// Error returned by the sorting entry points.
///
/// A sort either returns the complete sorted sequence or one of these; it
/// never hands back a partially sorted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortError {
    /// A participating thread could not register with the hazard registry.
    Hazard(HazardError),
    /// A chunk's completion slot was dropped before a result was published,
    /// typically because the comparator panicked on a worker thread.
    ChunkAbandoned,
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hazard(err) => write!(f, "sort aborted: {err}"),
            Self::ChunkAbandoned => f.write_str("sort aborted: a chunk was abandoned unsorted"),
        }
    }
}

impl std::error::Error for SortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hazard(err) => Some(err),
            Self::ChunkAbandoned => None,
        }
    }
}

impl From<HazardError> for SortError {
    fn from(err: HazardError) -> Self {
        Self::Hazard(err)
    }
}
