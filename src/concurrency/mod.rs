//! Lock-free building blocks for the sorter.
//!
//! Important: the stack hands out owned values and never references, so the
//! only raw pointers that cross threads are the ones published in hazard
//! slots. All reclamation decisions go through the [`HazardRegistry`].

pub mod hazard;
pub mod oneshot;
pub mod reclaim;
pub mod worklist;

pub use hazard::{HazardPointer, HazardRegistry, DEFAULT_HAZARD_SLOTS};
pub use reclaim::{ReclamationList, Retired};
pub use worklist::ConcurrentStack;
