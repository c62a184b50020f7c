//! Switches the atomics and thread-locals that the reclamation protocol depends
//! on over to `loom` when the crate is built with `--cfg loom`.
//!
//! Only the hazard registry, the reclamation list and the stack go through
//! here. Everything else (pool, oneshot slots) stays on `std` and is never
//! exercised inside a loom model.

#[cfg(loom)]
pub(crate) use ::loom::{sync::atomic, thread_local};

#[cfg(not(loom))]
pub(crate) use std::{sync::atomic, thread_local};
