//! Lock-free worklists for parallel algorithms.

pub mod concurrent_stack;

pub use concurrent_stack::ConcurrentStack;
