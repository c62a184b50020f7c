//! A lock-free Treiber stack with hazard-pointer reclamation.
//!
//! This is a classic MPMC stack:
//! - `head` is an atomic pointer to the most recently pushed node (or null)
//! - every node owns its value and a plain `next` pointer fixed at push time
//!
//! Safety model:
//! - `pop` publishes the head it is about to dereference in the calling
//!   thread's hazard slot and re-reads `head` before trusting it.
//! - an unlinked node is freed immediately when no slot protects it, and
//!   handed to the [`ReclamationList`] otherwise.
//! - a protected address can never be freed and reallocated, so the head CAS
//!   cannot be fooled by a recycled address (no ABA).

use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr;

use crossbeam_utils::CachePadded;

use crate::concurrency::hazard::HazardRegistry;
use crate::concurrency::reclaim::ReclamationList;
use crate::error::HazardError;
use crate::loom::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    value: ManuallyDrop<T>,
    next: *mut Node<T>,
}

/// A lock-free LIFO stack whose `pop` is safe against concurrent frees.
pub struct ConcurrentStack<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    registry: HazardRegistry,
    retired: ReclamationList,
    _owns: PhantomData<Box<Node<T>>>,
}

unsafe impl<T: Send> Send for ConcurrentStack<T> {}
unsafe impl<T: Send> Sync for ConcurrentStack<T> {}

impl<T> ConcurrentStack<T> {
    /// Creates an empty stack that protects its pops through `registry`.
    pub fn new(registry: HazardRegistry) -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            registry,
            retired: ReclamationList::new(),
            _owns: PhantomData,
        }
    }

    /// The registry this stack publishes hazards in.
    #[inline]
    pub fn registry(&self) -> &HazardRegistry {
        &self.registry
    }

    /// Returns `true` if the stack was empty at the moment of the check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Number of unlinked nodes not yet freed.
    #[inline]
    pub fn pending_reclamation(&self) -> usize {
        self.retired.len()
    }

    /// Pushes `value` onto the stack.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: the node is private to this thread until the CAS succeeds.
            unsafe { (*node).next = head };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Pops the most recently pushed value, if any.
    ///
    /// # Errors
    /// Returns [`HazardError::Exhausted`] if the calling thread has no hazard
    /// slot yet and the registry is full.
    pub fn pop(&self) -> Result<Option<T>, HazardError> {
        let hp = self.registry.acquire_for_current_thread()?;

        let mut old_head = self.head.load(Ordering::SeqCst);
        loop {
            // Publish, then re-verify that the candidate is still the head.
            loop {
                let candidate = old_head;
                hp.protect(candidate.cast())?;
                old_head = self.head.load(Ordering::SeqCst);
                if old_head == candidate {
                    break;
                }
            }
            if old_head.is_null() {
                hp.clear();
                return Ok(None);
            }

            // SAFETY: `old_head` is protected and was the head after
            // publication, so it has not been freed. `next` never changes
            // once the node is reachable.
            let next = unsafe { (*old_head).next };
            match self
                .head
                .compare_exchange(old_head, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(actual) => old_head = actual,
            }
        }
        hp.clear();

        // SAFETY: the successful CAS made this thread the only one allowed to
        // move the value out; other readers only ever look at `next`.
        let value = unsafe { ManuallyDrop::into_inner(ptr::read(ptr::addr_of!((*old_head).value))) };

        if self.registry.is_protected(old_head.cast()) {
            #[cfg(feature = "tracing")]
            tracing::trace!(node = ?old_head, "popped node still protected, deferring");
            // SAFETY: unlinked above; only this thread holds the right to free it.
            unsafe { self.retired.retire(old_head) };
        } else {
            // SAFETY: unlinked and not published in any slot. The value was
            // moved out and `ManuallyDrop` keeps it from being dropped twice.
            drop(unsafe { Box::from_raw(old_head) });
        }
        self.retired.drain_and_retry(&self.registry);

        Ok(Some(value))
    }

    /// Frees every deferred node no longer protected.
    ///
    /// Returns how many were freed.
    pub fn reclaim(&self) -> usize {
        self.retired.drain_and_retry(&self.registry)
    }
}

impl<T> Drop for ConcurrentStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: `&mut self` excludes concurrent pops, so every node
            // still linked is owned by the stack alone.
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next;
            unsafe { ManuallyDrop::drop(&mut node.value) };
        }
    }
}

impl<T> fmt::Debug for ConcurrentStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("is_empty", &self.is_empty())
            .field("pending_reclamation", &self.pending_reclamation())
            .finish_non_exhaustive()
    }
}
