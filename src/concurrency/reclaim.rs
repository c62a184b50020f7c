//! Deferred reclamation of unlinked nodes.
//!
//! A node that is still published in some hazard slot when it gets unlinked
//! cannot be freed on the spot. It is wrapped in a [`Retired`] entry and
//! pushed onto a lock-free intrusive list. Later scans free whatever is no
//! longer protected and push the rest back.

use core::ptr;

use crate::concurrency::hazard::HazardRegistry;
use crate::loom::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// A type-erased allocation waiting to be freed.
pub struct Retired {
    addr: *mut u8,
    deleter: unsafe fn(*mut u8),
    next: *mut Retired,
}

impl Retired {
    /// Wraps a pointer obtained from `Box::into_raw`.
    ///
    /// # Safety
    /// `addr` must come from `Box::<N>::into_raw`, must already be unreachable
    /// for new readers, and must not be freed by anyone else.
    pub unsafe fn new<N>(addr: *mut N) -> Box<Self> {
        unsafe fn drop_boxed<N>(addr: *mut u8) {
            drop(Box::from_raw(addr.cast::<N>()));
        }

        Box::new(Self {
            addr: addr.cast(),
            deleter: drop_boxed::<N>,
            next: ptr::null_mut(),
        })
    }

    /// Runs the destructor and releases the entry itself.
    ///
    /// # Safety
    /// No thread may still dereference the wrapped address.
    unsafe fn reclaim(self: Box<Self>) {
        (self.deleter)(self.addr);
    }
}

/// Lock-free list of [`Retired`] entries.
pub struct ReclamationList {
    head: AtomicPtr<Retired>,
    len: AtomicUsize,
}

impl ReclamationList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of entries awaiting reclamation.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if nothing is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Pushes an entry. Always succeeds.
    pub fn enqueue(&self, entry: Box<Retired>) {
        self.len.fetch_add(1, Ordering::Relaxed);
        self.link(Box::into_raw(entry));
    }

    /// Retires a boxed node for later freeing.
    ///
    /// # Safety
    /// Same contract as [`Retired::new`].
    pub unsafe fn retire<N>(&self, addr: *mut N) {
        self.enqueue(Retired::new(addr));
    }

    /// Takes the whole list, frees every entry that no slot in `registry`
    /// protects, and re-enqueues the rest.
    ///
    /// Returns the number of entries freed.
    pub fn drain_and_retry(&self, registry: &HazardRegistry) -> usize {
        let mut current = self.head.swap(ptr::null_mut(), Ordering::AcqRel);
        let mut freed = 0;
        while !current.is_null() {
            // SAFETY: entries are only reachable from the list, and the swap
            // above made this thread their sole owner.
            let entry = unsafe { Box::from_raw(current) };
            current = entry.next;
            if registry.is_protected(entry.addr) {
                self.link(Box::into_raw(entry));
            } else {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: unlinked before retirement and not published in
                // any hazard slot.
                unsafe { entry.reclaim() };
                freed += 1;
            }
        }
        #[cfg(feature = "tracing")]
        if freed > 0 {
            tracing::trace!(freed, pending = self.len(), "deferred nodes reclaimed");
        }
        freed
    }

    fn link(&self, entry: *mut Retired) {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `entry` is exclusively owned until the CAS publishes it.
            unsafe { (*entry).next = head };
            match self
                .head
                .compare_exchange_weak(head, entry, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }
}

impl Default for ReclamationList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReclamationList {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: `&mut self` rules out concurrent scans and poppers.
            let entry = unsafe { Box::from_raw(current) };
            current = entry.next;
            unsafe { entry.reclaim() };
        }
    }
}

unsafe impl Send for ReclamationList {}
unsafe impl Sync for ReclamationList {}
