//! A fixed-capacity hazard-pointer registry.
//!
//! Each participating thread owns at most one slot per registry. A slot pairs
//! an owner token with the single address that thread is about to
//! dereference. Reclaimers call [`HazardRegistry::is_protected`] before
//! freeing anything that may still be in another thread's hands.
//!
//! Registration is cached in a thread-local lease list, so a thread pays for
//! the slot scan only once. The lease holds a [`Weak`] reference: when the
//! thread exits the slot is handed back, unless the registry is already gone.
//!
//! ```
//! use hazard_sort::concurrency::HazardRegistry;
//!
//! let registry = HazardRegistry::with_capacity(4);
//! let mut value = 7u64;
//! let addr = (&mut value as *mut u64).cast::<u8>();
//!
//! let hp = registry.acquire_for_current_thread().unwrap();
//! hp.protect(addr).unwrap();
//! assert!(registry.is_protected(addr));
//! hp.clear();
//! assert!(!registry.is_protected(addr));
//!
//! registry.release_current_thread();
//! assert_eq!(registry.owned_slots(), 0);
//! // The handle no longer owns a slot and cannot publish.
//! assert!(hp.protect(addr).is_err());
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::ptr;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

use crossbeam_utils::CachePadded;

use crate::error::HazardError;
use crate::loom::atomic::{AtomicPtr, AtomicU64, Ordering};
use crate::loom::thread_local;

/// Default number of slots, one per participating thread.
pub const DEFAULT_HAZARD_SLOTS: usize = 100;

/// Owner token of a slot nobody holds.
const FREE: u64 = 0;

// Identity counters are plain std atomics: they only hand out unique numbers
// and never take part in the reclamation protocol.
static NEXT_THREAD_TOKEN: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
static NEXT_REGISTRY_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 =
        NEXT_THREAD_TOKEN.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    static LEASES: RefCell<Vec<SlotLease>> = RefCell::new(Vec::new());
}

/// One entry of the registry table.
struct HazardSlot {
    owner: AtomicU64,
    protected: AtomicPtr<u8>,
}

impl HazardSlot {
    fn new() -> Self {
        Self {
            owner: AtomicU64::new(FREE),
            protected: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn try_claim(&self, token: u64) -> bool {
        self.owner
            .compare_exchange(FREE, token, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    fn release(&self) {
        self.protected.store(ptr::null_mut(), Ordering::SeqCst);
        self.owner.store(FREE, Ordering::Release);
    }

    fn is_owned_by(&self, token: u64) -> bool {
        self.owner.load(Ordering::Acquire) == token
    }
}

struct RegistryInner {
    id: u64,
    slots: Box<[CachePadded<HazardSlot>]>,
}

/// A thread's claim on one slot, kept in thread-local storage.
struct SlotLease {
    registry_id: u64,
    registry: Weak<RegistryInner>,
    index: usize,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.slots[self.index].release();
            #[cfg(feature = "tracing")]
            tracing::trace!(registry = self.registry_id, slot = self.index, "hazard slot released");
        }
    }
}

/// A shared table of hazard slots.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone)]
pub struct HazardRegistry {
    inner: Arc<RegistryInner>,
}

impl HazardRegistry {
    /// Creates a registry with [`DEFAULT_HAZARD_SLOTS`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HAZARD_SLOTS)
    }

    /// Creates a registry with exactly `capacity` slots.
    ///
    /// A capacity of zero is allowed; every acquisition then fails.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| CachePadded::new(HazardSlot::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            inner: Arc::new(RegistryInner {
                id: NEXT_REGISTRY_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
                slots,
            }),
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of slots currently owned by some thread.
    pub fn owned_slots(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.owner.load(Ordering::Acquire) != FREE)
            .count()
    }

    /// Returns the calling thread's slot, claiming a free one on first use.
    ///
    /// # Errors
    /// Returns [`HazardError::Exhausted`] when every slot is owned by another
    /// thread. This is not retried.
    pub fn acquire_for_current_thread(&self) -> Result<HazardPointer<'_>, HazardError> {
        let id = self.inner.id;
        let cached = LEASES.with(|leases| {
            let mut leases = leases.borrow_mut();
            leases.retain(|lease| lease.registry.strong_count() > 0);
            leases
                .iter()
                .find(|lease| lease.registry_id == id)
                .map(|lease| lease.index)
        });
        let token = THREAD_TOKEN.with(|token| *token);
        if let Some(index) = cached {
            return Ok(self.pointer(index, token));
        }

        let Some(index) = self
            .inner
            .slots
            .iter()
            .position(|slot| slot.try_claim(token))
        else {
            #[cfg(feature = "tracing")]
            tracing::warn!(registry = id, capacity = self.capacity(), "no hazard slot available");
            return Err(HazardError::Exhausted {
                capacity: self.capacity(),
            });
        };

        LEASES.with(|leases| {
            leases.borrow_mut().push(SlotLease {
                registry_id: id,
                registry: Arc::downgrade(&self.inner),
                index,
            });
        });
        #[cfg(feature = "tracing")]
        tracing::trace!(registry = id, slot = index, "hazard slot acquired");
        Ok(self.pointer(index, token))
    }

    /// Returns `true` if the calling thread currently holds a slot here.
    pub fn is_registered_current_thread(&self) -> bool {
        let id = self.inner.id;
        LEASES.with(|leases| leases.borrow().iter().any(|lease| lease.registry_id == id))
    }

    /// Ends the calling thread's registration, if it has one.
    ///
    /// The slot's protected address and owner are reset so that another
    /// thread can claim it. Thread exit does the same implicitly. Handles
    /// obtained before the release stop publishing.
    pub fn release_current_thread(&self) {
        let id = self.inner.id;
        let released = LEASES.with(|leases| {
            let mut leases = leases.borrow_mut();
            leases
                .iter()
                .position(|lease| lease.registry_id == id)
                .map(|at| leases.swap_remove(at))
        });
        drop(released);
    }

    /// Returns `true` if any slot currently protects `addr`.
    pub fn is_protected(&self, addr: *const u8) -> bool {
        self.inner
            .slots
            .iter()
            .any(|slot| ptr::eq(slot.protected.load(Ordering::SeqCst), addr))
    }

    fn pointer(&self, index: usize, token: u64) -> HazardPointer<'_> {
        HazardPointer {
            slot: &self.inner.slots[index],
            token,
            _not_send: PhantomData,
        }
    }
}

impl Default for HazardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HazardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardRegistry")
            .field("id", &self.inner.id)
            .field("capacity", &self.capacity())
            .field("owned", &self.owned_slots())
            .finish()
    }
}

/// The calling thread's view of its own slot.
///
/// A handle only writes while its thread still owns the slot, and it never
/// leaves that thread. Only the owning thread can release a slot, so the
/// ownership check cannot go stale between the check and the store.
pub struct HazardPointer<'r> {
    slot: &'r HazardSlot,
    token: u64,
    _not_send: PhantomData<*mut ()>,
}

impl HazardPointer<'_> {
    /// Publishes `addr` as "about to be dereferenced".
    ///
    /// The caller must re-read its source afterwards: the publication only
    /// protects `addr` if it was still reachable after the store.
    ///
    /// # Errors
    /// Returns [`HazardError::Released`] if the thread's registration ended
    /// after this handle was obtained. Nothing is published in that case.
    #[inline]
    pub fn protect(&self, addr: *mut u8) -> Result<(), HazardError> {
        if !self.slot.is_owned_by(self.token) {
            return Err(HazardError::Released);
        }
        self.slot.protected.store(addr, Ordering::SeqCst);
        Ok(())
    }

    /// Withdraws the current publication.
    ///
    /// Does nothing once the thread's registration has ended; the slot may
    /// belong to another thread by then.
    #[inline]
    pub fn clear(&self) {
        if self.slot.is_owned_by(self.token) {
            self.slot.protected.store(ptr::null_mut(), Ordering::Release);
        }
    }

    /// The currently published address (null if none).
    #[inline]
    pub fn protected(&self) -> *mut u8 {
        self.slot.protected.load(Ordering::Acquire)
    }
}
