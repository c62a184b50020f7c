//! A oneshot completion slot.
//!
//! Designed for single-producer, single-consumer hand-off of a single value:
//! the producer publishes once, the consumer observes "ready" and takes the
//! value exactly once. The producer's write happens-before the consumer's
//! successful read.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const STATE_EMPTY: u8 = 0;
const STATE_READY: u8 = 1;
const STATE_DISCONNECTED: u8 = 2;
const STATE_CONSUMED: u8 = 3;

/// The internal state of the slot.
struct SlotState<T> {
    data: UnsafeCell<MaybeUninit<T>>,
    state: AtomicU8,
}

unsafe impl<T: Send> Send for SlotState<T> {}
unsafe impl<T: Send> Sync for SlotState<T> {}

/// The publishing half of the slot.
pub struct Sender<T> {
    state: Arc<SlotState<T>>,
}

/// The awaiting half of the slot.
pub struct Receiver<T> {
    state: Arc<SlotState<T>>,
}

/// Error returned by [`Receiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing has been published yet.
    Empty,
    /// The sender went away without publishing, or the value was already taken.
    Disconnected,
}

/// Creates a new completion slot.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let state = Arc::new(SlotState {
        data: UnsafeCell::new(MaybeUninit::uninit()),
        state: AtomicU8::new(STATE_EMPTY),
    });

    (
        Sender {
            state: state.clone(),
        },
        Receiver { state },
    )
}

impl<T> Sender<T> {
    /// Publishes `value`, consuming the sender.
    ///
    /// # Errors
    /// Hands the value back if the receiver was already dropped.
    pub fn send(self, value: T) -> Result<(), T> {
        // Safety: only the sender writes, and only before leaving EMPTY.
        unsafe {
            (*self.state.data.get()).write(value);
        }

        match self.state.state.compare_exchange(
            STATE_EMPTY,
            STATE_READY,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                // Prevent Drop from marking the slot disconnected.
                std::mem::forget(self);
                Ok(())
            }
            Err(_) => {
                // Receiver is gone; take the value back.
                let value = unsafe { (*self.state.data.get()).assume_init_read() };
                Err(value)
            }
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let _ = self.state.state.compare_exchange(
            STATE_EMPTY,
            STATE_DISCONNECTED,
            Ordering::Release,
            Ordering::Relaxed,
        );
    }
}

impl<T> Receiver<T> {
    /// Takes the value if it has been published.
    ///
    /// Succeeds at most once; afterwards the slot reports `Disconnected`.
    ///
    /// # Errors
    /// [`TryRecvError::Empty`] while nothing is published,
    /// [`TryRecvError::Disconnected`] once nothing ever will be.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match self.state.state.compare_exchange(
            STATE_READY,
            STATE_CONSUMED,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            // Safety: READY means the sender finished writing, and the CAS
            // above makes this the only read.
            Ok(_) => Ok(unsafe { (*self.state.data.get()).assume_init_read() }),
            Err(STATE_EMPTY) => Err(TryRecvError::Empty),
            Err(_) => Err(TryRecvError::Disconnected),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        // If dropped while READY, we own the data and must drop it.
        let s = self.state.state.swap(STATE_CONSUMED, Ordering::Acquire);
        if s == STATE_READY {
            unsafe {
                let ptr = self.state.data.get();
                (*ptr).assume_init_drop();
            }
        }
    }
}
