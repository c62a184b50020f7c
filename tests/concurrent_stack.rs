#![cfg(not(loom))]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hazard_sort::{ConcurrentStack, HazardError, HazardRegistry};

struct DropCounter {
    id: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn concurrent_stack_single_thread_lifo() {
    let s = ConcurrentStack::new(HazardRegistry::with_capacity(1));
    s.push(1);
    s.push(2);
    s.push(3);
    assert_eq!(s.pop(), Ok(Some(3)));
    assert_eq!(s.pop(), Ok(Some(2)));
    assert_eq!(s.pop(), Ok(Some(1)));
    assert_eq!(s.pop(), Ok(None));
    s.registry().release_current_thread();
}

#[test]
fn concurrent_stack_eight_threads_push_then_drain() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let s = ConcurrentStack::new(HazardRegistry::with_capacity(THREADS));

    std::thread::scope(|scope| {
        let s = &s;
        for t in 0..THREADS {
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    s.push(t * PER_THREAD + i);
                }
            });
        }
    });

    let popped: Vec<Vec<usize>> = std::thread::scope(|scope| {
        let s = &s;
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    let mut mine = Vec::new();
                    while let Some(v) = s.pop().unwrap() {
                        mine.push(v);
                    }
                    s.registry().release_current_thread();
                    mine
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::with_capacity(THREADS * PER_THREAD);
    for v in popped.into_iter().flatten() {
        assert!(seen.insert(v), "value {v} popped twice");
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD);
    assert!(s.is_empty());
    assert_eq!(s.registry().owned_slots(), 0);

    s.reclaim();
    assert_eq!(s.pending_reclamation(), 0);
}

#[test]
fn concurrent_stack_interleaved_push_pop() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let s = ConcurrentStack::new(HazardRegistry::with_capacity(THREADS + 1));
    let popped: Vec<Vec<usize>> = std::thread::scope(|scope| {
        let s = &s;
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                scope.spawn(move || {
                    let mut mine = Vec::new();
                    for i in 0..PER_THREAD {
                        s.push(t * PER_THREAD + i);
                        if i % 2 == 1 {
                            mine.extend(s.pop().unwrap());
                        }
                    }
                    while let Some(v) = s.pop().unwrap() {
                        mine.push(v);
                    }
                    mine
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut all: Vec<usize> = popped.into_iter().flatten().collect();
    while let Some(v) = s.pop().unwrap() {
        all.push(v);
    }
    all.sort_unstable();
    assert_eq!(all, (0..THREADS * PER_THREAD).collect::<Vec<_>>());
    s.registry().release_current_thread();
}

#[test]
fn concurrent_stack_drops_each_value_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let registry = HazardRegistry::with_capacity(4);
    let taken = {
        let s = ConcurrentStack::new(registry.clone());
        for id in 0..1_000 {
            s.push(DropCounter {
                id,
                drops: drops.clone(),
            });
        }

        let taken = std::thread::scope(|scope| {
            let s = &s;
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    scope.spawn(move || {
                        let mut ids = Vec::new();
                        for _ in 0..200 {
                            if let Some(item) = s.pop().unwrap() {
                                ids.push(item.id);
                            }
                        }
                        ids
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().len())
                .sum::<usize>()
        });
        assert_eq!(taken, 600);
        assert_eq!(drops.load(Ordering::SeqCst), 600);
        taken
    };
    // The 400 values still linked are dropped with the stack.
    assert_eq!(drops.load(Ordering::SeqCst), taken + 400);
}

#[test]
fn concurrent_stack_pop_fails_when_slots_run_out() {
    let registry = HazardRegistry::with_capacity(1);
    let s = ConcurrentStack::new(registry.clone());
    s.push(7);

    // The main thread holds the only slot.
    assert_eq!(s.pop(), Ok(Some(7)));
    s.push(8);

    let other = std::thread::scope(|scope| scope.spawn(|| s.pop()).join().unwrap());
    assert_eq!(other, Err(HazardError::Exhausted { capacity: 1 }));

    registry.release_current_thread();
    let other = std::thread::scope(|scope| scope.spawn(|| s.pop()).join().unwrap());
    assert_eq!(other, Ok(Some(8)));
    // That thread has exited, so its slot is free again.
    assert_eq!(registry.owned_slots(), 0);
}

#[test]
fn concurrent_stack_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConcurrentStack<String>>();
    assert_send_sync::<HazardRegistry>();
}
