//! In-process bounded SPSC ring buffer.
//!
//! Exactly one producer thread and one consumer thread per ring, enforced
//! by construction at the call sites (bridge pump, recorder writer lanes),
//! not by runtime checks. Head and tail live on separate cache lines and
//! each side keeps a lazily refreshed copy of the other's counter, so the
//! hot paths touch a foreign cache line only when the ring looks full or
//! empty.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-line aligned wrapper to prevent false sharing.
#[repr(C, align(64))]
struct CachePadded<T>(T);

/// Bounded single-producer/single-consumer ring.
///
/// Capacity is rounded up to the next power of two so index masking is a
/// single AND.
pub struct SpscRing<T> {
    /// Producer-owned publish counter.
    head: CachePadded<AtomicU64>,
    /// Consumer-owned consume counter.
    tail: CachePadded<AtomicU64>,
    /// Producer-side stale copy of `tail`.
    cached_tail: CachePadded<AtomicU64>,
    /// Consumer-side stale copy of `head`.
    cached_head: CachePadded<AtomicU64>,
    mask: u64,
    capacity: u64,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: single producer writes slots and head; single consumer reads
// slots and writes tail; Release/Acquire on the counters publishes slot
// contents. The cached copies are plain atomics touched only by their one
// owning side.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a ring holding at least `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = capacity.max(1).next_power_of_two() as u64;
        let mut slots = Vec::with_capacity(cap as usize);
        for _ in 0..cap {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            head: CachePadded(AtomicU64::new(0)),
            tail: CachePadded(AtomicU64::new(0)),
            cached_tail: CachePadded(AtomicU64::new(0)),
            cached_head: CachePadded(AtomicU64::new(0)),
            mask: cap - 1,
            capacity: cap,
            slots: slots.into(),
        }
    }

    /// Producer: append one item, or hand it back if the ring is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let head = self.head.0.load(Ordering::Relaxed);
        let mut tail = self.cached_tail.0.load(Ordering::Relaxed);
        if head.wrapping_sub(tail) >= self.capacity {
            tail = self.tail.0.load(Ordering::Acquire);
            self.cached_tail.0.store(tail, Ordering::Relaxed);
            if head.wrapping_sub(tail) >= self.capacity {
                return Err(item);
            }
        }
        let index = (head & self.mask) as usize;
        // SAFETY: the slot at `head` is outside [tail, head), so the
        // consumer is not reading it; we are the only producer.
        unsafe {
            (*self.slots[index].get()).write(item);
        }
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Consumer: take the oldest item, or `None` if the ring is empty.
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let mut head = self.cached_head.0.load(Ordering::Relaxed);
        if tail >= head {
            head = self.head.0.load(Ordering::Acquire);
            self.cached_head.0.store(head, Ordering::Relaxed);
            if tail >= head {
                return None;
            }
        }
        let index = (tail & self.mask) as usize;
        // SAFETY: slot is in [tail, head): written by the producer and
        // published by the Release store on head.
        let item = unsafe { (*self.slots[index].get()).assume_init_read() };
        self.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Items currently queued (approximate under concurrency).
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Acquire);
        let tail = self.tail.0.load(Ordering::Acquire);
        head.wrapping_sub(tail) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usable capacity (power of two).
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        let head = *self.head.0.get_mut();
        let tail = *self.tail.0.get_mut();
        for i in tail..head {
            let index = (i & self.mask) as usize;
            // SAFETY: exclusive access (&mut self); slots in [tail, head)
            // hold initialized, unconsumed items.
            unsafe {
                self.slots[index].get_mut().assume_init_drop();
            }
        }
    }
}
