//! Process-shared mutex over a single futex word.
//!
//! Two-phase lock: word 0 = free, 1 = locked, 2 = locked with (possible)
//! waiters. Uncontended lock/unlock is a single CAS/swap; contended paths
//! go through the futex. Waits are timed at [`super::WAIT_TICK`], so a
//! dead lock holder stalls peers by ticks, not forever - the node-level
//! protocol detects END/stale state on each retry.

use super::futex::{futex_wait, futex_wake};
use super::WAIT_TICK;
use std::sync::atomic::{AtomicU32, Ordering};

const FREE: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// RAII guard for a locked mutex word. Unlocks on drop.
pub struct MutexGuard<'a> {
    word: &'a AtomicU32,
}

impl<'a> MutexGuard<'a> {
    /// The word this guard will unlock; used by condvar re-lock.
    pub(crate) fn word(&self) -> &'a AtomicU32 {
        self.word
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if self.word.swap(FREE, Ordering::Release) == CONTENDED {
            futex_wake(self.word, 1);
        }
    }
}

/// Acquire the mutex word, blocking in bounded ticks until it is free.
pub fn lock(word: &AtomicU32) -> MutexGuard<'_> {
    if word
        .compare_exchange(FREE, LOCKED, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
    {
        return MutexGuard { word };
    }

    loop {
        // Announce contention so the holder knows to wake us.
        let previous = word.swap(CONTENDED, Ordering::Acquire);
        if previous == FREE {
            return MutexGuard { word };
        }
        futex_wait(word, CONTENDED, Some(WAIT_TICK));
    }
}
