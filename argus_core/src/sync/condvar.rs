//! Process-shared condition variables over futex sequence words.
//!
//! A condvar here is just a monotonically bumped `AtomicU32`. A waiter
//! snapshots the sequence while holding the node mutex, releases the
//! mutex, futex-waits on the sequence word, and re-locks. A notifier bumps
//! the sequence and wakes. The caller always re-checks its predicate in a
//! loop; combined with timed waits this makes lost wake-ups harmless.

use super::futex::{futex_wait, futex_wake};
use super::mutex::{lock, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

impl<'a> MutexGuard<'a> {
    /// Atomically release the mutex, wait (bounded by `timeout`) for `seq`
    /// to be bumped, and re-acquire the mutex.
    pub fn wait_on(self, seq: &AtomicU32, timeout: Duration) -> MutexGuard<'a> {
        let word = self.word();
        let snapshot = seq.load(Ordering::Acquire);
        drop(self); // release before sleeping
        futex_wait(seq, snapshot, Some(timeout));
        lock(word)
    }
}

/// Bump the sequence and wake every waiter.
pub fn notify_all(seq: &AtomicU32) {
    seq.fetch_add(1, Ordering::AcqRel);
    futex_wake(seq, i32::MAX);
}

/// Bump the sequence and wake a single waiter.
pub fn notify_one(seq: &AtomicU32) {
    seq.fetch_add(1, Ordering::AcqRel);
    futex_wake(seq, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::WAIT_TICK;
    use std::sync::Arc;
    use std::time::Instant;

    struct Pair {
        mutex: AtomicU32,
        cond: AtomicU32,
        flag: AtomicU32,
    }

    #[test]
    fn notified_waiter_wakes_promptly() {
        let pair = Arc::new(Pair {
            mutex: AtomicU32::new(0),
            cond: AtomicU32::new(0),
            flag: AtomicU32::new(0),
        });

        let p = pair.clone();
        let waiter = std::thread::spawn(move || {
            let mut guard = lock(&p.mutex);
            let start = Instant::now();
            while p.flag.load(Ordering::Acquire) == 0 {
                guard = guard.wait_on(&p.cond, WAIT_TICK);
                if start.elapsed() > Duration::from_secs(5) {
                    panic!("condvar wait never observed the flag");
                }
            }
            drop(guard);
        });

        std::thread::sleep(Duration::from_millis(20));
        {
            let _g = lock(&pair.mutex);
            pair.flag.store(1, Ordering::Release);
        }
        notify_all(&pair.cond);
        waiter.join().unwrap();
    }

    #[test]
    fn wait_without_notify_times_out_per_tick() {
        let mutex = AtomicU32::new(0);
        let cond = AtomicU32::new(0);
        let guard = lock(&mutex);
        let start = Instant::now();
        let guard = guard.wait_on(&cond, Duration::from_millis(15));
        assert!(start.elapsed() >= Duration::from_millis(5));
        drop(guard);
        assert_eq!(mutex.load(Ordering::Relaxed), 0);
    }
}
