//! Thin futex syscall wrappers (Linux), with a sleep-based fallback.
//!
//! The words live in shared memory mapped by several processes, so the
//! non-PRIVATE futex ops are used. Errors from the syscall (EAGAIN on a
//! changed word, ETIMEDOUT, EINTR) all mean "go re-check the predicate"
//! and are deliberately not surfaced.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub(crate) fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs() as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);

    // SAFETY: word points into a live mapping for the duration of the call;
    // FUTEX_WAIT only sleeps if *word == expected and never writes.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32 as *mut u32,
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
        );
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn futex_wake(word: &AtomicU32, waiters: i32) {
    // SAFETY: word points into a live mapping; FUTEX_WAKE reads nothing
    // beyond the word address.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32 as *mut u32,
            libc::FUTEX_WAKE,
            waiters,
        );
    }
}

// Portable fallback: waiters poll on short sleeps, wakers do nothing. The
// timed-tick discipline in the callers bounds the extra latency.
#[cfg(not(target_os = "linux"))]
pub(crate) fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::sync::atomic::Ordering;
    if word.load(Ordering::Acquire) != expected {
        return;
    }
    let nap = timeout
        .unwrap_or(Duration::from_millis(1))
        .min(Duration::from_millis(1));
    std::thread::sleep(nap);
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn futex_wake(_word: &AtomicU32, _waiters: i32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn wait_returns_on_timeout() {
        let word = AtomicU32::new(0);
        let start = Instant::now();
        futex_wait(&word, 0, Some(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn wait_returns_immediately_on_stale_expectation() {
        let word = AtomicU32::new(7);
        let start = Instant::now();
        futex_wait(&word, 0, Some(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wake_releases_a_waiter() {
        let word = Arc::new(AtomicU32::new(0));
        let w = word.clone();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            // Re-check loop: a timed wait per iteration bounds the race.
            while w.load(Ordering::Acquire) == 0 {
                futex_wait(&w, 0, Some(Duration::from_millis(50)));
            }
            start.elapsed()
        });
        std::thread::sleep(Duration::from_millis(30));
        word.store(1, Ordering::Release);
        futex_wake(&word, 1);
        let waited = handle.join().unwrap();
        assert!(waited < Duration::from_secs(2));
    }
}
