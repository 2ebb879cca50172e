//! Process-shared synchronization over futex words in the node header.
//!
//! The node header carries three `AtomicU32` words: one mutex word and two
//! condvar sequence words. Nothing here allocates or stores pointers, so
//! the primitives work at any fixed offset inside a shared mapping.
//!
//! Every blocking operation is a timed wait of at most [`WAIT_TICK`], so a
//! cooperative shutdown flag or an END transition is observed within one
//! tick even if a wake-up is lost (e.g. the waker died).

pub(crate) mod futex;

mod condvar;
mod mutex;

pub use condvar::{notify_all, notify_one};
pub use mutex::{lock, MutexGuard};

use std::time::Duration;

/// Upper bound on any single blocking wait in the fabric.
pub const WAIT_TICK: Duration = Duration::from_millis(10);
