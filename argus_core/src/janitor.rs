//! Stale-region cleanup.
//!
//! A sink that dies without running its destructor leaves a region file
//! with `sink_present` still set, which makes the next `bind` fail with
//! `AddressInUse`. The janitor resolves this by name: it marks the node
//! END so surviving sources drain out, then unlinks the backing file so a
//! fresh sink can bind. Mutex state in the stale header is deliberately
//! ignored - its holder is dead.

use std::sync::atomic::Ordering;

use crate::error::{ArgusError, ArgusResult};
use crate::layout::{region_name, NodeState, PAYLOAD_OFFSET};
use crate::memory::ShmRegion;
use crate::node::NodeView;
use crate::sync;

/// Scrub the region behind `address`. Returns `true` if a region existed
/// and was removed, `false` if there was nothing to clean.
///
/// Safe to run against a live node only as an operator decision: the live
/// sink will observe END on its next `wait`.
pub fn scrub(address: &str) -> ArgusResult<bool> {
    let name = region_name(address);
    let region = match ShmRegion::open(&name) {
        Ok(region) => region,
        Err(ArgusError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    if region.size() >= PAYLOAD_OFFSET {
        let view = NodeView::over_fresh(region, 0);
        let header = view.header();
        // Terminal state first, then wake every parked peer. No mutex: a
        // crashed owner may still "hold" it.
        header.set_state(NodeState::End);
        header.sink_present.store(0, Ordering::Release);
        sync::notify_all(&header.read_ready);
        sync::notify_all(&header.write_ready);
    }

    ShmRegion::unlink(&name);
    log::info!("janitor scrubbed '{address}'");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Sink, Source};

    fn unique_address(prefix: &str) -> String {
        format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )
    }

    #[test]
    fn scrub_missing_region_is_a_noop() {
        let addr = unique_address("janitor_none");
        assert!(!scrub(&addr).unwrap());
    }

    #[test]
    fn scrub_unblocks_a_crashed_address() {
        let addr = unique_address("janitor_crash");
        let name = region_name(&addr);

        // Simulate a crash: bind, then leak the sink so its destructor
        // (which would clear sink_present and unlink) never runs.
        let mut sink = Sink::new();
        sink.bind(&addr, 32).unwrap();
        std::mem::forget(sink);
        assert!(ShmRegion::exists(&name));

        // A second sink is locked out until the janitor runs.
        let mut blocked = Sink::new();
        assert!(matches!(
            blocked.bind(&addr, 32),
            Err(ArgusError::AddressInUse(_))
        ));

        assert!(scrub(&addr).unwrap());
        assert!(!ShmRegion::exists(&name));

        let mut fresh = Sink::new();
        fresh.bind(&addr, 32).expect("bind after scrub");
    }

    #[test]
    fn survivors_observe_end_after_scrub() {
        let addr = unique_address("janitor_survivor");

        let mut sink = Sink::new();
        sink.bind(&addr, 16).unwrap();

        let mut source = Source::new();
        source.touch(&addr).unwrap();
        source.connect().unwrap();

        std::mem::forget(sink); // crash the writer
        assert!(scrub(&addr).unwrap());

        assert!(source.wait().unwrap().is_end());
    }
}
