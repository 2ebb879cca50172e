//! Node endpoints: the one-writer/many-reader rendezvous protocol.
//!
//! A node is the synchronization object at the front of a shared region
//! (see [`crate::layout`]). A [`Sink`] constructs and owns it; any number
//! of [`Source`]s attach to it. Each published sample is gated by one full
//! barrier cycle:
//!
//! ```text
//! sink.wait()            blocks until every attached source has posted
//! write into retrieve()d view
//! sink.post()            sample_count += 1, broadcast read_ready
//! source.wait()          blocks for an unseen sample (or END)
//! read / copy_to()
//! source.post()          last post signals write_ready
//! ```
//!
//! The payload is opaque bytes at this layer; [`typed`] adds frame and
//! position views on top.

mod sink;
mod source;
#[cfg(test)]
mod tests;
pub mod typed;

pub use sink::{SampleViewMut, Sink};
pub use source::Source;

use crate::error::{ArgusError, ArgusResult};
use crate::layout::{NodeHeader, SideHeader, PAYLOAD_OFFSET, SIDE_HEADER_OFFSET};
use crate::memory::ShmRegion;

/// A mapped region interpreted as node header + side header + payload.
pub(crate) struct NodeView {
    region: ShmRegion,
    payload_len: usize,
}

impl NodeView {
    /// Wrap a mapped region. The caller has already established that a
    /// node header lives at offset 0 (creator) or validated its magic
    /// (attacher); this only checks that the advertised payload fits.
    pub(crate) fn over(region: ShmRegion) -> ArgusResult<Self> {
        if region.size() < PAYLOAD_OFFSET {
            return Err(ArgusError::memory(format!(
                "region '{}' too small for a node header ({} bytes)",
                region.name(),
                region.size()
            )));
        }
        let mut view = Self {
            region,
            payload_len: 0,
        };
        let advertised = view
            .header()
            .payload_bytes
            .load(std::sync::atomic::Ordering::Acquire) as usize;
        if PAYLOAD_OFFSET + advertised > view.region.size() {
            return Err(ArgusError::memory(format!(
                "region '{}' advertises {} payload bytes but holds {}",
                view.region.name(),
                advertised,
                view.region.size() - PAYLOAD_OFFSET
            )));
        }
        view.payload_len = advertised;
        Ok(view)
    }

    /// Creator path: the payload length is being established right now.
    pub(crate) fn over_fresh(region: ShmRegion, payload_len: usize) -> Self {
        Self {
            region,
            payload_len,
        }
    }

    #[inline]
    pub(crate) fn header(&self) -> &NodeHeader {
        // SAFETY: the region is at least PAYLOAD_OFFSET bytes (checked at
        // construction), page-aligned, and every header field is atomic.
        unsafe { &*(self.region.as_ptr() as *const NodeHeader) }
    }

    pub(crate) fn read_side_header(&self) -> SideHeader {
        // SAFETY: fixed in-bounds offset; SideHeader is Pod. The writer
        // publishes the shape before the node leaves Undefined, so reads
        // after connect are stable.
        unsafe {
            std::ptr::read_volatile(self.region.as_ptr().add(SIDE_HEADER_OFFSET) as *const SideHeader)
        }
    }

    pub(crate) fn write_side_header(&self, side: &SideHeader) {
        // SAFETY: fixed in-bounds offset; SideHeader is Pod; only the
        // binding sink writes here, before any source can observe the node.
        unsafe {
            std::ptr::write_volatile(
                self.region.as_mut_ptr().add(SIDE_HEADER_OFFSET) as *mut SideHeader,
                *side,
            )
        }
    }

    #[inline]
    pub(crate) fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Shared payload bytes. Validity windows are enforced by the
    /// endpoint protocol, not by this accessor.
    #[inline]
    pub(crate) fn payload(&self) -> &[u8] {
        // SAFETY: [PAYLOAD_OFFSET, PAYLOAD_OFFSET + payload_len) is in
        // bounds (checked at construction).
        unsafe {
            std::slice::from_raw_parts(self.region.as_ptr().add(PAYLOAD_OFFSET), self.payload_len)
        }
    }

    /// Mutable payload bytes; only the sink inside its write window calls
    /// this.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn payload_mut(&self) -> &mut [u8] {
        // SAFETY: in bounds as above; exclusivity comes from the sample
        // protocol (producer writes only while acknowledged == attached).
        unsafe {
            std::slice::from_raw_parts_mut(
                self.region.as_mut_ptr().add(PAYLOAD_OFFSET),
                self.payload_len,
            )
        }
    }

    /// Unwrap back into the underlying region.
    pub(crate) fn into_region(self) -> ShmRegion {
        self.region
    }
}
