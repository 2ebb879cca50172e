//! Fixed shared-memory layout of an Argus node.
//!
//! # Region layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ [0..64)   NodeHeader   - magic, key hash, futex words,       │
//! │                          counters, state                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ [64..96)  SideHeader   - producer-published payload shape    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ [96..)    payload bytes (opaque to the fabric)               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is little-endian and 8-byte aligned; sizes are pinned by
//! compile-time assertions. All header fields are atomics because the
//! region is mapped by several processes at once; every field except the
//! futex words themselves is only mutated while the node mutex is held.

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{ArgusError, ArgusResult};

/// Magic value written last during node construction ("ARGUSND1").
pub const NODE_MAGIC: u64 = u64::from_le_bytes(*b"ARGUSND1");

/// Suffix appended to a logical address to name its shared region.
pub const REGION_SUFFIX: &str = "_sh_mem";

/// Suffix appended to a logical address to form the in-region lookup key.
pub const KEY_SUFFIX: &str = "_sh_obj";

/// Extra bytes reserved past the payload when sizing a region.
pub const REGION_SLACK: usize = 1024;

/// Byte offset of the side header within a region.
pub const SIDE_HEADER_OFFSET: usize = 64;

/// Byte offset of the payload within a region.
pub const PAYLOAD_OFFSET: usize = 96;

/// Iterations to spin waiting for a creator to finish initializing.
const MAX_INIT_WAIT_ITERS: u32 = 1_000_000;

/// OS-global region name for a logical address.
pub fn region_name(address: &str) -> String {
    format!("{address}{REGION_SUFFIX}")
}

/// In-region lookup key, stored as an FNV-1a hash in the header and
/// validated on attach.
pub fn key_hash(address: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in address.as_bytes().iter().chain(KEY_SUFFIX.as_bytes()) {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Total region size for a given payload reservation.
pub fn region_size(payload_bytes: usize) -> usize {
    PAYLOAD_OFFSET + payload_bytes + REGION_SLACK
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeState {
    /// Region exists but no sink has bound it.
    Undefined = 0,
    /// A sink is bound; no sample published yet.
    SinkBound = 1,
    /// Normal cycling: at least one sample has been published.
    SourceWaiting = 2,
    /// Terminal: no more samples will be produced.
    End = 3,
}

impl NodeState {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => NodeState::SinkBound,
            2 => NodeState::SourceWaiting,
            3 => NodeState::End,
            _ => NodeState::Undefined,
        }
    }

    /// Whether the node has reached end-of-stream.
    #[inline]
    pub fn is_end(self) -> bool {
        self == NodeState::End
    }
}

/// Node header at region offset 0 (64 bytes).
///
/// `mutex` is a futex word (see [`crate::sync`]); `read_ready` and
/// `write_ready` are condvar sequence words. Counter invariants:
/// `acknowledged_reads <= source_ref_count`, `sample_count` never rolls
/// back.
#[repr(C, align(8))]
pub struct NodeHeader {
    /// Written last during init with Release; attachers spin on it.
    pub magic: AtomicU64,
    /// FNV-1a of `<address>_sh_obj`; validated on attach.
    pub key_hash: AtomicU64,
    /// Process-shared mutex word.
    pub mutex: AtomicU32,
    /// 1 while a live sink owns this node; cleared only by that sink.
    pub sink_present: AtomicU32,
    /// Condvar sequence: bumped by the writer on publish and at END.
    pub read_ready: AtomicU32,
    /// Condvar sequence: bumped when all readers have posted.
    pub write_ready: AtomicU32,
    /// Raw [`NodeState`].
    pub state: AtomicU32,
    /// Number of attached sources.
    pub source_ref_count: AtomicU32,
    /// Sources that have posted for the current sample.
    pub acknowledged_reads: AtomicU32,
    /// Size of the payload region in bytes.
    pub payload_bytes: AtomicU32,
    /// Published samples; increments exactly once per publish.
    pub sample_count: AtomicU64,
    _pad: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == SIDE_HEADER_OFFSET);
const _: () = assert!(std::mem::align_of::<NodeHeader>() == 8);

impl NodeHeader {
    /// Initialize a freshly zeroed header. Only the creating sink calls
    /// this; `magic` goes last so attachers never see a half-built node.
    pub fn init(&self, key: u64, payload_bytes: u32) {
        self.key_hash.store(key, Ordering::Relaxed);
        self.mutex.store(0, Ordering::Relaxed);
        self.sink_present.store(0, Ordering::Relaxed);
        self.read_ready.store(0, Ordering::Relaxed);
        self.write_ready.store(0, Ordering::Relaxed);
        self.state.store(NodeState::Undefined as u32, Ordering::Relaxed);
        self.source_ref_count.store(0, Ordering::Relaxed);
        self.acknowledged_reads.store(0, Ordering::Relaxed);
        self.payload_bytes.store(payload_bytes, Ordering::Relaxed);
        self.sample_count.store(0, Ordering::Relaxed);
        self.magic.store(NODE_MAGIC, Ordering::Release);
    }

    /// Spin until the creator has published `magic`, then validate the
    /// lookup key. Used by attaching sources.
    pub fn wait_initialized(&self, expected_key: u64, address: &str) -> ArgusResult<()> {
        let mut iters = 0u32;
        loop {
            let magic = self.magic.load(Ordering::Acquire);
            if magic == NODE_MAGIC {
                break;
            }
            if magic != 0 {
                return Err(ArgusError::memory(format!(
                    "node '{address}' has invalid magic {magic:#x} (stale or foreign region)"
                )));
            }
            iters += 1;
            if iters > MAX_INIT_WAIT_ITERS {
                return Err(ArgusError::memory(format!(
                    "node '{address}' initialization timed out; creator may have died mid-setup"
                )));
            }
            std::hint::spin_loop();
        }

        let key = self.key_hash.load(Ordering::Acquire);
        if key != expected_key {
            return Err(ArgusError::memory(format!(
                "node '{address}' lookup key mismatch ({key:#x} != {expected_key:#x})"
            )));
        }
        Ok(())
    }

    /// Current state (plain load; take the mutex for transition decisions).
    #[inline]
    pub fn node_state(&self) -> NodeState {
        NodeState::from_raw(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: NodeState) {
        self.state.store(state as u32, Ordering::Release);
    }
}

/// Payload family advertised through the side header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadKind {
    Opaque = 0,
    Frame = 1,
    Position = 2,
}

impl PayloadKind {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => PayloadKind::Frame,
            2 => PayloadKind::Position,
            _ => PayloadKind::Opaque,
        }
    }
}

/// Producer-published payload shape (32 bytes, Pod).
///
/// Written by the sink before it transitions the node to `SinkBound`, so a
/// connected source always sees a consistent shape.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SideHeader {
    pub payload_bytes: u32,
    pub payload_kind: u32,
    pub rows: u32,
    pub cols: u32,
    pub pixel_format: u32,
    _pad: u32,
    pub sample_period_ns: u64,
}

const _: () = assert!(std::mem::size_of::<SideHeader>() == 32);
const _: () = assert!(PAYLOAD_OFFSET == SIDE_HEADER_OFFSET + std::mem::size_of::<SideHeader>());

impl SideHeader {
    pub fn opaque(payload_bytes: u32) -> Self {
        Self {
            payload_bytes,
            payload_kind: PayloadKind::Opaque as u32,
            ..Self::default()
        }
    }

    #[inline]
    pub fn kind(&self) -> PayloadKind {
        PayloadKind::from_raw(self.payload_kind)
    }
}

/// Payload metadata handed to a source by `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub payload_bytes: u32,
    pub kind: PayloadKind,
    pub rows: u32,
    pub cols: u32,
    pub pixel_format: u32,
    pub sample_period_ns: u64,
}

impl From<SideHeader> for ConnectionParameters {
    fn from(side: SideHeader) -> Self {
        Self {
            payload_bytes: side.payload_bytes,
            kind: side.kind(),
            rows: side.rows,
            cols: side.cols,
            pixel_format: side.pixel_format,
            sample_period_ns: side.sample_period_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_64_bytes() {
        assert_eq!(std::mem::size_of::<NodeHeader>(), 64);
    }

    #[test]
    fn side_header_is_32_bytes() {
        assert_eq!(std::mem::size_of::<SideHeader>(), 32);
    }

    #[test]
    fn naming_follows_address() {
        assert_eq!(region_name("track"), "track_sh_mem");
        // Same address hashes identically, different addresses do not.
        assert_eq!(key_hash("track"), key_hash("track"));
        assert_ne!(key_hash("track"), key_hash("track2"));
    }

    #[test]
    fn init_publishes_magic_last() {
        let header: NodeHeader = unsafe { std::mem::zeroed() };
        assert_eq!(header.magic.load(Ordering::Relaxed), 0);
        header.init(key_hash("t"), 256);
        assert_eq!(header.magic.load(Ordering::Relaxed), NODE_MAGIC);
        assert_eq!(header.payload_bytes.load(Ordering::Relaxed), 256);
        assert_eq!(header.node_state(), NodeState::Undefined);
        header.wait_initialized(key_hash("t"), "t").expect("valid");
        assert!(header.wait_initialized(key_hash("other"), "t").is_err());
    }

    #[test]
    fn state_round_trips() {
        for s in [
            NodeState::Undefined,
            NodeState::SinkBound,
            NodeState::SourceWaiting,
            NodeState::End,
        ] {
            assert_eq!(NodeState::from_raw(s as u32), s);
        }
        assert!(NodeState::End.is_end());
        assert!(!NodeState::SinkBound.is_end());
    }
}
