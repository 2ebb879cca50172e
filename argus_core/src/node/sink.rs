//! Writer endpoint: constructs, owns and eventually ends a node.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;

use crate::error::{ArgusError, ArgusResult};
use crate::layout::{
    key_hash, region_name, region_size, NodeState, SideHeader, NODE_MAGIC,
};
use crate::memory::ShmRegion;
use crate::node::NodeView;
use crate::sync::{self, WAIT_TICK};

/// Process-local writer endpoint. At most one live `Sink` may be bound to
/// a given address; the bind fails with `AddressInUse` otherwise.
///
/// The sink owns the region: dropping it marks the node END, wakes every
/// source and unlinks the backing file.
#[derive(Default)]
pub struct Sink {
    address: Option<String>,
    node: Option<NodeView>,
    retrieved: bool,
}

/// Mutable view of a node's payload region, handed out by
/// [`Sink::retrieve`]. Derefs to `[u8]`.
pub struct SampleViewMut<'a> {
    bytes: &'a mut [u8],
}

impl Deref for SampleViewMut<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for SampleViewMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind this sink to `address`, reserving `payload_bytes` of opaque
    /// payload. Creates the region `<address>_sh_mem` and constructs the
    /// node under the key `<address>_sh_obj`.
    pub fn bind(&mut self, address: &str, payload_bytes: usize) -> ArgusResult<()> {
        self.bind_with_shape(address, SideHeader::opaque(payload_bytes as u32))
    }

    /// Bind with an explicit payload shape; the shape is published in the
    /// side header before any source can connect, so downstream always
    /// learns the shape before the first sample.
    pub fn bind_with_shape(&mut self, address: &str, shape: SideHeader) -> ArgusResult<()> {
        if let Some(bound) = &self.address {
            return Err(ArgusError::AlreadyBound(bound.clone()));
        }

        let name = region_name(address);
        let total = region_size(shape.payload_bytes as usize);

        let mut region = ShmRegion::create(&name, total)?;
        if !region.is_owner() {
            region = self.recycle_stale(address, &name, total, region)?;
        }

        let view = NodeView::over_fresh(region, shape.payload_bytes as usize);
        let header = view.header();
        header.init(key_hash(address), shape.payload_bytes);
        view.write_side_header(&shape);

        {
            let _guard = sync::lock(&header.mutex);
            header.sink_present.store(1, Ordering::Release);
            header.set_state(NodeState::SinkBound);
        }
        // Wake sources parked in connect().
        sync::notify_all(&header.read_ready);

        log::debug!(
            "sink bound '{}' ({} payload bytes)",
            address,
            shape.payload_bytes
        );
        self.node = Some(view);
        self.address = Some(address.to_string());
        self.retrieved = false;
        Ok(())
    }

    /// An existing region file means either a live sink (fatal) or a stale
    /// leftover from a crash (recycle it). A cleanly dropped sink always
    /// unlinks, so "file exists with sink_present clear" is stale.
    fn recycle_stale(
        &self,
        address: &str,
        name: &str,
        total: usize,
        stale: ShmRegion,
    ) -> ArgusResult<ShmRegion> {
        if stale.size() >= crate::layout::PAYLOAD_OFFSET {
            let view = NodeView::over_fresh(stale, 0);
            let header = view.header();
            let magic = header.magic.load(Ordering::Acquire);
            if magic == NODE_MAGIC {
                if header.sink_present.load(Ordering::Acquire) == 1 {
                    return Err(ArgusError::AddressInUse(address.to_string()));
                }
                // Terminate any sources still mapped to the old inode.
                header.set_state(NodeState::End);
                sync::notify_all(&header.read_ready);
                sync::notify_all(&header.write_ready);
            }
            log::warn!("recycling stale region for '{address}'");
        }

        ShmRegion::unlink(name);
        let fresh = ShmRegion::create(name, total)?;
        if !fresh.is_owner() {
            // Another sink won the re-create race.
            return Err(ArgusError::AddressInUse(address.to_string()));
        }
        Ok(fresh)
    }

    /// Mutable view of the payload region.
    ///
    /// Must be called after `bind` (the first call establishes the write
    /// view; `post` refuses to publish until it has happened). Writing is
    /// only safe between `wait` and `post`, which the barrier cycle
    /// enforces by construction.
    pub fn retrieve(&mut self) -> ArgusResult<SampleViewMut<'_>> {
        let view = self
            .node
            .as_ref()
            .ok_or_else(|| ArgusError::not_bound("retrieve() requires a bound sink"))?;
        self.retrieved = true;
        Ok(SampleViewMut {
            bytes: view.payload_mut(),
        })
    }

    /// Block until every attached source has acknowledged the previous
    /// sample (immediately if none are attached). Returns
    /// [`NodeState::End`] if the node was marked END externally.
    pub fn wait(&mut self) -> ArgusResult<NodeState> {
        let view = self
            .node
            .as_ref()
            .ok_or_else(|| ArgusError::not_bound("wait() requires a bound sink"))?;
        let header = view.header();

        let mut guard = sync::lock(&header.mutex);
        loop {
            let state = header.node_state();
            if state.is_end() {
                return Ok(state);
            }
            let attached = header.source_ref_count.load(Ordering::Relaxed);
            let acked = header.acknowledged_reads.load(Ordering::Relaxed);
            if acked >= attached {
                return Ok(state);
            }
            guard = guard.wait_on(&header.write_ready, WAIT_TICK);
        }
    }

    /// Publish the current contents of the payload view as one new sample.
    /// Paired 1:1 with [`Sink::wait`] after the first [`Sink::retrieve`].
    pub fn post(&mut self) -> ArgusResult<()> {
        let view = self
            .node
            .as_ref()
            .ok_or_else(|| ArgusError::not_bound("post() requires a bound sink"))?;
        if !self.retrieved {
            return Err(ArgusError::not_bound("post() before retrieve()"));
        }
        let header = view.header();

        {
            let _guard = sync::lock(&header.mutex);
            header.acknowledged_reads.store(0, Ordering::Relaxed);
            header.sample_count.fetch_add(1, Ordering::Release);
            header.set_state(NodeState::SourceWaiting);
        }
        sync::notify_all(&header.read_ready);
        Ok(())
    }

    /// Published sample count, for diagnostics.
    pub fn sample_count(&self) -> u64 {
        self.node
            .as_ref()
            .map(|v| v.header().sample_count.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// The bound address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Number of currently attached sources.
    pub fn attached_sources(&self) -> u32 {
        self.node
            .as_ref()
            .map(|v| v.header().source_ref_count.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        if let Some(view) = &self.node {
            let header = view.header();
            {
                let _guard = sync::lock(&header.mutex);
                header.set_state(NodeState::End);
                header.sink_present.store(0, Ordering::Release);
            }
            sync::notify_all(&header.read_ready);
            sync::notify_all(&header.write_ready);
            if let Some(address) = &self.address {
                log::debug!("sink released '{address}'");
            }
            // The region (owned) unlinks its file when `self.node` drops;
            // attached sources keep their mappings until they detach.
        }
    }
}
