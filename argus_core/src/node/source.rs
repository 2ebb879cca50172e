//! Reader endpoint: attaches to an existing node without owning it.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::error::{ArgusError, ArgusResult};
use crate::layout::{key_hash, region_name, ConnectionParameters, NodeState, PAYLOAD_OFFSET};
use crate::memory::ShmRegion;
use crate::node::NodeView;
use crate::sync::{self, WAIT_TICK};

/// How long `touch` keeps retrying before giving up with `NotFound`.
const DEFAULT_TOUCH_RETRY: Duration = Duration::from_secs(5);

/// Process-local reader endpoint.
///
/// Lifecycle: [`touch`](Source::touch) (attach, counted), then
/// [`connect`](Source::connect) (rendezvous with the sink, learn the
/// payload shape), then any number of `wait` / read / `post` cycles until
/// `wait` returns [`NodeState::End`]. Dropping the source detaches it
/// under the node mutex so the writer's barrier stays consistent.
pub struct Source {
    address: Option<String>,
    node: Option<NodeView>,
    params: Option<ConnectionParameters>,
    last_seen: u64,
    /// Sample index whose acknowledgement this source currently
    /// contributes (attaching grants an implicit ack for the in-flight
    /// sample, see `touch`).
    last_acked: u64,
    connected: bool,
    in_critical: bool,
    touch_retry: Duration,
}

impl Default for Source {
    fn default() -> Self {
        Self::new()
    }
}

impl Source {
    pub fn new() -> Self {
        Self {
            address: None,
            node: None,
            params: None,
            last_seen: 0,
            last_acked: 0,
            connected: false,
            in_critical: false,
            touch_retry: DEFAULT_TOUCH_RETRY,
        }
    }

    /// Adjust how long `touch` retries a missing region before failing.
    pub fn with_touch_retry(mut self, retry: Duration) -> Self {
        self.touch_retry = retry;
        self
    }

    /// Attach to the node at `address`, retrying silently while no region
    /// exists yet. Increments the node's reader count; the sample counter
    /// is snapshotted so this source joins at the *next* published sample.
    pub fn touch(&mut self, address: &str) -> ArgusResult<()> {
        if let Some(attached) = &self.address {
            return Err(ArgusError::AlreadyBound(attached.clone()));
        }

        let name = region_name(address);
        let deadline = Instant::now() + self.touch_retry;
        let view = loop {
            match ShmRegion::open(&name) {
                Ok(region) if region.size() >= PAYLOAD_OFFSET => {
                    let view = NodeView::over_fresh(region, 0);
                    view.header().wait_initialized(key_hash(address), address)?;
                    break NodeView::over(
                        // Re-wrap to validate the advertised payload length
                        // now that the header is known to be initialized.
                        view.into_region(),
                    )?;
                }
                Ok(_) | Err(ArgusError::NotFound(_)) => {
                    if Instant::now() >= deadline {
                        return Err(ArgusError::NotFound(address.to_string()));
                    }
                    std::thread::sleep(WAIT_TICK);
                }
                Err(e) => return Err(e),
            }
        };

        let header = view.header();
        {
            let _guard = sync::lock(&header.mutex);
            header.source_ref_count.fetch_add(1, Ordering::AcqRel);
            // Joining mid-stream: the current sample is treated as already
            // seen (this source starts at the next one), so it also counts
            // as already acknowledged. This keeps the writer's wakeup
            // condition `acknowledged_reads == source_ref_count` intact at
            // the moment of attach.
            header.acknowledged_reads.fetch_add(1, Ordering::AcqRel);
            self.last_seen = header.sample_count.load(Ordering::Acquire);
            self.last_acked = self.last_seen;
        }

        log::debug!("source attached to '{address}'");
        self.node = Some(view);
        self.address = Some(address.to_string());
        Ok(())
    }

    /// Block until a sink has bound the node, then return the payload
    /// metadata it published. If the node is already terminal the
    /// parameters are still returned; the next `wait` reports END.
    pub fn connect(&mut self) -> ArgusResult<ConnectionParameters> {
        let view = self
            .node
            .as_ref()
            .ok_or_else(|| ArgusError::not_bound("connect() requires touch() first"))?;
        let header = view.header();

        let mut guard = sync::lock(&header.mutex);
        while header.node_state() == NodeState::Undefined {
            guard = guard.wait_on(&header.read_ready, WAIT_TICK);
        }
        let params = ConnectionParameters::from(view.read_side_header());
        drop(guard);

        self.params = Some(params);
        self.connected = true;
        Ok(params)
    }

    /// Block for the next unseen sample. Returns [`NodeState::End`] once
    /// the node is terminal; otherwise the caller holds the read critical
    /// section until [`Source::post`].
    pub fn wait(&mut self) -> ArgusResult<NodeState> {
        let view = self
            .node
            .as_ref()
            .ok_or_else(|| ArgusError::not_bound("wait() requires connect() first"))?;
        if !self.connected {
            return Err(ArgusError::not_bound("wait() requires connect() first"));
        }
        let header = view.header();

        let mut guard = sync::lock(&header.mutex);
        loop {
            let state = header.node_state();
            if state.is_end() {
                return Ok(state);
            }
            let produced = header.sample_count.load(Ordering::Acquire);
            if produced != self.last_seen {
                self.last_seen = produced;
                self.in_critical = true;
                return Ok(state);
            }
            guard = guard.wait_on(&header.read_ready, WAIT_TICK);
        }
    }

    /// Borrow the current sample's payload. Only valid between `wait`
    /// returning OK and `post`.
    pub fn sample(&self) -> ArgusResult<&[u8]> {
        match &self.node {
            Some(view) if self.in_critical => Ok(view.payload()),
            _ => Err(ArgusError::not_bound("no sample held; call wait() first")),
        }
    }

    /// Copy the current sample's payload into `dst`; returns the number of
    /// bytes copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> ArgusResult<usize> {
        let payload = self.sample()?;
        if dst.len() < payload.len() {
            return Err(ArgusError::PayloadTooLarge {
                needed: payload.len(),
                available: dst.len(),
            });
        }
        dst[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }

    /// Copy the current sample's payload into a fresh buffer.
    pub fn clone_payload(&self) -> ArgusResult<Vec<u8>> {
        Ok(self.sample()?.to_vec())
    }

    /// Release the current sample. The last source to post wakes the
    /// writer.
    pub fn post(&mut self) -> ArgusResult<()> {
        let view = match &self.node {
            Some(view) if self.in_critical => view,
            _ => return Err(ArgusError::not_bound("post() without a held sample")),
        };
        let header = view.header();

        {
            let _guard = sync::lock(&header.mutex);
            let acked = header.acknowledged_reads.fetch_add(1, Ordering::AcqRel) + 1;
            if acked >= header.source_ref_count.load(Ordering::Acquire) {
                sync::notify_one(&header.write_ready);
            }
        }
        self.in_critical = false;
        self.last_acked = self.last_seen;
        Ok(())
    }

    /// Parameters learned at connect time, if connected.
    pub fn parameters(&self) -> Option<ConnectionParameters> {
        self.params
    }

    /// The attached address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Index of the most recently observed sample.
    pub fn last_sample(&self) -> u64 {
        self.last_seen
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        if let Some(view) = &self.node {
            let header = view.header();
            {
                let _guard = sync::lock(&header.mutex);
                header.source_ref_count.fetch_sub(1, Ordering::AcqRel);
                // Withdraw this source's acknowledgement only if it is
                // counted against the *current* sample (explicitly posted,
                // or implicit from attach).
                let current = header.sample_count.load(Ordering::Acquire);
                if self.last_acked == current {
                    header.acknowledged_reads.fetch_sub(1, Ordering::AcqRel);
                }
            }
            sync::notify_one(&header.write_ready);
            if let Some(address) = &self.address {
                log::debug!("source detached from '{address}'");
            }
        }
    }
}
