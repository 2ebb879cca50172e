//! Buffered bridge: decouples a fast upstream node from a slow consumer.
//!
//! A bridge owns an inbound source and an outbound sink joined by a
//! bounded SPSC ring. The component's `process` runs on the caller's
//! thread and is the ring's only producer; a dedicated pump thread owns
//! the outbound sink and is the only consumer. The pump sleeps on a
//! condvar with a short timeout, so it both reacts to pushes immediately
//! and notices shutdown within one tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use argus_core::spsc::SpscRing;
use argus_core::sync::WAIT_TICK;
use argus_core::{
    ArgusError, ArgusResult, Component, ComponentKind, Flow, FrameShape, FrameSink, FrameSource,
    NodeState, OwnedFrame, PositionSink, PositionSource,
};
use argus_types::Position;

use crate::config::BridgeConfig;

/// What a bridge does with a new sample when its FIFO is full. Fixed at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Stall the inbound side until the pump frees a slot; no sample is
    /// ever dropped and back-pressure propagates upstream.
    #[default]
    Block,
    /// Drop the incoming sample; delivered samples remain a strictly
    /// increasing subsequence of the input.
    DropNewest,
}

/// A payload family that can be pumped through a bridge.
///
/// Implementations tie an inbound typed source and an outbound typed sink
/// together; the bridge itself stays generic and monomorphic per family.
pub trait BridgePayload: Send + Sized + 'static {
    type Source: Default + Send + 'static;
    type Sink: Default + Send + 'static;
    /// Shape information carried from the inbound connection to the
    /// outbound bind.
    type Params: Copy + Send + 'static;

    fn attach(source: &mut Self::Source, address: &str) -> ArgusResult<Self::Params>;
    fn read_next(source: &mut Self::Source) -> ArgusResult<Option<Self>>;
    fn bind(sink: &mut Self::Sink, address: &str, params: Self::Params) -> ArgusResult<()>;
    fn forward(sink: &mut Self::Sink, item: &Self) -> ArgusResult<NodeState>;
    /// Block until downstream acknowledged the most recent sample.
    fn settle(sink: &mut Self::Sink) -> ArgusResult<NodeState>;
}

impl BridgePayload for Position {
    type Source = PositionSource;
    type Sink = PositionSink;
    type Params = u64; // sample period

    fn attach(source: &mut Self::Source, address: &str) -> ArgusResult<u64> {
        source.touch(address)?;
        Ok(source.connect()?.sample_period_ns)
    }

    fn read_next(source: &mut Self::Source) -> ArgusResult<Option<Self>> {
        source.next()
    }

    fn bind(sink: &mut Self::Sink, address: &str, period: u64) -> ArgusResult<()> {
        sink.bind(address, period)
    }

    fn forward(sink: &mut Self::Sink, item: &Self) -> ArgusResult<NodeState> {
        sink.publish(item)
    }

    fn settle(sink: &mut Self::Sink) -> ArgusResult<NodeState> {
        sink.drain()
    }
}

impl BridgePayload for OwnedFrame {
    type Source = FrameSource;
    type Sink = FrameSink;
    type Params = FrameShape;

    fn attach(source: &mut Self::Source, address: &str) -> ArgusResult<FrameShape> {
        source.touch(address)?;
        source.connect()
    }

    fn read_next(source: &mut Self::Source) -> ArgusResult<Option<Self>> {
        let shape = source
            .shape()
            .ok_or_else(|| ArgusError::not_bound("frame bridge source not connected"))?;
        let mut frame = OwnedFrame::sized_for(&shape);
        if source.next_into(&mut frame)?.is_end() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn bind(sink: &mut Self::Sink, address: &str, shape: FrameShape) -> ArgusResult<()> {
        sink.bind(address, shape)
    }

    fn forward(sink: &mut Self::Sink, item: &Self) -> ArgusResult<NodeState> {
        sink.publish(item)
    }

    fn settle(sink: &mut Self::Sink) -> ArgusResult<NodeState> {
        sink.drain()
    }
}

/// Bridge over positions.
pub type PositionBuffer = Buffer<Position>;
/// Bridge over frames.
pub type FrameBuffer = Buffer<OwnedFrame>;

/// Buffered bridge component; see the module docs.
pub struct Buffer<P: BridgePayload> {
    name: String,
    source_address: String,
    sink_address: String,
    config: BridgeConfig,
    source: P::Source,
    ring: Arc<SpscRing<P>>,
    nudge: Arc<(Mutex<()>, Condvar)>,
    sink_running: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    dropped: AtomicU64,
}

impl<P: BridgePayload> Buffer<P> {
    pub fn new(source_address: &str, sink_address: &str, config: BridgeConfig) -> Self {
        Self {
            name: format!("buffer[{source_address}->{sink_address}]"),
            source_address: source_address.to_string(),
            sink_address: sink_address.to_string(),
            ring: Arc::new(SpscRing::with_capacity(config.capacity)),
            config,
            source: P::Source::default(),
            nudge: Arc::new((Mutex::new(()), Condvar::new())),
            sink_running: Arc::new(AtomicBool::new(true)),
            pump: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Samples discarded so far under [`OverflowPolicy::DropNewest`].
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Items currently queued.
    pub fn backlog(&self) -> usize {
        self.ring.len()
    }

    fn spawn_pump(&mut self, params: P::Params) -> ArgusResult<()> {
        let ring = self.ring.clone();
        let nudge = self.nudge.clone();
        let running = self.sink_running.clone();
        let sink_address = self.sink_address.clone();
        let name = self.name.clone();

        let handle = std::thread::Builder::new()
            .name(format!("{name}-pump"))
            .spawn(move || {
                let mut sink = P::Sink::default();
                if let Err(e) = P::bind(&mut sink, &sink_address, params) {
                    log::error!("{name}: pump could not bind '{sink_address}': {e}");
                    running.store(false, Ordering::Release);
                    return;
                }

                'pump: loop {
                    {
                        let (lock, condvar) = &*nudge;
                        let guard = lock.lock().unwrap_or_else(|p| p.into_inner());
                        let _ = condvar.wait_timeout(guard, WAIT_TICK);
                    }

                    while let Some(item) = ring.try_pop() {
                        match P::forward(&mut sink, &item) {
                            Ok(state) if state.is_end() => {
                                log::warn!("{name}: downstream node ended; pump exiting");
                                running.store(false, Ordering::Release);
                                break 'pump;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                log::error!("{name}: forward failed: {e}");
                                running.store(false, Ordering::Release);
                                break 'pump;
                            }
                        }
                    }

                    if !running.load(Ordering::Acquire) && ring.is_empty() {
                        // Let downstream finish the final sample before the
                        // sink drop turns the node terminal.
                        if let Err(e) = P::settle(&mut sink) {
                            log::warn!("{name}: settle before shutdown failed: {e}");
                        }
                        break;
                    }
                }
                // Dropping the sink here marks the downstream node END.
            })
            .map_err(|e| ArgusError::memory(format!("could not spawn pump thread: {e}")))?;

        self.pump = Some(handle);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.sink_running.store(false, Ordering::Release);
        self.nudge.1.notify_all();
        if let Some(handle) = self.pump.take() {
            if handle.join().is_err() {
                log::error!("{}: pump thread panicked", self.name);
            }
        }
    }

    fn push(&mut self, item: P) -> Flow {
        match self.config.policy {
            OverflowPolicy::Block => {
                let mut pending = item;
                loop {
                    match self.ring.try_push(pending) {
                        Ok(()) => break,
                        Err(back) => {
                            if !self.sink_running.load(Ordering::Acquire) {
                                // Pump is gone; nothing will ever drain.
                                return Flow::End;
                            }
                            pending = back;
                            self.nudge.1.notify_one();
                            std::thread::sleep(Duration::from_millis(1));
                        }
                    }
                }
            }
            OverflowPolicy::DropNewest => {
                if self.ring.try_push(item).is_err() {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    log::debug!("{}: FIFO full, dropped sample ({total} total)", self.name);
                }
            }
        }
        self.nudge.1.notify_one();
        Flow::Continue
    }
}

impl<P: BridgePayload> Component for Buffer<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Buffer
    }

    /// Inbound source first, outbound sink last (inside the pump), so the
    /// sink's shape always comes from a live upstream connection.
    fn connect(&mut self) -> ArgusResult<()> {
        let params = P::attach(&mut self.source, &self.source_address)?;
        self.spawn_pump(params)
    }

    fn process(&mut self) -> ArgusResult<Flow> {
        match P::read_next(&mut self.source)? {
            None => {
                log::info!("{}: upstream ended, draining", self.name);
                self.shutdown();
                Ok(Flow::End)
            }
            Some(item) => {
                if self.push(item) == Flow::End {
                    return Ok(Flow::End);
                }
                Ok(Flow::Continue)
            }
        }
    }
}

impl<P: BridgePayload> Drop for Buffer<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
