//! Recorder: persists synchronized samples from several nodes at once.
//!
//! Per tick the coordinator reads one sample from each of M frame nodes
//! and K position nodes in lockstep, hands each frame to its stream's
//! dedicated writer thread through a bounded SPSC ring, and serializes one
//! `[sample_tick, [position, …]]` element to the position JSON stream.
//!
//! Ordering: position elements are written strictly in sample order (one
//! serializing thread); frames are ordered per stream by the ring; across
//! streams no global order is promised. Back-pressure: a full writer ring
//! stalls the coordinator, which in turn stalls the upstream producers
//! through the node barrier.

pub mod control;
pub mod position_log;
pub mod video;

pub use control::{control_recorder, RecorderControls};
pub use position_log::PositionLog;
pub use video::{RawVideoWriter, VideoWriter, FOURCC_H264};

use std::fs::File;
use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use argus_core::spsc::SpscRing;
use argus_core::sync::WAIT_TICK;
use argus_core::{
    ArgusError, ArgusResult, Component, ComponentKind, Flow, FrameSource, OwnedFrame,
    PositionSource,
};
use argus_types::Position;

use crate::config::RecorderConfig;

/// Capacity of each per-stream frame ring.
const FRAME_LANE_CAPACITY: usize = 128;

/// One video stream: ring, wake-up, writer thread, artifact path.
///
/// Single-owner record - dropping the lane (after `running` is cleared and
/// the condvar notified) joins the thread, which drains the ring first.
struct WriterLane {
    ring: Arc<SpscRing<OwnedFrame>>,
    nudge: Arc<(Mutex<()>, Condvar)>,
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
}

/// Multi-node recorder component, generic over the video writer so codec
/// backends stay external. See the module docs for the per-tick protocol.
pub struct Recorder<W: VideoWriter + Default + 'static = RawVideoWriter> {
    name: String,
    config: RecorderConfig,
    frame_sources: Vec<(String, FrameSource)>,
    frame_scratch: Vec<OwnedFrame>,
    lanes: Vec<WriterLane>,
    position_sources: Vec<(String, PositionSource)>,
    position_scratch: Vec<(String, Position)>,
    position_log: Option<PositionLog<BufWriter<File>>>,
    position_path: Option<PathBuf>,
    running: Arc<AtomicBool>,
    record_on: Arc<AtomicBool>,
    ticks_recorded: u64,
    drained: bool,
    _writer: PhantomData<W>,
}

impl<W: VideoWriter + Default + 'static> Recorder<W> {
    /// Create a recorder for the given position and frame node addresses.
    /// Artifact files are created immediately; writer threads start idle
    /// and open their containers lazily on the first frame.
    pub fn new(
        position_addresses: &[String],
        frame_addresses: &[String],
        config: RecorderConfig,
    ) -> ArgusResult<Self> {
        if position_addresses.is_empty() && frame_addresses.is_empty() {
            return Err(ArgusError::memory(
                "recorder requires at least one source address",
            ));
        }

        let mut config = config;
        if !config.save_path.is_dir() {
            log::warn!(
                "recording path {} does not exist or is not a directory; using the current directory",
                config.save_path.display()
            );
            config.save_path = PathBuf::from(".");
        }

        let date_prefix = if config.append_date {
            Some(chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string())
        } else {
            None
        };

        // Position artifact: a single JSON file shared by all K sources.
        let (position_log, position_path) = if position_addresses.is_empty() {
            (None, None)
        } else {
            let base = if config.file_name.is_empty() {
                flatten_address(&position_addresses[0])
            } else {
                config.file_name.clone()
            };
            let mut path = config.save_path.join(stamped(&date_prefix, &base));
            path.set_extension("json");
            ensure_unique_path(&mut path);
            (Some(PositionLog::create(&path)?), Some(path))
        };

        let running = Arc::new(AtomicBool::new(true));
        let record_on = Arc::new(AtomicBool::new(config.record_on));

        // One writer lane per frame stream.
        let mut lanes = Vec::with_capacity(frame_addresses.len());
        for address in frame_addresses {
            let base = if config.file_name.is_empty() {
                flatten_address(address)
            } else {
                format!("{}_{}", config.file_name, flatten_address(address))
            };
            let mut path = config.save_path.join(stamped(&date_prefix, &base));
            path.set_extension(W::EXTENSION);
            ensure_unique_path(&mut path);

            lanes.push(spawn_writer_lane::<W>(
                path,
                running.clone(),
                config.frames_per_second,
            )?);
        }

        let name = format!(
            "recorder[{}+{} streams]",
            frame_addresses.len(),
            position_addresses.len()
        );

        Ok(Self {
            name,
            config,
            frame_sources: frame_addresses
                .iter()
                .map(|a| (a.clone(), FrameSource::new()))
                .collect(),
            frame_scratch: frame_addresses.iter().map(|_| OwnedFrame::default()).collect(),
            lanes,
            position_sources: position_addresses
                .iter()
                .map(|a| (a.clone(), PositionSource::new()))
                .collect(),
            position_scratch: position_addresses
                .iter()
                .map(|a| (a.clone(), Position::default()))
                .collect(),
            position_log,
            position_path,
            running,
            record_on,
            ticks_recorded: 0,
            drained: false,
            _writer: PhantomData,
        })
    }

    /// Toggles shared with an interactive control loop.
    pub fn controls(&self) -> RecorderControls {
        RecorderControls::new(self.record_on.clone(), self.running.clone())
    }

    /// Effective configuration (after save-path fallback).
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Path of the position JSON artifact, if any.
    pub fn position_path(&self) -> Option<&Path> {
        self.position_path.as_deref()
    }

    /// Paths of the video artifacts, one per frame stream.
    pub fn video_paths(&self) -> Vec<&Path> {
        self.lanes.iter().map(|lane| lane.path.as_path()).collect()
    }

    /// Ticks that were persisted (recording enabled).
    pub fn ticks_recorded(&self) -> u64 {
        self.ticks_recorded
    }

    /// Drive `process` until end-of-stream or an `exit` request from the
    /// control surface, then drain writer threads and close artifacts.
    pub fn run_until_exit(&mut self) -> ArgusResult<()> {
        while self.running.load(Ordering::Acquire) {
            if self.process()? == Flow::End {
                break;
            }
        }
        self.drain();
        Ok(())
    }

    /// Stop writer threads (after they empty their rings) and close the
    /// position log. Idempotent.
    fn drain(&mut self) {
        if self.drained {
            return;
        }
        self.drained = true;
        self.running.store(false, Ordering::Release);
        for lane in &mut self.lanes {
            lane.nudge.1.notify_all();
            if let Some(handle) = lane.handle.take() {
                if handle.join().is_err() {
                    log::error!("{}: writer thread for {} panicked", self.name, lane.path.display());
                }
            }
        }
        if let Some(mut log) = self.position_log.take() {
            if let Err(e) = log.finish() {
                log::error!("{}: failed to close position log: {e}", self.name);
            }
        }
        log::info!("{}: drained after {} recorded ticks", self.name, self.ticks_recorded);
    }

    /// Block-push one frame into a lane; back-pressure stalls the whole
    /// coordinator (and through it the upstream producers).
    fn push_frame(&self, lane_idx: usize, frame: OwnedFrame) {
        let lane = &self.lanes[lane_idx];
        let mut pending = frame;
        loop {
            match lane.ring.try_push(pending) {
                Ok(()) => break,
                Err(back) => {
                    if !self.running.load(Ordering::Acquire) {
                        return; // shutting down, frame is lost by design
                    }
                    pending = back;
                    lane.nudge.1.notify_one();
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
        lane.nudge.1.notify_one();
    }
}

impl<W: VideoWriter + Default + 'static> Component for Recorder<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Recorder
    }

    /// The recorder is a pure consumer: touch and connect every source;
    /// there are no sinks to bind.
    fn connect(&mut self) -> ArgusResult<()> {
        for (address, source) in &mut self.frame_sources {
            source.touch(address)?;
            source.connect()?;
        }
        for (address, source) in &mut self.position_sources {
            source.touch(address)?;
            source.connect()?;
        }
        Ok(())
    }

    /// One tick of the multi-node barrier: frames first, then positions,
    /// then the serialized position element.
    fn process(&mut self) -> ArgusResult<Flow> {
        let recording = self.record_on.load(Ordering::Acquire);

        for i in 0..self.frame_sources.len() {
            let (_, source) = &mut self.frame_sources[i];
            if source.next_into(&mut self.frame_scratch[i])?.is_end() {
                self.drain();
                return Ok(Flow::End);
            }
            if recording {
                let frame = self.frame_scratch[i].clone();
                self.push_frame(i, frame);
            }
        }

        for j in 0..self.position_sources.len() {
            let (_, source) = &mut self.position_sources[j];
            match source.next()? {
                None => {
                    self.drain();
                    return Ok(Flow::End);
                }
                Some(position) => self.position_scratch[j].1 = position,
            }
        }

        if recording {
            if let Some(log) = &mut self.position_log {
                let sample_tick = self.position_scratch[0].1.sample_index;
                log.write_tick(sample_tick, &self.position_scratch)?;
            }
            self.ticks_recorded += 1;
        }

        Ok(Flow::Continue)
    }
}

impl<W: VideoWriter + Default + 'static> Drop for Recorder<W> {
    fn drop(&mut self) {
        self.drain();
    }
}

/// Spawn one writer thread. It sleeps on its condvar in short ticks,
/// drains the ring on every wake-up, opens the container lazily from the
/// first frame's geometry, and exits once `running` is cleared and the
/// ring is empty.
fn spawn_writer_lane<W: VideoWriter + Default + 'static>(
    path: PathBuf,
    running: Arc<AtomicBool>,
    fps: f64,
) -> ArgusResult<WriterLane> {
    let ring = Arc::new(SpscRing::<OwnedFrame>::with_capacity(FRAME_LANE_CAPACITY));
    let nudge = Arc::new((Mutex::new(()), Condvar::new()));

    let thread_ring = ring.clone();
    let thread_nudge = nudge.clone();
    let thread_path = path.clone();
    let handle = std::thread::Builder::new()
        .name(format!("writer-{}", path.display()))
        .spawn(move || {
            let mut writer = W::default();
            loop {
                {
                    let (lock, condvar) = &*thread_nudge;
                    let guard = lock.lock().unwrap_or_else(|p| p.into_inner());
                    let _ = condvar.wait_timeout(guard, WAIT_TICK);
                }

                while let Some(frame) = thread_ring.try_pop() {
                    if !writer.is_open() {
                        if let Err(e) = writer.open(
                            &thread_path,
                            FOURCC_H264,
                            fps,
                            frame.header.rows,
                            frame.header.cols,
                            frame.header.format(),
                        ) {
                            // Failure is isolated to this stream: drop the
                            // frame, try opening again on the next one.
                            log::error!(
                                "could not open {}: {e}; dropping frame",
                                thread_path.display()
                            );
                            continue;
                        }
                    }
                    if let Err(e) = writer.write(&frame) {
                        log::error!("write to {} failed: {e}; frame dropped", thread_path.display());
                    }
                }

                if !running.load(Ordering::Acquire) && thread_ring.is_empty() {
                    break;
                }
            }
        })
        .map_err(|e| ArgusError::memory(format!("could not spawn writer thread: {e}")))?;

    Ok(WriterLane {
        ring,
        nudge,
        handle: Some(handle),
        path,
    })
}

/// Make node addresses filesystem-friendly for artifact names.
fn flatten_address(address: &str) -> String {
    address.replace('/', "_")
}

fn stamped(date_prefix: &Option<String>, base: &str) -> String {
    match date_prefix {
        Some(date) => format!("{date}_{base}"),
        None => base.to_string(),
    }
}

/// Append `_1`, `_2`, … to the stem until the path no longer collides
/// with an existing file.
fn ensure_unique_path(path: &mut PathBuf) {
    if !path.exists() {
        return;
    }
    let original = path.clone();
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = original
        .extension()
        .map(|s| s.to_string_lossy().into_owned());

    let mut n = 0u32;
    while path.exists() {
        n += 1;
        let mut candidate = original.clone();
        candidate.set_file_name(match &extension {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        });
        *path = candidate;
    }
    log::warn!(
        "{} exists; artifact renamed to {}",
        original.display(),
        path.display()
    );
}
