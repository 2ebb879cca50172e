//! Component lifecycle shell.
//!
//! Every pipeline stage - frame source, detector, decorator, buffer,
//! recorder, test generator - exposes the same minimal surface: a stable
//! name, a kind tag, a single connection pass, and a `process` that runs
//! exactly one barrier cycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ArgusResult;

/// What role a component plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    FrameSource,
    PositionDetector,
    Decorator,
    Buffer,
    Recorder,
    TestPosition,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::FrameSource => "frame_source",
            ComponentKind::PositionDetector => "position_detector",
            ComponentKind::Decorator => "decorator",
            ComponentKind::Buffer => "buffer",
            ComponentKind::Recorder => "recorder",
            ComponentKind::TestPosition => "test_position",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `process` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep cycling.
    Continue,
    /// A source reported END; the component should stop.
    End,
}

/// Minimal trait satisfied by every pipeline stage.
///
/// `connect` performs all endpoint setup in a fixed order - sources are
/// touched and connected first, sinks bound and retrieved last - so a sink
/// never publishes before its downstream knows the payload shape.
/// `process` runs one wait/compute/post barrier cycle and reports
/// [`Flow::End`] when any source returned END.
pub trait Component {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    fn connect(&mut self) -> ArgusResult<()>;

    fn process(&mut self) -> ArgusResult<Flow>;

    /// Drive `process` until end-of-stream or `running` is cleared.
    fn run(&mut self, running: &AtomicBool) -> ArgusResult<()> {
        while running.load(Ordering::Acquire) {
            if self.process()? == Flow::End {
                log::info!("component '{}' reached end of stream", self.name());
                break;
            }
        }
        Ok(())
    }
}
