//! Position detector shell: frame node in, position node out.
//!
//! The image-processing kernel itself is an external collaborator behind
//! the [`Detector`] trait; this component supplies the endpoint lifecycle
//! and the per-sample barrier cycle around it.

use argus_core::{
    ArgusResult, Component, ComponentKind, Flow, FrameSource, OwnedFrame, PositionSink,
};
use argus_types::Position;

/// A detection kernel: given one frame, produce one position.
pub trait Detector: Send {
    fn detect(&mut self, frame: &OwnedFrame) -> Position;
}

/// Blanket impl so closures work as kernels.
impl<F> Detector for F
where
    F: FnMut(&OwnedFrame) -> Position + Send,
{
    fn detect(&mut self, frame: &OwnedFrame) -> Position {
        self(frame)
    }
}

/// Detector component wiring a kernel between two nodes.
pub struct PositionDetector<D: Detector> {
    name: String,
    frame_source_address: String,
    position_sink_address: String,
    source: FrameSource,
    sink: PositionSink,
    frame: OwnedFrame,
    kernel: D,
}

impl<D: Detector> PositionDetector<D> {
    pub fn new(frame_source_address: &str, position_sink_address: &str, kernel: D) -> Self {
        Self {
            name: format!("posidet[{frame_source_address}->{position_sink_address}]"),
            frame_source_address: frame_source_address.to_string(),
            position_sink_address: position_sink_address.to_string(),
            source: FrameSource::new(),
            sink: PositionSink::new(),
            frame: OwnedFrame::default(),
            kernel,
        }
    }
}

impl<D: Detector> Component for PositionDetector<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::PositionDetector
    }

    /// Source first, then the sink, carrying the frame rate downstream.
    fn connect(&mut self) -> ArgusResult<()> {
        self.source.touch(&self.frame_source_address)?;
        let shape = self.source.connect()?;
        self.frame = OwnedFrame::sized_for(&shape);
        self.sink
            .bind(&self.position_sink_address, shape.sample_period_ns)
    }

    fn process(&mut self) -> ArgusResult<Flow> {
        if self.source.next_into(&mut self.frame)?.is_end() {
            // Let downstream finish the last published position before the
            // sink drop turns the node terminal.
            self.sink.drain()?;
            return Ok(Flow::End);
        }

        let mut position = self.kernel.detect(&self.frame);
        position.sample_index = self.frame.header.sample_index;

        if self.sink.publish(&position)?.is_end() {
            return Ok(Flow::End);
        }
        Ok(Flow::Continue)
    }
}
