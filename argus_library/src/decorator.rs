//! Decorator shell: draws position overlays onto a frame stream.
//!
//! Reads one frame node plus any number of position nodes in lockstep and
//! republishes the frame through its own sink. The drawing primitives are
//! an external collaborator behind [`FrameAnnotator`]; this component owns
//! the endpoint lifecycle and the three-way barrier cycle.

use argus_core::{
    ArgusResult, Component, ComponentKind, Flow, FrameSink, FrameSource, OwnedFrame, PositionSource,
};
use argus_types::Position;

/// A drawing kernel: annotate `frame` using the positions read this tick,
/// each paired with the address it came from.
pub trait FrameAnnotator: Send {
    fn annotate(&mut self, frame: &mut OwnedFrame, positions: &[(String, Position)]);
}

impl<F> FrameAnnotator for F
where
    F: FnMut(&mut OwnedFrame, &[(String, Position)]) + Send,
{
    fn annotate(&mut self, frame: &mut OwnedFrame, positions: &[(String, Position)]) {
        self(frame, positions)
    }
}

/// Decorator component; see the module docs.
pub struct Decorator<A: FrameAnnotator> {
    name: String,
    frame_source_address: String,
    frame_sink_address: String,
    frame_source: FrameSource,
    position_sources: Vec<(String, PositionSource)>,
    positions: Vec<(String, Position)>,
    frame_sink: FrameSink,
    frame: OwnedFrame,
    annotator: A,
}

impl<A: FrameAnnotator> Decorator<A> {
    pub fn new(
        position_source_addresses: &[String],
        frame_source_address: &str,
        frame_sink_address: &str,
        annotator: A,
    ) -> Self {
        Self {
            name: format!("decorator[{frame_source_address}->{frame_sink_address}]"),
            frame_source_address: frame_source_address.to_string(),
            frame_sink_address: frame_sink_address.to_string(),
            frame_source: FrameSource::new(),
            position_sources: position_source_addresses
                .iter()
                .map(|a| (a.clone(), PositionSource::new()))
                .collect(),
            positions: position_source_addresses
                .iter()
                .map(|a| (a.clone(), Position::default()))
                .collect(),
            frame_sink: FrameSink::new(),
            frame: OwnedFrame::default(),
            annotator,
        }
    }
}

impl<A: FrameAnnotator> Component for Decorator<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Decorator
    }

    /// All sources first; the sink last, shaped by the inbound frame
    /// connection so downstream learns the geometry before any sample.
    fn connect(&mut self) -> ArgusResult<()> {
        self.frame_source.touch(&self.frame_source_address)?;
        let shape = self.frame_source.connect()?;
        self.frame = OwnedFrame::sized_for(&shape);

        for (address, source) in &mut self.position_sources {
            source.touch(address)?;
            source.connect()?;
        }

        self.frame_sink.bind(&self.frame_sink_address, shape)
    }

    fn process(&mut self) -> ArgusResult<Flow> {
        if self.frame_source.next_into(&mut self.frame)?.is_end() {
            self.frame_sink.drain()?;
            return Ok(Flow::End);
        }

        for (i, (_, source)) in self.position_sources.iter_mut().enumerate() {
            match source.next()? {
                None => {
                    self.frame_sink.drain()?;
                    return Ok(Flow::End);
                }
                Some(position) => self.positions[i].1 = position,
            }
        }

        self.annotator.annotate(&mut self.frame, &self.positions);

        if self.frame_sink.publish(&self.frame)?.is_end() {
            return Ok(Flow::End);
        }
        Ok(Flow::Continue)
    }
}
