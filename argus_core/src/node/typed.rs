//! Typed endpoint wrappers over the opaque byte fabric.
//!
//! The fabric moves bytes; these wrappers pin a payload family onto a node
//! through the side header and give components `Position` / frame views
//! without any generic node machinery (the shared layout stays
//! monomorphic).

use bytemuck::{bytes_of, pod_read_unaligned};

use argus_types::{FrameHeader, PixelFormat, Position};

use crate::error::{ArgusError, ArgusResult};
use crate::layout::{ConnectionParameters, NodeState, PayloadKind, SideHeader};
use crate::node::{Sink, Source};

/// A frame owned by process-local memory: fixed header plus pixel bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedFrame {
    pub header: FrameHeader,
    pub pixels: Vec<u8>,
}

impl OwnedFrame {
    /// Allocate a zeroed frame matching `shape`.
    pub fn sized_for(shape: &FrameShape) -> Self {
        let header = FrameHeader::new(shape.rows, shape.cols, shape.format, shape.sample_period_ns);
        let pixels = vec![0u8; header.pixel_bytes()];
        Self { header, pixels }
    }

    /// Decode a node payload (header followed by pixels).
    pub fn read_from(&mut self, payload: &[u8]) -> ArgusResult<()> {
        let header_len = std::mem::size_of::<FrameHeader>();
        if payload.len() < header_len {
            return Err(ArgusError::memory("payload shorter than a frame header"));
        }
        let header: FrameHeader = pod_read_unaligned(&payload[..header_len]);
        let pixel_len = header.pixel_bytes();
        if payload.len() < header_len + pixel_len {
            return Err(ArgusError::memory(format!(
                "frame header promises {pixel_len} pixel bytes, payload holds {}",
                payload.len() - header_len
            )));
        }
        self.header = header;
        self.pixels.clear();
        self.pixels
            .extend_from_slice(&payload[header_len..header_len + pixel_len]);
        Ok(())
    }
}

/// Frame geometry negotiated through the side header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub rows: u32,
    pub cols: u32,
    pub format: PixelFormat,
    pub sample_period_ns: u64,
}

impl FrameShape {
    pub fn new(rows: u32, cols: u32, format: PixelFormat, sample_period_ns: u64) -> Self {
        Self {
            rows,
            cols,
            format,
            sample_period_ns,
        }
    }

    /// Bytes of one frame payload: header plus pixels.
    pub fn payload_bytes(&self) -> usize {
        std::mem::size_of::<FrameHeader>()
            + self.rows as usize * self.cols as usize * self.format.bytes_per_pixel() as usize
    }

    fn side_header(&self) -> SideHeader {
        let mut side = SideHeader::opaque(self.payload_bytes() as u32);
        side.payload_kind = PayloadKind::Frame as u32;
        side.rows = self.rows;
        side.cols = self.cols;
        side.pixel_format = self.format as u32;
        side.sample_period_ns = self.sample_period_ns;
        side
    }

    fn from_parameters(params: &ConnectionParameters) -> Self {
        Self {
            rows: params.rows,
            cols: params.cols,
            format: PixelFormat::from_raw(params.pixel_format),
            sample_period_ns: params.sample_period_ns,
        }
    }
}

/// Writer endpoint for frame payloads.
#[derive(Default)]
pub struct FrameSink {
    sink: Sink,
    shape: Option<FrameShape>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a frame node; the shape is advertised to every source.
    pub fn bind(&mut self, address: &str, shape: FrameShape) -> ArgusResult<()> {
        self.sink.bind_with_shape(address, shape.side_header())?;
        self.sink.retrieve()?;
        self.shape = Some(shape);
        Ok(())
    }

    /// One full producer barrier cycle: wait for readers, copy `frame`
    /// into the shared payload, publish. Returns END if the node was
    /// terminated externally (the frame is then not published).
    pub fn publish(&mut self, frame: &OwnedFrame) -> ArgusResult<NodeState> {
        let shape = self
            .shape
            .ok_or_else(|| ArgusError::not_bound("frame sink is not bound"))?;
        if frame.header.pixel_bytes() != frame.pixels.len() {
            return Err(ArgusError::memory(format!(
                "frame header promises {} pixel bytes, buffer holds {}",
                frame.header.pixel_bytes(),
                frame.pixels.len()
            )));
        }
        let needed = std::mem::size_of::<FrameHeader>() + frame.pixels.len();
        if needed > shape.payload_bytes() {
            return Err(ArgusError::PayloadTooLarge {
                needed,
                available: shape.payload_bytes(),
            });
        }

        let state = self.sink.wait()?;
        if state.is_end() {
            return Ok(state);
        }
        {
            let mut view = self.sink.retrieve()?;
            let header_len = std::mem::size_of::<FrameHeader>();
            view[..header_len].copy_from_slice(bytes_of(&frame.header));
            view[header_len..header_len + frame.pixels.len()].copy_from_slice(&frame.pixels);
        }
        self.sink.post()?;
        Ok(state)
    }

    /// Block until every attached source has acknowledged the most recent
    /// sample. Useful before dropping the sink so the final frame is not
    /// cut off by END.
    pub fn drain(&mut self) -> ArgusResult<NodeState> {
        self.sink.wait()
    }

    pub fn shape(&self) -> Option<FrameShape> {
        self.shape
    }

    pub fn sample_count(&self) -> u64 {
        self.sink.sample_count()
    }
}

/// Reader endpoint for frame payloads.
#[derive(Default)]
pub struct FrameSource {
    source: Source,
    shape: Option<FrameShape>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, address: &str) -> ArgusResult<()> {
        self.source.touch(address)
    }

    /// Rendezvous with the sink and learn the frame geometry. Fails if the
    /// node's payload is not a frame.
    pub fn connect(&mut self) -> ArgusResult<FrameShape> {
        let params = self.source.connect()?;
        if params.kind != PayloadKind::Frame {
            return Err(ArgusError::memory(format!(
                "node '{}' carries {:?} payloads, expected frames",
                self.source.address().unwrap_or("?"),
                params.kind
            )));
        }
        let shape = FrameShape::from_parameters(&params);
        self.shape = Some(shape);
        Ok(shape)
    }

    /// Wait for the next frame, copy it into `frame`, release the sample.
    /// Returns END without touching `frame` once the stream is terminal.
    pub fn next_into(&mut self, frame: &mut OwnedFrame) -> ArgusResult<NodeState> {
        let state = self.source.wait()?;
        if state.is_end() {
            return Ok(state);
        }
        frame.read_from(self.source.sample()?)?;
        self.source.post()?;
        Ok(state)
    }

    pub fn shape(&self) -> Option<FrameShape> {
        self.shape
    }

    pub fn last_sample(&self) -> u64 {
        self.source.last_sample()
    }
}

/// Writer endpoint for position payloads.
#[derive(Default)]
pub struct PositionSink {
    sink: Sink,
    bound: bool,
}

impl PositionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, address: &str, sample_period_ns: u64) -> ArgusResult<()> {
        let mut side = SideHeader::opaque(std::mem::size_of::<Position>() as u32);
        side.payload_kind = PayloadKind::Position as u32;
        side.sample_period_ns = sample_period_ns;
        self.sink.bind_with_shape(address, side)?;
        self.sink.retrieve()?;
        self.bound = true;
        Ok(())
    }

    /// One full producer barrier cycle for a single position sample.
    pub fn publish(&mut self, position: &Position) -> ArgusResult<NodeState> {
        if !self.bound {
            return Err(ArgusError::not_bound("position sink is not bound"));
        }
        let state = self.sink.wait()?;
        if state.is_end() {
            return Ok(state);
        }
        {
            let mut view = self.sink.retrieve()?;
            let bytes = bytes_of(position);
            view[..bytes.len()].copy_from_slice(bytes);
        }
        self.sink.post()?;
        Ok(state)
    }

    /// Block until every attached source has acknowledged the most recent
    /// sample.
    pub fn drain(&mut self) -> ArgusResult<NodeState> {
        if !self.bound {
            return Err(ArgusError::not_bound("position sink is not bound"));
        }
        self.sink.wait()
    }

    pub fn sample_count(&self) -> u64 {
        self.sink.sample_count()
    }
}

/// Reader endpoint for position payloads.
#[derive(Default)]
pub struct PositionSource {
    source: Source,
}

impl PositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, address: &str) -> ArgusResult<()> {
        self.source.touch(address)
    }

    pub fn connect(&mut self) -> ArgusResult<ConnectionParameters> {
        let params = self.source.connect()?;
        if params.kind != PayloadKind::Position {
            return Err(ArgusError::memory(format!(
                "node '{}' carries {:?} payloads, expected positions",
                self.source.address().unwrap_or("?"),
                params.kind
            )));
        }
        if (params.payload_bytes as usize) < std::mem::size_of::<Position>() {
            return Err(ArgusError::memory(
                "position node payload smaller than a Position record",
            ));
        }
        Ok(params)
    }

    /// Wait for the next sample and return a copy, or `None` at
    /// end-of-stream.
    pub fn next(&mut self) -> ArgusResult<Option<Position>> {
        if self.source.wait()?.is_end() {
            return Ok(None);
        }
        let position = {
            let payload = self.source.sample()?;
            let len = std::mem::size_of::<Position>();
            pod_read_unaligned::<Position>(&payload[..len])
        };
        self.source.post()?;
        Ok(Some(position))
    }

    pub fn last_sample(&self) -> u64 {
        self.source.last_sample()
    }

    pub fn address(&self) -> Option<&str> {
        self.source.address()
    }
}
