//! Video writer interface.
//!
//! Codec selection and container muxing are external collaborators; the
//! recorder only needs lazy open-on-first-frame plus per-frame writes.
//! [`RawVideoWriter`] is the built-in implementation: a minimal
//! length-less raw container (fixed-size frames after a fixed header)
//! that keeps recordings inspectable without a codec stack.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use argus_core::{ArgusError, ArgusResult, OwnedFrame};
use argus_types::PixelFormat;

/// FourCC stamped into containers by the recorder.
pub const FOURCC_H264: [u8; 4] = *b"H264";

/// Sink for one recorded video stream.
///
/// `open` is called lazily with the geometry of the first frame; `write`
/// failures are isolated to the stream (the recorder logs and drops the
/// frame).
pub trait VideoWriter: Send {
    /// File extension for artifacts produced by this writer.
    const EXTENSION: &'static str;

    fn is_open(&self) -> bool;

    fn open(
        &mut self,
        path: &Path,
        fourcc: [u8; 4],
        fps: f64,
        rows: u32,
        cols: u32,
        format: PixelFormat,
    ) -> ArgusResult<()>;

    fn write(&mut self, frame: &OwnedFrame) -> ArgusResult<()>;
}

const RAW_MAGIC: [u8; 8] = *b"ARGVRAW1";

/// Built-in raw container writer.
///
/// Layout: 8-byte magic, 4-byte fourcc, rows/cols/pixel_format as u32 LE,
/// fps as f64 LE, then per frame an 8-byte sample index followed by the
/// fixed-size pixel block.
#[derive(Default)]
pub struct RawVideoWriter {
    out: Option<BufWriter<File>>,
    pixel_bytes: usize,
    frames_written: u64,
}

impl RawVideoWriter {
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Read back the sample indices recorded in a raw container; used by
    /// tooling and tests to audit a recording.
    pub fn read_index(path: &Path) -> ArgusResult<Vec<u64>> {
        let mut file = File::open(path)?;
        let mut head = [0u8; 32];
        file.read_exact(&mut head)?;
        if head[..8] != RAW_MAGIC {
            return Err(ArgusError::memory(format!(
                "{} is not a raw argus recording",
                path.display()
            )));
        }
        let rows = u32::from_le_bytes([head[12], head[13], head[14], head[15]]);
        let cols = u32::from_le_bytes([head[16], head[17], head[18], head[19]]);
        let format = PixelFormat::from_raw(u32::from_le_bytes([head[20], head[21], head[22], head[23]]));
        let pixel_bytes = rows as usize * cols as usize * format.bytes_per_pixel() as usize;

        let mut indices = Vec::new();
        let mut frame_head = [0u8; 8];
        let mut pixels = vec![0u8; pixel_bytes];
        loop {
            match file.read_exact(&mut frame_head) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            file.read_exact(&mut pixels)?;
            indices.push(u64::from_le_bytes(frame_head));
        }
        Ok(indices)
    }
}

impl VideoWriter for RawVideoWriter {
    const EXTENSION: &'static str = "rawv";

    fn is_open(&self) -> bool {
        self.out.is_some()
    }

    fn open(
        &mut self,
        path: &Path,
        fourcc: [u8; 4],
        fps: f64,
        rows: u32,
        cols: u32,
        format: PixelFormat,
    ) -> ArgusResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&RAW_MAGIC)?;
        out.write_all(&fourcc)?;
        out.write_all(&rows.to_le_bytes())?;
        out.write_all(&cols.to_le_bytes())?;
        out.write_all(&(format as u32).to_le_bytes())?;
        out.write_all(&fps.to_le_bytes())?;
        self.pixel_bytes = rows as usize * cols as usize * format.bytes_per_pixel() as usize;
        self.out = Some(out);
        log::info!(
            "opened video container {} ({rows}x{cols}, {fps} fps)",
            path.display()
        );
        Ok(())
    }

    fn write(&mut self, frame: &OwnedFrame) -> ArgusResult<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| ArgusError::not_bound("video writer not opened"))?;
        if frame.pixels.len() != self.pixel_bytes {
            return Err(ArgusError::PayloadTooLarge {
                needed: frame.pixels.len(),
                available: self.pixel_bytes,
            });
        }
        out.write_all(&frame.header.sample_index.to_le_bytes())?;
        out.write_all(&frame.pixels)?;
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for RawVideoWriter {
    fn drop(&mut self) {
        if let Some(mut out) = self.out.take() {
            if let Err(e) = out.flush() {
                log::error!("failed to flush video container: {e}");
            }
        }
    }
}
