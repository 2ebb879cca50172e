//! Fixed-size video frame descriptor.
//!
//! A frame payload in a node is a `FrameHeader` followed immediately by the
//! pixel bytes it describes. Only the header is interpreted by the fabric's
//! typed wrappers; pixel layout is a producer/consumer contract.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame payload.
///
/// Stored inside [`FrameHeader`] as a raw `u32` so the header stays Pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum PixelFormat {
    /// Single 8-bit channel.
    Mono8 = 0,
    /// Interleaved blue/green/red, 8 bits per channel.
    Bgr8 = 1,
    /// Interleaved red/green/blue, 8 bits per channel.
    Rgb8 = 2,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
        }
    }

    /// Decode a raw header value. Unknown values fall back to `Mono8`.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => PixelFormat::Bgr8,
            2 => PixelFormat::Rgb8,
            _ => PixelFormat::Mono8,
        }
    }
}

/// Frame descriptor - Pod, 32 bytes, precedes the pixel bytes in a payload.
///
/// # Layout (32 bytes, repr(C))
///
/// ```text
/// sample_index:     u64   (8 bytes)
/// sample_period_ns: u64   (8 bytes)
/// rows:             u32   (4 bytes)
/// cols:             u32   (4 bytes)
/// pixel_format:     u32   (4 bytes, raw PixelFormat)
/// _reserved:        u32   (4 bytes)
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Monotonic index assigned by the producer.
    pub sample_index: u64,
    /// Nominal period between samples, nanoseconds (0 = unknown).
    pub sample_period_ns: u64,
    /// Frame height in pixels.
    pub rows: u32,
    /// Frame width in pixels.
    pub cols: u32,
    /// Raw pixel format, see [`PixelFormat::from_raw`].
    pub pixel_format: u32,
    #[serde(skip)]
    _reserved: u32,
}

impl FrameHeader {
    pub fn new(rows: u32, cols: u32, format: PixelFormat, sample_period_ns: u64) -> Self {
        Self {
            sample_index: 0,
            sample_period_ns,
            rows,
            cols,
            pixel_format: format as u32,
            _reserved: 0,
        }
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        PixelFormat::from_raw(self.pixel_format)
    }

    /// Pixel bytes described by this header.
    #[inline]
    pub fn pixel_bytes(&self) -> usize {
        self.rows as usize * self.cols as usize * self.format().bytes_per_pixel() as usize
    }

    /// Total payload size: header plus pixels.
    #[inline]
    pub fn payload_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.pixel_bytes()
    }
}
