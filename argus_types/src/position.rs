//! Fixed-size 2D position record.
//!
//! `Position` is the tracking output that flows between detectors,
//! decorators and recorders. It is a Pod record so it can live directly in
//! a shared payload region; the JSON shape written by recorders is produced
//! through [`PositionRecord`].

use crate::fixed_string::FixedString;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Capacity of the inline region label.
pub const REGION_LABEL_LEN: usize = 16;

const POSITION_VALID: u32 = 1 << 0;
const HEADING_VALID: u32 = 1 << 1;
const VELOCITY_VALID: u32 = 1 << 2;
const REGION_VALID: u32 = 1 << 3;

/// 2D position sample - Pod, 80 bytes.
///
/// Coordinates are in whatever unit the producing detector works in
/// (typically pixels). Each optional quantity (heading, velocity, region)
/// carries a validity bit; invalid fields hold stale values and must not be
/// read.
///
/// # Layout (80 bytes, repr(C))
///
/// ```text
/// sample_index: u64              (8 bytes)
/// x, y:         f64 x 2          (16 bytes)
/// heading_x/y:  f64 x 2          (16 bytes)
/// vx, vy:       f64 x 2          (16 bytes)
/// flags:        u32              (4 bytes)
/// region:       FixedString<16>  (17 bytes)
/// _pad:         [u8; 3]          (3 bytes)
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Monotonic index assigned by the producer.
    pub sample_index: u64,
    pub x: f64,
    pub y: f64,
    pub heading_x: f64,
    pub heading_y: f64,
    pub vx: f64,
    pub vy: f64,
    flags: u32,
    region: FixedString<REGION_LABEL_LEN>,
    #[serde(skip)]
    _pad: [u8; 3],
}

// SAFETY: repr(C), all fields Pod, explicit tail padding.
// 8 + 48 + 4 + 17 + 3 = 80 bytes, 80 % 8 == 0.
unsafe impl Zeroable for Position {}
unsafe impl Pod for Position {}

impl Position {
    /// An invalid position for the given sample index.
    pub fn invalid(sample_index: u64) -> Self {
        Self {
            sample_index,
            ..Self::default()
        }
    }

    /// A valid position at (x, y).
    pub fn at(sample_index: u64, x: f64, y: f64) -> Self {
        Self {
            sample_index,
            x,
            y,
            flags: POSITION_VALID,
            ..Self::default()
        }
    }

    #[inline]
    pub fn position_valid(&self) -> bool {
        self.flags & POSITION_VALID != 0
    }

    #[inline]
    pub fn heading_valid(&self) -> bool {
        self.flags & HEADING_VALID != 0
    }

    #[inline]
    pub fn velocity_valid(&self) -> bool {
        self.flags & VELOCITY_VALID != 0
    }

    #[inline]
    pub fn region_valid(&self) -> bool {
        self.flags & REGION_VALID != 0
    }

    pub fn set_heading(&mut self, hx: f64, hy: f64) {
        self.heading_x = hx;
        self.heading_y = hy;
        self.flags |= HEADING_VALID;
    }

    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        self.vx = vx;
        self.vy = vy;
        self.flags |= VELOCITY_VALID;
    }

    pub fn set_region(&mut self, label: &str) {
        self.region = FixedString::truncated(label);
        self.flags |= REGION_VALID;
    }

    pub fn region(&self) -> Option<&str> {
        if self.region_valid() {
            Some(self.region.as_str())
        } else {
            None
        }
    }

    /// Project this sample into the JSON record shape used by recorders,
    /// attaching the source label it was read from.
    pub fn to_record(&self, label: &str) -> PositionRecord {
        PositionRecord {
            label: label.to_string(),
            valid: self.position_valid(),
            x: self.x,
            y: self.y,
            heading: self.heading_valid().then_some([self.heading_x, self.heading_y]),
            velocity: self.velocity_valid().then_some([self.vx, self.vy]),
            region: self.region().map(str::to_string),
        }
    }
}

/// JSON projection of a [`Position`], one element of a recorder tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub label: String,
    pub valid: bool,
    pub x: f64,
    pub y: f64,
    pub heading: Option<[f64; 2]>,
    pub velocity: Option<[f64; 2]>,
    pub region: Option<String>,
}
