//! Typed configuration for library components.
//!
//! Argus does not parse configuration files itself; embedding applications
//! deserialize these structs from whatever format they use (the serde
//! derives make that a one-liner) or build them in code.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bridge::OverflowPolicy;

/// Settings for a buffered bridge component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// FIFO capacity in samples (rounded up to a power of two).
    pub capacity: usize,
    /// What to do with a new sample when the FIFO is full.
    pub policy: OverflowPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            policy: OverflowPolicy::Block,
        }
    }
}

/// Settings for a recorder component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory artifacts are written into; falls back to the current
    /// directory if it does not exist.
    pub save_path: PathBuf,
    /// Base file name; empty means "use the first source's address".
    pub file_name: String,
    /// Prefix artifacts with the recording start date.
    pub append_date: bool,
    /// Frame rate stamped into video containers.
    pub frames_per_second: f64,
    /// Whether recording starts enabled (toggled at runtime via the
    /// control surface).
    pub record_on: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("."),
            file_name: String::new(),
            append_date: false,
            frames_per_second: 30.0,
            record_on: true,
        }
    }
}

/// Settings for the synthetic position generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPositionConfig {
    /// Publication rate in Hz.
    pub samples_per_second: f64,
    /// Peak step size of the random walk, in coordinate units per sample.
    pub step: f64,
    /// Walk bounds: positions stay within [0, width) x [0, height).
    pub width: f64,
    pub height: f64,
}

impl Default for TestPositionConfig {
    fn default() -> Self {
        Self {
            samples_per_second: 30.0,
            step: 3.0,
            width: 640.0,
            height: 480.0,
        }
    }
}
