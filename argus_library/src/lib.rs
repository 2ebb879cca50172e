//! # Argus Standard Library
//!
//! The standard pipeline components built on the `argus_core` fabric:
//!
//! ```text
//! argus_library/
//! ── bridge/      # Buffered bridges (PositionBuffer, FrameBuffer)
//! ── recorder/    # Multi-node recorder, video/position artifacts, control loop
//! ── detector     # Position detector shell around an external kernel
//! ── decorator    # Frame decorator shell around an external annotator
//! ── testgen      # Synthetic position and frame generators
//! ── config       # Typed component configuration
//! ```
//!
//! Concrete image-processing kernels and video codecs are external
//! collaborators; the [`detector::Detector`], [`decorator::FrameAnnotator`]
//! and [`recorder::VideoWriter`] traits are the seams they plug into.

pub mod bridge;
pub mod config;
pub mod decorator;
pub mod detector;
pub mod recorder;
pub mod testgen;

pub use bridge::{Buffer, BridgePayload, FrameBuffer, OverflowPolicy, PositionBuffer};
pub use config::{BridgeConfig, RecorderConfig, TestPositionConfig};
pub use decorator::{Decorator, FrameAnnotator};
pub use detector::{Detector, PositionDetector};
pub use recorder::{
    control_recorder, PositionLog, RawVideoWriter, Recorder, RecorderControls, VideoWriter,
    FOURCC_H264,
};
pub use testgen::{TestFrame, TestPosition};
