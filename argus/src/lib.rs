//! # Argus - shared-memory dataflow runtime for real-time tracking
//!
//! Argus composes independent processes (frame sources, position
//! detectors, decorators, recorders, test generators) into a directed
//! graph by attaching each process's outputs and inputs to named
//! rendezvous nodes backed by shared memory. Payloads move between
//! processes at the producer's natural rate with per-sample
//! synchronization, bounded buffering and clean shutdown.
//!
//! ## Quick start
//!
//! ```no_run
//! use argus::prelude::*;
//!
//! # fn main() -> argus::ArgusResult<()> {
//! // Generate synthetic positions on node "pos" at 30 Hz...
//! let mut generator = TestPosition::new("pos", TestPositionConfig::default());
//! generator.connect()?;
//!
//! // ...and record them to ./pos.json from another component (typically
//! // another process).
//! let mut recorder: Recorder = Recorder::new(
//!     &["pos".to_string()],
//!     &[],
//!     RecorderConfig::default(),
//! )?;
//! recorder.connect()?;
//! # Ok(())
//! # }
//! ```

// Re-export the whole core surface.
pub use argus_core::{self, *};

// Re-export the component library with an alias.
pub use argus_library as library;

/// Everything needed to assemble a pipeline.
pub mod prelude {
    pub use argus_core::component::{Component, ComponentKind, Flow};
    pub use argus_core::error::{ArgusError, ArgusResult};
    pub use argus_core::layout::{ConnectionParameters, NodeState, PayloadKind};
    pub use argus_core::node::typed::{
        FrameShape, FrameSink, FrameSource, OwnedFrame, PositionSink, PositionSource,
    };
    pub use argus_core::node::{Sink, Source};
    pub use argus_core::{janitor, spsc::SpscRing};

    pub use argus_library::bridge::{FrameBuffer, OverflowPolicy, PositionBuffer};
    pub use argus_library::config::{BridgeConfig, RecorderConfig, TestPositionConfig};
    pub use argus_library::decorator::{Decorator, FrameAnnotator};
    pub use argus_library::detector::{Detector, PositionDetector};
    pub use argus_library::recorder::{
        control_recorder, RawVideoWriter, Recorder, RecorderControls, VideoWriter,
    };
    pub use argus_library::testgen::{TestFrame, TestPosition};

    pub use argus_types::{FrameHeader, PixelFormat, Position};
}
