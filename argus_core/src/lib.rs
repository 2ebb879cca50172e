//! # Argus Core
//!
//! The shared-memory dataflow fabric for real-time vision/tracking
//! pipelines. Independent processes - frame sources, position detectors,
//! decorators, recorders, test generators - are composed into a directed
//! graph by attaching their outputs and inputs to named rendezvous nodes
//! backed by shared memory.
//!
//! Building blocks:
//!
//! - **Regions** ([`memory`]): OS-named, mmap-backed shared byte ranges.
//! - **Nodes** ([`layout`], [`node`]): a fixed-layout synchronization
//!   header plus payload, cycled by one [`Sink`] and N [`Source`]s with
//!   per-sample barriers and no copies on the write path.
//! - **Typed endpoints** ([`node::typed`]): frame and position views over
//!   the opaque byte payload.
//! - **SPSC rings** ([`spsc`]): in-process lock-free FIFOs used by bridges
//!   and recorder writer lanes.
//! - **Components** ([`component`]): the minimal lifecycle trait every
//!   pipeline stage satisfies.
//! - **Janitor** ([`janitor`]): by-name cleanup of regions left behind by
//!   crashed sinks.
//!
//! ## Quick start
//!
//! ```no_run
//! use argus_core::{Sink, Source};
//!
//! # fn main() -> argus_core::ArgusResult<()> {
//! // Producer process
//! let mut sink = Sink::new();
//! sink.bind("raw", 640 * 480)?;
//! sink.wait()?;
//! sink.retrieve()?.fill(0);
//! sink.post()?;
//!
//! // Consumer process
//! let mut source = Source::new();
//! source.touch("raw")?;
//! source.connect()?;
//! while !source.wait()?.is_end() {
//!     let bytes = source.clone_payload()?;
//!     source.post()?;
//!     drop(bytes);
//! }
//! # Ok(())
//! # }
//! ```

pub mod component;
pub mod error;
pub mod janitor;
pub mod layout;
pub mod memory;
pub mod node;
pub mod spsc;
pub mod sync;

pub use component::{Component, ComponentKind, Flow};
pub use error::{ArgusError, ArgusResult};
pub use layout::{ConnectionParameters, NodeState, PayloadKind, SideHeader};
pub use memory::ShmRegion;
pub use node::typed::{
    FrameShape, FrameSink, FrameSource, OwnedFrame, PositionSink, PositionSource,
};
pub use node::{SampleViewMut, Sink, Source};
pub use spsc::SpscRing;

// Re-export the payload types crate for downstream convenience.
pub use argus_types;
