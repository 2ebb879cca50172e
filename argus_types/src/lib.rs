//! # Argus Types - payload types with zero Argus dependencies
//!
//! This is a leaf crate providing the canonical definitions of the payloads
//! that flow through Argus nodes:
//!
//! - [`Position`] - fixed-size 2D position record (tracking output)
//! - [`FrameHeader`] / [`PixelFormat`] - fixed-size video frame descriptor
//! - [`FixedString`] - inline bounded string for shared-memory records
//!
//! Every type here is `repr(C)` and `bytemuck::Pod`, so it can be placed
//! directly inside a shared-memory payload region and copied out with plain
//! byte copies. The fabric itself (`argus_core`) treats payloads as opaque
//! bytes; these types give the typed endpoint wrappers their shape.

pub mod fixed_string;
pub mod frame;
pub mod position;

pub use fixed_string::FixedString;
pub use frame::{FrameHeader, PixelFormat};
pub use position::{Position, PositionRecord, REGION_LABEL_LEN};
