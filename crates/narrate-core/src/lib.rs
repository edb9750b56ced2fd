//! Narrate Core - shared domain types for the narration audio pane
//!
//! This crate holds everything the waveform engine needs that is not UI:
//!
//! - **PCM format**: channel layout, frame alignment, byte/time conversion
//! - **Stream source**: the seekable PCM byte stream handed to the renderer
//! - **Segment markers**: byte ranges of document segments within one stream
//! - **Configuration**: waveform settings with YAML persistence
//!
//! The widgets crate builds the tiled renderer on top of these types.

pub mod config;
pub mod gc;
pub mod markers;
pub mod stream;
pub mod types;

pub use markers::{
    MarkerError, MarkerResult, PublishedMarkers, SegmentId, SegmentMarker, SegmentMarkerIndex,
    SegmentMatch, StepResult,
};
pub use stream::{MemoryPcmSource, PcmStreamSource};
pub use types::{ByteOrder, FormatError, FormatResult, PcmFormat};
