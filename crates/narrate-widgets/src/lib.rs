//! Waveform engine and iced widgets for the narrate audio pane
//!
//! ## Current Features
//!
//! - **Tiled rendering**: fixed-width tiles over a recycled surface pool
//! - **Reduction**: linear or decibel envelopes, with decibel auto-adjust
//! - **Scheduling**: one background worker, visible tiles first, bounded cancellation
//! - **Overlays**: playhead chevron, selection, segment bracket, boundary ticks, labels
//! - **Time ruler**: adaptive tick spacing with labelled major ticks
//!
//! ## View Functions
//!
//! - `waveform_pane`: the scrolling waveform with click-to-seek and drag-to-select

pub mod theme;
pub mod waveform;

// Engine state and view function
pub use waveform::{waveform_pane, ResumePlayback, WaveformState};

// Scheduling
pub use waveform::{LoadFinished, LoadState, LoadStatus, PlaybackHook, RenderError, RenderResult};

// Canvas interaction types for advanced usage
pub use waveform::{WaveformCanvas, WaveformInteraction};
