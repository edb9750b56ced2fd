//! Waveform rendering error types

use narrate_core::MarkerError;
use thiserror::Error;

/// Errors surfaced by the render scheduler and the waveform state
///
/// Degenerate zoom/resolution combinations are not errors: they just draw
/// nothing.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No PCM stream is attached
    #[error("No audio stream attached to the waveform")]
    NoStream,

    /// The stream was lost with a worker that had to be abandoned
    #[error("Audio stream unavailable: reattach it after the previous render was abandoned")]
    StreamUnavailable,

    /// Marker index does not describe the attached stream
    #[error("Segment markers rejected: {0}")]
    Markers(#[from] MarkerError),

    /// Reading the stream failed
    #[error("Audio stream read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The background worker thread could not be started
    #[error("Failed to spawn waveform worker: {0}")]
    WorkerSpawn(String),
}

/// Result type for waveform rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
