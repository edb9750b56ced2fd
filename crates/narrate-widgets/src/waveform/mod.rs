//! Tiled waveform rendering for the narration audio pane
//!
//! The waveform is cut into fixed-width tiles, each backed by a pooled
//! surface. Tiles are reduced from PCM on a single background worker,
//! visible ones first, and composed with the playhead, selection and
//! segment overlays on an iced canvas.
//!
//! ## Architecture (iced 0.14 patterns)
//!
//! - **Engine** (`TileSet`, `Reducer`, `RenderScheduler`): no UI types beyond geometry
//! - **State** (`WaveformState`): lives at the application level, owns the engine
//! - **View function** (`waveform_pane`): takes state + callbacks, returns `Element<Message>`
//! - **Canvas Program** (`WaveformCanvas`): rendering and event-to-callback translation
//!
//! ## Usage
//!
//! ```ignore
//! // attach once, then drive from update()
//! state.attach_stream(Box::new(source), markers)?;
//! state.request_load(false, ResumePlayback::default())?;
//!
//! // in the tick handler
//! if let Some(finished) = state.poll() { /* ... */ }
//! ```

mod canvas;
mod decibel;
mod error;
mod job;
mod overlay;
mod reducer;
mod scheduler;
mod state;
mod surface_pool;
mod tiles;
mod time_ticks;
mod view;
mod viewport;
mod worker;

pub use decibel::{DecibelRange, DecibelScale, ReachedLevels, FULL_SCALE};

pub use error::{RenderError, RenderResult};

pub use job::{plan_tasks, RenderConfig, RenderJob, TileTask};

pub use overlay::{boundary_ticks, OverlayComposer, SegmentLabel, ARROW_DEPTH, MIN_LABEL_CHUNK_WIDTH};

pub use reducer::{ChannelEnvelope, EnvelopeColumn, Reducer, ScaleMode, MAX_CHANNELS, TOLERANCE};

pub use scheduler::{
    CancelResult, LoadFinished, LoadRequest, LoadState, LoadStatus, PlaybackHook, RenderScheduler,
    ResumePlayback,
};

pub use state::{
    PointerGesture, WaveformState,
    // Constants
    CLICK_TOLERANCE, MAX_ZOOM, MIN_ZOOM, WAVEFORM_PANE_HEIGHT, ZOOM_SELECTION_MARGIN,
};

pub use surface_pool::{SurfaceId, SurfacePool, TileImage, POOL_COVERAGE_WIDTH};

pub use tiles::{Tile, TileSet};

pub use time_ticks::{format_tick_time, tick_interval_ms, time_ticks, TimeTick};

pub use view::waveform_pane;

pub use viewport::{Viewport, ViewportController, SCROLL_MARGIN};

pub use worker::{run_job, CancelToken, JobOutcome, JobReport, Progress, TileOutput};

// Re-export canvas types for advanced usage (custom Program state)
pub use canvas::{WaveformCanvas, WaveformInteraction};
