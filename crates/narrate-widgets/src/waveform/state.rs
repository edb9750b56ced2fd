//! Waveform pane state
//!
//! `WaveformState` ties the engine together for the application: it owns the
//! tile set and the scheduler, tracks zoom, scroll, playhead and selection,
//! and drives the viewport after every change. Positions handed to and from
//! the canvas are zoomed pixels from the start of the content unless noted.

use std::sync::Arc;

use basedrop::Shared;
use narrate_core::config::WaveformSettings;
use narrate_core::{
    PcmFormat, PcmStreamSource, PublishedMarkers, SegmentId, SegmentMarkerIndex, SegmentMatch,
    StepResult,
};
use tokio::sync::watch;

use super::error::{RenderError, RenderResult};
use super::job::RenderConfig;
use super::overlay::OverlayComposer;
use super::scheduler::{
    CancelResult, LoadFinished, LoadRequest, LoadState, LoadStatus, PlaybackHook, RenderScheduler,
    ResumePlayback,
};
use super::surface_pool::TileImage;
use super::tiles::TileSet;
use super::time_ticks::{time_ticks, TimeTick};
use super::viewport::{Viewport, ViewportController};

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default pane height in pixels
pub const WAVEFORM_PANE_HEIGHT: f32 = 160.0;

/// Fit-to-width zoom
pub const MIN_ZOOM: f64 = 1.0;

/// Deepest zoom reachable through zoom-to-selection
pub const MAX_ZOOM: f64 = 20000.0;

/// A drag shorter than this (pixels) is a click
pub const CLICK_TOLERANCE: f64 = 6.0;

/// Space left around a selection when zooming to it
pub const ZOOM_SELECTION_MARGIN: f64 = 20.0;

// =============================================================================
// Waveform State
// =============================================================================

/// What a press and release on the pane amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerGesture {
    /// Playhead to this byte offset
    Click(u64),
    /// Select `[begin, end)`
    Select(u64, u64),
}

pub struct WaveformState {
    settings: WaveformSettings,
    config: Arc<RenderConfig>,
    format: Option<PcmFormat>,
    data_length: u64,
    markers: Option<PublishedMarkers>,
    tiles: TileSet,
    scheduler: RenderScheduler,
    viewport: ViewportController,
    overlay: OverlayComposer,
    /// Pane width
    visible_width: f64,
    /// Content width at zoom 1: the pane width, until the stream grows in place
    canvas_width: f64,
    height: f64,
    zoom: f64,
    scroll: f64,
    playhead: Option<u64>,
    selection: Option<(u64, u64)>,
}

impl Default for WaveformState {
    fn default() -> Self {
        Self::new(WaveformSettings::default())
    }
}

impl WaveformState {
    pub fn new(settings: WaveformSettings) -> Self {
        let config = RenderConfig::from(&settings);
        let mut scheduler = RenderScheduler::new();
        scheduler.set_cancel_timeout(config.cancel_timeout);
        Self {
            tiles: TileSet::new(settings.tile_width),
            overlay: OverlayComposer::new(settings.label_render_threshold),
            config: Arc::new(config),
            settings,
            format: None,
            data_length: 0,
            markers: None,
            scheduler,
            viewport: ViewportController::default(),
            visible_width: 0.0,
            canvas_width: 0.0,
            height: WAVEFORM_PANE_HEIGHT as f64,
            zoom: MIN_ZOOM,
            scroll: 0.0,
            playhead: None,
            selection: None,
        }
    }

    // -------------------------------------------------------------------------
    // Stream and markers
    // -------------------------------------------------------------------------

    /// Show a new stream with its segment markers
    ///
    /// Resets zoom, scroll and selection; the playhead goes to the start.
    pub fn attach_stream(
        &mut self,
        source: Box<dyn PcmStreamSource>,
        markers: SegmentMarkerIndex,
    ) -> RenderResult<()> {
        let data_length = source.data_length();
        markers.validate_length(data_length)?;

        self.format = Some(source.format());
        self.data_length = data_length;
        self.scheduler.attach_source(&mut self.tiles, source);
        match self.markers.as_mut() {
            Some(published) => published.publish(markers),
            None => self.markers = Some(PublishedMarkers::new(markers)),
        }

        self.zoom = MIN_ZOOM;
        self.scroll = 0.0;
        self.selection = None;
        self.playhead = Some(0);
        self.canvas_width = self.visible_width;
        self.tiles.retile(self.canvas_width, self.zoom);
        log::info!(
            "attach_stream: {} bytes, {} segments",
            data_length,
            self.markers.as_ref().map_or(0, |m| m.load().len())
        );
        Ok(())
    }

    /// Swap in the same recording after it grew or shrank
    ///
    /// Bytes-per-pixel, zoom, scroll and playhead are kept, so the content
    /// width follows the data and earlier tiles keep their byte ranges. A
    /// change that fits in the last tile redraws only that tile. Returns true
    /// when the tiles were laid out again.
    pub fn extend_stream(
        &mut self,
        source: Box<dyn PcmStreamSource>,
        markers: SegmentMarkerIndex,
    ) -> RenderResult<bool> {
        let bytes_per_pixel = self.bytes_per_pixel();
        if self.format != Some(source.format()) || bytes_per_pixel <= 0.0 {
            self.attach_stream(source, markers)?;
            return Ok(true);
        }
        let data_length = source.data_length();
        markers.validate_length(data_length)?;

        self.scheduler.attach_source(&mut self.tiles, source);
        let kept = self.data_length.min(data_length);
        let ticks_unchanged = self
            .markers()
            .is_some_and(|old| boundaries_agree_below(&old, &markers, kept));
        match self.markers.as_mut() {
            Some(published) => published.publish(markers),
            None => self.markers = Some(PublishedMarkers::new(markers)),
        }

        let old_width = self.canvas_width;
        self.canvas_width = data_length as f64 / (bytes_per_pixel * self.zoom);
        self.data_length = data_length;
        let retiled = self.tiles.on_canvas_resized(old_width, self.canvas_width);
        if !retiled && !ticks_unchanged {
            self.tiles.invalidate_all();
        }

        self.playhead = self.playhead.map(|p| self.clamp_byte(p));
        self.selection = self.selection.and_then(|(begin, end)| {
            let end = self.clamp_byte(end);
            (begin < end).then_some((begin, end))
        });
        self.scroll = self.viewport_state().clamp(self.scroll);
        log::info!(
            "extend_stream: {} bytes, canvas {:.1}px, retiled: {}",
            data_length,
            self.canvas_width,
            retiled
        );
        Ok(retiled)
    }

    /// Hand the stream back (e.g. before recording into it)
    pub fn detach_stream(&mut self) -> Option<Box<dyn PcmStreamSource>> {
        let source = self.scheduler.detach_source(&mut self.tiles);
        self.format = None;
        self.data_length = 0;
        self.playhead = None;
        self.selection = None;
        self.tiles.invalidate_all();
        source
    }

    /// Replace the marker list after the document changed
    ///
    /// Boundary ticks live in the tile pictures, so every tile goes stale.
    pub fn publish_markers(&mut self, markers: SegmentMarkerIndex) -> RenderResult<()> {
        if self.format.is_some() {
            markers.validate_length(self.data_length)?;
        }
        match self.markers.as_mut() {
            Some(published) => published.publish(markers),
            None => self.markers = Some(PublishedMarkers::new(markers)),
        }
        self.tiles.invalidate_all();
        Ok(())
    }

    pub fn markers(&self) -> Option<Shared<SegmentMarkerIndex>> {
        self.markers.as_ref().map(PublishedMarkers::load)
    }

    pub fn has_stream(&self) -> bool {
        self.format.is_some()
    }

    pub fn format(&self) -> Option<PcmFormat> {
        self.format
    }

    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    pub fn set_playback_hook(&mut self, hook: Box<dyn PlaybackHook>) {
        self.scheduler.set_playback_hook(hook);
    }

    // -------------------------------------------------------------------------
    // Settings and geometry
    // -------------------------------------------------------------------------

    pub fn settings(&self) -> &WaveformSettings {
        &self.settings
    }

    pub fn config(&self) -> Arc<RenderConfig> {
        Arc::clone(&self.config)
    }

    /// Apply new settings; tiles are recomputed when the picture would change
    pub fn set_settings(&mut self, settings: WaveformSettings) {
        if settings == self.settings {
            return;
        }
        let config = RenderConfig::from(&settings);
        if settings.tile_width != self.settings.tile_width {
            self.scheduler.cancel(&mut self.tiles, true);
            self.tiles.set_tile_width(settings.tile_width);
        } else if affects_picture(&self.config, &config) {
            self.scheduler.cancel(&mut self.tiles, true);
            self.tiles.invalidate_all();
        }
        self.overlay = OverlayComposer::new(settings.label_render_threshold);
        self.scheduler.set_cancel_timeout(config.cancel_timeout);
        self.config = Arc::new(config);
        self.settings = settings;
    }

    /// Resize the pane
    ///
    /// A width change fits the content to the new width and re-lays the
    /// tiles. A height change stretches the computed pictures.
    pub fn set_canvas_size(&mut self, width: f32, height: f32) {
        let width = if width.is_finite() { width.max(0.0) as f64 } else { 0.0 };
        let height = if height.is_finite() { height.max(0.0) as f64 } else { 0.0 };
        if (width - self.visible_width).abs() > 0.5 {
            self.scheduler.cancel(&mut self.tiles, true);
            self.visible_width = width;
            self.canvas_width = width;
            self.tiles.retile(width, self.zoom);
            self.scroll = self.viewport_state().clamp(self.scroll);
        }
        if (height - self.height).abs() > 0.5 {
            self.scheduler.cancel(&mut self.tiles, true);
            self.height = height;
            self.tiles.rescale_height(height as f32);
        }
    }

    pub fn visible_width(&self) -> f64 {
        self.visible_width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Zoom in or out; the scroll offset scales with the content
    pub fn set_zoom(&mut self, zoom: f64) {
        let zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            MIN_ZOOM
        };
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        self.scheduler.cancel(&mut self.tiles, true);
        let ratio = zoom / self.zoom;
        self.zoom = zoom;
        self.tiles.retile(self.canvas_width, zoom);
        self.scroll = self.viewport_state().clamp(self.scroll * ratio);
        self.rescroll();
    }

    /// Full width of the zoomed content
    pub fn content_width(&self) -> f64 {
        self.canvas_width * self.zoom
    }

    /// Bytes per zoomed pixel, zero without a stream or a canvas
    pub fn bytes_per_pixel(&self) -> f64 {
        let width = self.content_width();
        if width <= 0.0 || self.data_length == 0 {
            0.0
        } else {
            self.data_length as f64 / width
        }
    }

    /// Frame-aligned byte offset under a content pixel, clamped to the data
    pub fn pixel_to_byte(&self, x: f64) -> u64 {
        let Some(format) = self.format else {
            return 0;
        };
        format
            .align_position(x * self.bytes_per_pixel())
            .min(format.align_to_frame(self.data_length))
    }

    pub fn byte_to_pixel(&self, byte_offset: u64) -> f64 {
        let bpp = self.bytes_per_pixel();
        if bpp > 0.0 {
            byte_offset as f64 / bpp
        } else {
            0.0
        }
    }

    // -------------------------------------------------------------------------
    // Scrolling
    // -------------------------------------------------------------------------

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    fn viewport_state(&self) -> Viewport {
        Viewport::new(self.scroll, self.visible_width, self.content_width())
    }

    /// Scroll to `offset`, loading tiles that came into view
    pub fn scroll_to(&mut self, offset: f64) -> RenderResult<Option<LoadStatus>> {
        self.scroll = self.viewport_state().clamp(offset);
        let pending = self
            .tiles
            .tiles_to_compute(self.scroll, self.visible_width, true);
        if pending.is_empty() || !self.has_stream() {
            return Ok(None);
        }
        self.request_load(true, ResumePlayback::default()).map(Some)
    }

    pub fn scroll_by(&mut self, delta: f64) -> RenderResult<Option<LoadStatus>> {
        self.scroll_to(self.scroll + delta)
    }

    /// Bring the playhead (or the selection start) back into view
    pub fn rescroll(&mut self) {
        let target = match (self.playhead, self.selection) {
            (Some(playhead), _) => playhead,
            (None, Some((begin, _))) => begin,
            (None, None) => return,
        };
        let selection = self
            .selection
            .map(|(begin, end)| (self.byte_to_pixel(begin), self.byte_to_pixel(end)));
        if let Some(offset) =
            self.viewport
                .scroll_in_view(self.viewport_state(), self.byte_to_pixel(target), selection)
        {
            self.scroll = offset;
        }
    }

    // -------------------------------------------------------------------------
    // Playhead and selection
    // -------------------------------------------------------------------------

    pub fn playhead(&self) -> Option<u64> {
        self.playhead
    }

    pub fn set_playhead(&mut self, byte_offset: u64) {
        self.playhead = Some(self.clamp_byte(byte_offset));
        self.rescroll();
    }

    pub fn clear_playhead(&mut self) {
        self.playhead = None;
    }

    pub fn selection(&self) -> Option<(u64, u64)> {
        self.selection
    }

    /// Select `[begin, end)`; an empty range clears the selection
    pub fn set_selection(&mut self, begin: u64, end: u64) {
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };
        let (begin, end) = (self.clamp_byte(begin), self.clamp_byte(end));
        self.selection = (begin < end).then_some((begin, end));
        self.rescroll();
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn select_all(&mut self) {
        self.set_selection(0, self.data_length);
    }

    /// Select the whole segment under `byte_offset`
    pub fn select_segment_at(&mut self, byte_offset: u64) -> RenderResult<SegmentMatch> {
        let segment = self.marker_index()?.find_segment(byte_offset)?;
        self.set_selection(segment.left, segment.right);
        Ok(segment)
    }

    /// Segment under the playhead
    pub fn current_segment(&self) -> Option<SegmentMatch> {
        let playhead = self.playhead?;
        self.markers()?.find_segment(playhead).ok()
    }

    /// Classify a press/release pair of content pixels
    ///
    /// A drag within `CLICK_TOLERANCE` is a click at the release point.
    pub fn classify_gesture(&self, start_x: f64, end_x: f64) -> PointerGesture {
        if (start_x - end_x).abs() <= CLICK_TOLERANCE {
            return PointerGesture::Click(self.pixel_to_byte(end_x));
        }
        let (left, right) = if start_x <= end_x {
            (start_x, end_x)
        } else {
            (end_x, start_x)
        };
        PointerGesture::Select(self.pixel_to_byte(left), self.pixel_to_byte(right))
    }

    /// A click moves the playhead and keeps the selection; a drag selects
    pub fn apply_gesture(&mut self, gesture: PointerGesture) {
        match gesture {
            PointerGesture::Click(byte_offset) => self.set_playhead(byte_offset),
            PointerGesture::Select(begin, end) => self.set_selection(begin, end),
        }
    }

    /// End of a mouse drag between two content pixels
    pub fn finish_drag_selection(&mut self, start_x: f64, end_x: f64) {
        let gesture = self.classify_gesture(start_x, end_x);
        self.apply_gesture(gesture);
    }

    /// Zoom so the selection fills the pane, returns false without a selection
    pub fn zoom_to_selection(&mut self) -> bool {
        let Some((begin, end)) = self.selection else {
            return false;
        };
        let selection_px = self.byte_to_pixel(end) - self.byte_to_pixel(begin);
        let usable = self.visible_width - ZOOM_SELECTION_MARGIN;
        if selection_px <= 0.0 || usable <= 0.0 {
            return false;
        }

        let inside = self.playhead.is_some_and(|p| p >= begin && p <= end);
        if !inside {
            self.playhead = Some(begin);
        }
        self.set_zoom((self.zoom * (usable / selection_px)).min(MAX_ZOOM));
        self.rescroll();
        true
    }

    /// Move the playhead back by `step_ms`
    pub fn rewind(&mut self, step_ms: f64) {
        let Some(format) = self.format else {
            return;
        };
        let step = format.ms_to_bytes(step_ms);
        let current = self.playhead.unwrap_or(0);
        self.set_playhead(current.saturating_sub(step));
    }

    /// Move the playhead forward by `step_ms`
    pub fn fast_forward(&mut self, step_ms: f64) {
        let Some(format) = self.format else {
            return;
        };
        let step = format.ms_to_bytes(step_ms);
        let current = self.playhead.unwrap_or(0);
        self.set_playhead(current.saturating_add(step));
    }

    /// Playhead to the start of the previous segment
    pub fn step_back(&mut self) -> RenderResult<StepResult> {
        let step = self.marker_index()?.step_back(self.playhead.unwrap_or(0))?;
        self.set_playhead(step.target);
        Ok(step)
    }

    /// Playhead to the start of the next segment
    pub fn step_forward(&mut self) -> RenderResult<StepResult> {
        let step = self.marker_index()?.step_forward(self.playhead.unwrap_or(0))?;
        self.set_playhead(step.target);
        Ok(step)
    }

    /// Start time of a segment in milliseconds
    pub fn segment_start_ms(&self, id: SegmentId) -> RenderResult<f64> {
        let format = self.format.ok_or(RenderError::NoStream)?;
        let segment = self.marker_index()?.range_of(id)?;
        Ok(format.bytes_to_ms(segment.left))
    }

    fn marker_index(&self) -> RenderResult<Shared<SegmentMarkerIndex>> {
        self.markers().ok_or(RenderError::NoStream)
    }

    fn clamp_byte(&self, byte_offset: u64) -> u64 {
        match self.format {
            Some(format) => format.align_to_frame(byte_offset.min(self.data_length)),
            None => 0,
        }
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Compute the tiles the current view needs
    pub fn request_load(
        &mut self,
        only_update_tiles: bool,
        resume: ResumePlayback,
    ) -> RenderResult<LoadStatus> {
        let markers = self.marker_index()?;
        let request = LoadRequest {
            config: Arc::clone(&self.config),
            markers,
            bytes_per_pixel: self.bytes_per_pixel(),
            height: self.height,
            scroll: self.scroll,
            visible_width: self.visible_width,
            only_update_tiles,
            resume,
        };
        let status = self.scheduler.request_load(&mut self.tiles, request)?;
        if status.request_rescroll() {
            self.rescroll();
        }
        Ok(status)
    }

    /// Throw away every tile and load again
    pub fn reload(&mut self, resume: ResumePlayback) -> RenderResult<LoadStatus> {
        self.scheduler.cancel(&mut self.tiles, true);
        self.tiles.invalidate_all();
        self.request_load(false, resume)
    }

    pub fn cancel_load(&mut self) -> CancelResult {
        self.scheduler.cancel(&mut self.tiles, true)
    }

    /// Apply a finished background load (call from the UI tick)
    pub fn poll(&mut self) -> Option<LoadFinished> {
        let finished = self.scheduler.poll(&mut self.tiles)?;
        if finished.request_rescroll {
            self.rescroll();
        }
        Some(finished)
    }

    pub fn load_state(&self) -> LoadState {
        self.scheduler.load_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.scheduler.subscribe()
    }

    // -------------------------------------------------------------------------
    // Drawing inputs
    // -------------------------------------------------------------------------

    pub fn tiles(&self) -> &TileSet {
        &self.tiles
    }

    pub fn overlay(&self) -> &OverlayComposer {
        &self.overlay
    }

    /// Computed tiles overlapping the view, with their x relative to the view
    pub fn visible_tiles(&self) -> Vec<(f32, &TileImage)> {
        let zoom = self.tiles.zoom();
        self.tiles
            .visible_range(self.scroll, self.visible_width)
            .filter_map(|index| {
                let tile = &self.tiles.tiles()[index];
                self.tiles
                    .image(index)
                    .map(|image| ((tile.x_at(zoom) - self.scroll) as f32, image))
            })
            .collect()
    }

    /// Time ruler ticks for the current view
    pub fn time_ticks(&self) -> Vec<TimeTick> {
        match self.format {
            Some(format) => time_ticks(
                format,
                self.data_length,
                self.bytes_per_pixel(),
                self.scroll,
                self.visible_width,
            ),
            None => Vec::new(),
        }
    }
}

/// Whether both marker lists put the same boundaries before `limit`
fn boundaries_agree_below(old: &SegmentMarkerIndex, new: &SegmentMarkerIndex, limit: u64) -> bool {
    let below = |index: &SegmentMarkerIndex| -> Vec<u64> {
        index.boundaries().iter().copied().take_while(|&b| b < limit).collect()
    };
    below(old) == below(new)
}

/// Whether switching configs changes tile pictures
fn affects_picture(old: &RenderConfig, new: &RenderConfig) -> bool {
    old.use_decibels != new.use_decibels
        || old.decibels_no_average != new.decibels_no_average
        || old.decibels_adjust != new.decibels_adjust
        || old.decibel_resolution != new.decibel_resolution
        || old.resolution != new.resolution
        || old.draw_style != new.draw_style
        || old.disable_draw != new.disable_draw
}
