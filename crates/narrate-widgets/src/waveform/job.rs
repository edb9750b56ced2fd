//! Render job description
//!
//! Settings are frozen into a `RenderConfig` when a load is requested, and a
//! `RenderJob` lists the tiles to compute with their byte ranges. The job is
//! self-contained: the worker never looks at live settings or the tile set.

use std::sync::Arc;
use std::time::Duration;

use basedrop::Shared;
use narrate_core::config::{DrawStyle, WaveformSettings};
use narrate_core::{PcmFormat, SegmentMarkerIndex};

use super::surface_pool::SurfaceId;
use super::tiles::TileSet;

/// Immutable snapshot of the renderer options for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub use_decibels: bool,
    pub decibels_no_average: bool,
    pub decibels_adjust: bool,
    pub decibel_resolution: f64,
    pub draw_style: DrawStyle,
    pub resolution: f64,
    pub label_render_threshold: usize,
    pub background_byte_threshold: u64,
    pub disable_draw: bool,
    pub only_load_visible_scroll: bool,
    pub cancel_timeout: Duration,
}

impl From<&WaveformSettings> for RenderConfig {
    fn from(settings: &WaveformSettings) -> Self {
        Self {
            use_decibels: settings.use_decibels,
            decibels_no_average: settings.decibels_no_average,
            decibels_adjust: settings.decibels_adjust,
            decibel_resolution: settings.decibel_resolution,
            draw_style: settings.draw_style,
            resolution: settings.resolution,
            label_render_threshold: settings.label_render_threshold,
            background_byte_threshold: settings.background_byte_threshold,
            disable_draw: settings.disable_draw,
            only_load_visible_scroll: settings.only_load_visible_scroll,
            cancel_timeout: Duration::from_millis(settings.cancel_timeout_ms),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from(&WaveformSettings::default())
    }
}

impl RenderConfig {
    /// Whether decibel levels get the second stretch pass
    pub fn auto_adjust(&self) -> bool {
        self.use_decibels && self.decibels_adjust
    }
}

/// One tile of a job, in zoomed pixels and frame-aligned bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTask {
    pub index: usize,
    pub surface: SurfaceId,
    pub x: f64,
    pub width: f64,
    pub start_byte: u64,
    pub end_byte: u64,
}

impl TileTask {
    pub fn byte_len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte)
    }
}

/// One computation pass over a set of tiles
pub struct RenderJob {
    pub id: u64,
    /// Tile set epoch the tasks were planned against
    pub epoch: u64,
    pub config: Arc<RenderConfig>,
    pub format: PcmFormat,
    pub data_length: u64,
    /// Bytes per zoomed pixel
    pub bytes_per_pixel: f64,
    pub zoom: f64,
    pub height: f64,
    pub markers: Shared<SegmentMarkerIndex>,
    pub tasks: Vec<TileTask>,
}

impl RenderJob {
    /// Total bytes the job reads
    pub fn bytes_needed(&self) -> u64 {
        self.tasks.iter().map(TileTask::byte_len).sum()
    }

    pub fn runs_in_background(&self) -> bool {
        self.bytes_needed() >= self.config.background_byte_threshold
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("bytes_per_pixel", &self.bytes_per_pixel)
            .field("zoom", &self.zoom)
            .field("height", &self.height)
            .field("markers", &format!("<{} segments>", self.markers.len()))
            .field("tasks", &self.tasks.len())
            .field("bytes_needed", &self.bytes_needed())
            .finish()
    }
}

/// Byte ranges for the given tiles
///
/// Tile starts are rounded down to a frame boundary; the last tile of the
/// set always runs to the end of the data.
pub fn plan_tasks(
    tiles: &TileSet,
    indices: &[usize],
    format: PcmFormat,
    data_length: u64,
    bytes_per_pixel: f64,
) -> Vec<TileTask> {
    let zoom = tiles.zoom();
    let last_index = tiles.len().saturating_sub(1);
    indices
        .iter()
        .filter_map(|&index| {
            let tile = tiles.tiles().get(index)?;
            let x = tile.x_at(zoom);
            let width = tile.width_at(zoom);
            let start_byte = format.align_position(x * bytes_per_pixel).min(data_length);
            let end_byte = if index == last_index {
                data_length
            } else {
                format
                    .align_position((x + width) * bytes_per_pixel)
                    .min(data_length)
            };
            Some(TileTask {
                index,
                surface: tile.surface,
                x,
                width,
                start_byte,
                end_byte: end_byte.max(start_byte),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_snapshot() {
        let settings = WaveformSettings {
            cancel_timeout_ms: 250,
            use_decibels: true,
            ..WaveformSettings::default()
        };
        let config = RenderConfig::from(&settings);
        assert_eq!(config.cancel_timeout, Duration::from_millis(250));
        assert!(config.auto_adjust());
    }

    #[test]
    fn test_plan_is_frame_aligned_and_contiguous() {
        let format = PcmFormat::stereo(44100).unwrap();
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);
        let data_length = 176_400;
        let bpp = data_length as f64 / 1000.0;

        let tasks = plan_tasks(&tiles, &[0, 1, 2], format, data_length, bpp);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].start_byte, 0);
        assert_eq!(tasks[2].end_byte, data_length);
        for pair in tasks.windows(2) {
            assert_eq!(pair[0].end_byte, pair[1].start_byte);
        }
        for task in &tasks {
            assert!(format.is_frame_aligned(task.start_byte));
            assert!(format.is_frame_aligned(task.end_byte));
        }
    }
}
