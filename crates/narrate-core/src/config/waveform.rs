//! Waveform renderer settings
//!
//! All fields default individually so a hand-edited file that names only a
//! few options still loads.

use serde::{Deserialize, Serialize};

/// Which parts of the envelope are painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawStyle {
    /// Outline of the envelope only
    Border,
    /// Outline plus a filled body
    #[default]
    BorderFill,
    /// Outline, filled body and one vertical bar per step
    BorderFillBars,
    /// Outline plus vertical bars
    BorderBars,
    /// Vertical bars only
    Bars,
}

impl DrawStyle {
    pub fn has_border(self) -> bool {
        !matches!(self, DrawStyle::Bars)
    }

    pub fn has_fill(self) -> bool {
        matches!(self, DrawStyle::BorderFill | DrawStyle::BorderFillBars)
    }

    pub fn has_bars(self) -> bool {
        matches!(
            self,
            DrawStyle::BorderFillBars | DrawStyle::BorderBars | DrawStyle::Bars
        )
    }
}

/// Options recognized by the waveform renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformSettings {
    /// Width of one render tile in pixels
    /// Default: 400
    pub tile_width: u32,

    /// Pixels per reduction step; larger values draw coarser, faster envelopes
    /// Default: 2.0
    pub resolution: f64,

    /// Draw amplitudes on a decibel scale instead of linearly
    pub use_decibels: bool,

    /// In decibel mode, map min/max directly (symmetric around the center)
    /// instead of the per-step average
    pub decibels_no_average: bool,

    /// Clamp points inside the tolerance band and, in decibel mode,
    /// stretch the observed range to the available height
    /// Default: true
    pub decibels_adjust: bool,

    /// Scale applied to the 0 dB reference amplitude (32767)
    /// Default: 1.0
    pub decibel_resolution: f64,

    pub draw_style: DrawStyle,

    /// Segment labels are skipped above this many segments
    /// Default: 100
    pub label_render_threshold: usize,

    /// Jobs reading more bytes than this run on the background worker
    /// Default: 2_000_000
    pub background_byte_threshold: u64,

    /// Skip drawing altogether (overlays only)
    pub disable_draw: bool,

    /// Compute only the tiles under the visible scroll region
    /// Default: true
    pub only_load_visible_scroll: bool,

    /// How long to wait for a cancelled worker before abandoning it
    /// Default: 500 ms
    pub cancel_timeout_ms: u64,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            tile_width: 400,
            resolution: 2.0,
            use_decibels: false,
            decibels_no_average: false,
            decibels_adjust: true,
            decibel_resolution: 1.0,
            draw_style: DrawStyle::default(),
            label_render_threshold: 100,
            background_byte_threshold: 2_000_000,
            disable_draw: false,
            only_load_visible_scroll: true,
            cancel_timeout_ms: 500,
        }
    }
}

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrateConfig {
    pub waveform: WaveformSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_style_parts() {
        assert!(DrawStyle::Border.has_border());
        assert!(!DrawStyle::Border.has_fill());
        assert!(!DrawStyle::Border.has_bars());

        assert!(DrawStyle::BorderFillBars.has_border());
        assert!(DrawStyle::BorderFillBars.has_fill());
        assert!(DrawStyle::BorderFillBars.has_bars());

        assert!(!DrawStyle::Bars.has_border());
        assert!(DrawStyle::Bars.has_bars());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "waveform:\n  use_decibels: true\n  draw_style: BorderBars\n";
        let config: NarrateConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.waveform.use_decibels);
        assert_eq!(config.waveform.draw_style, DrawStyle::BorderBars);
        assert_eq!(config.waveform.tile_width, 400);
        assert_eq!(config.waveform.cancel_timeout_ms, 500);
    }
}
