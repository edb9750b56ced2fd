//! Shared theme constants for the narrate audio pane
//!
//! Colors for the waveform, its overlays and the time ruler.

use iced::Color;

/// Pane background
pub const BACKGROUND: Color = Color::from_rgb(0.1, 0.1, 0.12);

/// Envelope outline per channel (left, right)
pub const CHANNEL_COLORS: [Color; 2] = [
    Color::from_rgb(0.2, 0.8, 0.4), // Left - Green (#33CC66)
    Color::from_rgb(0.0, 0.8, 0.8), // Right - Cyan (#00CCCC)
];

/// Envelope fill, drawn under the outline
pub const FILL_ALPHA: f32 = 0.35;

/// Per-column bars
pub const BARS_ALPHA: f32 = 0.6;

/// Segment boundary ticks baked into tiles
pub const SEGMENT_TICK: Color = Color {
    r: 0.9,
    g: 0.9,
    b: 0.9,
    a: 0.5,
};

pub const SELECTION: Color = Color {
    r: 0.3,
    g: 0.45,
    b: 0.9,
    a: 0.3,
};

/// Bars marking the segment under the playhead
pub const SEGMENT_BRACKET: Color = Color::from_rgb(1.0, 0.6, 0.0);

pub const PLAYHEAD: Color = Color::from_rgb(1.0, 0.3, 0.3);

pub const LABEL_TEXT: Color = Color::from_rgb(0.8, 0.8, 0.85);

pub const TIME_TICK: Color = Color {
    r: 1.0,
    g: 1.0,
    b: 1.0,
    a: 0.6,
};

/// Backdrop behind the cursor time label
pub const CURSOR_LABEL_BACKGROUND: Color = Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 0.7,
};

pub const LOADING: Color = Color {
    r: 0.6,
    g: 0.6,
    b: 0.6,
    a: 0.8,
};

/// Channel color with a different alpha
pub fn with_alpha(color: Color, alpha: f32) -> Color {
    Color { a: alpha, ..color }
}
