//! Time ruler along the top edge of the waveform
//!
//! Minor ticks default to one per second. When that lands too far from the
//! ideal on-screen spacing the interval is re-derived from the spacing and
//! snapped to a multiple of 10 ms. Every fifth tick is major and labelled.

use narrate_core::PcmFormat;

/// Default minor tick interval
pub const MINOR_TICK_MS: f64 = 1000.0;

/// Preferred distance between minor ticks, in pixels
pub const IDEAL_TICK_SPACING: f64 = 20.0;

/// Every Nth tick is a labelled major tick
pub const MAJOR_TICK_EVERY: u64 = 5;

pub const MINOR_TICK_HEIGHT: f32 = 3.0;
pub const MAJOR_TICK_HEIGHT: f32 = MINOR_TICK_HEIGHT * 2.0;

/// One tick, `x` relative to the visible area
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTick {
    pub x: f32,
    pub height: f32,
    pub label: Option<String>,
}

impl TimeTick {
    pub fn is_major(&self) -> bool {
        self.label.is_some()
    }
}

/// Minor tick interval for the zoom level, `None` when it would be zero
pub fn tick_interval_ms(format: PcmFormat, bytes_per_pixel: f64) -> Option<f64> {
    if !bytes_per_pixel.is_finite() || bytes_per_pixel <= 0.0 {
        return None;
    }

    let default_px = format.ms_to_bytes(MINOR_TICK_MS) as f64 / bytes_per_pixel;
    if (default_px - IDEAL_TICK_SPACING).abs() < 1.0 {
        return Some(MINOR_TICK_MS);
    }

    let ideal_bytes = format.align_position(bytes_per_pixel * IDEAL_TICK_SPACING);
    let ms = format.bytes_to_ms(ideal_bytes).round();
    let snapped = (ms / 10.0).round() * 10.0;
    (snapped > 0.0).then_some(snapped)
}

/// Ticks for the visible part of the ruler
///
/// `scroll` and `visible_width` are zoomed pixels. No tick is placed past
/// the end of the data.
pub fn time_ticks(
    format: PcmFormat,
    data_length: u64,
    bytes_per_pixel: f64,
    scroll: f64,
    visible_width: f64,
) -> Vec<TimeTick> {
    let Some(interval_ms) = tick_interval_ms(format, bytes_per_pixel) else {
        return Vec::new();
    };
    let interval_px = format.ms_to_bytes(interval_ms) as f64 / bytes_per_pixel;
    if interval_px <= 0.0 {
        return Vec::new();
    }

    let scroll = scroll.max(0.0);
    let hidden = (scroll / interval_px).floor();
    let first_x = interval_px - (scroll - hidden * interval_px);
    let content_end = data_length as f64 / bytes_per_pixel - scroll;
    let limit = visible_width.min(content_end);

    let mut ticks = Vec::new();
    let mut count = hidden as u64;
    let mut x = first_x;
    while x <= limit {
        count += 1;
        let tick = if count % MAJOR_TICK_EVERY == 0 {
            let ms = position_ms(format, bytes_per_pixel * (scroll + x));
            TimeTick {
                x: x as f32,
                height: MAJOR_TICK_HEIGHT,
                label: Some(format_tick_time(ms)),
            }
        } else {
            TimeTick {
                x: x as f32,
                height: MINOR_TICK_HEIGHT,
                label: None,
            }
        };
        ticks.push(tick);
        x += interval_px;
    }
    ticks
}

/// Label for the mouse cursor at `x` in the visible area
pub fn cursor_label(format: PcmFormat, bytes_per_pixel: f64, scroll: f64, x: f64) -> String {
    let bytes = (bytes_per_pixel * (scroll + x)).max(0.0);
    format_tick_time(position_ms(format, bytes))
}

/// `hh:mm:ss.mmm`
pub fn format_tick_time(ms: f64) -> String {
    let total = if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    };
    let millis = total % 1000;
    let seconds = (total / 1000) % 60;
    let minutes = (total / 60_000) % 60;
    let hours = total / 3_600_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

fn position_ms(format: PcmFormat, bytes: f64) -> f64 {
    bytes / format.byte_rate() as f64 * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono() -> PcmFormat {
        PcmFormat::mono(44100).unwrap()
    }

    #[test]
    fn test_one_second_interval_kept_near_ideal_spacing() {
        // 4410 bytes per pixel puts one second at exactly 20 px
        assert_eq!(tick_interval_ms(mono(), 4410.0), Some(1000.0));
    }

    #[test]
    fn test_interval_rederived_and_snapped() {
        // one second spans 1000 px, 20 px is 20 ms
        assert_eq!(tick_interval_ms(mono(), 88.2), Some(20.0));
        // 20 px is ~22.7 ms, snapped down to 20
        assert_eq!(tick_interval_ms(mono(), 100.0), Some(20.0));
    }

    #[test]
    fn test_zero_interval_disables_ruler() {
        assert_eq!(tick_interval_ms(mono(), 0.2), None);
        assert!(time_ticks(mono(), 88200, 0.2, 0.0, 1000.0).is_empty());
        assert!(time_ticks(mono(), 88200, 0.0, 0.0, 1000.0).is_empty());
    }

    #[test]
    fn test_every_fifth_tick_is_labelled() {
        let ticks = time_ticks(mono(), 88200 * 60, 4410.0, 0.0, 200.0);
        assert_eq!(ticks.len(), 10);
        assert_eq!(ticks[0].x, 20.0);
        assert!(!ticks[0].is_major());
        assert_eq!(ticks[0].height, MINOR_TICK_HEIGHT);
        assert!(ticks[4].is_major());
        assert_eq!(ticks[4].height, MAJOR_TICK_HEIGHT);
        assert_eq!(ticks[4].label.as_deref(), Some("00:00:05.000"));
        assert_eq!(ticks[9].label.as_deref(), Some("00:00:10.000"));
    }

    #[test]
    fn test_scrolled_ruler_keeps_tick_phase() {
        let ticks = time_ticks(mono(), 88200 * 60, 4410.0, 30.0, 200.0);
        assert_eq!(ticks[0].x, 10.0);
        // ticks at 2 s, 3 s, 4 s, then the labelled 5 s tick
        assert!(ticks[3].is_major());
        assert_eq!(ticks[3].x, 70.0);
        assert_eq!(ticks[3].label.as_deref(), Some("00:00:05.000"));
    }

    #[test]
    fn test_no_ticks_past_end_of_data() {
        // one second of audio is 20 px wide at this zoom
        let ticks = time_ticks(mono(), 88200, 4410.0, 0.0, 1000.0);
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].x, 20.0);
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_tick_time(0.0), "00:00:00.000");
        assert_eq!(format_tick_time(-5.0), "00:00:00.000");
        assert_eq!(format_tick_time(61_250.0), "00:01:01.250");
        assert_eq!(format_tick_time(3_723_004.0), "01:02:03.004");
        assert_eq!(cursor_label(mono(), 88.2, 500.0, 500.0), "00:00:01.000");
    }
}
