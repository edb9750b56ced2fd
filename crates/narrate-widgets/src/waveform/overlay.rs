//! Overlay geometry drawn over the tiles
//!
//! Everything here is plain geometry in zoomed canvas pixels; the canvas
//! program strokes and fills it. Positions derive from byte offsets divided
//! by bytes-per-pixel.

use iced::{Point, Rectangle, Size};
use narrate_core::{SegmentMarkerIndex, SegmentMatch};

/// Size of the playhead arrows
pub const ARROW_DEPTH: f32 = 6.0;

/// Segments narrower than this get no label
pub const MIN_LABEL_CHUNK_WIDTH: f32 = 10.0;

/// Rough advance of one label character at the default text size
pub const LABEL_CHAR_WIDTH: f32 = 7.0;

/// Horizontal inset of a label inside its segment
pub const LABEL_PADDING: f32 = 3.0;

const ELLIPSIS: char = '\u{2026}';

/// A label clipped to its segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLabel {
    pub x: f32,
    pub width: f32,
    pub text: String,
}

/// Builds overlay geometry for one view configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayComposer {
    pub arrow_depth: f32,
    pub label_char_width: f32,
    pub label_threshold: usize,
}

impl Default for OverlayComposer {
    fn default() -> Self {
        Self {
            arrow_depth: ARROW_DEPTH,
            label_char_width: LABEL_CHAR_WIDTH,
            label_threshold: 100,
        }
    }
}

impl OverlayComposer {
    pub fn new(label_threshold: usize) -> Self {
        Self {
            label_threshold,
            ..Self::default()
        }
    }

    /// Playhead chevron: arrows at top and bottom joined by a stem
    ///
    /// The points trace bottom arrow, stem, top arrow. A negative position
    /// (no playhead) gives no geometry.
    pub fn playhead_chevron(&self, byte_offset: f64, bytes_per_pixel: f64, height: f32) -> Option<[Point; 8]> {
        let x = pixel_of(byte_offset, bytes_per_pixel)?;
        let d = self.arrow_depth;
        Some([
            Point::new(x, height - d),
            Point::new(x + d, height),
            Point::new(x - d, height),
            Point::new(x, height - d),
            Point::new(x, d),
            Point::new(x - d, 0.0),
            Point::new(x + d, 0.0),
            Point::new(x, d),
        ])
    }

    /// Selection rectangle over the full height
    pub fn selection_rect(
        &self,
        begin: u64,
        end: u64,
        bytes_per_pixel: f64,
        height: f32,
    ) -> Option<Rectangle> {
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };
        let left = pixel_of(begin as f64, bytes_per_pixel)?;
        let right = pixel_of(end as f64, bytes_per_pixel)?;
        Some(Rectangle::new(
            Point::new(left, 0.0),
            Size::new(right - left, height),
        ))
    }

    /// Thick bars along the top and bottom edge of the current segment
    pub fn segment_bracket(
        &self,
        segment: &SegmentMatch,
        bytes_per_pixel: f64,
        height: f32,
    ) -> Option<[Rectangle; 2]> {
        let left = pixel_of(segment.left as f64, bytes_per_pixel)?;
        let right = pixel_of(segment.right as f64, bytes_per_pixel)?;
        let thickness = self.arrow_depth / 2.0;
        let size = Size::new(right - left, thickness);
        Some([
            Rectangle::new(Point::new(left, 0.0), size),
            Rectangle::new(Point::new(left, height - thickness), size),
        ])
    }

    /// Labels for the segments overlapping the viewport
    ///
    /// Skipped entirely above the label threshold. Each label is clipped to
    /// the visible part of its segment and shortened with an ellipsis when
    /// too long; segments of `MIN_LABEL_CHUNK_WIDTH` or less get none.
    pub fn segment_labels(
        &self,
        markers: &SegmentMarkerIndex,
        bytes_per_pixel: f64,
        scroll: f64,
        visible_width: f64,
    ) -> Vec<SegmentLabel> {
        if markers.len() > self.label_threshold || !(bytes_per_pixel > 0.0) {
            return Vec::new();
        }
        let view_end = scroll + visible_width;
        let mut labels = Vec::new();
        let mut left_byte = 0u64;
        for (marker, &right_byte) in markers.markers().iter().zip(markers.boundaries()) {
            let left = left_byte as f64 / bytes_per_pixel;
            let right = right_byte as f64 / bytes_per_pixel;
            left_byte = right_byte;
            if right <= scroll || left >= view_end {
                continue;
            }
            let clipped_left = left.max(scroll);
            let clipped_right = right.min(view_end);
            let width = (clipped_right - clipped_left) as f32;
            if width <= MIN_LABEL_CHUNK_WIDTH {
                continue;
            }
            if let Some(text) = self.fit_label(&marker.label, width - 2.0 * LABEL_PADDING) {
                labels.push(SegmentLabel {
                    x: clipped_left as f32 + LABEL_PADDING,
                    width: width - 2.0 * LABEL_PADDING,
                    text,
                });
            }
        }
        labels
    }

    /// Shorten `text` to fit `width`, ending with an ellipsis when cut
    pub fn fit_label(&self, text: &str, width: f32) -> Option<String> {
        if text.is_empty() || width <= 0.0 {
            return None;
        }
        let max_chars = (width / self.label_char_width).floor() as usize;
        let len = text.chars().count();
        if len <= max_chars {
            return Some(text.to_string());
        }
        if max_chars < 2 {
            return None;
        }
        let mut fitted: String = text.chars().take(max_chars - 1).collect();
        fitted.push(ELLIPSIS);
        Some(fitted)
    }
}

/// Segment boundary ticks inside one tile, relative to the tile origin
///
/// A tick lies in the tile when `x <= boundary < x + width`; the very first
/// tile also gets a tick at its origin.
pub fn boundary_ticks(
    markers: &SegmentMarkerIndex,
    bytes_per_pixel: f64,
    tile_x: f64,
    tile_width: f64,
    first_tile: bool,
) -> Vec<f32> {
    let mut ticks = Vec::new();
    if first_tile {
        ticks.push(0.0);
    }
    if !(bytes_per_pixel > 0.0) {
        return ticks;
    }
    let tile_end = tile_x + tile_width;
    let start = markers
        .boundaries()
        .partition_point(|&right| (right as f64 / bytes_per_pixel) < tile_x);
    for &right in &markers.boundaries()[start..] {
        let x = right as f64 / bytes_per_pixel;
        if x >= tile_end {
            break;
        }
        let local = (x - tile_x) as f32;
        if !(first_tile && local == 0.0) {
            ticks.push(local);
        }
    }
    ticks
}

fn pixel_of(byte_offset: f64, bytes_per_pixel: f64) -> Option<f32> {
    if byte_offset < 0.0 || !(bytes_per_pixel > 0.0) || !byte_offset.is_finite() {
        return None;
    }
    Some((byte_offset / bytes_per_pixel) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrate_core::{SegmentId, SegmentMarker};

    fn markers(lengths: &[u64]) -> SegmentMarkerIndex {
        SegmentMarkerIndex::new(
            lengths
                .iter()
                .enumerate()
                .map(|(i, len)| SegmentMarker::new(SegmentId(i as u64), format!("Segment {}", i + 1), *len))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_playhead_chevron() {
        let composer = OverlayComposer::default();
        let points = composer.playhead_chevron(1000.0, 10.0, 120.0).unwrap();
        assert_eq!(points[0], Point::new(100.0, 114.0));
        assert_eq!(points[4], Point::new(100.0, 6.0));
        assert_eq!(points[6], Point::new(106.0, 0.0));
        assert!(composer.playhead_chevron(-1.0, 10.0, 120.0).is_none());
        assert!(composer.playhead_chevron(10.0, 0.0, 120.0).is_none());
    }

    #[test]
    fn test_selection_rect_orders_edges() {
        let composer = OverlayComposer::default();
        let rect = composer.selection_rect(4000, 2000, 20.0, 50.0).unwrap();
        assert_eq!(rect.x, 100.0);
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 50.0);
    }

    #[test]
    fn test_segment_bracket() {
        let composer = OverlayComposer::default();
        let index = markers(&[30000, 58200]);
        let segment = index.find_segment(40000).unwrap();
        let [top, bottom] = composer.segment_bracket(&segment, 100.0, 80.0).unwrap();
        assert_eq!(top.x, 300.0);
        assert_eq!(top.width, 582.0);
        assert_eq!(top.height, 3.0);
        assert_eq!(bottom.y, 77.0);
    }

    #[test]
    fn test_ticks_are_local_to_tile() {
        let index = markers(&[1000, 1000, 1000, 1000]);
        // 10 bytes per pixel: boundaries at 100, 200, 300, 400 px
        assert_eq!(boundary_ticks(&index, 10.0, 0.0, 150.0, true), vec![0.0, 100.0]);
        assert_eq!(boundary_ticks(&index, 10.0, 150.0, 150.0, false), vec![50.0]);
        assert_eq!(boundary_ticks(&index, 10.0, 300.0, 150.0, false), vec![0.0, 100.0]);
    }

    #[test]
    fn test_labels_suppressed_above_threshold() {
        let composer = OverlayComposer::new(3);
        let index = markers(&[100, 100, 100, 100]);
        assert!(composer.segment_labels(&index, 1.0, 0.0, 400.0).is_empty());
    }

    #[test]
    fn test_narrow_segments_get_no_label() {
        let composer = OverlayComposer::default();
        let index = markers(&[100, 8, 292]);
        let labels = composer.segment_labels(&index, 1.0, 0.0, 400.0);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].x, LABEL_PADDING);
        assert_eq!(labels[1].x, 108.0 + LABEL_PADDING);
    }

    #[test]
    fn test_labels_clip_to_viewport() {
        let composer = OverlayComposer::default();
        let index = markers(&[1000, 1000]);
        let labels = composer.segment_labels(&index, 1.0, 900.0, 500.0);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].x, 900.0 + LABEL_PADDING);
        assert_eq!(labels[0].width, 100.0 - 2.0 * LABEL_PADDING);
    }

    #[test]
    fn test_fit_label_ellipsizes() {
        let composer = OverlayComposer::default();
        assert_eq!(composer.fit_label("Intro", 70.0).as_deref(), Some("Intro"));
        assert_eq!(
            composer.fit_label("Chapter one", 35.0).as_deref(),
            Some("Chap\u{2026}")
        );
        assert_eq!(composer.fit_label("Chapter one", 10.0), None);
    }
}
