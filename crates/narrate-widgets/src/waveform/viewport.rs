//! Keeps the playhead (and selection) inside the scrolled viewport

/// Inset kept between a scrolled-to position and the viewport edge
pub const SCROLL_MARGIN: f64 = 10.0;

/// Horizontal scroll state, all in zoomed pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: f64,
    pub width: f64,
    pub content_width: f64,
}

impl Viewport {
    pub fn new(offset: f64, width: f64, content_width: f64) -> Self {
        Self {
            offset,
            width,
            content_width,
        }
    }

    pub fn left(&self) -> f64 {
        self.offset
    }

    pub fn right(&self) -> f64 {
        self.offset + self.width
    }

    pub fn max_offset(&self) -> f64 {
        (self.content_width - self.width).max(0.0)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.left() && x <= self.right()
    }

    pub fn clamp(&self, offset: f64) -> f64 {
        if offset.is_finite() {
            offset.clamp(0.0, self.max_offset())
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewportController {
    margin: f64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self {
            margin: SCROLL_MARGIN,
        }
    }
}

impl ViewportController {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// New scroll offset that brings `target` into view, `None` if no scroll is needed
    ///
    /// With a selection, the union of the selection and `target` is kept in
    /// view when it fits. When it does not, the selection start stays
    /// visible if `target` is reachable from it; otherwise the view centers
    /// on `target`.
    pub fn scroll_in_view(
        &self,
        viewport: Viewport,
        target: f64,
        selection: Option<(f64, f64)>,
    ) -> Option<f64> {
        if !target.is_finite() || viewport.width <= 0.0 {
            return None;
        }

        let wanted = match selection {
            None => {
                if viewport.contains(target) {
                    return None;
                }
                target - self.margin
            }
            Some((begin, end)) => {
                let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };
                let min_x = begin.min(target);
                let max_x = end.max(target);
                let usable = viewport.width - 2.0 * self.margin;

                if max_x - min_x <= usable {
                    if min_x < viewport.left() {
                        min_x - self.margin
                    } else if max_x > viewport.right() {
                        max_x - viewport.width + self.margin
                    } else {
                        return None;
                    }
                } else if target >= begin && target - begin <= usable {
                    begin - self.margin
                } else {
                    target - viewport.width / 2.0
                }
            }
        };

        let offset = viewport.clamp(wanted);
        ((offset - viewport.offset).abs() > f64::EPSILON).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(offset: f64) -> Viewport {
        Viewport::new(offset, 500.0, 5000.0)
    }

    #[test]
    fn test_visible_target_does_not_scroll() {
        let ctrl = ViewportController::default();
        assert_eq!(ctrl.scroll_in_view(view(100.0), 300.0, None), None);
        assert_eq!(ctrl.scroll_in_view(view(100.0), 100.0, None), None);
        assert_eq!(ctrl.scroll_in_view(view(100.0), 600.0, None), None);
    }

    #[test]
    fn test_offscreen_target_scrolls_with_margin() {
        let ctrl = ViewportController::default();
        assert_eq!(ctrl.scroll_in_view(view(0.0), 1200.0, None), Some(1190.0));
        assert_eq!(ctrl.scroll_in_view(view(1000.0), 400.0, None), Some(390.0));
    }

    #[test]
    fn test_scroll_clamped_to_content() {
        let ctrl = ViewportController::default();
        assert_eq!(ctrl.scroll_in_view(view(2000.0), 5.0, None), Some(0.0));
        assert_eq!(ctrl.scroll_in_view(view(0.0), 4990.0, None), Some(4500.0));
        // already at the clamped offset
        assert_eq!(ctrl.scroll_in_view(view(0.0), -50.0, None), None);
    }

    #[test]
    fn test_fitting_selection_scrolls_minimally() {
        let ctrl = ViewportController::default();
        // selection left of the view
        assert_eq!(
            ctrl.scroll_in_view(view(1000.0), 1100.0, Some((900.0, 1100.0))),
            Some(890.0)
        );
        // playhead right of the view, selection inside
        assert_eq!(
            ctrl.scroll_in_view(view(1000.0), 1600.0, Some((1200.0, 1300.0))),
            Some(1110.0)
        );
        // union already visible
        assert_eq!(
            ctrl.scroll_in_view(view(1000.0), 1250.0, Some((1200.0, 1300.0))),
            None
        );
    }

    #[test]
    fn test_wide_selection_keeps_start_visible() {
        let ctrl = ViewportController::default();
        // union is 2000 px wide, target within reach of the selection start
        assert_eq!(
            ctrl.scroll_in_view(view(0.0), 2300.0, Some((2000.0, 4000.0))),
            Some(1990.0)
        );
    }

    #[test]
    fn test_wide_selection_centers_unreachable_target() {
        let ctrl = ViewportController::default();
        assert_eq!(
            ctrl.scroll_in_view(view(0.0), 3500.0, Some((2000.0, 4000.0))),
            Some(3250.0)
        );
        // target before the selection
        assert_eq!(
            ctrl.scroll_in_view(view(0.0), 1000.0, Some((2000.0, 4000.0))),
            Some(750.0)
        );
    }

    #[test]
    fn test_reversed_selection_is_normalized() {
        let ctrl = ViewportController::default();
        assert_eq!(
            ctrl.scroll_in_view(view(1000.0), 1100.0, Some((1100.0, 900.0))),
            Some(890.0)
        );
    }
}
