//! Tile layout of the waveform canvas
//!
//! The canvas is cut into tiles of `tile_width` pixels at the current zoom.
//! Positions are stored at zoom 1 (`original_x`, `original_width`) so the
//! partition always sums to the zoom-1 canvas width; multiply by `zoom` for
//! on-screen coordinates.

use super::surface_pool::{SurfaceId, SurfacePool, TileImage};

/// Narrowest a tile may become (zoomed pixels)
pub const MIN_TILE_WIDTH: f64 = 1.0;

/// Slack when counting tiles, so float noise in `zoomed / tile_width` does not add a tile
const TILE_COUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub original_x: f64,
    pub original_width: f64,
    pub surface: SurfaceId,
    pub is_computed: bool,
}

impl Tile {
    pub fn x_at(&self, zoom: f64) -> f64 {
        self.original_x * zoom
    }

    pub fn width_at(&self, zoom: f64) -> f64 {
        self.original_width * zoom
    }
}

/// Ordered, contiguous tiles plus the surfaces backing them
#[derive(Debug)]
pub struct TileSet {
    tiles: Vec<Tile>,
    pool: SurfacePool,
    tile_width: u32,
    canvas_width: f64,
    zoom: f64,
    /// Bumped whenever tile positions or contents are invalidated
    epoch: u64,
}

impl TileSet {
    pub fn new(tile_width: u32) -> Self {
        let tile_width = tile_width.max(1);
        Self {
            tiles: Vec::new(),
            pool: SurfacePool::new(tile_width),
            tile_width,
            canvas_width: 0.0,
            zoom: 1.0,
            epoch: 0,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Canvas width at zoom 1
    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    /// `MIN_TILE_WIDTH` at zoom 1
    fn min_width(&self) -> f64 {
        MIN_TILE_WIDTH / self.zoom
    }

    /// Picture of a computed tile
    pub fn image(&self, index: usize) -> Option<&TileImage> {
        let tile = self.tiles.get(index)?;
        if !tile.is_computed {
            return None;
        }
        self.pool.get(tile.surface).and_then(|surface| surface.image())
    }

    /// Change the tile width; the pool is rebuilt and the layout redone
    pub fn set_tile_width(&mut self, tile_width: u32) {
        let tile_width = tile_width.max(1);
        if tile_width == self.tile_width {
            return;
        }
        self.tiles.clear();
        self.pool = SurfacePool::new(tile_width);
        self.tile_width = tile_width;
        let (width, zoom) = (self.canvas_width, self.zoom);
        self.retile(width, zoom);
    }

    /// Rebuild the partition for a canvas of `canvas_width` zoom-1 pixels
    pub fn retile(&mut self, canvas_width: f64, zoom: f64) {
        for tile in self.tiles.drain(..) {
            self.pool.release(tile.surface);
        }
        self.epoch += 1;
        self.zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        self.canvas_width = if canvas_width.is_finite() { canvas_width.max(0.0) } else { 0.0 };

        if self.canvas_width <= 0.0 {
            return;
        }

        let zoomed_width = self.canvas_width * self.zoom;
        let tile_width = self.tile_width as f64;

        if zoomed_width <= tile_width {
            let surface = self.pool.acquire();
            self.tiles.push(Tile {
                original_x: 0.0,
                original_width: self.canvas_width,
                surface,
                is_computed: false,
            });
            return;
        }

        let count = ((zoomed_width / tile_width) - TILE_COUNT_EPSILON).ceil().max(1.0) as usize;
        let mut x = 0.0;
        for index in 0..count {
            let width = if index + 1 == count {
                self.canvas_width - x
            } else {
                tile_width / self.zoom
            };
            let surface = self.pool.acquire();
            self.tiles.push(Tile {
                original_x: x,
                original_width: width,
                surface,
                is_computed: false,
            });
            x += width;
        }

        // A sliver left after the full tiles joins the tile before it
        if self.tiles.len() > 1 {
            let min_width = self.min_width();
            if let Some(last) = self.tiles.last().copied() {
                if last.original_width < min_width {
                    self.tiles.pop();
                    self.pool.release(last.surface);
                    if let Some(previous) = self.tiles.last_mut() {
                        previous.original_width += last.original_width;
                    }
                }
            }
        }

        log::debug!(
            "retile: {} tiles for {:.1}px at zoom {:.2}",
            self.tiles.len(),
            self.canvas_width,
            self.zoom
        );
    }

    /// Absorb a small width change by resizing the last tile
    ///
    /// Used when the data grows or shrinks at a constant bytes-per-pixel, so
    /// earlier tiles keep their byte ranges. Falls back to a full retile when
    /// the last tile would leave its bounds. Returns true on a full retile.
    pub fn on_canvas_resized(&mut self, old_width: f64, new_width: f64) -> bool {
        let delta = new_width - old_width;
        if delta == 0.0 && new_width == self.canvas_width {
            return false;
        }
        let tile_width = self.tile_width as f64;
        let zoom = self.zoom;
        let fits = self.tiles.last().map_or(false, |last| {
            let width = (last.original_width + delta) * zoom;
            width >= MIN_TILE_WIDTH && width <= tile_width
        });
        if !fits || (old_width - self.canvas_width).abs() > 0.5 {
            self.retile(new_width, zoom);
            return true;
        }

        if let Some(last) = self.tiles.last_mut() {
            last.original_width += delta;
            last.is_computed = false;
            self.pool.release(last.surface);
            last.surface = self.pool.acquire();
        }
        self.canvas_width = new_width;
        self.epoch += 1;
        false
    }

    /// Grow tile `index` by `overflow` zoom-1 pixels, taking them from the next tile
    ///
    /// The next tile keeps at least `MIN_TILE_WIDTH`; the last tile has no
    /// neighbour and is left alone. Returns the index of the shifted
    /// neighbour, whose picture no longer matches its position.
    pub fn apply_overflow(&mut self, index: usize, overflow: f64) -> Option<usize> {
        if index + 1 >= self.tiles.len() || !overflow.is_finite() {
            return None;
        }
        let min_width = self.min_width();
        let available = (self.tiles[index + 1].original_width - min_width).max(0.0);
        let shrinkable = (self.tiles[index].original_width - min_width).max(0.0);
        let shift = overflow.min(available).max(-shrinkable);
        if shift == 0.0 {
            return None;
        }
        self.tiles[index].original_width += shift;
        let next = &mut self.tiles[index + 1];
        next.original_x += shift;
        next.original_width -= shift;
        Some(index + 1)
    }

    /// Mark one tile stale and blank its surface
    pub fn invalidate(&mut self, index: usize) {
        let Some(tile) = self.tiles.get_mut(index) else {
            return;
        };
        tile.is_computed = false;
        if let Some(surface) = self.pool.get_mut(tile.surface) {
            surface.clear();
        }
    }

    /// Mark every tile stale and blank its surface
    pub fn invalidate_all(&mut self) {
        for tile in &mut self.tiles {
            tile.is_computed = false;
            if let Some(surface) = self.pool.get_mut(tile.surface) {
                surface.clear();
            }
        }
        self.epoch += 1;
    }

    /// Fit computed pictures to a new pane height
    ///
    /// A picture that cannot be stretched goes back to the compute queue.
    pub fn rescale_height(&mut self, height: f32) {
        for tile in &mut self.tiles {
            if !tile.is_computed {
                continue;
            }
            let Some(surface) = self.pool.get_mut(tile.surface) else {
                continue;
            };
            let rescaled = surface
                .image_mut()
                .is_some_and(|image| image.rescale_height(height));
            if !rescaled {
                surface.clear();
                tile.is_computed = false;
            }
        }
    }

    /// Store a computed picture and mark the tile ready
    pub fn install(&mut self, index: usize, image: TileImage) {
        let Some(tile) = self.tiles.get_mut(index) else {
            return;
        };
        if let Some(surface) = self.pool.get_mut(tile.surface) {
            surface.install(image);
            tile.is_computed = true;
        }
    }

    /// Indices of the tiles overlapping `[scroll, scroll + visible_width)` (zoomed pixels)
    pub fn visible_range(&self, scroll: f64, visible_width: f64) -> std::ops::Range<usize> {
        let zoom = self.zoom;
        let end = scroll + visible_width.max(0.0);
        let first = self
            .tiles
            .partition_point(|tile| tile.x_at(zoom) + tile.width_at(zoom) <= scroll);
        let last = self.tiles.partition_point(|tile| tile.x_at(zoom) < end);
        first..last.max(first)
    }

    /// Tiles that still need computing, visible ones first
    ///
    /// With `only_visible`, tiles outside the viewport are left for a later
    /// request (typically the next scroll).
    pub fn tiles_to_compute(&self, scroll: f64, visible_width: f64, only_visible: bool) -> Vec<usize> {
        let visible = self.visible_range(scroll, visible_width);
        let mut order: Vec<usize> = visible
            .clone()
            .filter(|&index| !self.tiles[index].is_computed)
            .collect();
        if !only_visible {
            order.extend(
                (0..self.tiles.len())
                    .filter(|index| !visible.contains(index))
                    .filter(|&index| !self.tiles[index].is_computed),
            );
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::reducer::EnvelopeColumn;

    fn widths(set: &TileSet) -> Vec<f64> {
        set.tiles().iter().map(|t| t.original_width).collect()
    }

    fn assert_partition(set: &TileSet) {
        let mut x = 0.0;
        for tile in set.tiles() {
            assert!((tile.original_x - x).abs() < 1e-9, "gap before tile at {}", tile.original_x);
            assert!(tile.original_width * set.zoom() >= MIN_TILE_WIDTH - 1e-9);
            x += tile.original_width;
        }
        assert!((x - set.canvas_width()).abs() < 1.0);
    }

    #[test]
    fn test_retile_at_zoom_one() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        assert_eq!(widths(&set), vec![400.0, 400.0, 200.0]);
        assert_partition(&set);
    }

    #[test]
    fn test_single_tile_fast_path() {
        let mut set = TileSet::new(400);
        set.retile(250.0, 1.0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.tiles()[0].surface, SurfaceId(0));
        assert_eq!(widths(&set), vec![250.0]);
    }

    #[test]
    fn test_retile_zoomed() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 2.5);
        // 2500 zoomed pixels in tiles of 400
        assert_eq!(set.len(), 7);
        assert!((set.tiles()[0].width_at(2.5) - 400.0).abs() < 1e-9);
        assert_partition(&set);
    }

    #[test]
    fn test_retile_never_leaves_a_sliver() {
        let mut set = TileSet::new(400);
        let mut zoom = 1.0;
        while zoom < 60.0 {
            set.retile(1000.0, zoom);
            let last = set.tiles().last().unwrap();
            assert!(
                last.width_at(zoom) >= MIN_TILE_WIDTH,
                "last tile {} px wide at zoom {} ({} tiles)",
                last.width_at(zoom),
                zoom,
                set.len()
            );
            let expected = (1000.0 * zoom / 400.0 - 1e-6).ceil().max(1.0) as usize;
            assert!(set.len() <= expected, "{} tiles at zoom {}", set.len(), zoom);
            assert_eq!(set.pool().in_use(), set.len());
            assert_partition(&set);
            zoom += 0.1;
        }
    }

    #[test]
    fn test_retile_reuses_pool() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        set.retile(1000.0, 1.0);
        assert_eq!(set.pool().allocations(), 4);

        set.retile(3000.0, 1.0);
        assert_eq!(set.len(), 8);
        assert_eq!(set.pool().allocations(), 8);
        assert_eq!(set.pool().in_use(), 8);

        set.retile(1000.0, 1.0);
        assert_eq!(set.pool().in_use(), 3);
    }

    #[test]
    fn test_degenerate_canvas() {
        let mut set = TileSet::new(400);
        set.retile(0.0, 1.0);
        assert!(set.is_empty());
        set.retile(f64::NAN, 1.0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_resize_adjusts_last_tile() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        set.install(0, TileImage::default());

        assert!(!set.on_canvas_resized(1000.0, 1050.0));
        assert_eq!(widths(&set), vec![400.0, 400.0, 250.0]);
        assert!(set.tiles()[0].is_computed);
        assert!(!set.tiles()[2].is_computed);
        assert_partition(&set);

        // growing past the tile width needs a new tile
        assert!(set.on_canvas_resized(1050.0, 1300.0));
        assert_eq!(widths(&set), vec![400.0, 400.0, 400.0, 100.0]);
    }

    #[test]
    fn test_overflow_shifts_next_tile() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        assert_eq!(set.apply_overflow(0, 1.5), Some(1));
        assert_eq!(widths(&set), vec![401.5, 398.5, 200.0]);
        assert_eq!(set.tiles()[1].original_x, 401.5);
        assert_partition(&set);

        // next tile never drops below the minimum width
        set.apply_overflow(1, 1000.0);
        assert_eq!(set.tiles()[2].original_width, MIN_TILE_WIDTH);
        assert_partition(&set);

        // nothing to shift past the last tile
        assert_eq!(set.apply_overflow(2, 5.0), None);
        assert_partition(&set);
    }

    #[test]
    fn test_overflow_at_deep_zoom_stays_small() {
        let mut set = TileSet::new(400);
        set.retile(10.0, 20000.0);
        let before = set.tiles()[1].original_x;
        // two zoomed pixels
        set.apply_overflow(0, 2.0 / 20000.0);
        assert!((set.tiles()[1].original_x - before - 2.0 / 20000.0).abs() < 1e-12);
        assert_partition(&set);
    }

    #[test]
    fn test_rescale_height_keeps_pictures() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        let mut column = EnvelopeColumn::default();
        column.channels[0].top = 10.0;
        column.channels[0].bottom = 90.0;
        set.install(
            0,
            TileImage {
                columns: vec![column],
                height: 100.0,
                ..TileImage::default()
            },
        );
        // no height on record: redraw instead
        set.install(1, TileImage::default());

        set.rescale_height(150.0);
        let image = set.image(0).unwrap();
        assert_eq!(image.height, 150.0);
        assert_eq!(image.columns[0].channels[0].top, 15.0);
        assert_eq!(image.columns[0].channels[0].bottom, 135.0);
        assert!(set.image(1).is_none());
        assert!(!set.tiles()[2].is_computed);
    }

    #[test]
    fn test_invalidate_single_tile() {
        let mut set = TileSet::new(400);
        set.retile(1000.0, 1.0);
        set.install(0, TileImage::default());
        set.install(1, TileImage::default());
        let epoch = set.epoch();

        set.invalidate(1);
        assert!(set.image(0).is_some());
        assert!(set.image(1).is_none());
        assert_eq!(set.epoch(), epoch);
        set.invalidate(7);
    }

    #[test]
    fn test_visible_first_order() {
        let mut set = TileSet::new(100);
        set.retile(1000.0, 1.0);
        set.install(4, TileImage::default());

        let visible = set.tiles_to_compute(350.0, 200.0, true);
        assert_eq!(visible, vec![3, 5]);

        let all = set.tiles_to_compute(350.0, 200.0, false);
        assert_eq!(all, vec![3, 5, 0, 1, 2, 6, 7, 8, 9]);
    }

    #[test]
    fn test_invalidate_blanks_surfaces() {
        let mut set = TileSet::new(400);
        set.retile(800.0, 1.0);
        set.install(1, TileImage::default());
        assert!(set.image(1).is_some());
        let epoch = set.epoch();

        set.invalidate_all();
        assert!(set.image(1).is_none());
        assert!(set.epoch() > epoch);
        assert_eq!(set.tiles_to_compute(0.0, 800.0, true), vec![0, 1]);
    }
}
