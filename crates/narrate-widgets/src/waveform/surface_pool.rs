//! Render surfaces and their pool
//!
//! A surface holds the computed picture of one tile. Surfaces live in an
//! arena addressed by `SurfaceId`. The first `min_capacity` slots are
//! pooled: releasing one keeps the surface for the next `acquire`. Slots
//! beyond the minimum are allocated on demand when the pool runs dry and are
//! freed again on release, so the pool never shrinks below (or grows its
//! reserve beyond) the minimum.

use super::reducer::EnvelopeColumn;

/// Canvas width the default pool is sized to cover
pub const POOL_COVERAGE_WIDTH: u32 = 1600;

/// Index of a surface slot in the pool arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub usize);

/// Computed picture of one tile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileImage {
    pub columns: Vec<EnvelopeColumn>,
    /// Segment boundary positions relative to the tile origin
    pub boundary_ticks: Vec<f32>,
    pub channel_count: usize,
    pub width: f32,
    pub height: f32,
}

impl TileImage {
    /// Stretch the envelope to a new picture height
    ///
    /// Returns false when either height is unusable; the picture is then
    /// left as it was.
    pub fn rescale_height(&mut self, height: f32) -> bool {
        if !(self.height > 0.0) || !(height > 0.0) || !height.is_finite() {
            return false;
        }
        let factor = height / self.height;
        for column in &mut self.columns {
            for envelope in &mut column.channels {
                envelope.top *= factor;
                envelope.bottom *= factor;
            }
        }
        self.height = height;
        true
    }
}

/// Reusable render target
#[derive(Debug, Default)]
pub struct Surface {
    image: Option<TileImage>,
}

impl Surface {
    pub fn image(&self) -> Option<&TileImage> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut TileImage> {
        self.image.as_mut()
    }

    pub fn install(&mut self, image: TileImage) {
        self.image = Some(image);
    }

    pub fn clear(&mut self) {
        self.image = None;
    }

    pub fn is_blank(&self) -> bool {
        self.image.is_none()
    }
}

/// Arena of surfaces with a fixed pooled minimum
#[derive(Debug)]
pub struct SurfacePool {
    slots: Vec<Option<Surface>>,
    /// Pooled surfaces ready for reuse
    free: Vec<SurfaceId>,
    /// Extra slots whose surface was dropped on release
    vacant: Vec<SurfaceId>,
    min_capacity: usize,
    allocations: usize,
}

/// `ceil(1600 / tile_width)`, at least one
pub fn min_capacity_for(tile_width: u32) -> usize {
    let tile_width = tile_width.max(1);
    POOL_COVERAGE_WIDTH.div_ceil(tile_width).max(1) as usize
}

impl SurfacePool {
    /// Pool sized for tiles of `tile_width` pixels
    pub fn new(tile_width: u32) -> Self {
        let min_capacity = min_capacity_for(tile_width);
        let slots = (0..min_capacity).map(|_| Some(Surface::default())).collect();
        // reversed so acquire hands out low ids first
        let free = (0..min_capacity).rev().map(SurfaceId).collect();
        Self {
            slots,
            free,
            vacant: Vec::new(),
            min_capacity,
            allocations: min_capacity,
        }
    }

    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    /// Surfaces allocated over the pool's lifetime
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Surfaces currently held by tiles
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count() - self.free.len()
    }

    /// Take a blank surface, allocating only when the pool is exhausted
    pub fn acquire(&mut self) -> SurfaceId {
        if let Some(id) = self.free.pop() {
            return id;
        }
        self.allocations += 1;
        if let Some(id) = self.vacant.pop() {
            self.slots[id.0] = Some(Surface::default());
            return id;
        }
        let id = SurfaceId(self.slots.len());
        self.slots.push(Some(Surface::default()));
        log::debug!("acquire: pool exhausted, allocated surface {}", id.0);
        id
    }

    /// Hand a surface back; its picture is discarded
    pub fn release(&mut self, id: SurfaceId) {
        match self.slots.get_mut(id.0) {
            Some(slot) if id.0 < self.min_capacity => {
                if let Some(surface) = slot.as_mut() {
                    surface.clear();
                }
                if !self.free.contains(&id) {
                    self.free.push(id);
                }
            }
            Some(slot) => {
                if slot.take().is_some() {
                    self.vacant.push(id);
                }
            }
            None => log::warn!("release: unknown surface {}", id.0),
        }
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_capacity() {
        assert_eq!(min_capacity_for(400), 4);
        assert_eq!(min_capacity_for(300), 6);
        assert_eq!(min_capacity_for(5000), 1);
        assert_eq!(min_capacity_for(0), 1600);
    }

    #[test]
    fn test_pooled_surfaces_are_reused() {
        let mut pool = SurfacePool::new(400);
        let a = pool.acquire();
        assert_eq!(a, SurfaceId(0));
        pool.get_mut(a).unwrap().install(TileImage::default());

        pool.release(a);
        assert!(pool.get(a).unwrap().is_blank());

        let b = pool.acquire();
        assert_eq!(b, a);
        assert_eq!(pool.allocations(), 4);
    }

    #[test]
    fn test_extras_are_not_pooled() {
        let mut pool = SurfacePool::new(400);
        let ids: Vec<_> = (0..6).map(|_| pool.acquire()).collect();
        assert_eq!(pool.allocations(), 6);
        assert_eq!(pool.in_use(), 6);

        for id in &ids {
            pool.release(*id);
        }
        assert_eq!(pool.in_use(), 0);
        // extra surfaces were dropped, not kept for reuse
        assert!(pool.get(ids[4]).is_none());
        assert!(pool.get(ids[5]).is_none());

        // the four pooled surfaces come back without allocating
        for _ in 0..4 {
            pool.acquire();
        }
        assert_eq!(pool.allocations(), 6);

        // a fifth needs a fresh allocation, reusing a vacant slot
        let extra = pool.acquire();
        assert_eq!(pool.allocations(), 7);
        assert!(extra.0 >= 4 && extra.0 < 6);
    }

    #[test]
    fn test_double_release_is_harmless() {
        let mut pool = SurfacePool::new(800);
        let a = pool.acquire();
        pool.release(a);
        pool.release(a);
        assert_eq!(pool.acquire(), a);
        assert_ne!(pool.acquire(), a);
    }
}
