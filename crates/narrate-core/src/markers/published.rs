//! Publish-by-replacement holder for the current marker index
//!
//! The UI thread swaps in a whole new `SegmentMarkerIndex` whenever the
//! attached document node changes. Readers (the overlay composer and the
//! render worker) take a `Shared` snapshot and keep reading it even if a
//! newer index is published meanwhile. A replaced index is reclaimed on the
//! collector thread once its last snapshot is dropped.

use basedrop::{Shared, SharedCell};

use super::SegmentMarkerIndex;
use crate::gc::gc_handle;

/// Atomically swappable marker index
pub struct PublishedMarkers {
    cell: SharedCell<SegmentMarkerIndex>,
    /// Bumped on every publish so consumers can detect a new index cheaply
    generation: u64,
}

impl PublishedMarkers {
    pub fn new(index: SegmentMarkerIndex) -> Self {
        Self {
            cell: SharedCell::new(Shared::new(&gc_handle(), index)),
            generation: 0,
        }
    }

    /// Replace the whole index; existing snapshots stay valid
    pub fn publish(&mut self, index: SegmentMarkerIndex) {
        log::debug!(
            "publish: {} segments, {} bytes",
            index.len(),
            index.total_length()
        );
        self.cell.set(Shared::new(&gc_handle(), index));
        self.generation += 1;
    }

    /// Snapshot of the current index
    pub fn load(&self) -> Shared<SegmentMarkerIndex> {
        self.cell.get()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for PublishedMarkers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.load();
        f.debug_struct("PublishedMarkers")
            .field("segments", &current.len())
            .field("total_length", &current.total_length())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{SegmentId, SegmentMarker};

    #[test]
    fn test_snapshot_survives_publish() {
        let mut published = PublishedMarkers::new(SegmentMarkerIndex::single(SegmentId(1), "a", 100));
        let before = published.load();

        let replacement = SegmentMarkerIndex::new(vec![
            SegmentMarker::new(SegmentId(2), "b", 40),
            SegmentMarker::new(SegmentId(3), "c", 60),
        ])
        .unwrap();
        published.publish(replacement);

        assert_eq!(before.len(), 1);
        assert_eq!(published.load().len(), 2);
        assert_eq!(published.generation(), 1);
    }

    #[test]
    fn test_snapshot_readable_from_other_thread() {
        let published = PublishedMarkers::new(SegmentMarkerIndex::single(SegmentId(1), "a", 100));
        let snapshot = published.load();
        let total = std::thread::spawn(move || snapshot.total_length())
            .join()
            .unwrap();
        assert_eq!(total, 100);
    }
}
