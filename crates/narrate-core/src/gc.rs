//! Deferred reclamation for published snapshots
//!
//! A global `basedrop` collector owned by a background thread. Values wrapped
//! in `Shared<T>` with [`gc_handle`] are freed on that thread when the last
//! reference drops, so swapping a large marker index on the UI thread never
//! pays for freeing the old one.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Global handle for creating Shared<T> allocations
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Interval between collection passes
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Start the collector thread and return a handle to it
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("narrate-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives entirely on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("init_gc: collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    let received = match spawned {
        Ok(_) => rx.recv().ok(),
        Err(e) => {
            log::error!("init_gc: failed to spawn collector thread: {}", e);
            None
        }
    };

    received.unwrap_or_else(|| {
        // Without a collector thread, deferred drops are never reclaimed.
        // Leaking keeps every Shared<T> valid.
        log::warn!("init_gc: falling back to a leaked collector");
        let collector = Collector::new();
        let handle = collector.handle();
        std::mem::forget(collector);
        handle
    })
}

/// Handle for creating Shared<T> allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
