//! Render pass execution
//!
//! `run_job` reads the bytes of each task through one `Reducer` and returns
//! the finished tile pictures. It runs either inline on the UI thread (small
//! jobs) or on the background worker; the code is the same.
//!
//! ## Cancellation
//!
//! The token is checked between tiles and between steps. A plain request
//! lets the current tile finish and starts no further tiles. With
//! `interrupt_drawing` the current tile is abandoned mid-way. An abandoned
//! tile never appears in the report, so a tile is only ever marked computed
//! with a complete picture.

use std::io::{ErrorKind, Read, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use narrate_core::PcmStreamSource;

use super::job::{RenderJob, TileTask};
use super::overlay::boundary_ticks;
use super::reducer::{EnvelopeColumn, Reducer};
use super::surface_pool::{SurfaceId, TileImage};

/// Shared cancellation flags for one job
#[derive(Debug, Default)]
pub struct CancelToken {
    requested: AtomicBool,
    interrupt_drawing: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop; with `interrupt_drawing` the current tile is dropped too
    pub fn request(&self, interrupt_drawing: bool) {
        if interrupt_drawing {
            self.interrupt_drawing.store(true, Ordering::Release);
        }
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub fn interrupts_drawing(&self) -> bool {
        self.interrupt_drawing.load(Ordering::Acquire)
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
    /// The stream failed; tiles finished before the failure are kept
    Failed(String),
}

/// A finished tile
#[derive(Debug, Clone)]
pub struct TileOutput {
    pub index: usize,
    pub surface: SurfaceId,
    pub image: TileImage,
    /// Zoomed pixels the last step ran past the tile's planned end
    pub overflow: f64,
}

/// Everything a job produced
#[derive(Debug)]
pub struct JobReport {
    pub job_id: u64,
    pub epoch: u64,
    pub tiles: Vec<TileOutput>,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

/// Per-tile progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub job_id: u64,
    pub tiles_done: usize,
    pub tiles_total: usize,
}

/// Result of drawing one tile
enum TilePass {
    Done { image: TileImage, overflow: f64, end: u64 },
    Interrupted,
}

/// Compute every task of `job` from `source`
pub fn run_job(
    source: &mut dyn PcmStreamSource,
    job: &RenderJob,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(Progress),
) -> JobReport {
    let started = Instant::now();
    let tiles_total = job.tasks.len();
    let mut tiles = Vec::with_capacity(tiles_total);
    let mut outcome = JobOutcome::Completed;

    let Some(mut reducer) = Reducer::new(&job.config, job.format, job.bytes_per_pixel, job.height) else {
        // Nothing to draw at this zoom: every tile is blank
        log::debug!("run_job: job {} has no whole frame per step, drawing blank", job.id);
        for task in &job.tasks {
            tiles.push(TileOutput {
                index: task.index,
                surface: task.surface,
                image: blank_image(job, task),
                overflow: 0.0,
            });
        }
        return JobReport {
            job_id: job.id,
            epoch: job.epoch,
            tiles,
            outcome,
            elapsed: started.elapsed(),
        };
    };

    let mut buf = vec![0u8; reducer.bytes_per_step()];
    // Stream position after the previous tile, when it is known
    let mut cursor: Option<(usize, u64)> = None;

    for task in &job.tasks {
        if cancel.is_requested() {
            outcome = JobOutcome::Cancelled;
            break;
        }

        let start = match cursor {
            Some((prev, position)) if prev + 1 == task.index && position >= task.start_byte => position,
            _ => {
                if let Err(e) = source.seek(SeekFrom::Start(task.start_byte)) {
                    log::warn!("run_job: seek to {} failed: {}", task.start_byte, e);
                    outcome = JobOutcome::Failed(e.to_string());
                    break;
                }
                task.start_byte
            }
        };

        match render_tile(source, &mut reducer, &mut buf, job, task, start, cancel) {
            Ok(TilePass::Done { image, overflow, end }) => {
                tiles.push(TileOutput {
                    index: task.index,
                    surface: task.surface,
                    image,
                    overflow,
                });
                cursor = Some((task.index, end));
                on_progress(Progress {
                    job_id: job.id,
                    tiles_done: tiles.len(),
                    tiles_total,
                });
            }
            Ok(TilePass::Interrupted) => {
                outcome = JobOutcome::Cancelled;
                break;
            }
            Err(e) => {
                log::warn!("run_job: read failed in tile {}: {}", task.index, e);
                outcome = JobOutcome::Failed(e.to_string());
                break;
            }
        }
    }

    if job.config.auto_adjust() && !tiles.is_empty() {
        if let Some(range) = reducer.adjusted_range(&reducer.reached()) {
            for tile in &mut tiles {
                reducer.rescale(&mut tile.image.columns, &range);
            }
        }
    }

    let elapsed = started.elapsed();
    log::debug!(
        "run_job: job {} {:?}, {}/{} tiles in {:?}",
        job.id,
        outcome,
        tiles.len(),
        tiles_total,
        elapsed
    );

    JobReport {
        job_id: job.id,
        epoch: job.epoch,
        tiles,
        outcome,
        elapsed,
    }
}

fn render_tile(
    source: &mut dyn PcmStreamSource,
    reducer: &mut Reducer,
    buf: &mut [u8],
    job: &RenderJob,
    task: &TileTask,
    start: u64,
    cancel: &CancelToken,
) -> std::io::Result<TilePass> {
    let bpp = job.bytes_per_pixel;
    // A previous tile that ran long already drew this tile's first pixels
    let carry = (start - task.start_byte) as f64 / bpp;
    let tile_x = task.x + carry;
    let width = task.width - carry;

    let capacity = (width.max(0.0) / reducer.pixels_per_step()) as usize + 1;
    let mut columns: Vec<EnvelopeColumn> = Vec::with_capacity(capacity);
    let mut position = start;
    let mut x = 0.5;

    while position < task.end_byte && x <= width {
        if cancel.interrupts_drawing() {
            return Ok(TilePass::Interrupted);
        }
        let read = read_fully(source, buf)?;
        if read == 0 {
            break;
        }
        if let Some(column) = reducer.reduce_step(&buf[..read], x as f32) {
            columns.push(column);
        }
        position += read as u64;
        x += read as f64 / bpp;
        if read < buf.len() {
            break;
        }
    }

    let overflow = if position > task.end_byte {
        (position - task.end_byte) as f64 / bpp
    } else {
        0.0
    };
    let drawn_width = width + overflow;

    Ok(TilePass::Done {
        image: TileImage {
            columns,
            boundary_ticks: boundary_ticks(&job.markers, bpp, tile_x, drawn_width, task.index == 0),
            channel_count: job.format.channel_count() as usize,
            width: drawn_width as f32,
            height: job.height as f32,
        },
        overflow,
        end: position,
    })
}

fn blank_image(job: &RenderJob, task: &TileTask) -> TileImage {
    TileImage {
        columns: Vec::new(),
        boundary_ticks: boundary_ticks(
            &job.markers,
            job.bytes_per_pixel,
            task.x,
            task.width,
            task.index == 0,
        ),
        channel_count: job.format.channel_count() as usize,
        width: task.width as f32,
        height: job.height as f32,
    }
}

/// Fill `buf` unless the stream ends first; returns the bytes read
fn read_fully(source: &mut dyn PcmStreamSource, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::waveform::job::{plan_tasks, RenderConfig};
    use crate::waveform::tiles::TileSet;
    use basedrop::Shared;
    use narrate_core::gc::gc_handle;
    use narrate_core::{
        MemoryPcmSource, PcmFormat, SegmentId, SegmentMarker, SegmentMarkerIndex,
    };
    use std::io::{Read, Seek};
    use std::sync::Arc;

    /// Sine-ish test signal: a ramp that alternates sign every frame
    pub(crate) fn tone(format: PcmFormat, frames: usize) -> MemoryPcmSource {
        let channels = format.channel_count() as usize;
        let samples: Vec<i16> = (0..frames * channels)
            .map(|i| {
                let frame = (i / channels) as i32;
                let level = ((frame % 200) * 150) as i16;
                if frame % 2 == 0 {
                    level
                } else {
                    -level
                }
            })
            .collect();
        MemoryPcmSource::from_samples(format, &samples)
    }

    pub(crate) fn job_for(
        tiles: &TileSet,
        indices: &[usize],
        format: PcmFormat,
        data_length: u64,
        config: RenderConfig,
    ) -> RenderJob {
        let bpp = data_length as f64 / (tiles.canvas_width() * tiles.zoom());
        let markers = SegmentMarkerIndex::new(vec![
            SegmentMarker::new(SegmentId(1), "one", data_length / 2),
            SegmentMarker::new(SegmentId(2), "two", data_length - data_length / 2),
        ])
        .unwrap();
        RenderJob {
            id: 1,
            epoch: tiles.epoch(),
            config: Arc::new(config),
            format,
            data_length,
            bytes_per_pixel: bpp,
            zoom: tiles.zoom(),
            height: 100.0,
            markers: Shared::new(&gc_handle(), markers),
            tasks: plan_tasks(tiles, indices, format, data_length, bpp),
        }
    }

    /// Stream that fails once reading passes a byte offset
    struct FailingSource {
        inner: MemoryPcmSource,
        fail_after: u64,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.inner.stream_position()? >= self.fail_after {
                return Err(std::io::Error::new(ErrorKind::UnexpectedEof, "device gone"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FailingSource {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl PcmStreamSource for FailingSource {
        fn format(&self) -> PcmFormat {
            self.inner.format()
        }

        fn data_length(&self) -> u64 {
            self.inner.data_length()
        }
    }

    /// Stream that requests cancellation once reading passes a byte offset
    struct CancellingSource {
        inner: MemoryPcmSource,
        cancel: Arc<CancelToken>,
        cancel_after: u64,
        interrupt_drawing: bool,
    }

    impl Read for CancellingSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let read = self.inner.read(buf)?;
            if self.inner.stream_position()? >= self.cancel_after {
                self.cancel.request(self.interrupt_drawing);
            }
            Ok(read)
        }
    }

    impl Seek for CancellingSource {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl PcmStreamSource for CancellingSource {
        fn format(&self) -> PcmFormat {
            self.inner.format()
        }

        fn data_length(&self) -> u64 {
            self.inner.data_length()
        }
    }

    /// Three tiles over one second of mono audio, cancelled inside tile 1
    fn run_cancelled_mid_tile(interrupt_drawing: bool) -> JobReport {
        let format = PcmFormat::mono(44100).unwrap();
        let cancel = Arc::new(CancelToken::new());
        let inner = tone(format, 44100);
        let data_length = inner.data_length();
        let mut source = CancellingSource {
            inner,
            cancel: Arc::clone(&cancel),
            // tile 1 covers bytes 35280..70560
            cancel_after: 40_000,
            interrupt_drawing,
        };
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        run_job(&mut source, &job, &cancel, |_| {})
    }

    #[test]
    fn test_plain_cancel_mid_tile_finishes_that_tile() {
        let report = run_cancelled_mid_tile(false);

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        let indices: Vec<_> = report.tiles.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1]);
        // tile 1 was drawn to its end, not cut off at the cancel point
        let last = report.tiles[1].image.columns.last().unwrap();
        assert!(last.x > 390.0, "tile 1 stops at {}", last.x);
    }

    #[test]
    fn test_interrupting_cancel_drops_the_partial_tile() {
        let report = run_cancelled_mid_tile(true);

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        let indices: Vec<_> = report.tiles.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0]);
        assert!(!report.tiles[0].image.columns.is_empty());
    }

    #[test]
    fn test_full_job_computes_every_tile() {
        let format = PcmFormat::mono(44100).unwrap();
        let mut source = tone(format, 44100);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        let mut progress = Vec::new();
        let report = run_job(&mut source, &job, &CancelToken::new(), |p| progress.push(p.tiles_done));

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.tiles.len(), 3);
        assert_eq!(progress, vec![1, 2, 3]);
        for tile in &report.tiles {
            assert!(!tile.image.columns.is_empty());
            for column in &tile.image.columns {
                assert!(column.x >= 0.0 && column.x <= tile.image.width + 1.0);
                let envelope = column.channels[0];
                assert!(envelope.top <= envelope.bottom);
                assert!(envelope.top >= 5.0 && envelope.bottom <= 95.0);
            }
        }
        assert_eq!(report.tiles[0].image.boundary_ticks[0], 0.0);
    }

    #[test]
    fn test_cancel_before_start_produces_nothing() {
        let format = PcmFormat::mono(44100).unwrap();
        let mut source = tone(format, 44100);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        let cancel = CancelToken::new();
        cancel.request(false);
        let report = run_job(&mut source, &job, &cancel, |_| {});

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert!(report.tiles.is_empty());
    }

    #[test]
    fn test_cancel_stops_at_tile_boundary() {
        let format = PcmFormat::mono(44100).unwrap();
        let mut source = tone(format, 44100);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        let cancel = CancelToken::new();
        let report = run_job(&mut source, &job, &cancel, |p| {
            if p.tiles_done == 1 {
                cancel.request(false);
            }
        });

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert_eq!(report.tiles.len(), 1);
        assert_eq!(report.tiles[0].index, 0);
    }

    #[test]
    fn test_read_failure_keeps_finished_tiles() {
        let format = PcmFormat::mono(44100).unwrap();
        let inner = tone(format, 44100);
        let data_length = inner.data_length();
        let mut source = FailingSource {
            inner,
            fail_after: 40_000,
        };
        let mut tiles = TileSet::new(400);
        tiles.retile(1000.0, 1.0);

        // tile 0 covers bytes 0..35280, tile 1 crosses the failure point
        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        let report = run_job(&mut source, &job, &CancelToken::new(), |_| {});

        assert!(matches!(report.outcome, JobOutcome::Failed(_)));
        assert_eq!(report.tiles.len(), 1);
        assert_eq!(report.tiles[0].index, 0);
    }

    #[test]
    fn test_degenerate_zoom_draws_blank_tiles() {
        let format = PcmFormat::mono(44100).unwrap();
        let mut source = tone(format, 100);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(400);
        // 200 bytes over 1000 px: far less than a sample per pixel
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[0, 1, 2], format, data_length, RenderConfig::default());
        let report = run_job(&mut source, &job, &CancelToken::new(), |_| {});

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.tiles.len(), 3);
        assert!(report.tiles.iter().all(|t| t.image.columns.is_empty()));
    }

    #[test]
    fn test_non_contiguous_tiles_seek() {
        let format = PcmFormat::stereo(22050).unwrap();
        let mut source = tone(format, 22050);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(100);
        tiles.retile(1000.0, 1.0);

        let job = job_for(&tiles, &[5, 2, 9], format, data_length, RenderConfig::default());
        let report = run_job(&mut source, &job, &CancelToken::new(), |_| {});

        assert_eq!(report.outcome, JobOutcome::Completed);
        let order: Vec<_> = report.tiles.iter().map(|t| t.index).collect();
        assert_eq!(order, vec![5, 2, 9]);
        assert!(report.tiles.iter().all(|t| !t.image.columns.is_empty()));
    }

    #[test]
    fn test_overflow_feeds_next_tile() {
        let format = PcmFormat::mono(8000).unwrap();
        // 3000 bytes over 1000 px with resolution 4: 12-byte steps, 4 px each
        let mut source = tone(format, 1500);
        let data_length = source.data_length();
        let mut tiles = TileSet::new(398);
        tiles.retile(1000.0, 1.0);

        let config = RenderConfig {
            resolution: 4.0,
            ..RenderConfig::default()
        };
        let job = job_for(&tiles, &[0, 1, 2], format, data_length, config);
        let report = run_job(&mut source, &job, &CancelToken::new(), |_| {});

        // tile 0 plans 1194 bytes, reads 100 steps = 1200 bytes
        assert!((report.tiles[0].overflow - 2.0).abs() < 1e-9);
        assert_eq!(report.tiles[2].overflow, 0.0);
    }
}
