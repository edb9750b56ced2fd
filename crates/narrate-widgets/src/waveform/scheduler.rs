//! Render scheduling: one worker at a time, visible tiles first
//!
//! ## Flow
//!
//! 1. UI calls `request_load()`: any running job is cancelled and joined
//! 2. Tiles needing work are picked (visible ones first) and planned into a job
//! 3. Small jobs run inline; large ones go to the `waveform-loader` thread,
//!    which takes exclusive ownership of the PCM stream for the duration
//! 4. UI calls `poll()` from its tick handler; the finished report is applied
//!    to the tile set and the stream comes back with it
//!
//! A worker that ignores cancellation past `cancel_timeout` is abandoned: its
//! thread is detached and the stream it holds is lost, so a new stream must
//! be attached before the next load.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::Shared;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, TryRecvError};
use narrate_core::{PcmStreamSource, SegmentMarkerIndex};
use tokio::sync::watch;

use super::error::{RenderError, RenderResult};
use super::job::{plan_tasks, RenderConfig, RenderJob};
use super::tiles::TileSet;
use super::worker::{run_job, CancelToken, JobOutcome, JobReport, Progress};

/// Overflow below this (zoomed pixels) is rounding noise
const OVERFLOW_EPSILON: f64 = 1e-6;

/// Observable state of the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading {
        job_id: u64,
        tiles_done: usize,
        tiles_total: usize,
    },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }

    /// Fraction of tiles done, `None` when idle
    pub fn progress(&self) -> Option<f32> {
        match *self {
            LoadState::Idle => None,
            LoadState::Loading {
                tiles_done,
                tiles_total,
                ..
            } => Some(if tiles_total == 0 {
                0.0
            } else {
                tiles_done as f32 / tiles_total as f32
            }),
        }
    }
}

/// What the playback collaborator should do once a load settles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumePlayback {
    /// Playback was running when the load started
    pub resume: bool,
    /// Byte offset to resume from
    pub byte_offset: u64,
}

/// Receives the resume-playback notification after a load
pub trait PlaybackHook: Send {
    fn resume_playback(&mut self, request: ResumePlayback);
}

impl<F> PlaybackHook for F
where
    F: FnMut(ResumePlayback) + Send,
{
    fn resume_playback(&mut self, request: ResumePlayback) {
        self(request)
    }
}

/// Parameters of one load request
#[derive(Clone)]
pub struct LoadRequest {
    pub config: Arc<RenderConfig>,
    pub markers: Shared<SegmentMarkerIndex>,
    /// Bytes per zoomed pixel
    pub bytes_per_pixel: f64,
    pub height: f64,
    /// Scroll offset in zoomed pixels
    pub scroll: f64,
    pub visible_width: f64,
    /// Refresh tiles only; the playback hook is not notified
    pub only_update_tiles: bool,
    pub resume: ResumePlayback,
}

/// A settled load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFinished {
    pub job_id: u64,
    pub outcome: JobOutcome,
    pub tiles_applied: usize,
    /// The view should re-run its scroll-into-view (full loads only)
    pub request_rescroll: bool,
}

/// Immediate result of `request_load`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Drawing is disabled by settings
    DrawDisabled { request_rescroll: bool },
    /// Every requested tile is already computed
    NothingToCompute { request_rescroll: bool },
    /// The job was small and ran inline
    Finished(LoadFinished),
    /// The job runs on the background worker; see `poll()`
    Started { job_id: u64 },
}

impl LoadStatus {
    /// Whether the view should re-run its scroll-into-view now
    ///
    /// True for every settled full load; a started job reports it through
    /// `poll()` instead.
    pub fn request_rescroll(&self) -> bool {
        match self {
            LoadStatus::DrawDisabled { request_rescroll }
            | LoadStatus::NothingToCompute { request_rescroll } => *request_rescroll,
            LoadStatus::Finished(finished) => finished.request_rescroll,
            LoadStatus::Started { .. } => false,
        }
    }
}

/// Result of cancelling the active worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    /// No worker was running
    Idle,
    /// The worker stopped and its stream was recovered
    Joined,
    /// The worker did not stop in time and was detached
    Abandoned,
}

struct WorkerExit {
    source: Box<dyn PcmStreamSource>,
    report: JobReport,
}

struct ActiveWorker {
    job_id: u64,
    cancel: Arc<CancelToken>,
    handle: JoinHandle<()>,
    done: Receiver<WorkerExit>,
    progress: Receiver<Progress>,
    only_update_tiles: bool,
    resume: ResumePlayback,
}

/// Owns the PCM stream and the single worker slot
pub struct RenderScheduler {
    source: Option<Box<dyn PcmStreamSource>>,
    /// The stream left with an abandoned worker
    source_lost: bool,
    worker: Option<ActiveWorker>,
    next_job_id: u64,
    workers_started: u64,
    state: watch::Sender<LoadState>,
    hook: Option<Box<dyn PlaybackHook>>,
    cancel_timeout: Duration,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderScheduler {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LoadState::Idle);
        Self {
            source: None,
            source_lost: false,
            worker: None,
            next_job_id: 1,
            workers_started: 0,
            state,
            hook: None,
            cancel_timeout: RenderConfig::default().cancel_timeout,
        }
    }

    /// Replace the stream; a running job is cancelled first
    pub fn attach_source(&mut self, tiles: &mut TileSet, source: Box<dyn PcmStreamSource>) {
        self.cancel(tiles, true);
        log::info!(
            "attach_source: {} bytes, {:?}",
            source.data_length(),
            source.format()
        );
        self.source = Some(source);
        self.source_lost = false;
    }

    /// Take the stream back, e.g. to hand it to the player
    pub fn detach_source(&mut self, tiles: &mut TileSet) -> Option<Box<dyn PcmStreamSource>> {
        self.cancel(tiles, true);
        self.source.take()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn set_playback_hook(&mut self, hook: Box<dyn PlaybackHook>) {
        self.hook = Some(hook);
    }

    pub fn set_cancel_timeout(&mut self, timeout: Duration) {
        self.cancel_timeout = timeout;
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    pub fn active_job_id(&self) -> Option<u64> {
        self.worker.as_ref().map(|worker| worker.job_id)
    }

    /// Background workers started over the scheduler's lifetime
    pub fn workers_started(&self) -> u64 {
        self.workers_started
    }

    pub fn load_state(&self) -> LoadState {
        *self.state.borrow()
    }

    /// Watch load state changes (e.g. to drive a loading indicator)
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Start computing the tiles the request needs
    pub fn request_load(
        &mut self,
        tiles: &mut TileSet,
        request: LoadRequest,
    ) -> RenderResult<LoadStatus> {
        self.cancel(tiles, true);
        self.cancel_timeout = request.config.cancel_timeout;

        if request.config.disable_draw {
            log::debug!("request_load: drawing disabled");
            let request_rescroll = self.settle(request.only_update_tiles, request.resume);
            return Ok(LoadStatus::DrawDisabled { request_rescroll });
        }

        let Some(source) = self.source.as_mut() else {
            return Err(if self.source_lost {
                RenderError::StreamUnavailable
            } else {
                RenderError::NoStream
            });
        };

        let indices = tiles.tiles_to_compute(
            request.scroll,
            request.visible_width,
            request.config.only_load_visible_scroll,
        );
        if indices.is_empty() {
            let request_rescroll = self.settle(request.only_update_tiles, request.resume);
            return Ok(LoadStatus::NothingToCompute { request_rescroll });
        }

        let format = source.format();
        let data_length = source.data_length();
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let job = RenderJob {
            id: job_id,
            epoch: tiles.epoch(),
            config: Arc::clone(&request.config),
            format,
            data_length,
            bytes_per_pixel: request.bytes_per_pixel,
            zoom: tiles.zoom(),
            height: request.height,
            markers: request.markers.clone(),
            tasks: plan_tasks(tiles, &indices, format, data_length, request.bytes_per_pixel),
        };
        let tiles_total = job.tasks.len();
        self.state.send_replace(LoadState::Loading {
            job_id,
            tiles_done: 0,
            tiles_total,
        });

        if !job.runs_in_background() {
            log::debug!("request_load: {:?} inline", job);
            let report = run_job(source.as_mut(), &job, &CancelToken::new(), |_| {});
            let finished = self.complete(tiles, report, request.only_update_tiles, request.resume);
            return Ok(LoadStatus::Finished(finished));
        }

        self.spawn_worker(job, request.only_update_tiles, request.resume)?;
        Ok(LoadStatus::Started { job_id })
    }

    fn spawn_worker(
        &mut self,
        job: RenderJob,
        only_update_tiles: bool,
        resume: ResumePlayback,
    ) -> RenderResult<()> {
        let job_id = job.id;
        let cancel = Arc::new(CancelToken::new());
        let (start_tx, start_rx) = channel::bounded::<(Box<dyn PcmStreamSource>, RenderJob)>(1);
        let (done_tx, done_rx) = channel::bounded::<WorkerExit>(1);
        let (progress_tx, progress_rx) = channel::unbounded::<Progress>();

        let worker_cancel = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("waveform-loader".to_string())
            .spawn(move || {
                let Ok((mut source, job)) = start_rx.recv() else {
                    return;
                };
                log::debug!("waveform-loader: starting {:?}", job);
                let report = run_job(source.as_mut(), &job, &worker_cancel, |progress| {
                    let _ = progress_tx.send(progress);
                });
                let _ = done_tx.send(WorkerExit { source, report });
            })
            .map_err(|e| {
                self.state.send_replace(LoadState::Idle);
                RenderError::WorkerSpawn(e.to_string())
            })?;

        // The stream moves only once the thread exists, so a failed spawn keeps it
        let Some(source) = self.source.take() else {
            return Err(RenderError::NoStream);
        };
        if start_tx.send((source, job)).is_err() {
            self.source_lost = true;
            self.state.send_replace(LoadState::Idle);
            return Err(RenderError::StreamUnavailable);
        }

        self.workers_started += 1;
        log::info!("request_load: job {} started on background worker", job_id);
        self.worker = Some(ActiveWorker {
            job_id,
            cancel,
            handle,
            done: done_rx,
            progress: progress_rx,
            only_update_tiles,
            resume,
        });
        Ok(())
    }

    /// Apply a finished background job, if any (call from the UI tick)
    pub fn poll(&mut self, tiles: &mut TileSet) -> Option<LoadFinished> {
        if self.worker.is_none() {
            return None;
        }
        self.forward_progress();
        let received = self.worker.as_ref()?.done.try_recv();
        match received {
            Ok(exit) => Some(self.finish_worker(tiles, exit)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.worker_vanished()),
        }
    }

    /// Block until the active job settles or `timeout` passes
    pub fn wait(&mut self, tiles: &mut TileSet, timeout: Duration) -> Option<LoadFinished> {
        let worker = self.worker.as_ref()?;
        let received = worker.done.recv_timeout(timeout);
        match received {
            Ok(exit) => Some(self.finish_worker(tiles, exit)),
            Err(RecvTimeoutError::Timeout) => {
                self.forward_progress();
                None
            }
            Err(RecvTimeoutError::Disconnected) => Some(self.worker_vanished()),
        }
    }

    /// Stop the active job and wait a bounded time for it
    ///
    /// Tiles the worker finished before stopping are still applied.
    pub fn cancel(&mut self, tiles: &mut TileSet, interrupt_drawing: bool) -> CancelResult {
        let Some(worker) = self.worker.as_ref() else {
            return CancelResult::Idle;
        };
        worker.cancel.request(interrupt_drawing);
        let received = worker.done.recv_timeout(self.cancel_timeout);
        match received {
            Ok(exit) => {
                self.finish_worker(tiles, exit);
                CancelResult::Joined
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "cancel: worker for job {:?} did not stop within {:?}, abandoning it",
                    self.active_job_id(),
                    self.cancel_timeout
                );
                self.abandon_worker();
                CancelResult::Abandoned
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker_vanished();
                CancelResult::Abandoned
            }
        }
    }

    fn forward_progress(&mut self) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        if let Some(latest) = worker.progress.try_iter().last() {
            self.state.send_replace(LoadState::Loading {
                job_id: latest.job_id,
                tiles_done: latest.tiles_done,
                tiles_total: latest.tiles_total,
            });
        }
    }

    fn finish_worker(&mut self, tiles: &mut TileSet, exit: WorkerExit) -> LoadFinished {
        let Some(worker) = self.worker.take() else {
            self.source = Some(exit.source);
            return self.complete(tiles, exit.report, true, ResumePlayback::default());
        };
        if worker.handle.join().is_err() {
            log::error!("finish_worker: worker for job {} panicked after reporting", worker.job_id);
        }
        self.source = Some(exit.source);
        self.complete(tiles, exit.report, worker.only_update_tiles, worker.resume)
    }

    /// Hard-abort fallback: detach the thread and reset worker tracking
    fn abandon_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            // dropping the handle detaches the thread; it still sees the cancel flags
            drop(worker.handle);
            self.source_lost = true;
            self.settle(worker.only_update_tiles, worker.resume);
        }
    }

    fn worker_vanished(&mut self) -> LoadFinished {
        let worker = self.worker.take();
        let job_id = worker.as_ref().map_or(0, |w| w.job_id);
        log::error!("poll: worker for job {} exited without reporting", job_id);
        self.source_lost = true;
        let (only_update_tiles, resume) = worker
            .map(|w| (w.only_update_tiles, w.resume))
            .unwrap_or((true, ResumePlayback::default()));
        let request_rescroll = self.settle(only_update_tiles, resume);
        LoadFinished {
            job_id,
            outcome: JobOutcome::Failed("worker exited unexpectedly".to_string()),
            tiles_applied: 0,
            request_rescroll,
        }
    }

    fn complete(
        &mut self,
        tiles: &mut TileSet,
        report: JobReport,
        only_update_tiles: bool,
        resume: ResumePlayback,
    ) -> LoadFinished {
        let mut tiles_applied = 0;
        if report.epoch == tiles.epoch() {
            let zoom = tiles.zoom();
            let in_job: Vec<usize> = report.tiles.iter().map(|output| output.index).collect();
            for output in report.tiles {
                let current = tiles.tiles().get(output.index).map(|tile| tile.surface);
                if current != Some(output.surface) {
                    continue;
                }
                if output.overflow > OVERFLOW_EPSILON {
                    if let Some(next) = tiles.apply_overflow(output.index, output.overflow / zoom) {
                        // Drawn by an earlier job at its old position
                        let stale = tiles.tiles()[next].is_computed && !in_job.contains(&next);
                        if stale {
                            tiles.invalidate(next);
                        }
                    }
                }
                tiles.install(output.index, output.image);
                tiles_applied += 1;
            }
        } else {
            log::debug!(
                "complete: job {} planned for epoch {}, tiles are at {}; discarding",
                report.job_id,
                report.epoch,
                tiles.epoch()
            );
        }

        log::info!(
            "complete: job {} {:?}, {} tiles applied in {:?}",
            report.job_id,
            report.outcome,
            tiles_applied,
            report.elapsed
        );
        let request_rescroll = self.settle(only_update_tiles, resume);
        LoadFinished {
            job_id: report.job_id,
            outcome: report.outcome,
            tiles_applied,
            request_rescroll,
        }
    }

    /// Back to idle; notify playback unless only tiles were refreshed
    ///
    /// Returns whether the view should rescroll.
    fn settle(&mut self, only_update_tiles: bool, resume: ResumePlayback) -> bool {
        self.state.send_replace(LoadState::Idle);
        if only_update_tiles {
            return false;
        }
        if let Some(hook) = self.hook.as_mut() {
            hook.resume_playback(resume);
        }
        true
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.request(true);
        }
    }
}
