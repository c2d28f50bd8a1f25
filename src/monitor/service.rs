//! Preview/monitor pointer service
//!
//! Each pointer owns at most one capture task. A task is tagged with the
//! epoch of the [`FrameSlot`] it was spawned for; every pointer change bumps
//! the epoch (clearing the cached frame under the same lock), so a task that
//! was cancelled while a capture was in flight cannot store its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::capture::{CaptureBackend, FrameReceiver};
use super::config::MonitorConfig;
use super::frame::PreviewFrame;
use crate::catalog::Source;
use crate::stats::{CaptureCounters, CaptureStats};

/// The two independent pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Preview,
    Monitor,
}

impl PointerKind {
    pub const ALL: [PointerKind; 2] = [PointerKind::Preview, PointerKind::Monitor];

    fn index(self) -> usize {
        match self {
            PointerKind::Preview => 0,
            PointerKind::Monitor => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PointerKind::Preview => "preview",
            PointerKind::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for PointerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible pointer state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerState {
    /// Source name the pointer is bound to
    pub source: Option<String>,
    /// Whether frames are exposed; false whenever unbound
    pub visible: bool,
}

/// A pointer reset by a cascade, with the name it was showing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedPointer {
    pub pointer: PointerKind,
    pub source: String,
}

/// Single-slot frame cache for one pointer
#[derive(Debug, Default)]
struct FrameSlot {
    epoch: AtomicU64,
    latest: Mutex<Option<PreviewFrame>>,
    counters: CaptureCounters,
}

impl FrameSlot {
    fn lock(&self) -> MutexGuard<'_, Option<PreviewFrame>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate running tasks and drop the cached frame
    fn advance(&self) -> u64 {
        let mut latest = self.lock();
        *latest = None;
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Store a frame if `epoch` is still current
    fn store(&self, epoch: u64, frame: PreviewFrame) -> bool {
        let mut latest = self.lock();
        if !self.is_current(epoch) {
            return false;
        }
        *latest = Some(frame);
        true
    }

    fn get(&self) -> Option<PreviewFrame> {
        self.lock().clone()
    }
}

#[derive(Default)]
struct Pointer {
    source: Option<Source>,
    visible: bool,
    task: Option<JoinHandle<()>>,
    frames: Arc<FrameSlot>,
}

impl Pointer {
    fn state(&self) -> PointerState {
        PointerState {
            source: self.source.as_ref().map(|s| s.name.clone()),
            visible: self.visible,
        }
    }

    /// Unbind and stop the task; the handle is returned for joining
    fn release(&mut self) -> (Option<Source>, Option<JoinHandle<()>>) {
        self.frames.advance();
        self.visible = false;
        let task = self.task.take();
        if let Some(task) = &task {
            task.abort();
        }
        (self.source.take(), task)
    }
}

/// Pointers reset by a cascade whose tasks have been cancelled but not joined
///
/// Callers holding a lock detach synchronously and join after releasing it.
#[must_use = "join the detached capture tasks"]
pub struct Detached {
    pub cleared: Vec<ClearedPointer>,
    tasks: Vec<JoinHandle<()>>,
}

impl Detached {
    /// Wait until every cancelled capture task has exited
    pub async fn join(self) -> Vec<ClearedPointer> {
        join_all(self.tasks).await;
        self.cleared
    }
}

/// Preview and studio-monitor pointers with their capture loops
pub struct MonitorService {
    capture: Arc<dyn CaptureBackend>,
    config: MonitorConfig,
    pointers: Mutex<[Pointer; 2]>,
}

impl MonitorService {
    pub fn new(capture: Arc<dyn CaptureBackend>) -> Self {
        Self::with_config(capture, MonitorConfig::default())
    }

    pub fn with_config(capture: Arc<dyn CaptureBackend>, config: MonitorConfig) -> Self {
        Self {
            capture,
            config,
            pointers: Mutex::new(Default::default()),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, [Pointer; 2]> {
        self.pointers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a pointer to a source and (re)start its capture task
    ///
    /// The previous task is stopped and joined before this returns. The
    /// pointer becomes visible and its frame cache starts empty.
    pub async fn set_pointer(&self, kind: PointerKind, source: Source) -> PointerState {
        let (state, previous) = {
            let mut pointers = self.lock();
            let pointer = &mut pointers[kind.index()];
            let (_, previous) = pointer.release();

            let epoch = pointer.frames.advance();
            pointer.task = Some(tokio::spawn(run_capture(
                Arc::clone(&self.capture),
                Arc::new(source.clone()),
                Arc::clone(&pointer.frames),
                epoch,
                self.config.clone(),
            )));
            pointer.source = Some(source);
            pointer.visible = true;
            (pointer.state(), previous)
        };

        join_all(previous).await;
        tracing::info!(pointer = %kind, source = ?state.source, "Pointer set");
        state
    }

    /// Unbind a pointer, stopping its capture task before returning
    pub async fn clear(&self, kind: PointerKind) -> Option<String> {
        let (source, task) = self.lock()[kind.index()].release();
        join_all(task).await;

        if let Some(source) = &source {
            tracing::info!(pointer = %kind, source = %source.name, "Pointer cleared");
        }
        source.map(|s| s.name)
    }

    /// Unbind every pointer currently showing `source_name`
    ///
    /// Synchronous so it can run inside another component's critical section.
    pub fn detach_source(&self, source_name: &str) -> Detached {
        self.detach_where(|s| s.name == source_name)
    }

    /// Unbind every pointer
    pub fn detach_all(&self) -> Detached {
        self.detach_where(|_| true)
    }

    /// Unbind every pointer and wait for the capture tasks to exit
    pub async fn reset_all(&self) -> Vec<ClearedPointer> {
        let cleared = self.detach_all().join().await;
        if !cleared.is_empty() {
            tracing::info!(count = cleared.len(), "Pointers reset");
        }
        cleared
    }

    fn detach_where(&self, matches: impl Fn(&Source) -> bool) -> Detached {
        let mut detached = Detached {
            cleared: Vec::new(),
            tasks: Vec::new(),
        };

        let mut pointers = self.lock();
        for kind in PointerKind::ALL {
            let pointer = &mut pointers[kind.index()];
            if !pointer.source.as_ref().is_some_and(&matches) {
                continue;
            }
            let (source, task) = pointer.release();
            if let Some(source) = source {
                detached.cleared.push(ClearedPointer {
                    pointer: kind,
                    source: source.name,
                });
            }
            detached.tasks.extend(task);
        }

        detached
    }

    /// Flip frame visibility; capture keeps running either way
    ///
    /// Returns the new visibility, or false for an unbound pointer.
    pub fn toggle_visibility(&self, kind: PointerKind) -> bool {
        let mut pointers = self.lock();
        let pointer = &mut pointers[kind.index()];
        if pointer.source.is_none() {
            return false;
        }
        pointer.visible = !pointer.visible;
        tracing::debug!(pointer = %kind, visible = pointer.visible, "Pointer visibility toggled");
        pointer.visible
    }

    pub fn pointer(&self, kind: PointerKind) -> PointerState {
        self.lock()[kind.index()].state()
    }

    /// The bound source, if any
    pub fn source(&self, kind: PointerKind) -> Option<Source> {
        self.lock()[kind.index()].source.clone()
    }

    /// Latest frame if the pointer is visible
    pub fn frame(&self, kind: PointerKind) -> Option<PreviewFrame> {
        let pointers = self.lock();
        let pointer = &pointers[kind.index()];
        if !pointer.visible {
            return None;
        }
        pointer.frames.get()
    }

    /// Latest frame regardless of visibility
    pub fn latest_frame(&self, kind: PointerKind) -> Option<PreviewFrame> {
        self.lock()[kind.index()].frames.get()
    }

    pub fn stats(&self, kind: PointerKind) -> CaptureStats {
        self.lock()[kind.index()].frames.counters.snapshot()
    }

    /// Stop both capture loops
    pub async fn shutdown(&self) {
        for kind in PointerKind::ALL {
            self.clear(kind).await;
        }
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        for pointer in self.lock().iter_mut() {
            if let Some(task) = pointer.task.take() {
                task.abort();
            }
        }
    }
}

async fn join_all(tasks: impl IntoIterator<Item = JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Capture task failed");
            }
        }
    }
}

/// What one capture tick produced
enum Tick {
    Frame(PreviewFrame),
    Empty,
    Failed(String),
}

/// Connect if needed, then fetch and convert one frame
fn capture_once(
    backend: &dyn CaptureBackend,
    source: &Source,
    receiver: &mut Option<Box<dyn FrameReceiver>>,
    timeout: Duration,
) -> Tick {
    let mut rx = match receiver.take() {
        Some(rx) => rx,
        None => match backend.connect(source) {
            Ok(rx) => rx,
            Err(e) => return Tick::Failed(e.to_string()),
        },
    };

    // A receiver that errored is dropped so the next tick reconnects
    let tick = match rx.capture(timeout) {
        Ok(Some(raw)) => match raw.to_preview() {
            Ok(frame) => Tick::Frame(frame),
            Err(e) => Tick::Failed(e.to_string()),
        },
        Ok(None) => Tick::Empty,
        Err(e) => return Tick::Failed(e.to_string()),
    };
    *receiver = Some(rx);
    tick
}

/// Capture loop for one pointer binding
///
/// Failed and empty ticks leave the cached frame alone.
async fn run_capture(
    backend: Arc<dyn CaptureBackend>,
    source: Arc<Source>,
    frames: Arc<FrameSlot>,
    epoch: u64,
    config: MonitorConfig,
) {
    let mut ticker = tokio::time::interval(config.capture_period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut receiver: Option<Box<dyn FrameReceiver>> = None;
    let mut healthy = true;

    tracing::debug!(source = %source.name, epoch, "Capture task started");

    loop {
        ticker.tick().await;
        if !frames.is_current(epoch) {
            break;
        }

        let backend = Arc::clone(&backend);
        let src = Arc::clone(&source);
        let timeout = config.capture_timeout;
        let joined = tokio::task::spawn_blocking(move || {
            let tick = capture_once(backend.as_ref(), &src, &mut receiver, timeout);
            (receiver, tick)
        })
        .await;

        let tick = match joined {
            Ok((rx, tick)) => {
                receiver = rx;
                tick
            }
            Err(e) => {
                tracing::error!(source = %source.name, error = %e, "Capture call panicked");
                frames.counters.record_failure();
                break;
            }
        };

        match tick {
            Tick::Frame(frame) => {
                if !frames.store(epoch, frame) {
                    frames.counters.record_stale();
                    break;
                }
                frames.counters.record_frame();
                if !healthy {
                    tracing::info!(source = %source.name, "Capture recovered");
                    healthy = true;
                }
            }
            Tick::Empty => {
                frames.counters.record_empty();
                tracing::trace!(source = %source.name, "No frame this tick");
            }
            Tick::Failed(error) => {
                frames.counters.record_failure();
                if healthy {
                    tracing::warn!(source = %source.name, error = %error, "Capture failed, keeping last frame");
                    healthy = false;
                } else {
                    tracing::trace!(source = %source.name, error = %error, "Capture still failing");
                }
            }
        }
    }

    tracing::debug!(source = %source.name, epoch, "Capture task stopped");
}
