// ── Rotation scheduler ──
//
// Two background tasks share one rotation state:
//
// - the rotation task waits out the current source's dwell time (or an
//   early reset signal), then advances to the next source;
// - the refresh task re-reads the current source every refresh period
//   and updates the segment display only.
//
// Rotation state is only touched under `state`. Provider and display I/O
// happen after the lock is released. A render is dropped if the current
// index moved while its value was being fetched, which is checked while
// holding the segment display so no stale number can land after a newer
// label.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::brightness::{BrightnessPolicy, Clock};
use crate::display::{Brightness, MatrixDisplay, SegmentDisplay, SegmentValue};
use crate::provider::DataProvider;
use crate::reading::Reading;
use crate::source::{SourceDescriptor, SourceSequence};

// ── Configuration ────────────────────────────────────────────────

/// Tunables that are not part of the rotation itself.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub brightness: BrightnessPolicy,
    /// Day level of the matrix display.
    pub matrix_brightness: Brightness,
    /// Day level of the segment display.
    pub segment_brightness: Brightness,
    pub refresh_period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            brightness: BrightnessPolicy::default(),
            matrix_brightness: Brightness::new(1),
            segment_brightness: Brightness::new(4),
            refresh_period: Duration::from_secs(1),
        }
    }
}

/// Collaborators the scheduler drives.
pub struct SchedulerParts {
    pub sources: SourceSequence,
    /// Serves sources with `is_remote = true`.
    pub remote: Arc<dyn DataProvider>,
    /// Serves all other sources.
    pub local: Arc<dyn DataProvider>,
    pub matrix: Box<dyn MatrixDisplay>,
    pub segment: Box<dyn SegmentDisplay>,
    pub clock: Arc<dyn Clock>,
}

// ── RotationState ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RotationState {
    current_index: usize,
    /// End of the longest pause in effect. `Some` means paused.
    paused_until: Option<Instant>,
    running: bool,
}

impl RotationState {
    fn is_paused(&self) -> bool {
        self.paused_until.is_some()
    }
}

// ── RotationScheduler ────────────────────────────────────────────

/// Cheaply cloneable handle; all clones drive the same rotation.
#[derive(Clone)]
pub struct RotationScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    sources: SourceSequence,
    config: SchedulerConfig,
    state: Mutex<RotationState>,
    /// Early-wake signal for the rotation task. `true` means set.
    reset: watch::Sender<bool>,
    remote: Arc<dyn DataProvider>,
    local: Arc<dyn DataProvider>,
    matrix: Mutex<Box<dyn MatrixDisplay>>,
    segment: Mutex<Box<dyn SegmentDisplay>>,
    clock: Arc<dyn Clock>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RotationScheduler {
    /// Build a stopped scheduler positioned on the first source.
    pub fn new(parts: SchedulerParts, config: SchedulerConfig) -> Self {
        let (reset, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                sources: parts.sources,
                config,
                state: Mutex::new(RotationState::default()),
                reset,
                remote: parts.remote,
                local: parts.local,
                matrix: Mutex::new(parts.matrix),
                segment: Mutex::new(parts.segment),
                clock: parts.clock,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn sources(&self) -> &SourceSequence {
        &self.inner.sources
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // ── Observers ────────────────────────────────────────────────

    pub async fn current_index(&self) -> usize {
        self.inner.state.lock().await.current_index
    }

    pub async fn current_source(&self) -> SourceDescriptor {
        let index = self.current_index().await;
        self.inner.sources.at(index).clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.is_paused()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Show the current source, apply brightness, and spawn both loops.
    ///
    /// No-op if already running.
    pub async fn start(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.running {
                debug!("scheduler already running");
                return;
            }
            state.running = true;
        }
        self.inner.reset.send_replace(false);

        self.refresh_display().await;
        self.apply_brightness_policy().await;

        let mut handles = self.inner.task_handles.lock().await;
        {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_rotation_loop().await;
            }));
        }
        {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_refresh_loop().await;
            }));
        }

        info!(sources = self.inner.sources.len(), "rotation started");
    }

    /// Stop both loops and wait for them to finish.
    ///
    /// Loops notice at their next iteration boundary, so one in-flight
    /// iteration (including a provider round trip) may still complete.
    /// No display writes happen after this returns.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.running = false;
        }
        // Wake the rotation task out of its dwell wait.
        self.inner.reset.send_replace(true);

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
        self.inner.reset.send_replace(false);
        info!("rotation stopped");
    }

    // ── Rotation ─────────────────────────────────────────────────

    /// Move to the next source (wrapping) and redraw both displays.
    pub async fn advance(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.current_index = (state.current_index + 1) % self.inner.sources.len();
        }
        self.refresh_display().await;
    }

    /// Advance only if running and not paused. Returns whether it did.
    async fn advance_if_active(&self) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if !state.running || state.is_paused() {
                return false;
            }
            state.current_index = (state.current_index + 1) % self.inner.sources.len();
        }
        self.refresh_display().await;
        true
    }

    /// Redraw label, caption, and value for the current source.
    ///
    /// The segment display is blanked before the matrix changes so the
    /// previous source's number never sits under the new label.
    pub async fn refresh_display(&self) {
        let (index, source) = {
            let state = self.inner.state.lock().await;
            (
                state.current_index,
                self.inner.sources.at(state.current_index).clone(),
            )
        };

        let reading = self.provider_for(&source).get_value(&source.key).await;
        log_absence(&source, &reading);

        let mut segment = self.inner.segment.lock().await;
        if !self.is_current(index).await {
            trace!(key = %source.key, "source changed during fetch, skipping redraw");
            return;
        }

        if let Err(e) = segment.render(&SegmentValue::Blank) {
            warn!(error = %e, "segment display clear failed");
        }
        {
            let mut matrix = self.inner.matrix.lock().await;
            if let Err(e) = matrix.render(&source.display_name, &source.alias_label) {
                warn!(error = %e, key = %source.key, "matrix display render failed");
            }
        }
        if let Err(e) = segment.render(&segment_value(&reading)) {
            warn!(error = %e, key = %source.key, "segment display render failed");
        }
        debug!(index, key = %source.key, "display switched");
    }

    /// Re-read the current source and update the segment display only.
    pub async fn refresh_value(&self) {
        let (index, source) = {
            let state = self.inner.state.lock().await;
            (
                state.current_index,
                self.inner.sources.at(state.current_index).clone(),
            )
        };

        let reading = self.provider_for(&source).get_value(&source.key).await;

        let mut segment = self.inner.segment.lock().await;
        if !self.is_current(index).await {
            trace!(key = %source.key, "source changed during fetch, dropping value");
            return;
        }
        if let Err(e) = segment.render(&segment_value(&reading)) {
            warn!(error = %e, key = %source.key, "segment display render failed");
        }
    }

    /// Rotation task body.
    ///
    /// Waits for the current source's dwell time or the reset signal,
    /// then advances unless paused, then re-applies brightness.
    pub async fn run_rotation_loop(&self) {
        let mut reset_rx = self.inner.reset.subscribe();

        loop {
            let dwell = {
                let state = self.inner.state.lock().await;
                if !state.running {
                    break;
                }
                self.inner.sources.at(state.current_index).dwell()
            };

            let woke_early = tokio::time::timeout(dwell, reset_rx.wait_for(|set| *set))
                .await
                .is_ok();
            if woke_early {
                self.inner.reset.send_replace(false);
                trace!("rotation timer reset");
            }

            if !self.is_running().await {
                break;
            }
            if !self.advance_if_active().await {
                trace!("rotation paused, holding current source");
            }
            self.apply_brightness_policy().await;
        }

        debug!("rotation loop exiting");
    }

    /// Refresh task body: one value update per refresh period.
    pub async fn run_refresh_loop(&self) {
        let period = self.inner.config.refresh_period;

        while self.is_running().await {
            self.refresh_value().await;
            tokio::time::sleep(period).await;
        }

        debug!("refresh loop exiting");
    }

    /// Hold the current source for `duration`, then advance promptly.
    ///
    /// Blocks the caller for the full duration. Overlapping pauses extend
    /// the hold to whichever ends last; only that one resumes rotation.
    pub async fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        {
            let mut state = self.inner.state.lock().await;
            state.paused_until = Some(state.paused_until.map_or(deadline, |u| u.max(deadline)));
            if state.running {
                self.inner.reset.send_replace(false);
            }
        }
        info!(?duration, "rotation paused");

        tokio::time::sleep_until(deadline).await;

        let mut state = self.inner.state.lock().await;
        match state.paused_until {
            Some(until) if until <= Instant::now() => {
                state.paused_until = None;
                if state.running {
                    self.inner.reset.send_replace(true);
                }
                info!("rotation resumed");
            }
            Some(until) => {
                debug!(remaining = ?(until - Instant::now()), "a later pause still holds");
            }
            None => {}
        }
    }

    // ── Brightness ───────────────────────────────────────────────

    /// Minimum brightness inside the night window, nominal otherwise.
    pub async fn apply_brightness_policy(&self) {
        let now = self.inner.clock.time_of_day();
        let policy = &self.inner.config.brightness;
        let matrix_level = policy.level_for(now, self.inner.config.matrix_brightness);
        let segment_level = policy.level_for(now, self.inner.config.segment_brightness);

        {
            let mut matrix = self.inner.matrix.lock().await;
            if let Err(e) = matrix.set_brightness(matrix_level) {
                warn!(error = %e, "matrix brightness update failed");
            }
        }
        {
            let mut segment = self.inner.segment.lock().await;
            if let Err(e) = segment.set_brightness(segment_level) {
                warn!(error = %e, "segment brightness update failed");
            }
        }
        trace!(
            %now,
            matrix = matrix_level.level(),
            segment = segment_level.level(),
            "brightness applied"
        );
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn provider_for(&self, source: &SourceDescriptor) -> &Arc<dyn DataProvider> {
        if source.is_remote {
            &self.inner.remote
        } else {
            &self.inner.local
        }
    }

    async fn is_current(&self, index: usize) -> bool {
        self.inner.state.lock().await.current_index == index
    }
}

fn segment_value(reading: &Reading) -> SegmentValue {
    match reading {
        Ok(m) => SegmentValue::Number(*m),
        Err(_) => SegmentValue::NoData,
    }
}

fn log_absence(source: &SourceDescriptor, reading: &Reading) {
    if let Err(absence) = reading {
        debug!(key = %source.key, %absence, "no data for source");
    }
}
