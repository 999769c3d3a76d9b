//! The action pacer: the single serialized entry point for paced actions.
//!
//! Every interaction the embedder wants humanized flows through
//! [`ActionPacer::pace`]. The pacer owns the session state machine, the
//! recent-action history, and the inter-action clock; an outer async mutex
//! serializes whole pace flows so two callers can never interleave their
//! delays, while a small inner sync mutex keeps the bookkeeping observable
//! from the [`ActivityMonitor`](crate::monitor::ActivityMonitor) without
//! touching the serial gate.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use std::time::Duration;

use cadence_common::{ActionKind, BehaviorConfig, DelayRange, Point, Rect, Result};
use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex as SerialGate;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delay::DelayGenerator;
use crate::keystrokes::KeystrokeSimulator;
use crate::ports::{
    BrowsingStateClearer, InteractionSurface, NullClearer, NullNotifier, SessionEvent,
    SessionNotifier, TextSink,
};
use crate::session::{SessionState, SessionStateMachine};
use crate::trajectory::TrajectorySynthesizer;
use crate::ConfigHandle;

/// How many completed actions the history ring retains.
pub const HISTORY_WINDOW: usize = 50;

/// One entry in the recent-action history.
#[derive(Debug, Clone, Copy)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub at: Instant,
}

/// Why a pace request produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A break is in progress; the caller should retry later.
    OnBreak,
    /// The engine master switch is off.
    Disabled,
    /// Shutdown was requested while a wait was pending.
    Cancelled,
}

/// Result of a pace request: either the action ran and produced a value, or
/// it was skipped for a stated reason. Action failures surface as `Err`.
#[derive(Debug)]
pub enum PaceOutcome<T> {
    Completed(T),
    Skipped(SkipReason),
}

impl<T> PaceOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, PaceOutcome::Completed(_))
    }
}

/// Timing knobs for the pacing flow itself, as opposed to the per-signal
/// delays owned by the generator.
#[derive(Debug, Clone)]
pub struct PacerTuning {
    /// Minimum spacing between consecutive actions; arriving sooner than
    /// this triggers a gap wait.
    pub min_action_gap: Duration,
    /// Wait drawn when the caller arrives faster than the gap floor.
    pub gap_wait: DelayRange,
    /// Deliberation pause before heavy actions.
    pub deliberation: DelayRange,
    /// Settle pause after a session rotation.
    pub rotation_settle: DelayRange,
    /// Fractional variation applied to the nominal break duration.
    pub break_variation: f64,
    /// Idle pointer/scroll rounds performed at the start of a break.
    pub idle_wander_rounds: u32,
}

impl PacerTuning {
    /// The default human-paced profile.
    pub fn standard() -> Self {
        Self {
            min_action_gap: Duration::from_millis(1000),
            gap_wait: DelayRange::new(1000, 2000),
            deliberation: DelayRange::new(3000, 7000),
            rotation_settle: DelayRange::new(1500, 4000),
            break_variation: 0.10,
            idle_wander_rounds: 2,
        }
    }

    /// A faster profile for impatient embedders.
    pub fn brisk() -> Self {
        Self {
            min_action_gap: Duration::from_millis(400),
            gap_wait: DelayRange::new(400, 900),
            deliberation: DelayRange::new(1000, 2500),
            rotation_settle: DelayRange::new(500, 1500),
            break_variation: 0.10,
            idle_wander_rounds: 1,
        }
    }

    /// No pacing waits at all. Test profile.
    pub fn instant() -> Self {
        Self {
            min_action_gap: Duration::ZERO,
            gap_wait: DelayRange::new(0, 0),
            deliberation: DelayRange::new(0, 0),
            rotation_settle: DelayRange::new(0, 0),
            break_variation: 0.0,
            idle_wander_rounds: 0,
        }
    }
}

impl Default for PacerTuning {
    fn default() -> Self {
        Self::standard()
    }
}

struct PacerShared {
    session: SessionStateMachine,
    history: VecDeque<ActionRecord>,
    last_action_at: Option<Instant>,
}

/// Serialized, humanized executor for page actions.
pub struct ActionPacer {
    config: ConfigHandle,
    surface: Arc<dyn InteractionSurface>,
    notifier: Arc<dyn SessionNotifier>,
    clearer: Arc<dyn BrowsingStateClearer>,
    clear_scope: String,
    tuning: PacerTuning,
    cancel: CancellationToken,
    delays: DelayGenerator,
    trajectory: TrajectorySynthesizer,
    keystrokes: KeystrokeSimulator,
    gate: SerialGate<()>,
    shared: Arc<Mutex<PacerShared>>,
}

impl ActionPacer {
    pub fn new(config: ConfigHandle, surface: Arc<dyn InteractionSurface>) -> Self {
        let snapshot = config.current();
        let delays = DelayGenerator::new(snapshot.randomize_delays);
        let session = SessionStateMachine::new(delays.clone(), &snapshot.break_policy);
        Self {
            config,
            surface,
            notifier: Arc::new(NullNotifier),
            clearer: Arc::new(NullClearer),
            clear_scope: String::new(),
            tuning: PacerTuning::standard(),
            cancel: CancellationToken::new(),
            trajectory: TrajectorySynthesizer::new(delays.clone()),
            keystrokes: KeystrokeSimulator::new(delays.clone()),
            delays,
            gate: SerialGate::new(()),
            shared: Arc::new(Mutex::new(PacerShared {
                session,
                history: VecDeque::with_capacity(HISTORY_WINDOW),
                last_action_at: None,
            })),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SessionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Install a browsing-state clearer invoked on rotation, scoped to
    /// `scope` (typically the automated site's origin).
    pub fn with_clearer(mut self, clearer: Arc<dyn BrowsingStateClearer>, scope: &str) -> Self {
        self.clearer = clearer;
        self.clear_scope = scope.to_owned();
        self
    }

    pub fn with_tuning(mut self, tuning: PacerTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read-only access point for the activity monitor and diagnostics.
    pub fn probe(&self) -> PacerProbe {
        PacerProbe {
            shared: self.shared.clone(),
            trajectory: self.trajectory.clone(),
        }
    }

    pub fn delays(&self) -> &DelayGenerator {
        &self.delays
    }

    /// Current session counters, copied out.
    pub fn session_snapshot(&self) -> SessionState {
        self.with_shared(|s| s.session.state().clone())
    }

    /// Run `action` under full pacing: the serial gate, break and rotation
    /// gating, inter-action spacing, deliberation for heavy kinds, then
    /// break evaluation after a successful run.
    ///
    /// Bookkeeping (action count, history, spacing clock) is updated whether
    /// or not the action itself succeeds; a failed attempt still consumed a
    /// turn.
    pub async fn pace<T, F, Fut>(&self, kind: ActionKind, action: F) -> Result<PaceOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let cfg = self.config.current();
        if !cfg.enabled {
            return Ok(PaceOutcome::Skipped(SkipReason::Disabled));
        }

        let _serial = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Ok(PaceOutcome::Skipped(SkipReason::Cancelled));
            }
            guard = self.gate.lock() => guard,
        };

        if self.with_shared(|s| s.session.state().on_break) {
            debug!(target: "pacer", ?kind, "refusing action during break");
            return Ok(PaceOutcome::Skipped(SkipReason::OnBreak));
        }

        if self.with_shared(|s| s.session.should_rotate(&cfg.session_policy)) {
            if !self.rotate(&cfg).await? {
                return Ok(PaceOutcome::Skipped(SkipReason::Cancelled));
            }
        }

        let since_last = self.with_shared(|s| s.last_action_at.map(|t| t.elapsed()));
        if let Some(elapsed) = since_last {
            if elapsed < self.tuning.min_action_gap {
                debug!(target: "pacer", elapsed_ms = elapsed.as_millis() as u64, "gap wait");
                if !self.wait(self.tuning.gap_wait).await {
                    return Ok(PaceOutcome::Skipped(SkipReason::Cancelled));
                }
            }
        }

        if cfg.humanize_actions && kind.is_heavy() {
            debug!(target: "pacer", ?kind, "deliberating before heavy action");
            if !self.wait(self.tuning.deliberation).await {
                return Ok(PaceOutcome::Skipped(SkipReason::Cancelled));
            }
        }

        let result = action().await;

        let now = Instant::now();
        self.with_shared(|s| {
            s.session.record_action();
            s.history.push_back(ActionRecord { kind, at: now });
            if s.history.len() > HISTORY_WINDOW {
                s.history.pop_front();
            }
            s.last_action_at = Some(now);
        });

        let value = result?;

        if self.with_shared(|s| s.session.should_take_break(&cfg.break_policy)) {
            self.take_break(&cfg).await;
        }

        Ok(PaceOutcome::Completed(value))
    }

    /// Paced pointer move into `target`; resolves to the arrival point.
    pub async fn pace_pointer_move(&self, target: Rect) -> Result<PaceOutcome<Point>> {
        let cfg = self.config.current();
        let trajectory = self.trajectory.clone();
        let surface = self.surface.clone();
        let simulate = cfg.simulate_pointer_movement;
        self.pace(ActionKind::Pointer, move || async move {
            trajectory.move_to(surface.as_ref(), target, simulate).await
        })
        .await
    }

    /// Paced move-and-click on `target`.
    pub async fn pace_click(&self, target: Rect) -> Result<PaceOutcome<Point>> {
        self.move_and_click(ActionKind::Pointer, target).await
    }

    /// Paced move-and-click classified as a submission, which earns the
    /// heavy-action deliberation pause.
    pub async fn pace_submit(&self, target: Rect) -> Result<PaceOutcome<Point>> {
        self.move_and_click(ActionKind::Submit, target).await
    }

    async fn move_and_click(&self, kind: ActionKind, target: Rect) -> Result<PaceOutcome<Point>> {
        let cfg = self.config.current();
        let trajectory = self.trajectory.clone();
        let surface = self.surface.clone();
        let simulate = cfg.simulate_pointer_movement;
        self.pace(kind, move || async move {
            let at = trajectory.move_to(surface.as_ref(), target, simulate).await?;
            surface.click(at).await?;
            Ok(at)
        })
        .await
    }

    /// Paced scroll of the viewport to vertical offset `to_y`.
    pub async fn pace_scroll(&self, to_y: f64) -> Result<PaceOutcome<()>> {
        let cfg = self.config.current();
        let trajectory = self.trajectory.clone();
        let surface = self.surface.clone();
        let simulate = cfg.simulate_scrolling;
        self.pace(ActionKind::Scroll, move || async move {
            trajectory.scroll_to(surface.as_ref(), to_y, simulate).await
        })
        .await
    }

    /// Paced keystroke-level typing of `text` into `sink`.
    pub async fn pace_typing(
        &self,
        sink: Arc<dyn TextSink>,
        text: &str,
    ) -> Result<PaceOutcome<()>> {
        let cfg = self.config.current();
        let keystrokes = self.keystrokes.clone();
        let text = text.to_owned();
        let humanize = cfg.humanize_actions;
        self.pace(ActionKind::Type, move || async move {
            keystrokes.type_text(sink.as_ref(), &text, humanize).await
        })
        .await
    }

    /// Rotate the session identity: announce it, clear site-scoped browsing
    /// state, settle, then reset the counters. Returns `false` if shutdown
    /// interrupted the settle wait, in which case the reset is skipped.
    async fn rotate(&self, cfg: &BehaviorConfig) -> Result<bool> {
        let session = self.session_snapshot();
        info!(
            target: "pacer",
            id = %session.id,
            actions = session.action_count,
            "session rotation due"
        );
        self.notifier
            .notify(SessionEvent::RotationRequired { at: Utc::now() });

        self.clearer.clear(&self.clear_scope).await?;

        if !self.wait(self.tuning.rotation_settle).await {
            return Ok(false);
        }

        self.with_shared(|s| s.session.reset(&cfg.break_policy));
        Ok(true)
    }

    /// Take a break: mark it, wander idly, announce the planned length, wait
    /// it out, then reset the counter. An interrupted wait abandons the
    /// break without the end bookkeeping; the engine is shutting down.
    async fn take_break(&self, cfg: &BehaviorConfig) {
        self.with_shared(|s| s.session.begin_break());

        for _ in 0..self.tuning.idle_wander_rounds {
            self.idle_wander(cfg).await;
        }

        let nominal_ms = cfg.break_policy.break_duration_minutes * 60_000;
        let planned_ms = vary(nominal_ms, self.tuning.break_variation);
        info!(target: "pacer", planned_ms, "break started");
        self.notifier.notify(SessionEvent::BreakStarted {
            at: Utc::now(),
            duration_ms: planned_ms,
        });

        let started = Instant::now();
        let finished = tokio::select! {
            _ = sleep(Duration::from_millis(planned_ms)) => true,
            _ = self.cancel.cancelled() => false,
        };
        if !finished {
            debug!(target: "pacer", "break abandoned by shutdown");
            return;
        }

        let actual_ms = started.elapsed().as_millis() as u64;
        self.with_shared(|s| s.session.end_break(&cfg.break_policy));
        info!(target: "pacer", actual_ms, "break ended");
        self.notifier.notify(SessionEvent::BreakEnded {
            at: Utc::now(),
            duration_ms: actual_ms,
        });
    }

    /// One round of aimless activity: a small pointer drift and a scroll
    /// wiggle near the current offsets. Failures here are logged and
    /// swallowed; idle texture must never abort a break.
    async fn idle_wander(&self, cfg: &BehaviorConfig) {
        let (drift_target, wiggle_y) = {
            let mut rng = rand::thread_rng();
            let here = self.trajectory.position();
            let target = Rect::new(
                (here.x + rng.gen_range(-120.0..=120.0)).max(0.0),
                (here.y + rng.gen_range(-120.0..=120.0)).max(0.0),
                10.0,
                10.0,
            );
            let wiggle = (self.trajectory.scroll_offset() + rng.gen_range(-150.0..=150.0)).max(0.0);
            (target, wiggle)
        };

        if let Err(error) = self
            .trajectory
            .move_to(
                self.surface.as_ref(),
                drift_target,
                cfg.simulate_pointer_movement,
            )
            .await
        {
            warn!(target: "pacer", %error, "idle pointer drift failed");
        }
        if let Err(error) = self
            .trajectory
            .scroll_to(self.surface.as_ref(), wiggle_y, cfg.simulate_scrolling)
            .await
        {
            warn!(target: "pacer", %error, "idle scroll wiggle failed");
        }
    }

    /// Cancellable drawn wait. Returns `false` when cancellation won.
    async fn wait(&self, range: DelayRange) -> bool {
        let duration = self.delays.delay(range);
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn with_shared<R>(&self, f: impl FnOnce(&mut PacerShared) -> R) -> R {
        let mut guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

/// Cheap observation handle detached from the pacer's serial gate, so the
/// monitor can sample without delaying actions.
pub struct PacerProbe {
    shared: Arc<Mutex<PacerShared>>,
    trajectory: TrajectorySynthesizer,
}

impl PacerProbe {
    /// Copy of the recent-action history, oldest first.
    pub fn history_snapshot(&self) -> Vec<ActionRecord> {
        self.with_shared(|s| s.history.iter().copied().collect())
    }

    pub fn session_snapshot(&self) -> SessionState {
        self.with_shared(|s| s.session.state().clone())
    }

    /// Push the spacing clock into the future, forcing a gap wait before the
    /// next action.
    pub fn penalize(&self, extra: Duration) {
        let deadline = Instant::now() + extra;
        self.with_shared(|s| s.last_action_at = Some(deadline));
    }

    /// A real user moved the pointer: adopt their position as the trajectory
    /// origin and restart the spacing clock so the engine yields to them.
    pub fn observe_user_pointer(&self, at: Point) {
        self.trajectory.observe_pointer(at);
        self.with_shared(|s| s.last_action_at = Some(Instant::now()));
    }

    /// A real user typed: restart the spacing clock.
    pub fn observe_user_keys(&self) {
        self.with_shared(|s| s.last_action_at = Some(Instant::now()));
    }

    fn with_shared<R>(&self, f: impl FnOnce(&mut PacerShared) -> R) -> R {
        let mut guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

/// Apply `±fraction` uniform variation to `nominal_ms`.
fn vary(nominal_ms: u64, fraction: f64) -> u64 {
    if fraction <= 0.0 || nominal_ms == 0 {
        return nominal_ms;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(-fraction..=fraction);
    (nominal_ms as f64 * factor).round().max(0.0) as u64
}
