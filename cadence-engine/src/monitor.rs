//! Self-monitoring: watches the pacer's own output for machine-like rhythm.
//!
//! The monitor samples the recent-action history on a fixed period and looks
//! for two signatures a human never produces: metronomic inter-arrival times
//! and sustained bursts. On detection it turns the delay knobs toward more
//! noise and pushes the spacing clock out, rather than pausing the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::delay::DelayTuning;
use crate::pacer::{ActionRecord, PacerProbe};

/// How often the history is inspected.
const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

/// Spacing-clock push applied on detection.
const COOLDOWN_PENALTY: Duration = Duration::from_secs(5);

/// Minimum history size before regularity is judged at all.
const REGULARITY_MIN_SAMPLES: usize = 10;

/// Inter-arrival standard deviation below this reads as metronomic.
const REGULARITY_SIGMA_MS: f64 = 1000.0;

/// Burst detection looks at this many most recent actions.
const RAPID_WINDOW: usize = 5;

/// Mean interval below this within the burst window reads as rapid.
const RAPID_MEAN_MS: f64 = 2000.0;

/// True when the history's inter-arrival times are too evenly spaced.
pub fn detect_regular_patterns(records: &[ActionRecord]) -> bool {
    if records.len() < REGULARITY_MIN_SAMPLES {
        return false;
    }
    let intervals = intervals_ms(records);
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let var = intervals
        .iter()
        .map(|i| (i - mean) * (i - mean))
        .sum::<f64>()
        / intervals.len() as f64;
    var.sqrt() < REGULARITY_SIGMA_MS
}

/// True when the last few actions landed in a tight burst.
pub fn detect_rapid_actions(records: &[ActionRecord]) -> bool {
    if records.len() < RAPID_WINDOW {
        return false;
    }
    let window = &records[records.len() - RAPID_WINDOW..];
    let intervals = intervals_ms(window);
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    mean < RAPID_MEAN_MS
}

fn intervals_ms(records: &[ActionRecord]) -> Vec<f64> {
    records
        .windows(2)
        .map(|w| (w[1].at - w[0].at).as_millis() as f64)
        .collect()
}

/// Periodic inspector over a [`PacerProbe`].
pub struct ActivityMonitor {
    probe: PacerProbe,
    tuning: Arc<DelayTuning>,
    period: Duration,
    cooldown_penalty: Duration,
}

impl ActivityMonitor {
    pub fn new(probe: PacerProbe, tuning: Arc<DelayTuning>) -> Self {
        Self {
            probe,
            tuning,
            period: DEFAULT_PERIOD,
            cooldown_penalty: COOLDOWN_PENALTY,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Inspect on every period tick until cancellation.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticks = interval(self.period);
        ticks.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(target: "monitor", "monitor stopped");
                    return;
                }
                _ = ticks.tick() => self.inspect(),
            }
        }
    }

    /// One inspection pass: judge the history, and on any finding force
    /// randomization on, widen the jitter, and impose a cooldown.
    pub fn inspect(&self) {
        let history = self.probe.history_snapshot();
        let regular = detect_regular_patterns(&history);
        let rapid = detect_rapid_actions(&history);
        if !regular && !rapid {
            return;
        }

        warn!(
            target: "monitor",
            regular,
            rapid,
            samples = history.len(),
            "machine-like activity pattern detected"
        );
        self.tuning.set_randomize(true);
        self.tuning.widen_jitter();
        self.probe.penalize(self.cooldown_penalty);
    }
}
