//! Session bookkeeping: action counts, break thresholds, rotation timing.
//!
//! The state machine owns the counters and predicates; the side-effectful
//! break/rotation sequences (waits, notifications, idle wandering) are driven
//! by the [`ActionPacer`](crate::pacer::ActionPacer), which is the only
//! mutator of this state.

use std::time::Duration;

use cadence_common::{BreakPolicy, DelayRange, SessionPolicy};
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::delay::DelayGenerator;

/// Counters for the current session identity.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub started_at: Instant,
    pub action_count: u32,
    pub on_break: bool,
    /// Action count that triggers the next break; drawn once per session
    /// rather than re-rolled on every check, so the trigger point is stable
    /// until the next reset.
    pub break_threshold: u32,
}

/// Tracks cumulative session activity and decides when a break or a session
/// rotation is due.
pub struct SessionStateMachine {
    state: SessionState,
    delays: DelayGenerator,
}

impl SessionStateMachine {
    pub fn new(delays: DelayGenerator, policy: &BreakPolicy) -> Self {
        let threshold = draw_threshold(&delays, policy);
        Self {
            state: SessionState {
                id: Uuid::new_v4(),
                started_at: Instant::now(),
                action_count: 0,
                on_break: false,
                break_threshold: threshold,
            },
            delays,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Count a completed (or attempted) action. Only legal outside breaks.
    pub fn record_action(&mut self) {
        debug_assert!(!self.state.on_break, "actions are refused during breaks");
        self.state.action_count += 1;
    }

    /// True iff the session policy is enabled and the session has outlived
    /// its maximum duration.
    pub fn should_rotate(&self, policy: &SessionPolicy) -> bool {
        policy.enabled
            && self.state.started_at.elapsed()
                >= Duration::from_secs(policy.max_session_minutes * 60)
    }

    /// True iff the break policy is enabled and the per-session threshold has
    /// been reached.
    pub fn should_take_break(&self, policy: &BreakPolicy) -> bool {
        policy.enabled && self.state.action_count >= self.state.break_threshold
    }

    pub fn begin_break(&mut self) {
        self.state.on_break = true;
    }

    /// Leave the break: counter back to zero, fresh threshold draw.
    pub fn end_break(&mut self, policy: &BreakPolicy) {
        self.state.on_break = false;
        self.state.action_count = 0;
        self.state.break_threshold = draw_threshold(&self.delays, policy);
    }

    /// Start a fresh session identity after rotation.
    pub fn reset(&mut self, policy: &BreakPolicy) {
        let previous = self.state.id;
        self.state = SessionState {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            action_count: 0,
            on_break: false,
            break_threshold: draw_threshold(&self.delays, policy),
        };
        info!(
            target: "session",
            %previous,
            id = %self.state.id,
            "session rotated"
        );
    }
}

/// Draw the break threshold over `[min_actions, max_actions]`, clamped back
/// into the policy bounds since the generator's micro-jitter is sized for
/// milliseconds, not action counts.
fn draw_threshold(delays: &DelayGenerator, policy: &BreakPolicy) -> u32 {
    let range = DelayRange::new(policy.min_actions as u64, policy.max_actions as u64);
    let drawn = delays.delay_ms(range);
    drawn.clamp(range.min_ms, range.max_ms) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::BreakPolicy;

    fn policy(min: u32, max: u32) -> BreakPolicy {
        BreakPolicy {
            enabled: true,
            min_actions: min,
            max_actions: max,
            break_duration_minutes: 1,
        }
    }

    #[tokio::test]
    async fn threshold_is_drawn_within_policy_bounds() {
        for _ in 0..100 {
            let machine = SessionStateMachine::new(DelayGenerator::new(true), &policy(5, 12));
            let t = machine.state().break_threshold;
            assert!((5..=12).contains(&t), "threshold {t} escaped [5,12]");
        }
    }

    #[tokio::test]
    async fn break_only_triggers_at_threshold() {
        let p = policy(2, 3);
        let mut machine = SessionStateMachine::new(DelayGenerator::new(true), &p);
        let threshold = machine.state().break_threshold;

        for _ in 0..threshold - 1 {
            machine.record_action();
            assert!(!machine.should_take_break(&p));
        }
        machine.record_action();
        assert!(machine.should_take_break(&p));
    }

    #[tokio::test]
    async fn disabled_break_policy_never_triggers() {
        let mut p = policy(1, 1);
        p.enabled = false;
        let mut machine = SessionStateMachine::new(DelayGenerator::new(true), &p);
        for _ in 0..50 {
            machine.record_action();
        }
        assert!(!machine.should_take_break(&p));
    }

    #[tokio::test]
    async fn ending_a_break_resets_the_counter_and_redraws() {
        let p = policy(2, 2);
        let mut machine = SessionStateMachine::new(DelayGenerator::new(true), &p);
        machine.record_action();
        machine.record_action();
        machine.begin_break();
        assert!(machine.state().on_break);

        machine.end_break(&p);
        assert!(!machine.state().on_break);
        assert_eq!(machine.state().action_count, 0);
        assert_eq!(machine.state().break_threshold, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_follows_session_age_when_enabled() {
        let session_policy = SessionPolicy {
            enabled: true,
            max_session_minutes: 1,
        };
        let machine = SessionStateMachine::new(DelayGenerator::new(true), &policy(5, 10));
        assert!(!machine.should_rotate(&session_policy));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(machine.should_rotate(&session_policy));

        let disabled = SessionPolicy {
            enabled: false,
            max_session_minutes: 1,
        };
        assert!(!machine.should_rotate(&disabled));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_starts_a_new_identity() {
        let p = policy(3, 6);
        let mut machine = SessionStateMachine::new(DelayGenerator::new(true), &p);
        let first_id = machine.state().id;
        machine.record_action();
        tokio::time::advance(Duration::from_secs(30)).await;

        machine.reset(&p);
        assert_ne!(machine.state().id, first_id);
        assert_eq!(machine.state().action_count, 0);
        assert!(machine.state().started_at.elapsed() < Duration::from_secs(1));
    }
}
