//! Parametric motion paths for pointer movement and scrolling.
//!
//! Pointer moves follow a cubic Bézier whose control points sit at 25 % and
//! 75 % of the chord with random offsets, so no two traversals share a path.
//! Scrolls interpolate through a symmetric ease-in-out cubic with occasional
//! stutter and a probabilistic overshoot-then-correct settle. Planning is
//! pure (a plan is a list of steps with pauses); the async drivers walk a
//! plan against an [`InteractionSurface`], updating the tracked pointer
//! position only on successful completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use cadence_common::{DelayRange, Point, Rect};
use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::delay::DelayGenerator;
use crate::ports::InteractionSurface;

/// Aim offset from the bounds center, per axis, in pixels.
const AIM_OFFSET_PX: f64 = 5.0;

/// Maximum control-point displacement from the chord, in pixels.
const CONTROL_OFFSET_PX: f64 = 50.0;

/// Pixels of travel per trajectory step.
const PX_PER_STEP: f64 = 50.0;

const MIN_POINTER_STEPS: usize = 5;
const MAX_POINTER_STEPS: usize = 20;

/// Pixels of scroll per step.
const SCROLL_PX_PER_STEP: f64 = 100.0;

/// Probability that a scroll step stutters.
const STUTTER_PROBABILITY: f64 = 0.10;

/// Probability of overshooting the scroll target before settling.
const OVERSHOOT_PROBABILITY: f64 = 0.30;

const MAX_OVERSHOOT_PX: f64 = 25.0;

/// Evaluate a cubic Bézier at `t`.
pub fn cubic_bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;
    let mt3 = mt2 * mt;

    Point::new(
        mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x,
        mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y,
    )
}

/// Symmetric ease-in-out cubic: slow start and end, fast middle.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// One intermediate pointer position with the pause preceding it.
#[derive(Debug, Clone)]
pub struct PointerStep {
    pub at: Point,
    pub pause: Duration,
}

/// A planned pointer traversal. The final step lands on the aim point; the
/// settle pause afterwards is the caller's cue that a click may follow.
#[derive(Debug, Clone)]
pub struct PointerPlan {
    pub steps: Vec<PointerStep>,
    pub settle: Duration,
}

impl PointerPlan {
    pub fn target(&self) -> Point {
        self.steps
            .last()
            .map(|s| s.at)
            .expect("a pointer plan always has at least one step")
    }
}

/// One intermediate scroll offset with the pause preceding it.
#[derive(Debug, Clone)]
pub struct ScrollStep {
    pub y: f64,
    pub pause: Duration,
}

/// Two-phase settle past the scroll target.
#[derive(Debug, Clone)]
pub struct Overshoot {
    pub y: f64,
    pub pause: Duration,
}

#[derive(Debug, Clone)]
pub struct ScrollPlan {
    pub steps: Vec<ScrollStep>,
    pub overshoot: Option<Overshoot>,
}

/// Synthesizes motion paths and owns the engine's kinematic state: the last
/// known pointer position and scroll offset, updated by completed
/// trajectories and by observed real user input.
#[derive(Clone)]
pub struct TrajectorySynthesizer {
    delays: DelayGenerator,
    position: Arc<Mutex<Point>>,
    scroll_y: Arc<Mutex<f64>>,
}

impl TrajectorySynthesizer {
    pub fn new(delays: DelayGenerator) -> Self {
        Self {
            delays,
            position: Arc::new(Mutex::new(Point::new(0.0, 0.0))),
            scroll_y: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Last known pointer position.
    pub fn position(&self) -> Point {
        *self.position.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current scroll offset.
    pub fn scroll_offset(&self) -> f64 {
        *self.scroll_y.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fold in a pointer position observed from real user input.
    pub fn observe_pointer(&self, at: Point) {
        *self.position.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    fn set_position(&self, at: Point) {
        *self.position.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    fn set_scroll(&self, y: f64) {
        *self.scroll_y.lock().unwrap_or_else(|e| e.into_inner()) = y;
    }

    /// Plan a curved traversal from `from` into `target`.
    ///
    /// Zero distance still yields the minimum step count, so degenerate
    /// moves never produce an empty or NaN path.
    pub fn plan_pointer(&self, from: Point, target: Rect) -> PointerPlan {
        let mut rng = rand::thread_rng();
        let center = target.center();
        let aim = Point::new(
            center.x + rng.gen_range(-AIM_OFFSET_PX..=AIM_OFFSET_PX),
            center.y + rng.gen_range(-AIM_OFFSET_PX..=AIM_OFFSET_PX),
        );

        let distance = from.distance_to(&aim);
        let steps = ((distance / PX_PER_STEP).floor() as usize)
            .clamp(MIN_POINTER_STEPS, MAX_POINTER_STEPS);

        let c1 = Point::new(
            from.x + (aim.x - from.x) * 0.25 + rng.gen_range(-CONTROL_OFFSET_PX..=CONTROL_OFFSET_PX),
            from.y + (aim.y - from.y) * 0.25 + rng.gen_range(-CONTROL_OFFSET_PX..=CONTROL_OFFSET_PX),
        );
        let c2 = Point::new(
            from.x + (aim.x - from.x) * 0.75 + rng.gen_range(-CONTROL_OFFSET_PX..=CONTROL_OFFSET_PX),
            from.y + (aim.y - from.y) * 0.75 + rng.gen_range(-CONTROL_OFFSET_PX..=CONTROL_OFFSET_PX),
        );

        let total = self.delays.delay(DelayRange::new(200, 500));
        let per_step = total / steps as u32;

        let steps = (1..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                PointerStep {
                    at: cubic_bezier(t, from, c1, c2, aim),
                    pause: per_step,
                }
            })
            .collect();

        PointerPlan {
            steps,
            settle: self.delays.delay(DelayRange::new(80, 220)),
        }
    }

    /// Plan an eased scroll from `from_y` to `to_y` spread over `duration`.
    pub fn plan_scroll(&self, from_y: f64, to_y: f64, duration: Duration) -> ScrollPlan {
        let mut rng = rand::thread_rng();
        let delta = to_y - from_y;
        let steps = ((delta.abs() / SCROLL_PX_PER_STEP).round() as usize).max(1);
        let per_step = duration / steps as u32;

        let steps: Vec<ScrollStep> = (1..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                let mut pause = per_step;
                if rng.gen_bool(STUTTER_PROBABILITY) {
                    pause += Duration::from_millis(rng.gen_range(40..=120));
                }
                ScrollStep {
                    y: from_y + delta * ease_in_out_cubic(t),
                    pause,
                }
            })
            .collect();

        let overshoot = if delta != 0.0 && rng.gen_bool(OVERSHOOT_PROBABILITY) {
            let magnitude = rng.gen_range(5.0..=MAX_OVERSHOOT_PX);
            Some(Overshoot {
                y: to_y + magnitude * delta.signum(),
                pause: Duration::from_millis(rng.gen_range(120..=300)),
            })
        } else {
            None
        };

        ScrollPlan { steps, overshoot }
    }

    /// Move the pointer into `target`, emitting each intermediate position,
    /// and return the arrival point after the settle pause. With simulation
    /// off the pointer is placed at the bounds center in one signal; the
    /// tracked position is updated either way.
    pub async fn move_to(
        &self,
        surface: &dyn InteractionSurface,
        target: Rect,
        simulate: bool,
    ) -> Result<Point> {
        if !simulate {
            let aim = target.center();
            surface.pointer_moved(aim).await?;
            self.set_position(aim);
            return Ok(aim);
        }

        let from = self.position();
        let plan = self.plan_pointer(from, target);
        debug!(
            target: "trajectory",
            steps = plan.steps.len(),
            from_x = from.x,
            from_y = from.y,
            "walking pointer trajectory"
        );

        for step in &plan.steps {
            sleep(step.pause).await;
            surface.pointer_moved(step.at).await?;
        }
        sleep(plan.settle).await;

        let arrived = plan.target();
        self.set_position(arrived);
        Ok(arrived)
    }

    /// Scroll the viewport to `to_y` through an eased multi-step path,
    /// honoring any planned overshoot. With simulation off the viewport jumps
    /// in a single signal.
    pub async fn scroll_to(
        &self,
        surface: &dyn InteractionSurface,
        to_y: f64,
        simulate: bool,
    ) -> Result<()> {
        let from_y = self.scroll_offset();

        if !simulate {
            surface.scroll_moved(to_y).await?;
            self.set_scroll(to_y);
            return Ok(());
        }

        let duration = self.delays.delay(DelayRange::new(300, 800));
        let plan = self.plan_scroll(from_y, to_y, duration);
        debug!(
            target: "trajectory",
            steps = plan.steps.len(),
            overshoot = plan.overshoot.is_some(),
            from_y,
            to_y,
            "walking scroll trajectory"
        );

        for step in &plan.steps {
            sleep(step.pause).await;
            surface.scroll_moved(step.y).await?;
        }

        if let Some(overshoot) = &plan.overshoot {
            surface.scroll_moved(overshoot.y).await?;
            sleep(overshoot.pause).await;
            surface.scroll_moved(to_y).await?;
        }

        self.set_scroll(to_y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPage;

    fn synth() -> TrajectorySynthesizer {
        TrajectorySynthesizer::new(DelayGenerator::new(true))
    }

    #[test]
    fn bezier_endpoints_are_exact() {
        let p0 = Point::new(10.0, 20.0);
        let p1 = Point::new(40.0, 90.0);
        let p2 = Point::new(160.0, 10.0);
        let p3 = Point::new(200.0, 120.0);
        assert_eq!(cubic_bezier(0.0, p0, p1, p2, p3), p0);
        assert_eq!(cubic_bezier(1.0, p0, p1, p2, p3), p3);
    }

    #[test]
    fn bezier_midpoint_near_geometric_middle_for_symmetric_controls() {
        let p0 = Point::new(0.0, 0.0);
        let p3 = Point::new(100.0, 0.0);
        let p1 = Point::new(25.0, 0.0);
        let p2 = Point::new(75.0, 0.0);
        let mid = cubic_bezier(0.5, p0, p1, p2, p3);
        assert!((mid.x - 50.0).abs() < 1e-9);
        assert!(mid.y.abs() < 1e-9);
    }

    #[test]
    fn ease_satisfies_its_anchors() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-9);
        // Slow start, fast finish.
        assert!(ease_in_out_cubic(0.1) < 0.1);
        assert!(ease_in_out_cubic(0.9) > 0.9);
    }

    #[test]
    fn ease_is_strictly_increasing() {
        let mut prev = ease_in_out_cubic(0.0);
        for i in 1..=100 {
            let cur = ease_in_out_cubic(i as f64 / 100.0);
            assert!(cur > prev, "ease not increasing at t={}", i as f64 / 100.0);
            prev = cur;
        }
    }

    #[test]
    fn pointer_step_count_scales_with_distance() {
        let s = synth();
        let near = s.plan_pointer(Point::new(0.0, 0.0), Rect::new(90.0, 0.0, 20.0, 20.0));
        let far = s.plan_pointer(Point::new(0.0, 0.0), Rect::new(1900.0, 900.0, 20.0, 20.0));
        assert!(near.steps.len() >= MIN_POINTER_STEPS);
        assert_eq!(far.steps.len(), MAX_POINTER_STEPS);
        assert!(near.steps.len() <= far.steps.len());
    }

    #[test]
    fn zero_distance_still_plans_minimum_steps() {
        let s = synth();
        let plan = s.plan_pointer(Point::new(50.0, 50.0), Rect::new(40.0, 40.0, 20.0, 20.0));
        assert_eq!(plan.steps.len(), MIN_POINTER_STEPS);
        for step in &plan.steps {
            assert!(step.at.x.is_finite() && step.at.y.is_finite());
        }
    }

    #[test]
    fn pointer_aim_stays_near_the_center() {
        let s = synth();
        let target = Rect::new(100.0, 100.0, 60.0, 30.0);
        for _ in 0..50 {
            let plan = s.plan_pointer(Point::new(0.0, 0.0), target);
            let aim = plan.target();
            assert!((aim.x - 130.0).abs() <= AIM_OFFSET_PX + 1e-9);
            assert!((aim.y - 115.0).abs() <= AIM_OFFSET_PX + 1e-9);
        }
    }

    #[test]
    fn scroll_steps_follow_the_distance() {
        let s = synth();
        let plan = s.plan_scroll(0.0, 650.0, Duration::from_millis(400));
        assert_eq!(plan.steps.len(), 7);
        // The final step lands exactly on the target.
        let last = plan.steps.last().unwrap();
        assert!((last.y - 650.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_scroll_still_takes_one_step() {
        let s = synth();
        let plan = s.plan_scroll(100.0, 110.0, Duration::from_millis(100));
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn overshoot_stays_bounded_and_directional() {
        let s = synth();
        let mut saw_overshoot = false;
        for _ in 0..200 {
            let plan = s.plan_scroll(0.0, 500.0, Duration::from_millis(300));
            if let Some(o) = plan.overshoot {
                saw_overshoot = true;
                assert!(o.y > 500.0 && o.y <= 500.0 + MAX_OVERSHOOT_PX);
            }
        }
        assert!(saw_overshoot, "overshoot never triggered in 200 plans");
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_pointer_simulation_jumps_but_tracks_position() {
        let s = synth();
        let page = SimPage::new();
        let target = Rect::new(300.0, 200.0, 40.0, 20.0);

        let arrived = s.move_to(page.as_ref(), target, false).await.unwrap();
        assert_eq!(arrived, target.center());
        assert_eq!(s.position(), target.center());
        assert_eq!(page.signals().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_move_emits_every_step_in_order() {
        let s = synth();
        let page = SimPage::new();
        let target = Rect::new(500.0, 400.0, 40.0, 20.0);

        let arrived = s.move_to(page.as_ref(), target, true).await.unwrap();
        let signals = page.signals();
        assert!(signals.len() >= MIN_POINTER_STEPS);
        assert_eq!(s.position(), arrived);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_lands_on_target_even_with_overshoot() {
        let s = synth();
        let page = SimPage::new();
        for _ in 0..20 {
            s.scroll_to(page.as_ref(), 400.0, true).await.unwrap();
            assert_eq!(s.scroll_offset(), 400.0);
            s.scroll_to(page.as_ref(), 0.0, true).await.unwrap();
        }
        // Whatever path was taken, the last signal is the requested offset.
        assert_eq!(s.scroll_offset(), 0.0);
    }
}
