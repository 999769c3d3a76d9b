//! Delay generation: bounded, normally distributed intervals.
//!
//! Every other component derives its timing from here. Draws center on the
//! range midpoint with a standard deviation of one sixth of the range width,
//! so ±3σ roughly spans the range, and carry a small uniform jitter applied
//! *after* clamping. The jitter may nudge a value slightly past the nominal
//! bounds; that is deliberate micro-noise, not a contract violation. Callers
//! that need a hard ceiling must clamp again downstream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_common::DelayRange;
use rand::Rng;

/// Default half-width of the post-clamp jitter, in milliseconds.
const DEFAULT_JITTER_MS: u64 = 50;

/// Ceiling the jitter may grow to under monitor feedback.
const MAX_JITTER_MS: u64 = 250;

/// Runtime-adjustable knobs shared between the generator and the
/// [`ActivityMonitor`](crate::monitor::ActivityMonitor). Atomics keep the
/// feedback path lock-free.
#[derive(Debug)]
pub struct DelayTuning {
    randomize: AtomicBool,
    jitter_ms: AtomicU64,
}

impl DelayTuning {
    pub fn new(randomize: bool) -> Self {
        Self {
            randomize: AtomicBool::new(randomize),
            jitter_ms: AtomicU64::new(DEFAULT_JITTER_MS),
        }
    }

    pub fn randomize(&self) -> bool {
        self.randomize.load(Ordering::Relaxed)
    }

    pub fn set_randomize(&self, on: bool) {
        self.randomize.store(on, Ordering::Relaxed);
    }

    pub fn jitter_ms(&self) -> u64 {
        self.jitter_ms.load(Ordering::Relaxed)
    }

    pub fn set_jitter_ms(&self, ms: u64) {
        self.jitter_ms.store(ms, Ordering::Relaxed);
    }

    /// Double the jitter half-width, capped at [`MAX_JITTER_MS`].
    pub fn widen_jitter(&self) {
        let current = self.jitter_ms();
        self.set_jitter_ms((current.max(25) * 2).min(MAX_JITTER_MS));
    }
}

/// Produces bounded, humanized delays.
#[derive(Clone)]
pub struct DelayGenerator {
    tuning: Arc<DelayTuning>,
}

impl DelayGenerator {
    pub fn new(randomize: bool) -> Self {
        Self {
            tuning: Arc::new(DelayTuning::new(randomize)),
        }
    }

    pub fn with_tuning(tuning: Arc<DelayTuning>) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> Arc<DelayTuning> {
        self.tuning.clone()
    }

    /// Draw a delay in milliseconds.
    ///
    /// With randomization off this is exactly the range midpoint. Otherwise
    /// the draw is normal(midpoint, width/6) clamped into the range, plus a
    /// uniform post-clamp jitter; the result never goes below zero.
    pub fn delay_ms(&self, range: DelayRange) -> u64 {
        let mid = (range.min_ms + range.max_ms) as f64 / 2.0;
        if !self.tuning.randomize() {
            return mid.round() as u64;
        }

        let sigma = range.width() as f64 / 6.0;
        let sample = mid + standard_normal() * sigma;
        let clamped = sample.clamp(range.min_ms as f64, range.max_ms as f64);

        let half_width = self.tuning.jitter_ms() as i64;
        let jitter = if half_width > 0 {
            rand::thread_rng().gen_range(-half_width..=half_width)
        } else {
            0
        };

        (clamped + jitter as f64).max(0.0).round() as u64
    }

    /// Draw a delay as a [`Duration`].
    pub fn delay(&self, range: DelayRange) -> Duration {
        Duration::from_millis(self.delay_ms(range))
    }

    /// Sleep for a freshly drawn delay over `range`.
    pub async fn pause(&self, range: DelayRange) {
        tokio::time::sleep(self.delay(range)).await;
    }
}

/// Sample a standard normal variate via the Box–Muller transform.
///
/// Consumes two independent uniform [0,1) draws; over large samples the mean
/// converges on 0 and the standard deviation on 1.
pub fn standard_normal() -> f64 {
    let mut rng = rand::thread_rng();
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_when_randomization_disabled() {
        let gen = DelayGenerator::new(false);
        for _ in 0..10 {
            assert_eq!(gen.delay_ms(DelayRange::new(100, 300)), 200);
        }
    }

    #[test]
    fn stays_in_range_without_jitter() {
        let gen = DelayGenerator::new(true);
        gen.tuning().set_jitter_ms(0);
        let range = DelayRange::new(200, 800);
        for _ in 0..500 {
            let d = gen.delay_ms(range);
            assert!((200..=800).contains(&d), "delay {d} escaped the range");
        }
    }

    #[test]
    fn jitter_stays_within_its_half_width() {
        let gen = DelayGenerator::new(true);
        let range = DelayRange::new(100, 400);
        for _ in 0..500 {
            let d = gen.delay_ms(range);
            assert!(
                (50..=450).contains(&d),
                "delay {d} exceeded range plus jitter"
            );
        }
    }

    #[test]
    fn zero_width_range_collapses_to_the_bound() {
        let gen = DelayGenerator::new(true);
        gen.tuning().set_jitter_ms(0);
        assert_eq!(gen.delay_ms(DelayRange::new(250, 250)), 250);
    }

    #[test]
    fn never_goes_negative() {
        let gen = DelayGenerator::new(true);
        // Jitter wider than the whole range; result must floor at zero.
        for _ in 0..200 {
            let d = gen.delay_ms(DelayRange::new(0, 10));
            assert!(d <= 10 + DEFAULT_JITTER_MS);
        }
    }

    #[test]
    fn standard_normal_has_unit_moments() {
        let n = 5000;
        let samples: Vec<f64> = (0..n).map(|_| standard_normal()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n as f64;
        let std_dev = var.sqrt();
        assert!(mean.abs() < 0.1, "sample mean {mean} drifted from 0");
        assert!((std_dev - 1.0).abs() < 0.1, "sample σ {std_dev} drifted from 1");
    }

    #[test]
    fn widen_jitter_is_capped() {
        let tuning = DelayTuning::new(true);
        for _ in 0..10 {
            tuning.widen_jitter();
        }
        assert_eq!(tuning.jitter_ms(), 250);
    }
}
