//! Behavioral-simulation and action-pacing engine.
//!
//! Wraps caller-supplied page actions with human-like timing so a sequence of
//! automated interactions resembles an attentive operator rather than a
//! script: normally distributed delays, curved pointer trajectories, eased
//! scrolling, per-keystroke typing texture, randomized rest windows, and a
//! feedback loop that widens its own variance when the recent action history
//! starts to look mechanical.
//!
//! - [`delay::DelayGenerator`]: bounded, normally distributed intervals
//! - [`trajectory::TrajectorySynthesizer`]: pointer and scroll paths
//! - [`keystrokes::KeystrokeSimulator`]: per-character input emission
//! - [`pacer::ActionPacer`]: the orchestration entry point
//! - [`session::SessionStateMachine`]: break and rotation bookkeeping
//! - [`monitor::ActivityMonitor`]: cadence self-inspection
//! - [`ports`]: injected collaborator interfaces (page surface, text sink,
//!   notifications, browsing-state clearing)
//! - [`sim`]: in-memory page surface for demos and tests
//!
//! The engine decides *how* an action happens (timing, path,
//! micro-variation), never *what* to interact with; targets and values
//! always arrive from the caller.

use std::sync::{Arc, RwLock};

use cadence_common::BehaviorConfig;

pub mod delay;
pub mod keystrokes;
pub mod monitor;
pub mod pacer;
pub mod ports;
pub mod session;
pub mod sim;
pub mod trajectory;

/// Shared handle to the current behavior snapshot.
///
/// Reads hand out the snapshot in force at that moment; a runtime
/// reconfiguration replaces the whole snapshot rather than mutating fields,
/// so an operation mid-flight keeps the config it started with.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<BehaviorConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The snapshot currently in force.
    pub fn current(&self) -> Arc<BehaviorConfig> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the snapshot wholesale.
    pub fn replace(&self, config: BehaviorConfig) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(BehaviorConfig::default())
    }
}
