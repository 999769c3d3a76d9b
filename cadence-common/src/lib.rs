//! Common types shared across the Cadence crates.
//!
//! This crate defines the behavior configuration snapshot, the small geometric
//! and timing value types the simulation engine works in, observability
//! helpers, and the shared error type. It is intentionally lightweight so that
//! every crate can depend on it without pulling in heavy transitive costs.
//!
//! # Overview
//!
//! - [`BehaviorConfig`]: immutable behavior snapshot (humanization toggles,
//!   break and session policies)
//! - [`DelayRange`]: bounded millisecond interval for delay draws
//! - [`Point`] and [`Rect`]: kinematic screen coordinates
//! - [`ActionKind`]: classification of paced actions
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`CadenceError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use cadence_common::BehaviorConfig;
//!
//! let cfg = BehaviorConfig::default();
//! assert!(cfg.humanize_actions);
//! assert_eq!(cfg.break_policy.min_actions, 15);
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Snapshot of the engine's behavior settings.
///
/// Loaded once at startup and treated as immutable per use; a runtime
/// reconfiguration replaces the whole snapshot rather than mutating fields in
/// place. Every field carries a serde default so partial documents load
/// cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Master switch. When off, callers should bypass the engine entirely.
    pub enabled: bool,
    /// Whether pointer/scroll/keystroke actions receive humanizing texture.
    pub humanize_actions: bool,
    /// Whether delay draws are randomized or collapse to range midpoints.
    pub randomize_delays: bool,
    /// Whether pointer moves are synthesized as curved multi-step paths.
    pub simulate_pointer_movement: bool,
    /// Whether scrolls are synthesized as eased multi-step paths.
    pub simulate_scrolling: bool,
    /// Policy for periodic rest windows.
    pub break_policy: BreakPolicy,
    /// Policy for rotating the session identity.
    pub session_policy: SessionPolicy,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            humanize_actions: true,
            randomize_delays: true,
            simulate_pointer_movement: true,
            simulate_scrolling: true,
            break_policy: BreakPolicy::default(),
            session_policy: SessionPolicy::default(),
        }
    }
}

/// When and for how long the engine refuses to act.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakPolicy {
    pub enabled: bool,
    /// Lower bound for the per-session action threshold draw.
    pub min_actions: u32,
    /// Upper bound for the per-session action threshold draw.
    pub max_actions: u32,
    /// Nominal break length; the actual wait carries random variation.
    pub break_duration_minutes: u64,
}

impl Default for BreakPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_actions: 15,
            max_actions: 30,
            break_duration_minutes: 10,
        }
    }
}

/// Cap on how long a single session identity runs before rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub enabled: bool,
    pub max_session_minutes: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_session_minutes: 45,
        }
    }
}

/// Bounded millisecond interval for delay draws; `min_ms <= max_ms` holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// Build a range, swapping the bounds if they arrive inverted.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// Midpoint of the range in milliseconds.
    pub fn midpoint(&self) -> u64 {
        (self.min_ms + self.max_ms) / 2
    }

    /// Width of the range in milliseconds.
    pub fn width(&self) -> u64 {
        self.max_ms - self.min_ms
    }
}

/// Floating-point screen coordinates. Purely kinematic state; never used to
/// infer semantic page location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned element bounds as reported by the page surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Geometric center of the bounds.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Classification of a paced action, used for history records and for
/// deciding whether an action deserves extra deliberation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Pointer,
    Scroll,
    Type,
    Submit,
    Custom,
}

impl ActionKind {
    /// Heavy actions, submissions and form-fill typing, warrant a longer
    /// pre-execution deliberation pause.
    pub fn is_heavy(&self) -> bool {
        matches!(self, ActionKind::Submit | ActionKind::Type)
    }
}

/// Error types used across the Cadence system.
#[derive(thiserror::Error, Debug)]
pub enum CadenceError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A page surface or other collaborator reported an error.
    #[error("Surface error: {0}")]
    Surface(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`CadenceError`].
pub type Result<T> = std::result::Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_range_normalizes_inverted_bounds() {
        let r = DelayRange::new(300, 100);
        assert_eq!(r.min_ms, 100);
        assert_eq!(r.max_ms, 300);
        assert_eq!(r.midpoint(), 200);
    }

    #[test]
    fn rect_center() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        let c = r.center();
        assert_eq!(c.x, 60.0);
        assert_eq!(c.y, 45.0);
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn submit_and_type_are_heavy() {
        assert!(ActionKind::Submit.is_heavy());
        assert!(ActionKind::Type.is_heavy());
        assert!(!ActionKind::Pointer.is_heavy());
        assert!(!ActionKind::Scroll.is_heavy());
        assert!(!ActionKind::Custom.is_heavy());
    }
}
