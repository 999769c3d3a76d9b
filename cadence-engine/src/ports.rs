//! Injected collaborator interfaces.
//!
//! The engine is free of any concrete UI toolkit dependency: it emits ordered
//! interaction signals against opaque handles supplied by the embedder and
//! never decides which elements those handles refer to.

use anyhow::Result;
use async_trait::async_trait;
use cadence_common::Point;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Receiver of pointer and scroll signals for the current page.
#[async_trait]
pub trait InteractionSurface: Send + Sync {
    /// The pointer arrived at `at`; intermediate trajectory steps come
    /// through here too, in order.
    async fn pointer_moved(&self, at: Point) -> Result<()>;

    /// A click at the pointer's current position.
    async fn click(&self, at: Point) -> Result<()>;

    /// The viewport scrolled to vertical offset `y`.
    async fn scroll_moved(&self, y: f64) -> Result<()>;
}

/// Receiver of keystroke-level signals for a single text input.
///
/// The signal order per character mirrors real input events: `key_down`,
/// `append`, `key_up`. `set_value` is the degraded single-shot path used when
/// humanization is disabled.
#[async_trait]
pub trait TextSink: Send + Sync {
    async fn focus(&self) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn key_down(&self, ch: char) -> Result<()>;
    async fn append(&self, ch: char) -> Result<()>;
    async fn key_up(&self, ch: char) -> Result<()>;
    async fn backspace(&self) -> Result<()>;
    async fn set_value(&self, value: &str) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn blur(&self) -> Result<()>;
}

/// Session lifecycle notifications, fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    RotationRequired {
        at: DateTime<Utc>,
    },
    BreakStarted {
        at: DateTime<Utc>,
        duration_ms: u64,
    },
    BreakEnded {
        at: DateTime<Utc>,
        duration_ms: u64,
    },
}

/// One-way event emission; delivery needs no acknowledgment.
pub trait SessionNotifier: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

/// Notifier backed by an unbounded channel.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionNotifier for ChannelNotifier {
    fn notify(&self, event: SessionEvent) {
        // Fire-and-forget: a dropped receiver is not the engine's problem.
        let _ = self.tx.send(event);
    }
}

/// Notifier that discards everything.
pub struct NullNotifier;

impl SessionNotifier for NullNotifier {
    fn notify(&self, _event: SessionEvent) {}
}

/// Clears site-scoped browsing state during a session rotation. The engine
/// only asks; the embedder does the clearing.
#[async_trait]
pub trait BrowsingStateClearer: Send + Sync {
    async fn clear(&self, scope: &str) -> Result<()>;
}

/// Clearer that does nothing, for demos and tests.
pub struct NullClearer;

#[async_trait]
impl BrowsingStateClearer for NullClearer {
    async fn clear(&self, _scope: &str) -> Result<()> {
        Ok(())
    }
}
