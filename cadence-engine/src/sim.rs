//! In-memory page surface for demos and tests.
//!
//! Records every interaction signal in arrival order and maintains a text
//! value with real append/backspace semantics, so tests can assert both the
//! event sequence and the net visible result.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use cadence_common::Point;
use tracing::trace;

use crate::ports::{InteractionSurface, TextSink};

/// One observed interaction signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    PointerMove { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Scroll { y: f64 },
    Focus,
    Clear,
    KeyDown(char),
    Input(char),
    KeyUp(char),
    Backspace,
    SetValue(String),
    Commit,
    Blur,
}

#[derive(Default)]
struct SimState {
    signals: Vec<Signal>,
    value: String,
}

/// Simulated page implementing both collaborator ports.
#[derive(Default)]
pub struct SimPage {
    state: Mutex<SimState>,
}

impl SimPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every signal observed so far, in order.
    pub fn signals(&self) -> Vec<Signal> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .signals
            .clone()
    }

    /// Current text value of the simulated input.
    pub fn value(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .clone()
    }

    fn record(&self, signal: Signal) {
        trace!(target: "sim", ?signal, "page signal");
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .signals
            .push(signal);
    }
}

#[async_trait]
impl InteractionSurface for SimPage {
    async fn pointer_moved(&self, at: Point) -> Result<()> {
        self.record(Signal::PointerMove { x: at.x, y: at.y });
        Ok(())
    }

    async fn click(&self, at: Point) -> Result<()> {
        self.record(Signal::Click { x: at.x, y: at.y });
        Ok(())
    }

    async fn scroll_moved(&self, y: f64) -> Result<()> {
        self.record(Signal::Scroll { y });
        Ok(())
    }
}

#[async_trait]
impl TextSink for SimPage {
    async fn focus(&self) -> Result<()> {
        self.record(Signal::Focus);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.record(Signal::Clear);
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .clear();
        Ok(())
    }

    async fn key_down(&self, ch: char) -> Result<()> {
        self.record(Signal::KeyDown(ch));
        Ok(())
    }

    async fn append(&self, ch: char) -> Result<()> {
        self.record(Signal::Input(ch));
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .push(ch);
        Ok(())
    }

    async fn key_up(&self, ch: char) -> Result<()> {
        self.record(Signal::KeyUp(ch));
        Ok(())
    }

    async fn backspace(&self) -> Result<()> {
        self.record(Signal::Backspace);
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .pop();
        Ok(())
    }

    async fn set_value(&self, value: &str) -> Result<()> {
        self.record(Signal::SetValue(value.to_string()));
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value = value.to_string();
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.record(Signal::Commit);
        Ok(())
    }

    async fn blur(&self) -> Result<()> {
        self.record(Signal::Blur);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn value_tracks_appends_and_backspaces() {
        let page = SimPage::new();
        page.append('h').await.unwrap();
        page.append('x').await.unwrap();
        page.backspace().await.unwrap();
        page.append('i').await.unwrap();
        assert_eq!(page.value(), "hi");
    }

    #[tokio::test]
    async fn signals_preserve_order() {
        let page = SimPage::new();
        page.pointer_moved(Point::new(1.0, 2.0)).await.unwrap();
        page.click(Point::new(1.0, 2.0)).await.unwrap();
        page.scroll_moved(30.0).await.unwrap();
        assert_eq!(
            page.signals(),
            vec![
                Signal::PointerMove { x: 1.0, y: 2.0 },
                Signal::Click { x: 1.0, y: 2.0 },
                Signal::Scroll { y: 30.0 },
            ]
        );
    }
}
