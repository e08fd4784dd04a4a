//! Ticker lifecycle phase and the shared handle used to observe it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Phase of a ticker run. Moves forward only: not started → running → finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerPhase {
    #[default]
    NotStarted,
    Running,
    Finished,
}

impl TickerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

/// Thread-safe handle shared between a ticker's tasks and its observers.
///
/// Reads are synchronous; `finished` lets a caller suspend until the run ends
/// instead of polling.
#[derive(Clone)]
pub struct TickerStatusHandle {
    inner: Arc<watch::Sender<TickerPhase>>,
}

impl Default for TickerStatusHandle {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(TickerPhase::NotStarted);
        Self { inner: Arc::new(tx) }
    }
}

impl TickerStatusHandle {
    pub fn phase(&self) -> TickerPhase {
        *self.inner.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == TickerPhase::Finished
    }

    /// Moves not started → running. Returns false if the ticker already left
    /// the not-started phase.
    pub(crate) fn mark_running(&self) -> bool {
        self.advance(TickerPhase::NotStarted, TickerPhase::Running)
    }

    /// Moves running → finished. Only the first caller wins.
    pub(crate) fn mark_finished(&self) -> bool {
        self.advance(TickerPhase::Running, TickerPhase::Finished)
    }

    fn advance(&self, from: TickerPhase, to: TickerPhase) -> bool {
        self.inner.send_if_modified(|phase| {
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once the phase is `Finished`.
    pub async fn finished(&self) {
        let mut rx = self.inner.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|phase| *phase == TickerPhase::Finished).await;
    }
}
