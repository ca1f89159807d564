//! Events observable by whoever drives a release

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Terminal events of the release operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineEvent {
    /// New release checked out and its REVISION recorded
    Updated,

    /// `current` now points at the new release
    Published,
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Updated => "updated",
            PipelineEvent::Published => "published",
        }
    }
}

/// Broadcast channel for pipeline events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Send to current subscribers; nobody listening is fine
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Log every event until all buses are dropped; returns how many were seen
pub async fn log_events(mut rx: broadcast::Receiver<PipelineEvent>) -> usize {
    let mut seen = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                seen += 1;
                info!("event: {}", event.name());
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event logger skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return seen,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
