use cnrm_models::{ResourceRef, SqlResourceStatus};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::WaitError;

/// Normalized observation of one resource, produced by its watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessEvent {
    pub group: String,
    pub resource: ResourceRef,
    pub status: Option<SqlResourceStatus>,
    pub error: Option<WaitError>,
}

impl ReadinessEvent {
    pub fn progress(
        group: impl Into<String>,
        resource: ResourceRef,
        status: SqlResourceStatus,
    ) -> Self {
        Self {
            group: group.into(),
            resource,
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(
        group: impl Into<String>,
        resource: ResourceRef,
        error: WaitError,
    ) -> Self {
        Self {
            group: group.into(),
            resource,
            status: None,
            error: Some(error),
        }
    }

    pub fn condition_reason(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.reason())
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
            && self.status.as_ref().is_some_and(|s| s.is_up_to_date())
    }
}

/// Message on the shared event channel.
#[derive(Debug)]
pub enum Envelope {
    Event(ReadinessEvent),
    /// Sent once, after every producer has finished.
    Done,
}

/// Producer half of the shared event channel, cloned into every watcher.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Envelope>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }

    /// Waits for channel capacity. The consumer drains until `Done`, so a
    /// closed channel only happens if it went away early.
    pub async fn send(&self, event: ReadinessEvent) {
        if let Err(e) = self.tx.send(Envelope::Event(event)).await {
            debug!(event = ?e.0, "event consumer gone; dropping event");
        }
    }
}
