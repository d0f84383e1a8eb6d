pub mod group;
pub mod scope;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

pub use scope::{ScopeEnd, WaitScope};
pub use watcher::ReadinessWatcher;

use crate::store::ResourceStore;

/// Shortest poll period; a zero interval would never yield.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Longest accepted wait. Larger values are clamped.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Lifecycle of a single readiness watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    Init,
    Polling,
    Streaming,
    Healthy,
    Failed,
    TimedOut,
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchState::Init => write!(f, "initializing"),
            WatchState::Polling => write!(f, "polling"),
            WatchState::Streaming => write!(f, "streaming"),
            WatchState::Healthy => write!(f, "healthy"),
            WatchState::Failed => write!(f, "failed"),
            WatchState::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WatchSettings {
    pub namespace: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    pub event_buffer: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            namespace: "default".into(),
            timeout: Duration::from_secs(20 * 60),
            poll_interval: Duration::from_millis(500),
            retry_backoff: Duration::from_secs(1),
            event_buffer: 16,
        }
    }
}

/// Everything a watcher task needs, shared by all tasks of one wait.
pub struct WatchContext<S> {
    pub store: Arc<S>,
    pub settings: Arc<WatchSettings>,
    pub scope: WaitScope,
}

impl<S> Clone for WatchContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            scope: self.scope.clone(),
        }
    }
}

impl<S: ResourceStore> WatchContext<S> {
    pub fn new(store: Arc<S>, settings: WatchSettings, scope: WaitScope) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            scope,
        }
    }
}
