use cnrm_models::{DecodeError, DescriptorError, ResourceKind};

use crate::store::StoreError;
use crate::watch::WatchState;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("group {0} already exists")]
    DuplicateGroup(String),

    #[error("{kind} {name} is declared under both {} and {}", .groups.0, .groups.1)]
    DuplicateResource {
        kind: ResourceKind,
        name: String,
        groups: (String, String),
    },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Terminal failure of a single resource. Carried inside readiness events and
/// collected into the final report; never aborts sibling watchers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaitError {
    #[error("fetch failed: {0}")]
    Fetch(StoreError),

    #[error("unreadable resource: {0}")]
    Decode(DecodeError),

    #[error("watch could not be opened: {0}")]
    Subscribe(StoreError),

    #[error("timed out while {0}")]
    TimedOut(WatchState),

    #[error("cancelled while {0}")]
    Cancelled(WatchState),

    #[error("not watched, instance {instance} did not become ready")]
    DependencyNotReady { instance: String },

    /// The task watching the resource panicked or was aborted.
    #[error("watch task aborted: {0}")]
    Aborted(String),
}
