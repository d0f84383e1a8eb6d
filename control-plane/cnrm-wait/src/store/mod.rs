pub mod k8s;
pub mod memory;

use async_trait::async_trait;
use cnrm_models::ResourceKind;
use futures_util::stream::BoxStream;
use serde_json::Value;

pub use k8s::KubeStore;
pub use memory::MemoryStore;

/// Version to subscribe from when nothing has been observed yet. The control
/// plane answers with the current state first, then subsequent changes.
pub const INITIAL_VERSION: &str = "0";

pub type StoreResult<T> = Result<T, StoreError>;

pub type ChangeStream = BoxStream<'static, StoreResult<ChangeEvent>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested resource version is too old to resume from.
    #[error("resource version expired: {0}")]
    Expired(String),

    #[error("control plane error: {0}")]
    Api(String),

    #[error("watch stream error: {0}")]
    Stream(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Raw control-plane object as last observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    pub resource_version: Option<String>,
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Applied(ObjectSnapshot),
    Deleted(ObjectSnapshot),
    /// Progress marker without an object payload.
    Bookmark { resource_version: String },
}

impl ChangeEvent {
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            ChangeEvent::Applied(s) | ChangeEvent::Deleted(s) => {
                s.resource_version.as_deref()
            }
            ChangeEvent::Bookmark { resource_version } => Some(resource_version),
        }
    }
}

/// Read/watch access to the control plane.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> StoreResult<ObjectSnapshot>;

    /// Open a change stream for one named object, starting after
    /// `from_version`. The stream may end or fail at any time; callers
    /// resume from the last version they saw.
    async fn subscribe(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        from_version: &str,
    ) -> StoreResult<ChangeStream>;
}
