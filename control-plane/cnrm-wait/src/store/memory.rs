use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use cnrm_models::{ResourceKind, ResourceRef};
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::json;
use tokio::sync::Mutex;

use super::{
    ChangeEvent, ChangeStream, ObjectSnapshot, ResourceStore, StoreError,
    StoreResult,
};

/// What the next `subscribe` call for a resource returns.
#[derive(Debug, Clone)]
pub enum ScriptedSubscription {
    /// Deliver the items, then stay open without further events.
    Open(Vec<StoreResult<ChangeEvent>>),
    /// Deliver the items, then end the stream.
    Closing(Vec<StoreResult<ChangeEvent>>),
    /// Fail to open.
    Refused(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },
    Subscribe {
        kind: ResourceKind,
        namespace: String,
        name: String,
        from_version: String,
    },
}

impl StoreCall {
    pub fn kind(&self) -> ResourceKind {
        match self {
            StoreCall::Get { kind, .. } | StoreCall::Subscribe { kind, .. } => {
                *kind
            }
        }
    }
}

#[derive(Default)]
struct Script {
    gets: VecDeque<StoreResult<ObjectSnapshot>>,
    last_get: Option<StoreResult<ObjectSnapshot>>,
    subscriptions: VecDeque<ScriptedSubscription>,
}

/// In-memory store replaying scripted responses per resource and recording
/// every call. Namespaces are recorded but not used for lookup.
///
/// `get` returns queued results in order and then keeps repeating the last
/// one; unscripted resources are not found. `subscribe` consumes queued
/// subscriptions; when none are left it returns a stream that never yields.
#[derive(Clone, Default)]
pub struct MemoryStore {
    scripts: Arc<Mutex<HashMap<ResourceRef, Script>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_get(
        &self,
        kind: ResourceKind,
        name: &str,
        result: StoreResult<ObjectSnapshot>,
    ) {
        let mut scripts = self.scripts.lock().await;
        scripts
            .entry(ResourceRef::new(kind, name))
            .or_default()
            .gets
            .push_back(result);
    }

    pub async fn push_subscription(
        &self,
        kind: ResourceKind,
        name: &str,
        subscription: ScriptedSubscription,
    ) {
        let mut scripts = self.scripts.lock().await;
        scripts
            .entry(ResourceRef::new(kind, name))
            .or_default()
            .subscriptions
            .push_back(subscription);
    }

    /// Script a resource that is fetchable with `reason` and whose watch
    /// reports `UpToDate`.
    pub async fn ready(&self, kind: ResourceKind, name: &str, reason: &str) {
        self.push_get(kind, name, Ok(sql_object(kind, name, "1", Some(reason))))
            .await;
        self.push_subscription(
            kind,
            name,
            ScriptedSubscription::Open(vec![applied(
                kind,
                name,
                "2",
                Some(cnrm_models::REASON_UP_TO_DATE),
            )]),
        )
        .await;
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_for_kind(&self, kind: ResourceKind) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    /// Versions passed to `subscribe` for one resource, in call order.
    pub async fn subscribe_versions(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                StoreCall::Subscribe {
                    kind: k,
                    name: n,
                    from_version,
                    ..
                } if *k == kind && n == name => Some(from_version.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> StoreResult<ObjectSnapshot> {
        self.calls.lock().await.push(StoreCall::Get {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        let mut scripts = self.scripts.lock().await;
        let Some(script) = scripts.get_mut(&ResourceRef::new(kind, name)) else {
            return Err(StoreError::NotFound(name.to_string()));
        };
        if let Some(next) = script.gets.pop_front() {
            script.last_get = Some(next.clone());
            return next;
        }
        script
            .last_get
            .clone()
            .unwrap_or_else(|| Err(StoreError::NotFound(name.to_string())))
    }

    async fn subscribe(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        from_version: &str,
    ) -> StoreResult<ChangeStream> {
        self.calls.lock().await.push(StoreCall::Subscribe {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            from_version: from_version.to_string(),
        });
        let next = self
            .scripts
            .lock()
            .await
            .get_mut(&ResourceRef::new(kind, name))
            .and_then(|s| s.subscriptions.pop_front())
            .unwrap_or(ScriptedSubscription::Open(Vec::new()));
        match next {
            ScriptedSubscription::Open(items) => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
            ScriptedSubscription::Closing(items) => {
                Ok(stream::iter(items).boxed())
            }
            ScriptedSubscription::Refused(e) => Err(e),
        }
    }
}

/// Build a raw Config Connector object with a single `Ready` condition.
pub fn sql_object(
    kind: ResourceKind,
    name: &str,
    version: &str,
    reason: Option<&str>,
) -> ObjectSnapshot {
    let conditions = match reason {
        Some(r) => json!([{
            "type": "Ready",
            "status": if r == cnrm_models::REASON_UP_TO_DATE { "True" } else { "False" },
            "reason": r,
        }]),
        None => json!([]),
    };
    ObjectSnapshot {
        resource_version: Some(version.to_string()),
        object: json!({
            "apiVersion": kind.api_version(),
            "kind": kind.k8s_kind(),
            "metadata": {"name": name, "resourceVersion": version},
            "status": {"conditions": conditions},
        }),
    }
}

pub fn applied(
    kind: ResourceKind,
    name: &str,
    version: &str,
    reason: Option<&str>,
) -> StoreResult<ChangeEvent> {
    Ok(ChangeEvent::Applied(sql_object(kind, name, version, reason)))
}

pub fn bookmark(version: &str) -> StoreResult<ChangeEvent> {
    Ok(ChangeEvent::Bookmark {
        resource_version: version.to_string(),
    })
}
