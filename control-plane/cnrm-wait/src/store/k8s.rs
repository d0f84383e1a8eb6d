use async_trait::async_trait;
use cnrm_models::{ResourceKind, SQL_API_GROUP, SQL_API_VERSION};
use futures_util::StreamExt;
use kube::api::{Api, WatchEvent, WatchParams};
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::trace;

use super::{
    ChangeEvent, ChangeStream, ObjectSnapshot, ResourceStore, StoreError,
    StoreResult,
};

/// Resource store backed by the Kubernetes API server, reading Config
/// Connector SQL objects as dynamic objects.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> anyhow::Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }
}

pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk =
        GroupVersionKind::gvk(SQL_API_GROUP, SQL_API_VERSION, kind.k8s_kind());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

fn name_selector(name: &str) -> String {
    format!("metadata.name={}", name)
}

fn into_store_err(name: &str, e: kube::Error) -> StoreError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => {
            StoreError::NotFound(name.to_string())
        }
        kube::Error::Api(ae) if ae.code == 410 => StoreError::Expired(ae.message),
        other => StoreError::Api(other.to_string()),
    }
}

fn snapshot(
    kind: ResourceKind,
    mut obj: DynamicObject,
) -> StoreResult<ObjectSnapshot> {
    // Typed objects from watch streams may arrive without type metadata.
    obj.types.get_or_insert_with(|| TypeMeta {
        api_version: kind.api_version(),
        kind: kind.k8s_kind().to_string(),
    });
    let resource_version = obj.metadata.resource_version.clone();
    let object = serde_json::to_value(&obj)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(ObjectSnapshot {
        resource_version,
        object,
    })
}

fn translate(
    kind: ResourceKind,
    event: WatchEvent<DynamicObject>,
) -> StoreResult<ChangeEvent> {
    match event {
        WatchEvent::Added(o) | WatchEvent::Modified(o) => {
            Ok(ChangeEvent::Applied(snapshot(kind, o)?))
        }
        WatchEvent::Deleted(o) => Ok(ChangeEvent::Deleted(snapshot(kind, o)?)),
        WatchEvent::Bookmark(b) => Ok(ChangeEvent::Bookmark {
            resource_version: b.metadata.resource_version,
        }),
        WatchEvent::Error(e) if e.code == 410 => {
            Err(StoreError::Expired(e.message))
        }
        WatchEvent::Error(e) => Err(StoreError::Stream(e.message)),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> StoreResult<ObjectSnapshot> {
        let obj = self
            .api(kind, namespace)
            .get(name)
            .await
            .map_err(|e| into_store_err(name, e))?;
        snapshot(kind, obj)
    }

    async fn subscribe(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        from_version: &str,
    ) -> StoreResult<ChangeStream> {
        trace!(%kind, %namespace, %name, %from_version, "opening watch");
        let wp = WatchParams::default().fields(&name_selector(name));
        let stream = self
            .api(kind, namespace)
            .watch(&wp, from_version)
            .await
            .map_err(|e| into_store_err(name, e))?;
        Ok(stream
            .map(move |res| match res {
                Ok(event) => translate(kind, event),
                Err(e) => Err(StoreError::Stream(e.to_string())),
            })
            .boxed())
    }
}
