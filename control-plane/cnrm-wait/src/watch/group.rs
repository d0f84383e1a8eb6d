use std::collections::HashMap;

use cnrm_models::ResourceRef;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::{ReadinessWatcher, WatchContext, WatchState};
use crate::error::WaitError;
use crate::events::{EventSender, ReadinessEvent};
use crate::groups::DependencyGroup;
use crate::store::ResourceStore;

impl DependencyGroup {
    /// Wait for the instance, then for all children concurrently.
    ///
    /// Children are only watched once the instance is healthy. Otherwise each
    /// child is reported as not ready without touching the store. Returns
    /// when every resource of the group is terminal.
    #[instrument(skip_all, fields(group = %self.name()))]
    pub async fn watch<S: ResourceStore>(
        self,
        ctx: WatchContext<S>,
        events: EventSender,
    ) {
        let instance_ref = self.instance_ref();
        let watcher =
            ReadinessWatcher::new(ctx.clone(), self.name(), instance_ref.clone());
        let instance = match tokio::spawn(watcher.run(events.clone())).await {
            Ok(state) => state,
            Err(e) => {
                self.aborted(instance_ref, e, &events).await;
                WatchState::Failed
            }
        };
        let children = self.children();

        if instance != WatchState::Healthy {
            info!(
                state = %instance,
                children = children.len(),
                "instance not ready; skipping children"
            );
            for child in children {
                events
                    .send(ReadinessEvent::failure(
                        self.name(),
                        child,
                        WaitError::DependencyNotReady {
                            instance: self.name().to_string(),
                        },
                    ))
                    .await;
            }
            return;
        }

        let mut tasks = JoinSet::new();
        let mut running = HashMap::new();
        for child in children {
            let watcher = ReadinessWatcher::new(ctx.clone(), self.name(), child.clone());
            let handle = tasks.spawn(watcher.run(events.clone()));
            running.insert(handle.id(), child);
        }
        while let Some(res) = tasks.join_next_with_id().await {
            match res {
                Ok((id, state)) => {
                    running.remove(&id);
                    debug!(%state, "child watcher finished");
                }
                Err(e) => match running.remove(&e.id()) {
                    Some(child) => self.aborted(child, e, &events).await,
                    None => warn!(error = %e, "unknown child watcher task failed"),
                },
            }
        }
    }

    async fn aborted(&self, resource: ResourceRef, err: JoinError, events: &EventSender) {
        warn!(%resource, error = %err, "watcher task aborted");
        events
            .send(ReadinessEvent::failure(
                self.name(),
                resource,
                WaitError::Aborted(err.to_string()),
            ))
            .await;
    }
}
