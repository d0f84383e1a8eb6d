use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use cnrm_models::{ResourceRef, SqlResourceStatus};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WaitError;
use crate::events::{Envelope, EventSender, ReadinessEvent};
use crate::groups::GroupRegistry;
use crate::report::{ProgressPrinter, ResourceFailure, WaitReport};
use crate::store::ResourceStore;
use crate::watch::{WaitScope, WatchContext, WatchSettings};

/// Runs every group's watch concurrently and drains their merged events.
pub struct Coordinator<S> {
    store: Arc<S>,
    settings: WatchSettings,
    printer: ProgressPrinter,
}

impl<S: ResourceStore> Coordinator<S> {
    pub fn new(store: Arc<S>, settings: WatchSettings) -> Self {
        Self {
            store,
            settings,
            printer: ProgressPrinter::sink(),
        }
    }

    pub fn with_printer(mut self, printer: ProgressPrinter) -> Self {
        self.printer = printer;
        self
    }

    /// Wait until every resource in `registry` is healthy, has failed, or the
    /// deadline passes. Cancelling `cancel` ends the wait early; resources
    /// still pending are reported as cancelled.
    pub async fn wait(
        &mut self,
        registry: GroupRegistry,
        cancel: CancellationToken,
    ) -> WaitReport {
        let started = Instant::now();
        let total = registry.resource_count();
        info!(
            groups = registry.len(),
            resources = total,
            namespace = %self.settings.namespace,
            timeout = ?self.settings.timeout,
            "waiting for resources"
        );

        let scope = WaitScope::new(cancel.child_token(), self.settings.timeout);
        let ctx = WatchContext::new(
            Arc::clone(&self.store),
            self.settings.clone(),
            scope.clone(),
        );
        let (tx, mut rx) = mpsc::channel(self.settings.event_buffer.max(1));
        let producers = tokio::spawn(fan_out(registry, ctx, tx));

        let mut tracker = ProgressTracker::new(total);
        while let Some(msg) = rx.recv().await {
            match msg {
                Envelope::Event(event) => tracker.handle(event, &mut self.printer),
                Envelope::Done => break,
            }
        }
        if let Err(e) = producers.await {
            warn!(error = %e, "group fan-out task failed");
        }
        if let Some(end) = scope.ended() {
            debug!(?end, "wait scope ended before completion");
        }
        scope.cancel();

        let report = tracker.finish(started.elapsed());
        info!(
            remaining = report.remaining,
            failures = report.failures.len(),
            elapsed = ?report.elapsed,
            "wait finished"
        );
        report
    }
}

/// Starts one task per group and sends `Done` once all of them returned.
/// Watchers hold the only other senders, so nothing is sent after `Done`.
///
/// A group task that dies reports every one of its resources as aborted;
/// the tracker ignores those already settled.
async fn fan_out<S: ResourceStore>(
    registry: GroupRegistry,
    ctx: WatchContext<S>,
    tx: mpsc::Sender<Envelope>,
) {
    let events = EventSender::new(tx.clone());
    let mut groups = JoinSet::new();
    let mut running = HashMap::new();
    for group in registry.into_groups() {
        let name = group.name().to_string();
        let mut resources = vec![group.instance_ref()];
        resources.extend(group.children());
        let handle = groups.spawn(group.watch(ctx.clone(), events.clone()));
        running.insert(handle.id(), (name, resources));
    }
    while let Some(res) = groups.join_next_with_id().await {
        match res {
            Ok((id, ())) => {
                running.remove(&id);
            }
            Err(e) => {
                let Some((name, resources)) = running.remove(&e.id()) else {
                    warn!(error = %e, "unknown group task failed");
                    continue;
                };
                warn!(group = %name, error = %e, "group task failed");
                for resource in resources {
                    events
                        .send(ReadinessEvent::failure(
                            name.as_str(),
                            resource,
                            WaitError::Aborted(e.to_string()),
                        ))
                        .await;
                }
            }
        }
    }
    drop(events);
    if tx.send(Envelope::Done).await.is_err() {
        debug!("event consumer gone before completion");
    }
}

/// Consumer-side state: the only place the remaining count changes.
struct ProgressTracker {
    total: usize,
    remaining: usize,
    healthy: BTreeSet<ResourceRef>,
    healthy_order: Vec<ResourceRef>,
    failed: BTreeSet<ResourceRef>,
    failures: Vec<ResourceFailure>,
}

impl ProgressTracker {
    fn new(total: usize) -> Self {
        Self {
            total,
            remaining: total,
            healthy: BTreeSet::new(),
            healthy_order: Vec::new(),
            failed: BTreeSet::new(),
            failures: Vec::new(),
        }
    }

    fn handle(&mut self, event: ReadinessEvent, printer: &mut ProgressPrinter) {
        if let Some(error) = event.error {
            if self.healthy.contains(&event.resource)
                || !self.failed.insert(event.resource.clone())
            {
                debug!(resource = %event.resource, %error, "already settled");
                return;
            }
            warn!(resource = %event.resource, %error, "resource failed");
            self.failures.push(ResourceFailure {
                group: event.group,
                resource: event.resource,
                error,
            });
            return;
        }
        let Some(status) = event.status else {
            debug!(resource = %event.resource, "event without status");
            return;
        };
        let Some(reason) = status.reason() else {
            debug!(resource = %event.resource, "no condition reported yet");
            return;
        };

        if !status.is_up_to_date() {
            printer.progress(&event.resource, reason);
            return;
        }
        if !self.healthy.insert(event.resource.clone()) {
            debug!(resource = %event.resource, "already healthy");
            return;
        }
        printer.progress(&event.resource, reason);
        self.remaining = self.remaining.saturating_sub(1);
        match &status {
            SqlResourceStatus::Instance(s) => info!(
                resource = %event.resource,
                connection_name = ?s.connection_name,
                remaining = self.remaining,
                "instance ready"
            ),
            SqlResourceStatus::Database(_) | SqlResourceStatus::User(_) => info!(
                resource = %event.resource,
                remaining = self.remaining,
                "resource ready"
            ),
        }
        self.healthy_order.push(event.resource);
    }

    fn finish(self, elapsed: std::time::Duration) -> WaitReport {
        WaitReport {
            total: self.total,
            remaining: self.remaining,
            healthy: self.healthy_order,
            failures: self.failures,
            elapsed,
        }
    }
}
