use cnrm_models::{ResourceRef, SqlResourceStatus};
use futures_util::StreamExt;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Instrument, debug, info_span, trace, warn};

use super::{MIN_POLL_INTERVAL, ScopeEnd, WatchContext, WatchState};
use crate::error::WaitError;
use crate::events::{EventSender, ReadinessEvent};
use crate::store::{ChangeEvent, INITIAL_VERSION, ResourceStore, StoreError};

/// Waits for one resource: polls until it leaves the initializing state,
/// then follows its change stream until it reports `UpToDate`.
///
/// Emits a progress event whenever the observed reason changes, and exactly
/// one failure event if it ends in any state other than healthy.
pub struct ReadinessWatcher<S> {
    ctx: WatchContext<S>,
    group: String,
    resource: ResourceRef,
    state: WatchState,
    last_reason: Option<String>,
}

impl<S: ResourceStore> ReadinessWatcher<S> {
    pub fn new(
        ctx: WatchContext<S>,
        group: impl Into<String>,
        resource: ResourceRef,
    ) -> Self {
        Self {
            ctx,
            group: group.into(),
            resource,
            state: WatchState::Init,
            last_reason: None,
        }
    }

    /// Drive the watcher to a terminal state and return it.
    pub async fn run(self, events: EventSender) -> WatchState {
        let span = info_span!(
            "watch",
            group = %self.group,
            kind = %self.resource.kind,
            name = %self.resource.name,
        );
        self.drive(events).instrument(span).await
    }

    async fn drive(mut self, events: EventSender) -> WatchState {
        self.transition(WatchState::Polling);
        if let Err(err) = self.poll().await {
            return self.fail(err, &events).await;
        }
        self.transition(WatchState::Streaming);
        match self.stream(&events).await {
            Ok(()) => self.state,
            Err(err) => self.fail(err, &events).await,
        }
    }

    fn transition(&mut self, next: WatchState) {
        trace!(from = %self.state, to = %next, "transition");
        self.state = next;
    }

    fn interrupted(&self, end: ScopeEnd) -> WaitError {
        match end {
            ScopeEnd::DeadlineExceeded => WaitError::TimedOut(self.state),
            ScopeEnd::Cancelled => WaitError::Cancelled(self.state),
        }
    }

    async fn fail(mut self, err: WaitError, events: &EventSender) -> WatchState {
        let next = match err {
            WaitError::TimedOut(_) | WaitError::Cancelled(_) => WatchState::TimedOut,
            _ => WatchState::Failed,
        };
        warn!(error = %err, "resource did not become ready");
        self.transition(next);
        events
            .send(ReadinessEvent::failure(
                self.group.clone(),
                self.resource.clone(),
                err,
            ))
            .await;
        self.state
    }

    /// Fetch on a fixed interval until the resource exists and is past its
    /// `UpdateFailed` initialization phase.
    async fn poll(&mut self) -> Result<(), WaitError> {
        let scope = self.ctx.scope.clone();
        let store = self.ctx.store.clone();
        let ns = self.ctx.settings.namespace.clone();
        let kind = self.resource.kind;
        let mut ticker = interval(self.ctx.settings.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                end = scope.done() => return Err(self.interrupted(end)),
                _ = ticker.tick() => {}
            }
            let fetched = tokio::select! {
                end = scope.done() => return Err(self.interrupted(end)),
                res = store.get(kind, &ns, &self.resource.name) => res,
            };
            match fetched {
                Err(StoreError::NotFound(_)) => {
                    debug!("resource not found yet");
                }
                Err(e) => return Err(WaitError::Fetch(e)),
                Ok(snapshot) => {
                    let status = SqlResourceStatus::decode(kind, &snapshot.object)
                        .map_err(WaitError::Decode)?;
                    if status.is_transient_failure() {
                        debug!(reason = ?status.reason(), "still initializing");
                        continue;
                    }
                    debug!(reason = ?status.reason(), "resource settled");
                    return Ok(());
                }
            }
        }
    }

    /// Follow the change stream until the resource is healthy. Interrupted
    /// streams are reopened from the last version seen; an expired version
    /// restarts from the current state.
    async fn stream(&mut self, events: &EventSender) -> Result<(), WaitError> {
        let scope = self.ctx.scope.clone();
        let store = self.ctx.store.clone();
        let ns = self.ctx.settings.namespace.clone();
        let backoff = self.ctx.settings.retry_backoff;
        let kind = self.resource.kind;
        let mut version = INITIAL_VERSION.to_string();

        loop {
            let opened = tokio::select! {
                end = scope.done() => return Err(self.interrupted(end)),
                res = store.subscribe(kind, &ns, &self.resource.name, &version) => res,
            };
            let mut changes = opened.map_err(WaitError::Subscribe)?;
            debug!(%version, "watch opened");

            loop {
                let next = tokio::select! {
                    end = scope.done() => return Err(self.interrupted(end)),
                    next = changes.next() => next,
                };
                match next {
                    None => {
                        debug!(%version, "watch stream ended");
                        break;
                    }
                    Some(Err(StoreError::Expired(msg))) => {
                        debug!(%msg, "resource version expired; restarting watch");
                        version = INITIAL_VERSION.to_string();
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, %version, "watch stream interrupted");
                        break;
                    }
                    Some(Ok(change)) => {
                        if let Some(v) = change.resource_version() {
                            version = v.to_string();
                        }
                        if self.observe(change, events).await {
                            return Ok(());
                        }
                    }
                }
            }

            tokio::select! {
                end = scope.done() => return Err(self.interrupted(end)),
                _ = sleep(backoff) => {}
            }
        }
    }

    /// Returns true once the resource is healthy.
    async fn observe(&mut self, change: ChangeEvent, events: &EventSender) -> bool {
        let snapshot = match change {
            ChangeEvent::Bookmark { .. } => {
                trace!("bookmark");
                return false;
            }
            ChangeEvent::Deleted(_) => {
                warn!("resource deleted while waiting");
                self.last_reason = None;
                return false;
            }
            ChangeEvent::Applied(snapshot) => snapshot,
        };
        let status = match SqlResourceStatus::decode(self.resource.kind, &snapshot.object)
        {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, "skipping malformed event");
                return false;
            }
        };

        let healthy = status.is_up_to_date();
        let reason = status.reason().map(str::to_string);
        if healthy || reason != self.last_reason {
            self.last_reason = reason;
            events
                .send(ReadinessEvent::progress(
                    self.group.clone(),
                    self.resource.clone(),
                    status,
                ))
                .await;
        }
        if healthy {
            self.transition(WatchState::Healthy);
        }
        healthy
    }
}
