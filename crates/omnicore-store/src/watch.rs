use std::collections::VecDeque;
use std::sync::Arc;

use omnicore_domain::{matches_all, AnyResource, LabelSelector, Namespace, Pointer, ResourceType};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::StoreError;

/// How many recent events a [`Hub`] keeps around to serve tail-from-offset
/// subscriptions. Beyond this, a watcher requesting an offset older than the
/// oldest retained event gets everything available instead of erroring —
/// matching the store's "best-effort tail" framing rather than a hard cursor
/// contract.
const BACKLOG_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Destroyed,
}

/// One item in a watch stream. `Bootstrapped` marks the boundary between
/// replayed backlog (and any synthetic `Created` events for a fresh watch's
/// existing matches) and live events; `total` is the count of resources that
/// matched the watch's scope and selector at the moment it was bootstrapped.
#[derive(Debug, Clone)]
pub enum Event {
    Resource {
        offset: u64,
        pointer: Pointer,
        kind: EventKind,
        resource: AnyResource,
        old: Option<AnyResource>,
    },
    Bootstrapped {
        total: usize,
    },
}

impl Event {
    fn offset(&self) -> Option<u64> {
        match self {
            Event::Resource { offset, .. } => Some(*offset),
            Event::Bootstrapped { .. } => None,
        }
    }

    fn matches(&self, selector: &[LabelSelector]) -> bool {
        match self {
            Event::Resource { resource, .. } => matches_all(selector, &resource.metadata.labels),
            Event::Bootstrapped { .. } => true,
        }
    }
}

/// Parameters for a single watch subscription.
pub struct WatchRequest {
    pub resource_type: ResourceType,
    pub namespace: Namespace,
    pub selector: Vec<LabelSelector>,
    /// Replay events with `offset > tail_from` before going live. `None`
    /// means "start from now" (no backlog replay, just `Bootstrapped` then
    /// live events).
    pub tail_from: Option<u64>,
}

struct HubInner {
    next_offset: u64,
    backlog: VecDeque<Event>,
    sender: broadcast::Sender<Event>,
}

/// Per-(resource-type, namespace) watch fan-out.
///
/// Every mutation the store performs calls [`Hub::publish`] under the same
/// lock that made the mutation visible to reads, so a subscriber that
/// observes the write via `get`/`list` is guaranteed to also see (or have
/// already seen) the corresponding event.
///
/// Label-selector filtering during backlog replay and live delivery is
/// evaluated against the resource's labels *as captured at publish time*,
/// not the resource's current state. A tailing watcher whose selector no
/// longer matches a resource by the time its update event is delivered still
/// receives that final transition — the selector narrows which resources a
/// watch starts with, not which events it loses mid-stream.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<RwLock<HubInner>>,
}

impl Default for Hub {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BACKLOG_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(HubInner {
                next_offset: 0,
                backlog: VecDeque::with_capacity(BACKLOG_CAPACITY),
                sender,
            })),
        }
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, pointer: Pointer, kind: EventKind, resource: AnyResource, old: Option<AnyResource>) {
        let mut guard = self.inner.write().await;
        let offset = guard.next_offset;
        guard.next_offset += 1;
        let event = Event::Resource { offset, pointer, kind, resource, old };
        guard.backlog.push_back(event.clone());
        if guard.backlog.len() > BACKLOG_CAPACITY {
            guard.backlog.pop_front();
        }
        // No receivers is not an error — publishing happens regardless of
        // whether anyone is watching.
        let _ = guard.sender.send(event);
    }

    /// Subscribe to a scoped, filtered event feed.
    ///
    /// `snapshot` is the caller's already-fetched, already-filtered (by
    /// `resource_type`/`namespace`, not yet by selector) current state for
    /// this watch's scope. For a fresh watch (`tail_from: None`) each
    /// snapshot entry is replayed as a synthetic `Created` event before
    /// `Bootstrapped` so a new watcher sees every currently-matching resource
    /// instead of only resources created after it connected.
    ///
    /// Callers that can cheaply hold a lock across both fetching `snapshot`
    /// and this call should do so: the live broadcast subscription is
    /// registered synchronously before this function returns, so a lock held
    /// across both closes the gap in which a concurrent write could land
    /// after the snapshot was taken but before the live feed was listening,
    /// and would otherwise be missed entirely.
    pub async fn subscribe(
        &self,
        request: WatchRequest,
        snapshot: Vec<AnyResource>,
    ) -> Result<ReceiverStream<Event>, StoreError> {
        let (tx, rx) = tokio::sync::mpsc::channel(1024);

        // Snapshot the backlog and subscribe to live events under the same
        // lock so no event can land in the gap between the two.
        let (backlog, mut live_rx) = {
            let guard = self.inner.read().await;
            let backlog: Vec<Event> = match request.tail_from {
                Some(from) => guard
                    .backlog
                    .iter()
                    .filter(|e| e.offset().is_some_and(|o| o > from))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            (backlog, guard.sender.subscribe())
        };

        let selector = request.selector.clone();
        let resource_type = request.resource_type.clone();
        let namespace = request.namespace.clone();
        let fresh = request.tail_from.is_none();

        tokio::spawn(async move {
            let total = snapshot.iter().filter(|r| matches_all(&selector, &r.metadata.labels)).count();
            if fresh {
                for resource in snapshot {
                    if !matches_all(&selector, &resource.metadata.labels) {
                        continue;
                    }
                    let event = Event::Resource {
                        offset: 0,
                        pointer: resource.pointer.clone(),
                        kind: EventKind::Created,
                        resource,
                        old: None,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }

            for event in backlog {
                if !event_in_scope(&event, &resource_type, &namespace) || !event.matches(&selector) {
                    continue;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if tx.send(Event::Bootstrapped { total }).await.is_err() {
                return;
            }
            loop {
                match live_rx.recv().await {
                    Ok(event) => {
                        if !event_in_scope(&event, &resource_type, &namespace) || !event.matches(&selector) {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "watch subscriber lagged, dropping skipped events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

fn event_in_scope(event: &Event, resource_type: &ResourceType, namespace: &Namespace) -> bool {
    match event {
        Event::Resource { pointer, .. } => {
            pointer.resource_type == *resource_type && pointer.namespace == *namespace
        }
        Event::Bootstrapped { .. } => true,
    }
}

/// Merge multiple watch streams into one, interleaved in arrival order.
/// Each input stream keeps its own `Bootstrapped` marker — a caller joining
/// N streams sees N `Bootstrapped` events, one per source, not a single
/// combined one.
pub fn join(
    streams: Vec<ReceiverStream<Event>>,
) -> impl tokio_stream::Stream<Item = Event> {
    futures::stream::select_all(
        streams
            .into_iter()
            .map(|s| Box::pin(s) as std::pin::Pin<Box<dyn tokio_stream::Stream<Item = Event> + Send>>),
    )
}
