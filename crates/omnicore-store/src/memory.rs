use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use omnicore_domain::{AnyResource, Namespace, Phase, Pointer, ResourceType};
use tokio::sync::RwLock;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::StoreError;
use crate::store::{apply_filter, ListFilter, ResourceStore};
use crate::watch::{Event, EventKind, Hub, WatchRequest};

/// Key used to shard the backing map: one lock per `(resource_type,
/// namespace)`, so readers/writers of unrelated namespaces never contend.
type ShardKey = (ResourceType, Namespace);

#[derive(Default)]
struct Shard {
    resources: HashMap<Pointer, AnyResource>,
}

/// In-memory [`ResourceStore`]. All data is lost on process exit — suitable
/// for tests and for running the control plane with no durable backend.
#[derive(Clone)]
pub struct InMemoryStore {
    shards: Arc<RwLock<HashMap<ShardKey, Arc<RwLock<Shard>>>>>,
    hub: Hub,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            shards: Arc::new(RwLock::new(HashMap::new())),
            hub: Hub::new(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn shard_for(&self, resource_type: &ResourceType, namespace: &Namespace) -> Arc<RwLock<Shard>> {
        let key = (resource_type.clone(), namespace.clone());
        if let Some(shard) = self.shards.read().await.get(&key) {
            return shard.clone();
        }
        let mut guard = self.shards.write().await;
        guard
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(Shard::default())))
            .clone()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, pointer: &Pointer) -> Result<AnyResource, StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let guard = shard.read().await;
        guard
            .resources
            .get(pointer)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))
    }

    async fn list(
        &self,
        resource_type: &ResourceType,
        namespace: &Namespace,
        filter: ListFilter,
    ) -> Result<(Vec<AnyResource>, usize), StoreError> {
        let shard = self.shard_for(resource_type, namespace).await;
        let guard = shard.read().await;
        let resources: Vec<AnyResource> = guard.resources.values().cloned().collect();
        Ok(apply_filter(resources, &filter))
    }

    async fn create(&self, resource: AnyResource) -> Result<AnyResource, StoreError> {
        let shard = self
            .shard_for(&resource.pointer.resource_type, &resource.pointer.namespace)
            .await;
        let mut guard = shard.write().await;
        if guard.resources.contains_key(&resource.pointer) {
            return Err(StoreError::AlreadyExists(resource.pointer));
        }
        let mut resource = resource;
        resource.metadata.version = Some(1);
        let now = Utc::now();
        resource.metadata.created = now;
        resource.metadata.updated = now;
        guard.resources.insert(resource.pointer.clone(), resource.clone());
        drop(guard);
        self.hub
            .publish(resource.pointer.clone(), EventKind::Created, resource.clone(), None)
            .await;
        Ok(resource)
    }

    async fn update(
        &self,
        pointer: &Pointer,
        expected_version: Option<u64>,
        desired: AnyResource,
    ) -> Result<AnyResource, StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let mut guard = shard.write().await;
        let current = guard
            .resources
            .get(pointer)
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))?;

        let current_version = current.metadata.version.unwrap_or(0);
        if let Some(expected) = expected_version {
            if current_version != expected {
                return Err(StoreError::Conflict {
                    pointer: pointer.clone(),
                    expected: Some(expected),
                    found: current_version,
                });
            }
        }

        let old = current.clone();
        let mut updated = desired;
        updated.pointer = pointer.clone();
        updated.metadata.version = Some(current_version + 1);
        updated.metadata.created = current.metadata.created;
        updated.metadata.updated = Utc::now();
        guard.resources.insert(pointer.clone(), updated.clone());
        drop(guard);
        self.hub
            .publish(pointer.clone(), EventKind::Updated, updated.clone(), Some(old))
            .await;
        Ok(updated)
    }

    async fn teardown(&self, pointer: &Pointer) -> Result<AnyResource, StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let mut guard = shard.write().await;
        let current = guard
            .resources
            .get_mut(pointer)
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))?;
        let old = current.clone();
        current.metadata.phase = Phase::TearingDown;
        current.metadata.updated = Utc::now();
        current.metadata.version = Some(current.metadata.version.unwrap_or(0) + 1);
        let snapshot = current.clone();
        drop(guard);
        self.hub
            .publish(pointer.clone(), EventKind::Updated, snapshot.clone(), Some(old))
            .await;
        Ok(snapshot)
    }

    async fn destroy(&self, pointer: &Pointer) -> Result<(), StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let mut guard = shard.write().await;
        let current = guard
            .resources
            .get(pointer)
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))?;

        if current.metadata.phase != Phase::TearingDown {
            return Err(StoreError::PhaseViolation {
                pointer: pointer.clone(),
                phase: current.metadata.phase.to_string(),
            });
        }
        if !current.metadata.finalizers.is_empty() {
            return Err(StoreError::HasFinalizers(pointer.clone()));
        }

        let removed = guard.resources.remove(pointer).expect("checked present above");
        drop(guard);
        self.hub
            .publish(pointer.clone(), EventKind::Destroyed, removed.clone(), Some(removed))
            .await;
        Ok(())
    }

    async fn add_finalizer(&self, pointer: &Pointer, finalizer: &str) -> Result<AnyResource, StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let mut guard = shard.write().await;
        let current = guard
            .resources
            .get_mut(pointer)
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))?;
        let old = current.clone();
        current.metadata.finalizers.insert(finalizer.to_string());
        current.metadata.version = Some(current.metadata.version.unwrap_or(0) + 1);
        let snapshot = current.clone();
        drop(guard);
        self.hub
            .publish(pointer.clone(), EventKind::Updated, snapshot.clone(), Some(old))
            .await;
        Ok(snapshot)
    }

    async fn remove_finalizer(&self, pointer: &Pointer, finalizer: &str) -> Result<AnyResource, StoreError> {
        let shard = self.shard_for(&pointer.resource_type, &pointer.namespace).await;
        let mut guard = shard.write().await;
        let current = guard
            .resources
            .get_mut(pointer)
            .ok_or_else(|| StoreError::NotFound(pointer.clone()))?;
        let old = current.clone();
        current.metadata.finalizers.remove(finalizer);
        current.metadata.version = Some(current.metadata.version.unwrap_or(0) + 1);
        let snapshot = current.clone();
        drop(guard);
        self.hub
            .publish(pointer.clone(), EventKind::Updated, snapshot.clone(), Some(old))
            .await;
        Ok(snapshot)
    }

    async fn watch(&self, request: WatchRequest) -> Result<ReceiverStream<Event>, StoreError> {
        let shard = self.shard_for(&request.resource_type, &request.namespace).await;
        let guard = shard.read().await;
        let snapshot: Vec<AnyResource> = guard.resources.values().cloned().collect();
        let stream = self.hub.subscribe(request, snapshot).await;
        drop(guard);
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicore_domain::{LabelSelector, Metadata};
    use tokio_stream::StreamExt;

    fn make(id: &str) -> AnyResource {
        AnyResource {
            pointer: Pointer::new("Cluster", "default", id),
            metadata: Metadata::new("test-controller"),
            spec: serde_json::json!({"talos_version": "v1.7.0"}),
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryStore::new();
        let created = store.create(make("c1")).await.unwrap();
        assert_eq!(created.metadata.version, Some(1));

        let fetched = store.get(&Pointer::new("Cluster", "default", "c1")).await.unwrap();
        assert_eq!(fetched.metadata.version, Some(1));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();
        let err = store.create(make("c1")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();
        let pointer = Pointer::new("Cluster", "default", "c1");
        let err = store.update(&pointer, Some(99), make("c1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_with_correct_version_succeeds_and_bumps() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();
        let pointer = Pointer::new("Cluster", "default", "c1");
        let updated = store.update(&pointer, Some(1), make("c1")).await.unwrap();
        assert_eq!(updated.metadata.version, Some(2));
    }

    #[tokio::test]
    async fn destroy_requires_teardown_first() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();
        let pointer = Pointer::new("Cluster", "default", "c1");
        let err = store.destroy(&pointer).await.unwrap_err();
        assert!(matches!(err, StoreError::PhaseViolation { .. }));
    }

    #[tokio::test]
    async fn destroy_requires_finalizers_cleared() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();
        let pointer = Pointer::new("Cluster", "default", "c1");
        store.add_finalizer(&pointer, "omni/owner").await.unwrap();
        store.teardown(&pointer).await.unwrap();
        let err = store.destroy(&pointer).await.unwrap_err();
        assert!(matches!(err, StoreError::HasFinalizers(_)));

        store.remove_finalizer(&pointer, "omni/owner").await.unwrap();
        store.destroy(&pointer).await.unwrap();
        assert!(matches!(store.get(&pointer).await.unwrap_err(), StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn watch_replays_backlog_then_bootstraps_then_goes_live() {
        let store = InMemoryStore::new();
        store.create(make("c1")).await.unwrap();

        let mut stream = store
            .watch(WatchRequest {
                resource_type: "Cluster".into(),
                namespace: "default".into(),
                selector: vec![],
                tail_from: Some(0).map(|_| 0),
            })
            .await
            .unwrap();

        // tail_from(0) replays the backlog starting after offset 0; the
        // create event was offset 0, so nothing is replayed before bootstrap.
        // A tail_from watch is not "fresh", so no synthetic Created events
        // are emitted ahead of the replayed backlog, but total still
        // reflects the one resource currently in scope.
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Event::Bootstrapped { total: 1 }));

        let pointer = Pointer::new("Cluster", "default", "c1");
        store.add_finalizer(&pointer, "x").await.unwrap();

        let second = stream.next().await.unwrap();
        match second {
            Event::Resource { kind, .. } => assert_eq!(kind, EventKind::Updated),
            other => panic!("expected Resource event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn watch_filters_by_selector() {
        let store = InMemoryStore::new();
        let mut labeled = make("c1");
        labeled.metadata.labels.insert("tier".into(), "prod".into());
        store.create(labeled).await.unwrap();
        store.create(make("c2")).await.unwrap();

        let mut stream = store
            .watch(WatchRequest {
                resource_type: "Cluster".into(),
                namespace: "default".into(),
                selector: vec![LabelSelector::equals("tier", "prod")],
                tail_from: None,
            })
            .await
            .unwrap();

        // A fresh (tail_from: None) watch synthesizes a Created event for
        // every resource already matching the selector before bootstrap.
        let p1 = Pointer::new("Cluster", "default", "c1");
        let p2 = Pointer::new("Cluster", "default", "c2");

        let first = stream.next().await.unwrap();
        match first {
            Event::Resource { pointer, kind, .. } => {
                assert_eq!(pointer, p1);
                assert_eq!(kind, EventKind::Created);
            }
            other => panic!("expected synthetic Created event for c1, got {other:?}"),
        }

        let second = stream.next().await.unwrap();
        assert!(matches!(second, Event::Bootstrapped { total: 1 }));

        store.add_finalizer(&p2, "x").await.unwrap();
        store.add_finalizer(&p1, "x").await.unwrap();

        let next = stream.next().await.unwrap();
        match next {
            Event::Resource { pointer, .. } => assert_eq!(pointer, p1),
            other => panic!("expected Resource event for c1, got {other:?}"),
        }
    }
}
