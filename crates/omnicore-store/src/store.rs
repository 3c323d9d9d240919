use async_trait::async_trait;
use omnicore_domain::{AnyResource, LabelSelector, Namespace, Pointer, ResourceType};

use crate::error::StoreError;
use crate::watch::{Event, WatchRequest};

/// Narrows and paginates a `list` call: label selectors, a free-text search
/// against the resource id, an offset/limit page, and an optional sort.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub label_selectors: Vec<LabelSelector>,
    /// Case-insensitive substring match against the resource id.
    pub search: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
    /// `"id"`, `"created"`, `"updated"`, `"version"`, `"phase"`, or any other
    /// value is looked up as a top-level key of the resource's `spec`.
    /// Defaults to `"id"` when absent.
    pub sort_field: Option<String>,
    pub sort_descending: bool,
}

/// Filter, sort, and paginate an already type/namespace-scoped resource set.
/// Shared by every [`ResourceStore`] backend so `list` pagination semantics
/// stay identical regardless of where the resources came from.
pub(crate) fn apply_filter(resources: Vec<AnyResource>, filter: &ListFilter) -> (Vec<AnyResource>, usize) {
    let mut matched: Vec<AnyResource> = resources
        .into_iter()
        .filter(|r| omnicore_domain::matches_all(&filter.label_selectors, &r.metadata.labels))
        .filter(|r| match &filter.search {
            Some(needle) => r.pointer.id.as_str().to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        })
        .collect();

    let total = matched.len();

    let field = filter.sort_field.as_deref().unwrap_or("id");
    matched.sort_by(|a, b| {
        let ord = sort_key(a, field).cmp(&sort_key(b, field));
        let ord = if filter.sort_descending { ord.reverse() } else { ord };
        ord.then_with(|| a.pointer.id.as_str().cmp(b.pointer.id.as_str()))
    });

    let page = matched.into_iter().skip(filter.offset).take(filter.limit.unwrap_or(usize::MAX)).collect();
    (page, total)
}

fn sort_key(resource: &AnyResource, field: &str) -> String {
    match field {
        "id" => resource.pointer.id.as_str().to_string(),
        "created" => resource.metadata.created.to_rfc3339(),
        "updated" => resource.metadata.updated.to_rfc3339(),
        "version" => format!("{:020}", resource.metadata.version.unwrap_or(0)),
        "phase" => resource.metadata.phase.to_string(),
        other => resource.spec.get(other).map(|v| v.to_string()).unwrap_or_default(),
    }
}

/// The resource store: typed, versioned, labeled resources with optimistic
/// concurrency and finalizer-gated teardown.
///
/// Implementations must guarantee per-`Pointer` linearizability: concurrent
/// writers racing on the same pointer observe a total order, and a successful
/// write is visible to every subsequent read and to the watch fan-out before
/// the write call returns.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    async fn get(&self, pointer: &Pointer) -> Result<AnyResource, StoreError>;

    /// Returns the page of matching resources and the total count that
    /// matched before `filter.offset`/`filter.limit` were applied.
    async fn list(
        &self,
        resource_type: &ResourceType,
        namespace: &Namespace,
        filter: ListFilter,
    ) -> Result<(Vec<AnyResource>, usize), StoreError>;

    /// Create a brand-new resource. Fails with [`StoreError::AlreadyExists`]
    /// if the pointer is already occupied.
    async fn create(&self, resource: AnyResource) -> Result<AnyResource, StoreError>;

    /// Replace the spec/metadata of an existing resource.
    ///
    /// `expected_version` implements optimistic concurrency: `Some(v)`
    /// requires the stored resource's current version to equal `v`, else
    /// [`StoreError::Conflict`]. `None` always succeeds (last-writer-wins),
    /// for callers that have already reconciled drift.
    async fn update(
        &self,
        pointer: &Pointer,
        expected_version: Option<u64>,
        desired: AnyResource,
    ) -> Result<AnyResource, StoreError>;

    /// Begin teardown: transitions the resource to `Phase::TearingDown`.
    /// Idempotent if the resource is already tearing down. Fails with
    /// [`StoreError::PhaseViolation`] only if the store tracks a phase that
    /// forbids re-entering teardown (none currently do; reserved for future
    /// phases).
    async fn teardown(&self, pointer: &Pointer) -> Result<AnyResource, StoreError>;

    /// Remove the resource permanently. Fails with
    /// [`StoreError::HasFinalizers`] unless the finalizer set is empty, and
    /// with [`StoreError::PhaseViolation`] unless the resource is already
    /// `TearingDown`.
    async fn destroy(&self, pointer: &Pointer) -> Result<(), StoreError>;

    async fn add_finalizer(&self, pointer: &Pointer, finalizer: &str) -> Result<AnyResource, StoreError>;

    /// Remove `finalizer`. A no-op (not an error) if the finalizer was never
    /// present — the last owner to release its hold wins regardless of
    /// ordering.
    async fn remove_finalizer(&self, pointer: &Pointer, finalizer: &str) -> Result<AnyResource, StoreError>;

    /// Subscribe to a live, filtered event feed. See [`crate::watch`] for the
    /// framing and ordering guarantees.
    async fn watch(&self, request: WatchRequest) -> Result<tokio_stream::wrappers::ReceiverStream<Event>, StoreError>;
}
