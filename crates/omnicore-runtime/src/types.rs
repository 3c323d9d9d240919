use std::time::Duration;

use omnicore_domain::ResourceType;

/// How a controller relates to one of its input resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The resource type this controller is keyed on — one reconcile per
    /// instance of this type.
    Primary,
    /// A related resource type the controller reads but does not own; an
    /// update to a mapped input requeues the owning primary resource.
    Mapped,
    /// Like `Mapped`, but the controller is additionally notified when a
    /// mapped resource becomes ready for destruction (`TearingDown` with no
    /// finalizers of its own) — used to sequence finalizer release across
    /// an ownership chain without back-pointers.
    MappedDestroyReady,
}

#[derive(Debug, Clone)]
pub struct InputSpec {
    pub resource_type: ResourceType,
    pub kind: InputKind,
}

impl InputSpec {
    pub fn primary(resource_type: impl Into<ResourceType>) -> Self {
        Self { resource_type: resource_type.into(), kind: InputKind::Primary }
    }

    pub fn mapped(resource_type: impl Into<ResourceType>) -> Self {
        Self { resource_type: resource_type.into(), kind: InputKind::Mapped }
    }

    pub fn mapped_destroy_ready(resource_type: impl Into<ResourceType>) -> Self {
        Self { resource_type: resource_type.into(), kind: InputKind::MappedDestroyReady }
    }
}

/// How a controller relates to one of its output resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// No other controller is permitted to write this resource type.
    Exclusive,
    /// Other controllers may also write this resource type (e.g. separate
    /// controllers each own disjoint label subsets).
    Shared,
}

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub resource_type: ResourceType,
    pub kind: OutputKind,
}

impl OutputSpec {
    pub fn exclusive(resource_type: impl Into<ResourceType>) -> Self {
        Self { resource_type: resource_type.into(), kind: OutputKind::Exclusive }
    }

    pub fn shared(resource_type: impl Into<ResourceType>) -> Self {
        Self { resource_type: resource_type.into(), kind: OutputKind::Shared }
    }
}

/// Outcome of a single reconcile call.
pub enum ReconcileResult {
    /// Reconcile succeeded; no further action needed until the next event.
    Ok,
    /// Reconcile succeeded but should run again after `Duration` even absent
    /// a new event (e.g. polling an external provisioner).
    Requeue(Duration),
    /// Reconcile failed; the runtime requeues with exponential backoff.
    Err(anyhow::Error),
}

impl ReconcileResult {
    pub fn err(message: impl Into<String>) -> Self {
        ReconcileResult::Err(anyhow::anyhow!(message.into()))
    }
}
