use std::sync::Arc;

use async_trait::async_trait;
use omnicore_domain::Pointer;
use omnicore_store::{Event, ResourceStore};

use crate::types::{InputSpec, OutputSpec, ReconcileResult};

/// Handed to every reconcile call. Thin wrapper around the shared store so
/// controllers never hold their own connection/lock state.
#[derive(Clone)]
pub struct ReconcileContext {
    pub store: Arc<dyn ResourceStore>,
}

impl ReconcileContext {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

/// A controller reconciling one primary resource type.
///
/// `inputs`/`outputs` are declarative metadata the [`crate::Runtime`] and the
/// `DependencyGraph` RPC use to wire watches and render the dependency graph
/// — they are not enforced at the type level, but a controller that writes a
/// resource type outside its declared `outputs` is a bug.
#[async_trait]
pub trait QController: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn inputs(&self) -> Vec<InputSpec>;

    fn outputs(&self) -> Vec<OutputSpec>;

    /// Reconcile the resource at `pointer`, whose declared primary input
    /// type this controller owns.
    async fn reconcile(&self, ctx: &ReconcileContext, pointer: &Pointer) -> ReconcileResult;

    /// Translate an event on a `Mapped`/`MappedDestroyReady` input into the
    /// primary pointers that should reconcile as a result. Called by
    /// [`crate::Runtime`] for every secondary-input event; never called for
    /// `Primary` events, which reconcile their own pointer directly.
    ///
    /// Default: no mapping. A controller that declares only a `Primary`
    /// input has nothing to override here.
    fn map(&self, _event: &Event, _input: &InputSpec) -> Vec<Pointer> {
        Vec::new()
    }
}
