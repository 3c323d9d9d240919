use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::select_all;
use futures::FutureExt;
use omnicore_domain::{Namespace, Pointer};
use omnicore_store::{Event, ResourceStore, WatchRequest};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::{backoff_delay, jitter_for};
use crate::controller::{QController, ReconcileContext};
use crate::error::RuntimeError;
use crate::types::{InputKind, InputSpec, ReconcileResult};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Namespace this runtime instance reconciles. A separate [`Runtime`] (or
    /// an outer per-namespace dispatcher) is needed to cover more than one.
    pub namespace: Namespace,
    /// Per-controller concurrency cap; a controller never has more than this
    /// many reconciles in flight at once.
    pub max_concurrent_reconciles: usize,
}

/// Hosts one or more [`QController`]s, driving each from its primary input's
/// watch feed with bounded concurrency, per-resource no-overlap, backoff on
/// error, and requeue-after-duration support.
pub struct Runtime {
    store: Arc<dyn ResourceStore>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(store: Arc<dyn ResourceStore>, config: RuntimeConfig) -> Self {
        Self { store, config }
    }

    /// Run a single controller until `shutdown` is cancelled or one of its
    /// watch streams ends. Intended to be spawned once per registered
    /// controller by the caller (the server binary), so one controller
    /// panicking in its driver loop never takes down another.
    ///
    /// Subscribes to every input the controller declares (`Primary` plus any
    /// `Mapped`/`MappedDestroyReady` inputs), merges them into a single
    /// stream, and dispatches each event through [`dispatch`] to get the
    /// primary pointers that should reconcile — the pointer itself for a
    /// `Primary` event, or whatever [`QController::map`] returns for a
    /// secondary one.
    pub async fn run_controller(
        &self,
        controller: Arc<dyn QController>,
        shutdown: CancellationToken,
    ) -> Result<(), RuntimeError> {
        let inputs = controller.inputs();
        if !inputs.iter().any(|i| i.kind == InputKind::Primary) {
            return Err(RuntimeError::Internal(format!(
                "controller '{}' declares no Primary input",
                controller.name()
            )));
        }

        info!(controller = controller.name(), inputs = inputs.len(), "starting controller");

        let mut tagged_streams = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let watch_stream = self
                .store
                .watch(WatchRequest {
                    resource_type: input.resource_type.clone(),
                    namespace: self.config.namespace.clone(),
                    selector: vec![],
                    tail_from: None,
                })
                .await?;
            let tagged_input = input.clone();
            tagged_streams.push(Box::pin(
                watch_stream.map(move |event| (tagged_input.clone(), event)),
            ) as std::pin::Pin<Box<dyn tokio_stream::Stream<Item = (InputSpec, Event)> + Send>>);
        }
        let mut merged = select_all(tagged_streams);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_reconciles));
        let inflight: Arc<Mutex<HashMap<Pointer, Arc<Mutex<()>>>>> = Arc::new(Mutex::new(HashMap::new()));
        let failures: Arc<Mutex<HashMap<Pointer, u32>>> = Arc::new(Mutex::new(HashMap::new()));
        let (requeue_tx, mut requeue_rx) = mpsc::channel::<Pointer>(1024);

        loop {
            let pointers = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(controller = controller.name(), "controller shutting down");
                    break;
                }
                tagged = merged.next() => {
                    match tagged {
                        Some((input, event)) => dispatch(controller.as_ref(), &input, event),
                        None => {
                            warn!(controller = controller.name(), "watch stream ended");
                            break;
                        }
                    }
                }
                Some(pointer) = requeue_rx.recv() => vec![pointer],
            };

            for pointer in pointers {
                let ctx = ReconcileContext::new(self.store.clone());
                let controller = controller.clone();
                let semaphore = semaphore.clone();
                let inflight = inflight.clone();
                let failures = failures.clone();
                let requeue_tx = requeue_tx.clone();

                tokio::spawn(async move {
                    let permit = match semaphore.acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => return,
                    };

                    let id_lock = {
                        let mut guard = inflight.lock().await;
                        guard
                            .entry(pointer.clone())
                            .or_insert_with(|| Arc::new(Mutex::new(())))
                            .clone()
                    };
                    let _id_guard = id_lock.lock().await;

                    let name = controller.name().to_string();
                    let outcome = AssertUnwindSafe(controller.reconcile(&ctx, &pointer))
                        .catch_unwind()
                        .await;

                    match outcome {
                        Ok(ReconcileResult::Ok) => {
                            failures.lock().await.remove(&pointer);
                            debug!(controller = %name, pointer = %pointer, "reconcile ok");
                        }
                        Ok(ReconcileResult::Requeue(delay)) => {
                            failures.lock().await.remove(&pointer);
                            debug!(controller = %name, pointer = %pointer, ?delay, "reconcile requested requeue");
                            schedule_requeue(requeue_tx, pointer.clone(), delay);
                        }
                        Ok(ReconcileResult::Err(err)) => {
                            let failure_count = {
                                let mut guard = failures.lock().await;
                                let count = guard.entry(pointer.clone()).or_insert(0);
                                *count += 1;
                                *count
                            };
                            let delay = backoff_delay(failure_count, jitter_for(&pointer));
                            warn!(controller = %name, pointer = %pointer, error = %err, failure_count, ?delay, "reconcile failed, backing off");
                            schedule_requeue(requeue_tx, pointer.clone(), delay);
                        }
                        Err(_panic) => {
                            error!(controller = %name, pointer = %pointer, "reconcile panicked");
                            let failure_count = {
                                let mut guard = failures.lock().await;
                                let count = guard.entry(pointer.clone()).or_insert(0);
                                *count += 1;
                                *count
                            };
                            let delay = backoff_delay(failure_count, jitter_for(&pointer));
                            schedule_requeue(requeue_tx, pointer.clone(), delay);
                        }
                    }

                    drop(permit);
                    // Drop the per-id lock map entry once nothing references it
                    // beyond this task and the map itself, so the map doesn't
                    // grow unbounded across a long-running process.
                    let mut guard = inflight.lock().await;
                    if let Some(entry) = guard.get(&pointer) {
                        if Arc::strong_count(entry) == 1 {
                            guard.remove(&pointer);
                        }
                    }
                });
            }
        }

        Ok(())
    }
}

/// Resolve one merged-stream event to the primary pointers that should
/// reconcile. `Bootstrapped` never dispatches anything. A `Primary` event
/// reconciles its own pointer; a secondary-input event is handed to
/// [`QController::map`].
fn dispatch(controller: &dyn QController, input: &InputSpec, event: Event) -> Vec<Pointer> {
    match (&input.kind, &event) {
        (InputKind::Primary, Event::Resource { pointer, .. }) => vec![pointer.clone()],
        (InputKind::Primary, Event::Bootstrapped { .. }) => Vec::new(),
        (InputKind::Mapped | InputKind::MappedDestroyReady, Event::Bootstrapped { .. }) => Vec::new(),
        (InputKind::Mapped | InputKind::MappedDestroyReady, Event::Resource { .. }) => {
            controller.map(&event, input)
        }
    }
}

fn schedule_requeue(tx: mpsc::Sender<Pointer>, pointer: Pointer, delay: std::time::Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(pointer).await;
    });
}
