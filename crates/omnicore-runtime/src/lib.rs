mod backoff;
mod controller;
pub mod error;
mod runtime;
mod types;

pub use backoff::backoff_delay;
pub use controller::{QController, ReconcileContext};
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeConfig};
pub use types::{InputKind, InputSpec, OutputKind, OutputSpec, ReconcileResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use omnicore_domain::{AnyResource, Metadata, Pointer};
    use omnicore_store::{InMemoryStore, ResourceStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct CountingController {
        seen: Arc<AtomicUsize>,
        fail_until: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QController for CountingController {
        fn name(&self) -> &str {
            "counting-controller"
        }

        fn inputs(&self) -> Vec<InputSpec> {
            vec![InputSpec::primary("Cluster")]
        }

        fn outputs(&self) -> Vec<OutputSpec> {
            vec![]
        }

        async fn reconcile(&self, _ctx: &ReconcileContext, _pointer: &Pointer) -> ReconcileResult {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until.load(Ordering::SeqCst) {
                return ReconcileResult::err("not ready yet");
            }
            ReconcileResult::Ok
        }
    }

    fn make_resource(id: &str) -> AnyResource {
        AnyResource {
            pointer: Pointer::new("Cluster", "default", id),
            metadata: Metadata::new("test"),
            spec: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn controller_reconciles_on_create_event() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let controller = Arc::new(CountingController {
            seen: seen.clone(),
            fail_until: Arc::new(AtomicUsize::new(0)),
        });

        let runtime = Runtime::new(
            store.clone(),
            RuntimeConfig { namespace: "default".into(), max_concurrent_reconciles: 4 },
        );

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move { runtime.run_controller(controller, shutdown_clone).await });

        store.create(make_resource("c1")).await.unwrap();

        // Give the spawned reconcile task a chance to run.
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert!(seen.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn failing_reconcile_is_retried_via_requeue() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let controller = Arc::new(CountingController {
            seen: seen.clone(),
            fail_until: Arc::new(AtomicUsize::new(1)),
        });

        let runtime = Runtime::new(
            store.clone(),
            RuntimeConfig { namespace: "default".into(), max_concurrent_reconciles: 4 },
        );

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move { runtime.run_controller(controller, shutdown_clone).await });

        store.create(make_resource("c1")).await.unwrap();

        // First attempt fails, backoff requeues it; wait long enough for the
        // minimum backoff delay (500ms) plus margin to observe the retry.
        tokio::time::sleep(Duration::from_millis(800)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert!(seen.load(Ordering::SeqCst) >= 2);
    }
}
