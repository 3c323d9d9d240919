mod context;
mod controller;
pub mod error;
pub mod image_factory;
pub mod join_token;
pub mod local;
mod schematic;

pub use context::{ProvisionContext, ProvisionProvider, ProvisionStep, StepOutcome};
pub use controller::ProvisionController;
pub use error::ProvisionError;
pub use join_token::JoinToken;
pub use schematic::{compute_schematic_id, SchematicInput};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use omnicore_domain::{AnyResource, ConnectionParams, MachineRequest, MachineRequestStage, Metadata, Pointer};
    use omnicore_store::{InMemoryStore, ResourceStore};
    use omnicore_runtime::{QController, ReconcileContext, ReconcileResult};

    use crate::local::{LocalProvider, StallingProvider};
    use crate::ProvisionController;

    fn request_resource(id: &str) -> AnyResource {
        AnyResource {
            pointer: Pointer::new("MachineRequest", "default", id),
            metadata: Metadata::new("test-user"),
            spec: serde_json::to_value(MachineRequest {
                infra_provider_id: "test".into(),
                extensions: vec![],
                kernel_args: vec![],
                meta_values: Default::default(),
                talos_version: "v1.7.0".into(),
            })
            .unwrap(),
        }
    }

    fn connection_params_resource() -> AnyResource {
        AnyResource {
            pointer: Pointer::new("ConnectionParams", "default", "singleton"),
            metadata: Metadata::new("test-harness"),
            spec: serde_json::to_value(ConnectionParams { api_url: "https://omni.example".into(), join_token: None })
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn running_phase_provisions_and_marks_status() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        store.create(connection_params_resource()).await.unwrap();
        let request = store.create(request_resource("m1")).await.unwrap();

        let controller = ProvisionController::new("local-provision", LocalProvider, "LocalMachineState");
        let ctx = ReconcileContext::new(store.clone());

        // First reconcile: adds the finalizer.
        let outcome = controller.reconcile(&ctx, &request.pointer).await;
        assert!(matches!(outcome, ReconcileResult::Ok));
        let after_finalizer = store.get(&request.pointer).await.unwrap();
        assert!(after_finalizer.metadata.finalizers.contains("omnicore-provision/local-provision"));

        // Second reconcile: runs the provider's steps to completion.
        let outcome = controller.reconcile(&ctx, &request.pointer).await;
        assert!(matches!(outcome, ReconcileResult::Ok));

        let status = store.get(&Pointer::new("MachineRequestStatus", "default", "m1")).await.unwrap();
        let status: MachineRequestStage =
            serde_json::from_value::<omnicore_domain::MachineRequestStatus>(status.spec).unwrap().stage;
        assert_eq!(status, MachineRequestStage::Provisioned);
    }

    #[tokio::test]
    async fn retry_outcome_requeues_without_failing() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        store.create(connection_params_resource()).await.unwrap();
        let request = store.create(request_resource("m2")).await.unwrap();

        let controller = ProvisionController::new("stalling-provision", StallingProvider, "LocalMachineState");
        let ctx = ReconcileContext::new(store.clone());

        controller.reconcile(&ctx, &request.pointer).await;
        let outcome = controller.reconcile(&ctx, &request.pointer).await;
        match outcome {
            ReconcileResult::Requeue(d) => assert_eq!(d, Duration::from_millis(50)),
            ReconcileResult::Ok => panic!("expected Requeue, got Ok"),
            ReconcileResult::Err(e) => panic!("expected Requeue, got Err: {e}"),
        }
    }

    #[tokio::test]
    async fn tearing_down_removes_finalizer_once_deprovisioned() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        store.create(connection_params_resource()).await.unwrap();
        let request = store.create(request_resource("m3")).await.unwrap();

        let controller = ProvisionController::new("local-provision", LocalProvider, "LocalMachineState");
        let ctx = ReconcileContext::new(store.clone());

        controller.reconcile(&ctx, &request.pointer).await;
        controller.reconcile(&ctx, &request.pointer).await;

        store.teardown(&request.pointer).await.unwrap();
        let outcome = controller.reconcile(&ctx, &request.pointer).await;
        assert!(matches!(outcome, ReconcileResult::Ok));

        let after = store.get(&request.pointer).await.unwrap();
        assert!(!after.metadata.finalizers.contains("omnicore-provision/local-provision"));
    }
}
