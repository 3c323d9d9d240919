//! Example provider demonstrating the schematic-id HTTP call named in the
//! runtime's external-RPC convention: a single step posts the requested
//! extensions/kernel args to an image-factory-style endpoint and stores the
//! schematic id it returns.

use std::time::Duration;

use async_trait::async_trait;
use omnicore_domain::MachineRequest;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::{ProvisionContext, ProvisionStep, StepOutcome};
use crate::error::ProvisionError;
use crate::schematic::{compute_schematic_id, SchematicInput};
use crate::ProvisionProvider;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageFactoryState {
    pub schematic_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchematicResponse {
    id: String,
}

pub struct SchematicIdStep {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl SchematicIdStep {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ProvisionStep<ImageFactoryState> for SchematicIdStep {
    fn name(&self) -> &'static str {
        "schematic-id"
    }

    async fn run(&self, ctx: &mut ProvisionContext, state: &mut ImageFactoryState) -> StepOutcome {
        let input = SchematicInput {
            extensions: ctx.request.extensions.clone(),
            kernel_args: ctx.request.kernel_args.clone(),
            meta_values: ctx.request.meta_values.clone(),
            talos_version: ctx.request.talos_version.clone(),
            connection_params: Some(ctx.connection_params.clone()),
        };

        // Locally computed so the request body is bit-identical to whatever
        // the remote factory would derive on its own.
        let local_id = ctx.compute_schematic_id(&input);

        let url = format!("{}/schematics", self.base_url);
        let request = self.client.post(&url).json(&serde_json::json!({ "customization": input_to_json(&input) }));

        let response = match tokio::time::timeout(RPC_TIMEOUT, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return StepOutcome::Err(e.into()),
            Err(_) => return StepOutcome::Retry(Duration::from_secs(1)),
        };

        let parsed: SchematicResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return StepOutcome::Err(e.into()),
        };

        if parsed.id != local_id {
            warn!(local = %local_id, remote = %parsed.id, "schematic id returned by factory does not match local computation");
        }

        state.schematic_id = Some(parsed.id.clone());
        ctx.publish("machineUUID", &parsed.id);
        ctx.publish("machineInfraID", &parsed.id);
        StepOutcome::Ok
    }
}

fn input_to_json(input: &SchematicInput) -> serde_json::Value {
    serde_json::json!({
        "extensions": input.extensions,
        "kernel_args": input.kernel_args,
        "meta_values": input.meta_values,
        "talos_version": input.talos_version,
    })
}

pub struct ImageFactoryProvider {
    pub base_url: String,
}

#[async_trait]
impl ProvisionProvider<ImageFactoryState> for ImageFactoryProvider {
    fn provision_steps(&self) -> Vec<Box<dyn ProvisionStep<ImageFactoryState>>> {
        vec![Box::new(SchematicIdStep::new(self.base_url.clone()))]
    }

    async fn deprovision(
        &self,
        _ctx: &ProvisionContext,
        _state: &ImageFactoryState,
        _request: &MachineRequest,
    ) -> Result<(), ProvisionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use omnicore_domain::{AnyResource, ConnectionParams, Metadata, Pointer};
    use omnicore_store::{InMemoryStore, ResourceStore};
    use omnicore_runtime::{QController, ReconcileContext, ReconcileResult};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::ProvisionController;

    use super::*;

    #[tokio::test]
    async fn schematic_step_stores_id_from_factory_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/schematics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "abc123" })))
            .mount(&server)
            .await;

        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        store
            .create(AnyResource {
                pointer: Pointer::new("ConnectionParams", "default", "singleton"),
                metadata: Metadata::new("test-harness"),
                spec: serde_json::to_value(ConnectionParams {
                    api_url: "https://omni.example".into(),
                    join_token: Some("tok".into()),
                })
                .unwrap(),
            })
            .await
            .unwrap();

        let request = store
            .create(AnyResource {
                pointer: Pointer::new("MachineRequest", "default", "m1"),
                metadata: Metadata::new("test-user"),
                spec: serde_json::to_value(MachineRequest {
                    infra_provider_id: "test".into(),
                    extensions: vec!["siderolabs/qemu-guest-agent".into()],
                    kernel_args: vec![],
                    meta_values: Default::default(),
                    talos_version: "v1.7.0".into(),
                })
                .unwrap(),
            })
            .await
            .unwrap();

        let controller = ProvisionController::new(
            "image-factory-provision",
            ImageFactoryProvider { base_url: server.uri() },
            "ImageFactoryState",
        );
        let ctx = ReconcileContext::new(store.clone());

        controller.reconcile(&ctx, &request.pointer).await;
        let outcome = controller.reconcile(&ctx, &request.pointer).await;
        assert!(matches!(outcome, ReconcileResult::Ok));

        let state = store.get(&Pointer::new("ImageFactoryState", "default", "m1")).await.unwrap();
        let state: ImageFactoryState = serde_json::from_value(state.spec).unwrap();
        assert_eq!(state.schematic_id.as_deref(), Some("abc123"));
    }
}
