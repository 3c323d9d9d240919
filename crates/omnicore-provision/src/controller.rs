use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use omnicore_domain::{
    AnyResource, ConnectionParams, MachineRequest, MachineRequestStage, MachineRequestStatus, Metadata, Phase,
    Pointer, ResourceType, LABEL_MACHINE_INFRA_ID,
};
use omnicore_runtime::{InputKind, InputSpec, OutputSpec, QController, ReconcileContext, ReconcileResult};
use omnicore_store::{Event, ResourceStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::context::{ProvisionContext, StepOutcome};
use crate::error::ProvisionError;
use crate::ProvisionProvider;

const MACHINE_REQUEST_TYPE: &str = "MachineRequest";
const STATUS_TYPE: &str = "MachineRequestStatus";
const CONNECTION_PARAMS_TYPE: &str = "ConnectionParams";
const CONNECTION_PARAMS_ID: &str = "singleton";

/// Generic provisioning controller: owns `MachineRequestStatus` exclusively
/// and a provider-specific state resource of type `T`, driving `P`'s steps
/// to completion and tearing both down when the `MachineRequest` is torn
/// down.
pub struct ProvisionController<T, P> {
    name: String,
    provider: P,
    provider_state_type: ResourceType,
    finalizer: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, P> ProvisionController<T, P>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    P: ProvisionProvider<T>,
{
    pub fn new(name: impl Into<String>, provider: P, provider_state_type: impl Into<ResourceType>) -> Self {
        let name = name.into();
        let finalizer = format!("omnicore-provision/{name}");
        Self { name, provider, provider_state_type: provider_state_type.into(), finalizer, _marker: PhantomData }
    }

    fn status_pointer(&self, pointer: &Pointer) -> Pointer {
        Pointer::new(STATUS_TYPE, pointer.namespace.clone(), pointer.id.clone())
    }

    fn state_pointer(&self, pointer: &Pointer) -> Pointer {
        Pointer::new(self.provider_state_type.clone(), pointer.namespace.clone(), pointer.id.clone())
    }

    fn connection_params_pointer(&self, pointer: &Pointer) -> Pointer {
        Pointer::new(CONNECTION_PARAMS_TYPE, pointer.namespace.clone(), CONNECTION_PARAMS_ID)
    }

    async fn reconcile_running(
        &self,
        store: &Arc<dyn ResourceStore>,
        pointer: &Pointer,
        request_any: AnyResource,
    ) -> Result<ReconcileResult, ProvisionError> {
        if !request_any.metadata.finalizers.contains(&self.finalizer) {
            store.add_finalizer(pointer, &self.finalizer).await?;
            return Ok(ReconcileResult::Ok);
        }

        let connection_params = match store.get(&self.connection_params_pointer(pointer)).await {
            Ok(any) => any.typed::<ConnectionParams>()?.spec,
            Err(StoreError::NotFound(_)) => {
                return Ok(ReconcileResult::Requeue(Duration::from_secs(5)));
            }
            Err(e) => return Err(e.into()),
        };

        let status_ptr = self.status_pointer(pointer);
        let mut status_any = match store.get(&status_ptr).await {
            Ok(any) => any,
            Err(StoreError::NotFound(_)) => {
                let metadata = Metadata::new(self.name.clone()).with_labels(request_any.metadata.labels.clone());
                let any = AnyResource {
                    pointer: status_ptr.clone(),
                    metadata,
                    spec: serde_json::to_value(MachineRequestStatus::provisioning())?,
                };
                store.create(any).await?
            }
            Err(e) => return Err(e.into()),
        };

        let state_ptr = self.state_pointer(pointer);
        let mut state_any = match store.get(&state_ptr).await {
            Ok(any) => any,
            Err(StoreError::NotFound(_)) => {
                let any = AnyResource {
                    pointer: state_ptr.clone(),
                    metadata: Metadata::new(self.name.clone()),
                    spec: serde_json::to_value(T::default())?,
                };
                store.create(any).await?
            }
            Err(e) => return Err(e.into()),
        };

        let request: MachineRequest = request_any.clone().typed()?.spec;
        let mut state: T = serde_json::from_value(state_any.spec.clone())?;

        let mut prov_ctx = ProvisionContext::new(request, connection_params, store.clone());

        for step in self.provider.provision_steps() {
            match step.run(&mut prov_ctx, &mut state).await {
                StepOutcome::Ok => continue,
                StepOutcome::Retry(delay) => {
                    state_any.spec = serde_json::to_value(&state)?;
                    store.update(&state_ptr, state_any.metadata.version, state_any).await?;
                    return Ok(ReconcileResult::Requeue(delay));
                }
                StepOutcome::Err(err) => {
                    warn!(controller = %self.name, pointer = %pointer, step_error = %err, "provision step failed");
                    status_any.spec = serde_json::to_value(MachineRequestStatus {
                        stage: MachineRequestStage::Failed,
                        id: None,
                        error: Some(err.to_string()),
                    })?;
                    store.update(&status_ptr, status_any.metadata.version, status_any).await?;
                    state_any.spec = serde_json::to_value(&state)?;
                    store.update(&state_ptr, state_any.metadata.version, state_any).await?;
                    // Terminal for this reconcile: the failure is recorded on
                    // status and observable via watch, not surfaced as a
                    // runtime-level error.
                    return Ok(ReconcileResult::Ok);
                }
            }
        }

        state_any.spec = serde_json::to_value(&state)?;
        let state_any = store.update(&state_ptr, state_any.metadata.version, state_any).await?;

        if let Some(infra_id) = prov_ctx.outputs().get("machineInfraID") {
            let mut labeled = state_any.clone();
            labeled.metadata.labels.insert(LABEL_MACHINE_INFRA_ID.to_string(), infra_id.clone());
            store.update(&state_ptr, labeled.metadata.version, labeled).await?;
        }

        status_any.spec = serde_json::to_value(MachineRequestStatus {
            stage: MachineRequestStage::Provisioned,
            id: prov_ctx.outputs().get("machineUUID").cloned(),
            error: None,
        })?;
        store.update(&status_ptr, status_any.metadata.version, status_any).await?;

        info!(controller = %self.name, pointer = %pointer, "provisioning complete");
        Ok(ReconcileResult::Ok)
    }

    async fn reconcile_tearing_down(
        &self,
        store: &Arc<dyn ResourceStore>,
        pointer: &Pointer,
        request_any: AnyResource,
    ) -> Result<ReconcileResult, ProvisionError> {
        let state_ptr = self.state_pointer(pointer);
        let state_any = match store.get(&state_ptr).await {
            Ok(any) => Some(any),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(state_any) = state_any {
            let request: MachineRequest = request_any.clone().typed()?.spec;
            let state: T = serde_json::from_value(state_any.spec.clone())?;

            let connection_params = match store.get(&self.connection_params_pointer(pointer)).await {
                Ok(any) => any.typed::<ConnectionParams>()?.spec,
                Err(StoreError::NotFound(_)) => ConnectionParams { api_url: String::new(), join_token: None },
                Err(e) => return Err(e.into()),
            };

            let prov_ctx = ProvisionContext::new(request.clone(), connection_params, store.clone());
            self.provider.deprovision(&prov_ctx, &state, &request).await?;

            match store.teardown(&state_ptr).await {
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            match store.destroy(&state_ptr).await {
                Ok(()) | Err(StoreError::NotFound(_)) | Err(StoreError::HasFinalizers(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let status_ptr = self.status_pointer(pointer);
        match store.teardown(&status_ptr).await {
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        match store.destroy(&status_ptr).await {
            Ok(()) | Err(StoreError::NotFound(_)) | Err(StoreError::HasFinalizers(_)) => {}
            Err(e) => return Err(e.into()),
        }

        store.remove_finalizer(pointer, &self.finalizer).await?;
        info!(controller = %self.name, pointer = %pointer, "teardown complete");
        Ok(ReconcileResult::Ok)
    }
}

#[async_trait]
impl<T, P> QController for ProvisionController<T, P>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    P: ProvisionProvider<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::primary(MACHINE_REQUEST_TYPE),
            InputSpec::mapped_destroy_ready(self.provider_state_type.clone()),
            InputSpec::mapped(CONNECTION_PARAMS_TYPE),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::exclusive(STATUS_TYPE), OutputSpec::shared(self.provider_state_type.clone())]
    }

    async fn reconcile(&self, ctx: &ReconcileContext, pointer: &Pointer) -> ReconcileResult {
        let request_any = match ctx.store.get(pointer).await {
            Ok(any) => any,
            Err(e) => return ReconcileResult::Err(e.into()),
        };

        let outcome = match request_any.metadata.phase {
            Phase::Running => self.reconcile_running(&ctx.store, pointer, request_any).await,
            Phase::TearingDown => self.reconcile_tearing_down(&ctx.store, pointer, request_any).await,
        };

        match outcome {
            Ok(result) => result,
            Err(err) => ReconcileResult::Err(err.into()),
        }
    }

    fn map(&self, event: &Event, input: &InputSpec) -> Vec<Pointer> {
        match input.kind {
            // The provider-state resource shares its id with the
            // MachineRequest that owns it, so the owning pointer can be
            // derived without a store lookup. Only dispatch once the state
            // has actually reached TearingDown with no finalizers of its
            // own left — matching this input's "destroy ready" contract.
            InputKind::MappedDestroyReady => match event {
                Event::Resource { pointer, resource, .. }
                    if resource.metadata.phase == Phase::TearingDown
                        && resource.metadata.finalizers.is_empty() =>
                {
                    vec![Pointer::new(MACHINE_REQUEST_TYPE, pointer.namespace.clone(), pointer.id.clone())]
                }
                _ => Vec::new(),
            },
            // ConnectionParams is a namespace-wide singleton: there is no
            // way to derive "every MachineRequest that should reconcile"
            // from the event alone. `reconcile_running` already requeues
            // every 5s while ConnectionParams is missing, so a request
            // self-heals once it becomes available instead of depending on
            // this mapping.
            InputKind::Mapped => Vec::new(),
            InputKind::Primary => Vec::new(),
        }
    }
}
