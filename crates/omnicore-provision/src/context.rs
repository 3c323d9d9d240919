use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use omnicore_domain::{ConnectionParams, MachineRequest};
use omnicore_store::ResourceStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProvisionError;
use crate::schematic::{compute_schematic_id, SchematicInput};

/// Outcome of a single provision step.
pub enum StepOutcome {
    Ok,
    /// Step is not done yet; the controller requeues after `Duration` without
    /// treating this as a failure (e.g. waiting on an async provider job).
    Retry(Duration),
    Err(anyhow::Error),
}

/// Handed to every step invocation. The only way a step observes the
/// in-flight request or writes values the controller later promotes onto
/// `MachineRequestStatus` and provider-state labels.
pub struct ProvisionContext {
    pub request: MachineRequest,
    pub connection_params: ConnectionParams,
    pub store: Arc<dyn ResourceStore>,
    outputs: BTreeMap<String, String>,
}

impl ProvisionContext {
    pub fn new(request: MachineRequest, connection_params: ConnectionParams, store: Arc<dyn ResourceStore>) -> Self {
        Self { request, connection_params, store, outputs: BTreeMap::new() }
    }

    pub fn compute_schematic_id(&self, input: &SchematicInput) -> String {
        compute_schematic_id(input)
    }

    /// Buffer a key/value output (e.g. `machineUUID`, `machineInfraID`) for
    /// the controller to apply once every step has run.
    pub fn publish(&mut self, key: &str, value: &str) {
        self.outputs.insert(key.to_string(), value.to_string());
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }
}

/// One step of a provider's provisioning sequence, run in order against a
/// mutable `state: T` the provider defines (e.g. the cloud handle/id it has
/// allocated so far).
#[async_trait]
pub trait ProvisionStep<T>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every external RPC a step performs should be wrapped in a short
    /// (nominally 10-second) timeout by the implementation — the runtime
    /// does not impose one on the step's `Future` itself.
    async fn run(&self, ctx: &mut ProvisionContext, state: &mut T) -> StepOutcome;
}

/// A provisioning backend: an ordered list of steps plus a teardown path.
#[async_trait]
pub trait ProvisionProvider<T>: Send + Sync + 'static
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn provision_steps(&self) -> Vec<Box<dyn ProvisionStep<T>>>;

    async fn deprovision(
        &self,
        ctx: &ProvisionContext,
        state: &T,
        request: &MachineRequest,
    ) -> Result<(), ProvisionError>;
}
