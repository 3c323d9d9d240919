//! A stub provider for tests and local development: synthesizes outputs
//! instead of calling a real cloud API.

use std::time::Duration;

use async_trait::async_trait;
use omnicore_domain::MachineRequest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{ProvisionContext, ProvisionStep, StepOutcome};
use crate::error::ProvisionError;
use crate::ProvisionProvider;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalMachineState {
    pub allocated: bool,
}

struct AllocateStep;

#[async_trait]
impl ProvisionStep<LocalMachineState> for AllocateStep {
    fn name(&self) -> &'static str {
        "allocate"
    }

    async fn run(&self, ctx: &mut ProvisionContext, state: &mut LocalMachineState) -> StepOutcome {
        debug!(infra_provider_id = %ctx.request.infra_provider_id, "LocalProvider: allocate");
        state.allocated = true;
        ctx.publish("machineUUID", &format!("local-{}", ctx.request.infra_provider_id));
        ctx.publish("machineInfraID", &format!("local-infra-{}", ctx.request.infra_provider_id));
        StepOutcome::Ok
    }
}

#[derive(Debug, Default, Clone)]
pub struct LocalProvider;

#[async_trait]
impl ProvisionProvider<LocalMachineState> for LocalProvider {
    fn provision_steps(&self) -> Vec<Box<dyn ProvisionStep<LocalMachineState>>> {
        vec![Box::new(AllocateStep)]
    }

    async fn deprovision(
        &self,
        _ctx: &ProvisionContext,
        _state: &LocalMachineState,
        request: &MachineRequest,
    ) -> Result<(), ProvisionError> {
        debug!(infra_provider_id = %request.infra_provider_id, "LocalProvider: deprovision");
        Ok(())
    }
}

/// A provider that never finishes provisioning, for exercising the
/// `Retry` / requeue path in tests.
pub struct StallingProvider;

struct StallStep;

#[async_trait]
impl ProvisionStep<LocalMachineState> for StallStep {
    fn name(&self) -> &'static str {
        "stall"
    }

    async fn run(&self, _ctx: &mut ProvisionContext, _state: &mut LocalMachineState) -> StepOutcome {
        StepOutcome::Retry(Duration::from_millis(50))
    }
}

#[async_trait]
impl ProvisionProvider<LocalMachineState> for StallingProvider {
    fn provision_steps(&self) -> Vec<Box<dyn ProvisionStep<LocalMachineState>>> {
        vec![Box::new(StallStep)]
    }

    async fn deprovision(
        &self,
        _ctx: &ProvisionContext,
        _state: &LocalMachineState,
        _request: &MachineRequest,
    ) -> Result<(), ProvisionError> {
        Ok(())
    }
}
