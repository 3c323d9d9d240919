use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `MachineRequest` — externally created; owns a `MachineRequestStatus` and
/// an opaque provider-specific state resource (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineRequest {
    /// Infrastructure provider this request targets, e.g. `"test"` (§8 scenario 2).
    pub infra_provider_id: String,
    pub extensions: Vec<String>,
    pub kernel_args: Vec<String>,
    pub meta_values: BTreeMap<String, String>,
    pub talos_version: String,
}

/// Provision progress, owned exclusively by the provision controller (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineRequestStatus {
    pub stage: MachineRequestStage,
    /// Set to the provider's `machineUUID` once `Provisioned`.
    pub id: Option<String>,
    pub error: Option<String>,
}

impl MachineRequestStatus {
    pub fn provisioning() -> Self {
        Self { stage: MachineRequestStage::Provisioning, id: None, error: None }
    }
}

/// `MachineRequestStatus` state machine (§4.4):
/// `Unknown -> Provisioning -> (Provisioned | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineRequestStage {
    Unknown,
    Provisioning,
    Provisioned,
    Failed,
}

impl Default for MachineRequestStage {
    fn default() -> Self {
        MachineRequestStage::Unknown
    }
}

impl std::fmt::Display for MachineRequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineRequestStage::Unknown => write!(f, "UNKNOWN"),
            MachineRequestStage::Provisioning => write!(f, "PROVISIONING"),
            MachineRequestStage::Provisioned => write!(f, "PROVISIONED"),
            MachineRequestStage::Failed => write!(f, "FAILED"),
        }
    }
}

/// Read-only singleton input to the provision controller (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub api_url: String,
    pub join_token: Option<String>,
}
