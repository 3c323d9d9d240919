//! Well-known label keys used to join the Cluster → MachineSet → ClusterMachine
//! tree and to tag provisioned machines (§3 "Entity relationships").

pub const LABEL_CLUSTER: &str = "omni.sidero.dev/cluster";
pub const LABEL_MACHINE_SET: &str = "omni.sidero.dev/machine-set";
pub const LABEL_CONTROL_PLANE_ROLE: &str = "omni.sidero.dev/role-control-plane";
pub const LABEL_WORKER_ROLE: &str = "omni.sidero.dev/role-worker";
pub const LABEL_MACHINE_INFRA_ID: &str = "omni.sidero.dev/machine-infra-id";
pub const LABEL_INFRA_PROVIDER_ID: &str = "omni.sidero.dev/infra-provider-id";
