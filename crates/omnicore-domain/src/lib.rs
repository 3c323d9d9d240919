pub mod cluster;
pub mod config_spec;
pub mod error;
pub mod labels;
pub mod machine;
pub mod metadata;
pub mod pointer;
pub mod resource;
pub mod selector;

pub use cluster::{Cluster, ClusterMachine, ConfigPatch, MachineSet, MachineSetNode};
pub use config_spec::{ClusterMachineConfig, ClusterMachineConfigPatches};
pub use error::DomainError;
pub use machine::{ConnectionParams, MachineRequest, MachineRequestStage, MachineRequestStatus};
pub use metadata::{Metadata, Phase};
pub use pointer::{Namespace, Pointer, ResourceId, ResourceType};
pub use resource::{AnyResource, Resource};
pub use selector::{matches_all, LabelSelector};
