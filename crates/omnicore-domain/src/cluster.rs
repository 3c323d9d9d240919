use serde::{Deserialize, Serialize};

use crate::config_spec::{ClusterMachineConfig, ClusterMachineConfigPatches};

/// Cluster ⇢ MachineSet ⇢ MachineSetNode ⇢ ClusterMachine tree, joined by
/// label selectors rather than back-pointers (§3 "Entity relationships",
/// §9 "Finalizers as ownership backreferences" — the same no-cyclic-reference
/// philosophy applies to this tree: children carry label selectors naming
/// their parent, never the reverse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub talos_version: String,
    pub kubernetes_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSet {
    pub cluster: String,
    pub control_plane: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSetNode {
    pub machine_set: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMachine {
    pub cluster: String,
    pub machine_set: String,
    pub config: ClusterMachineConfig,
}

/// Joined to its targets via the same label set plus a numeric weight prefix
/// in the id (§3), e.g. id `000-base-patch` applies before `100-overrides`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub patches: ClusterMachineConfigPatches,
}

impl ConfigPatch {
    /// The numeric weight prefix of a ConfigPatch id, used to order patches
    /// before merging. Ids without a parseable prefix sort last.
    pub fn weight_of(id: &str) -> u64 {
        id.split('-').next().and_then(|p| p.parse().ok()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_prefix_parses() {
        assert_eq!(ConfigPatch::weight_of("000-base"), 0);
        assert_eq!(ConfigPatch::weight_of("100-overrides"), 100);
    }

    #[test]
    fn unprefixed_id_sorts_last() {
        assert_eq!(ConfigPatch::weight_of("no-prefix-here"), u64::MAX);
    }
}
