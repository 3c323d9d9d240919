use std::collections::BTreeMap;

use omnicore_domain::ConnectionParams;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Input to the canonical schematic id. Whether `connection_params` is
/// present is what distinguishes a `WithoutConnectionParams` schematic from
/// one joined to a SideroLink endpoint — the two hash differently.
#[derive(Debug, Clone)]
pub struct SchematicInput {
    pub extensions: Vec<String>,
    pub kernel_args: Vec<String>,
    pub meta_values: BTreeMap<String, String>,
    pub talos_version: String,
    pub connection_params: Option<ConnectionParams>,
}

#[derive(Serialize)]
struct CanonicalSchematic {
    extensions: Vec<String>,
    kernel_args: Vec<String>,
    meta_values: BTreeMap<String, String>,
    talos_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    siderolink_kernel_arg: Option<String>,
}

/// Canonical schematic id: a sha256 hex digest of a field-sorted JSON
/// encoding of `input`. Every call site (the provision step, the CLI/test
/// helper) must route through this function so the digest is bit-identical
/// by construction rather than by convention.
pub fn compute_schematic_id(input: &SchematicInput) -> String {
    let mut kernel_args = input.kernel_args.clone();
    kernel_args.sort();

    let siderolink_kernel_arg = input.connection_params.as_ref().map(|params| {
        format!(
            "siderolink={}?jointoken={}",
            params.api_url,
            params.join_token.as_deref().unwrap_or("")
        )
    });

    let canonical = CanonicalSchematic {
        extensions: input.extensions.clone(),
        kernel_args,
        meta_values: input.meta_values.clone(),
        talos_version: input.talos_version.clone(),
        siderolink_kernel_arg,
    };

    let bytes = serde_json::to_vec(&canonical).expect("canonical schematic always serializes");
    format!("{:x}", Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> SchematicInput {
        SchematicInput {
            extensions: vec!["siderolabs/qemu-guest-agent".into()],
            kernel_args: vec!["b=2".into(), "a=1".into()],
            meta_values: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
            talos_version: "v1.7.0".into(),
            connection_params: None,
        }
    }

    #[test]
    fn identical_inputs_hash_identically() {
        let input = base_input();
        assert_eq!(compute_schematic_id(&input), compute_schematic_id(&input));
    }

    #[test]
    fn kernel_arg_order_does_not_affect_hash() {
        let mut shuffled = base_input();
        shuffled.kernel_args.reverse();
        assert_eq!(compute_schematic_id(&base_input()), compute_schematic_id(&shuffled));
    }

    #[test]
    fn connection_params_presence_changes_hash() {
        let without = base_input();
        let mut with = base_input();
        with.connection_params = Some(ConnectionParams {
            api_url: "https://siderolink.example".into(),
            join_token: Some("tok".into()),
        });
        assert_ne!(compute_schematic_id(&without), compute_schematic_id(&with));
    }
}
