use std::collections::BTreeMap;

use base64::Engine;
use omnicore_domain::{ConnectionParams, LABEL_INFRA_PROVIDER_ID};
use serde::Deserialize;

use crate::error::ProvisionError;

/// Decoded join token carried by a `MachineRequest`. Opaque to everything
/// except the provider named in `extra_data[LABEL_INFRA_PROVIDER_ID]`;
/// `verify` is how that provider asserts the token was actually minted for
/// it before acting on it.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinToken {
    pub extra_data: BTreeMap<String, String>,
}

impl JoinToken {
    /// Parse a join token from its wire form: base64 of the JSON object
    /// `{ "extra_data": { ... } }`.
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))?;
        serde_json::from_slice(&decoded).map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))
    }

    /// Verify this token was minted for `expected_provider_id` and that the
    /// accompanying `JoinConfig` multi-document YAML carries the documents a
    /// provider needs to hand back to a booting machine, each pointing at an
    /// endpoint consistent with `connection_params`.
    pub fn verify(
        &self,
        expected_provider_id: &str,
        join_config_yaml: &str,
        connection_params: &ConnectionParams,
    ) -> Result<(), ProvisionError> {
        let found = self
            .extra_data
            .get(LABEL_INFRA_PROVIDER_ID)
            .map(String::as_str)
            .unwrap_or("");
        if found != expected_provider_id {
            return Err(ProvisionError::ProviderIdMismatch {
                expected: expected_provider_id.to_string(),
                found: found.to_string(),
            });
        }

        verify_join_config(join_config_yaml, connection_params)
    }
}

#[derive(Debug, Deserialize)]
struct SideroLinkConfig {
    #[serde(rename = "apiUrl")]
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventSinkConfig {
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KmsgLogConfig {
    url: Option<String>,
}

/// Confirms the multi-document YAML contains one document each for
/// `SideroLinkConfig`, `EventSinkConfig` and `KmsgLogConfig`, keyed by
/// document-level map entry (`SideroLinkConfig: {apiUrl: ...}`), and that
/// each document's endpoint resolves to the same host as
/// `connection_params.api_url` — the host a machine is actually joining.
fn verify_join_config(join_config_yaml: &str, connection_params: &ConnectionParams) -> Result<(), ProvisionError> {
    let expected_host = host_of(&connection_params.api_url).ok_or_else(|| {
        ProvisionError::JoinConfigMismatch(format!(
            "connection params api_url '{}' has no host",
            connection_params.api_url
        ))
    })?;

    let mut has_siderolink = false;
    let mut has_event_sink = false;
    let mut has_kmsg = false;

    for doc in serde_yaml::Deserializer::from_str(join_config_yaml) {
        let value =
            serde_yaml::Value::deserialize(doc).map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))?;
        let Some(mapping) = value.as_mapping() else { continue };

        if let Some(v) = mapping.get("SideroLinkConfig") {
            let cfg: SideroLinkConfig = serde_yaml::from_value(v.clone())
                .map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))?;
            check_endpoint_host("SideroLinkConfig", cfg.api_url.as_deref(), &expected_host)?;
            has_siderolink = true;
        }
        if let Some(v) = mapping.get("EventSinkConfig") {
            let cfg: EventSinkConfig = serde_yaml::from_value(v.clone())
                .map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))?;
            check_endpoint_host("EventSinkConfig", cfg.endpoint.as_deref(), &expected_host)?;
            has_event_sink = true;
        }
        if let Some(v) = mapping.get("KmsgLogConfig") {
            let cfg: KmsgLogConfig = serde_yaml::from_value(v.clone())
                .map_err(|e| ProvisionError::InvalidJoinToken(e.to_string()))?;
            check_endpoint_host("KmsgLogConfig", cfg.url.as_deref(), &expected_host)?;
            has_kmsg = true;
        }
    }

    if !has_siderolink {
        return Err(ProvisionError::MissingJoinConfigDocument("SideroLinkConfig"));
    }
    if !has_event_sink {
        return Err(ProvisionError::MissingJoinConfigDocument("EventSinkConfig"));
    }
    if !has_kmsg {
        return Err(ProvisionError::MissingJoinConfigDocument("KmsgLogConfig"));
    }

    Ok(())
}

fn check_endpoint_host(document: &'static str, endpoint: Option<&str>, expected_host: &str) -> Result<(), ProvisionError> {
    let Some(endpoint) = endpoint else {
        return Err(ProvisionError::JoinConfigMismatch(format!("{document} has no endpoint")));
    };
    match host_of(endpoint) {
        Some(found) if found == expected_host => Ok(()),
        Some(found) => Err(ProvisionError::JoinConfigMismatch(format!(
            "{document} endpoint '{endpoint}' host '{found}' does not match connection params host '{expected_host}'"
        ))),
        None => Err(ProvisionError::JoinConfigMismatch(format!(
            "{document} endpoint '{endpoint}' has no host"
        ))),
    }
}

/// Extracts the host component from a URL string, tolerant of the bracketed
/// IPv6 and non-http schemes (`tcp://`) a `JoinConfig` document may use.
fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_token(provider_id: &str) -> String {
        let json = serde_json::json!({
            "extra_data": { LABEL_INFRA_PROVIDER_ID: provider_id }
        });
        base64::engine::general_purpose::STANDARD.encode(json.to_string())
    }

    const VALID_JOIN_CONFIG: &str = "\
SideroLinkConfig:\n  apiUrl: https://omni.example\n---\n\
EventSinkConfig:\n  endpoint: https://omni.example:8091\n---\n\
KmsgLogConfig:\n  url: tcp://omni.example:8092\n";

    fn params() -> ConnectionParams {
        ConnectionParams { api_url: "https://omni.example".into(), join_token: None }
    }

    #[test]
    fn parses_and_verifies_matching_provider() {
        let raw = encode_token("test");
        let token = JoinToken::parse(&raw).unwrap();
        token.verify("test", VALID_JOIN_CONFIG, &params()).unwrap();
    }

    #[test]
    fn rejects_mismatched_provider() {
        let raw = encode_token("other");
        let token = JoinToken::parse(&raw).unwrap();
        let err = token.verify("test", VALID_JOIN_CONFIG, &params()).unwrap_err();
        assert!(matches!(err, ProvisionError::ProviderIdMismatch { .. }));
    }

    #[test]
    fn rejects_join_config_missing_a_document() {
        let raw = encode_token("test");
        let token = JoinToken::parse(&raw).unwrap();
        let err = token
            .verify("test", "SideroLinkConfig:\n  apiUrl: https://omni.example\n", &params())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingJoinConfigDocument(_)));
    }

    #[test]
    fn rejects_join_config_endpoint_host_mismatch() {
        let raw = encode_token("test");
        let token = JoinToken::parse(&raw).unwrap();
        let mismatched = "\
SideroLinkConfig:\n  apiUrl: https://other.example\n---\n\
EventSinkConfig:\n  endpoint: https://omni.example:8091\n---\n\
KmsgLogConfig:\n  url: tcp://omni.example:8092\n";
        let err = token.verify("test", mismatched, &params()).unwrap_err();
        assert!(matches!(err, ProvisionError::JoinConfigMismatch(_)));
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(JoinToken::parse("not-base64!!!").is_err());
    }
}
