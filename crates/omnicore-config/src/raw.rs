use serde::{Deserialize, Serialize};

/// Raw YAML representation of the server config file.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawServerConfig {
    #[serde(default = "default_bind")]
    pub bind_address: String,

    #[serde(default)]
    pub dictionary_path: Option<String>,

    #[serde(default)]
    pub compression: RawCompression,

    #[serde(default)]
    pub runtime: RawRuntime,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawCompression {
    #[serde(default)]
    pub enabled: bool,
    /// Values below this length are never compressed, regardless of class.
    #[serde(default = "default_min_threshold")]
    pub min_threshold: usize,
}

fn default_min_threshold() -> usize {
    1024
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawRuntime {
    /// Max concurrent reconciles per controller, unless the controller
    /// overrides it.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,
}

impl Default for RawRuntime {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
        }
    }
}

fn default_max_concurrent_reconciles() -> usize {
    10
}
