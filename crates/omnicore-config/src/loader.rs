use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::raw::RawServerConfig;

/// Typed, validated server config (bind address, compression, runtime
/// concurrency) produced from [`RawServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub dictionary_path: Option<String>,
    pub compression_enabled: bool,
    pub compression_min_threshold: usize,
    pub max_concurrent_reconciles: usize,
}

/// Load and parse a server config YAML file at `path`.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawServerConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!("loaded server config from {}", path.display());
    convert(raw, path)
}

fn convert(raw: RawServerConfig, path: &Path) -> Result<ServerConfig, ConfigError> {
    if raw.compression.enabled {
        if let Some(dict_path) = &raw.dictionary_path {
            if !Path::new(dict_path).exists() {
                return Err(ConfigError::Invalid(format!(
                    "{}: dictionary_path '{}' does not exist",
                    path.display(),
                    dict_path
                )));
            }
        }
    }

    Ok(ServerConfig {
        bind_address: raw.bind_address,
        dictionary_path: raw.dictionary_path,
        compression_enabled: raw.compression.enabled,
        compression_min_threshold: raw.compression.min_threshold,
        max_concurrent_reconciles: raw.runtime.max_concurrent_reconciles,
    })
}

/// Initialize the process-wide compression config singleton from a loaded
/// [`ServerConfig`]. Must be called once, before any resource carrying a
/// compressed field is read or written (§9).
pub fn init_compression(config: &ServerConfig) -> Result<(), ConfigError> {
    let dictionary = match &config.dictionary_path {
        Some(path) => Some(std::fs::read(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?),
        None => None,
    };

    omnicore_codec::init_config(
        config.compression_enabled,
        dictionary,
        config.compression_min_threshold,
    )
    .map_err(ConfigError::Codec)
}
