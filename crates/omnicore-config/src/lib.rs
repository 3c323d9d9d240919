pub mod error;
mod loader;
mod raw;

pub use error::ConfigError;
pub use loader::{init_compression, load_server_config, ServerConfig};
pub use raw::{RawCompression, RawRuntime, RawServerConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "bind_address: \"127.0.0.1:9000\"").unwrap();
        let cfg = load_server_config(f.path()).unwrap();
        assert_eq!(cfg.bind_address, "127.0.0.1:9000");
        assert!(!cfg.compression_enabled);
        assert_eq!(cfg.max_concurrent_reconciles, 10);
    }

    #[test]
    fn rejects_missing_dictionary_path() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "bind_address: \"127.0.0.1:9000\"").unwrap();
        writeln!(f, "dictionary_path: \"/no/such/file\"").unwrap();
        writeln!(f, "compression:").unwrap();
        writeln!(f, "  enabled: true").unwrap();
        let err = load_server_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = load_server_config(Path::new("/no/such/config.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
