use std::io::Write;
use std::path::Path;

use omnicore_config::{load_server_config, ConfigError};

#[test]
fn load_full_config_with_compression_disabled() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "bind_address: \"0.0.0.0:9443\"").unwrap();
    writeln!(f, "runtime:").unwrap();
    writeln!(f, "  max_concurrent_reconciles: 25").unwrap();
    let cfg = load_server_config(f.path()).unwrap();
    assert_eq!(cfg.bind_address, "0.0.0.0:9443");
    assert_eq!(cfg.max_concurrent_reconciles, 25);
    assert!(!cfg.compression_enabled);
}

#[test]
fn compression_enabled_without_dictionary_is_allowed() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "bind_address: \"127.0.0.1:8080\"").unwrap();
    writeln!(f, "compression:").unwrap();
    writeln!(f, "  enabled: true").unwrap();
    writeln!(f, "  min_threshold: 512").unwrap();
    let cfg = load_server_config(f.path()).unwrap();
    assert!(cfg.compression_enabled);
    assert_eq!(cfg.compression_min_threshold, 512);
}

#[test]
fn missing_file_returns_io_error() {
    let err = load_server_config(Path::new("/nonexistent/path/does/not/exist.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
