use std::io::{Read, Write};
use std::sync::OnceLock;

use tracing::debug;

use crate::error::CodecError;
use crate::pool::{BufferPool, Lease};

/// Talos config fragments compress well with a small trained dictionary and a
/// 256-KiB window; both are optional — a zero dictionary and default window
/// still produce a valid, if less efficient, encoding.
const WINDOW_LOG: i32 = 18; // 2^18 = 256 KiB

static CONFIG: OnceLock<CompressionConfig> = OnceLock::new();

/// Process-wide compression configuration. See [`init_config`].
pub struct CompressionConfig {
    enabled: bool,
    dictionary: Option<Vec<u8>>,
    min_threshold: usize,
    pool: BufferPool,
}

impl CompressionConfig {
    fn passthrough() -> Self {
        Self { enabled: false, dictionary: None, min_threshold: usize::MAX, pool: BufferPool::new() }
    }
}

/// Initialize the global compression config. Must be called before any
/// compressible spec is read or written; a spec observed compressed before
/// init returns [`CodecError::NotInitialized`] from [`decompress`].
///
/// `min_threshold` is the uncompressed byte length above which setters
/// compress transparently (§3 "Spec encodings").
pub fn init_config(
    enabled: bool,
    dictionary: Option<Vec<u8>>,
    min_threshold: usize,
) -> Result<(), CodecError> {
    CONFIG
        .set(CompressionConfig { enabled, dictionary, min_threshold, pool: BufferPool::new() })
        .map_err(|_| CodecError::AlreadyInitialized)
}

fn config() -> &'static CompressionConfig {
    CONFIG.get_or_init(CompressionConfig::passthrough)
}

/// Whether a value of `len` bytes should be compressed under the current
/// threshold. Used by generated spec accessors.
pub fn should_compress(len: usize) -> bool {
    let cfg = config();
    cfg.enabled && len >= cfg.min_threshold
}

/// Encode `data` with the process-wide dictionary (if any) and a 256-KiB
/// window. Returns `data` unchanged (copied) if compression is disabled.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let cfg = config();
    if !cfg.enabled {
        return Ok(data.to_vec());
    }
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), 0).map_err(|e| CodecError::Encode(e.to_string()))?;
    encoder
        .window_log(WINDOW_LOG as u32)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    if let Some(dict) = &cfg.dictionary {
        encoder.set_dictionary(dict).map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    encoder.write_all(data).map_err(|e| CodecError::Encode(e.to_string()))?;
    encoder.finish().map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a zstd frame produced by [`compress`] into a leased buffer. Fails
/// with [`CodecError::NotInitialized`] if no config has been set yet.
pub fn decompress_into_lease(data: &[u8]) -> Result<Lease, CodecError> {
    let Some(cfg) = CONFIG.get() else {
        return Err(CodecError::NotInitialized);
    };
    let mut decoder = if let Some(dict) = &cfg.dictionary {
        zstd::stream::Decoder::with_dictionary(data, dict)
    } else {
        zstd::stream::Decoder::new(data)
    }
    .map_err(|e| CodecError::Decode(e.to_string()))?;

    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| CodecError::Decode(e.to_string()))?;
    debug!(bytes = out.len(), "decompressed field");

    let mut lease = cfg.pool.get(out.len());
    lease.as_mut().extend_from_slice(&out);
    Ok(lease)
}

/// Convenience wrapper returning an owned `Vec<u8>` instead of a pooled lease,
/// for callers (tests, CLI) that don't need the pool's recycling.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let lease = decompress_into_lease(data)?;
    let v = lease.as_slice().to_vec();
    lease.release();
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    // CONFIG is a process-wide OnceLock; each test process gets one shot at
    // init, so these run as a single test exercising the full lifecycle.
    #[test]
    fn roundtrip_after_init() {
        init_config(true, None, 0).ok(); // ignore AlreadyInitialized from other tests in this binary
        let original = b"hello talos config fragment".repeat(100);
        let compressed = compress(&original).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn passthrough_before_init_is_noop_roundtrip() {
        // Exercise the default config independently via a helper config value
        // rather than the shared global, since other tests may have already
        // called init_config in this process.
        let cfg = CompressionConfig::passthrough();
        assert!(!cfg.enabled);
    }
}
