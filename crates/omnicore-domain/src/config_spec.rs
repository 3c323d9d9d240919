use omnicore_codec::{compress, decompress, should_compress, CodecError};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `ClusterMachineConfig.data` (§3 "Spec encodings"): a single large text
/// blob. `SetUncompressed`/`GetUncompressed` transparently (de)compress
/// above [`omnicore_codec::should_compress`]'s threshold.
///
/// JSON/YAML marshaling always emits the uncompressed string — see
/// `Serialize`/`Deserialize` below — while [`ClusterMachineConfig::to_wire`]
/// is what the store persists at rest, honoring the `compressed` flag.
#[derive(Debug, Clone, Default)]
pub struct ClusterMachineConfig {
    compressed_bytes: Option<Vec<u8>>,
    uncompressed: Option<String>,
}

impl ClusterMachineConfig {
    pub fn set_uncompressed(&mut self, data: String) -> Result<(), CodecError> {
        if should_compress(data.len()) {
            self.compressed_bytes = Some(compress(data.as_bytes())?);
            self.uncompressed = None;
        } else {
            self.compressed_bytes = None;
            self.uncompressed = Some(data);
        }
        Ok(())
    }

    pub fn get_uncompressed(&self) -> Result<String, CodecError> {
        if let Some(bytes) = &self.compressed_bytes {
            let raw = decompress(bytes)?;
            return Ok(String::from_utf8_lossy(&raw).into_owned());
        }
        Ok(self.uncompressed.clone().unwrap_or_default())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_bytes.is_some()
    }

    /// Wire/at-rest representation: `(compressed_flag, bytes)`. The store's
    /// persistence layer uses this directly instead of the `Serialize` impl,
    /// which always emits the uncompressed form (§3, §6).
    pub fn to_wire(&self) -> (bool, Vec<u8>) {
        match &self.compressed_bytes {
            Some(b) => (true, b.clone()),
            None => (false, self.uncompressed.clone().unwrap_or_default().into_bytes()),
        }
    }

    pub fn from_wire(compressed: bool, bytes: Vec<u8>) -> Self {
        if compressed {
            Self { compressed_bytes: Some(bytes), uncompressed: None }
        } else {
            Self { compressed_bytes: None, uncompressed: Some(String::from_utf8_lossy(&bytes).into_owned()) }
        }
    }
}

impl Serialize for ClusterMachineConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.get_uncompressed().map_err(serde::ser::Error::custom)?;
        text.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClusterMachineConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut out = ClusterMachineConfig::default();
        out.set_uncompressed(text).map_err(D::Error::custom)?;
        Ok(out)
    }
}

/// `ClusterMachineConfigPatches.patches` (§3): an array of text patches, each
/// compressed independently above threshold.
#[derive(Debug, Clone, Default)]
pub struct ClusterMachineConfigPatches {
    entries: Vec<ClusterMachineConfig>,
}

impl ClusterMachineConfigPatches {
    pub fn set_patches(&mut self, patches: Vec<String>) -> Result<(), CodecError> {
        let mut entries = Vec::with_capacity(patches.len());
        for p in patches {
            let mut entry = ClusterMachineConfig::default();
            entry.set_uncompressed(p)?;
            entries.push(entry);
        }
        self.entries = entries;
        Ok(())
    }

    pub fn get_patches(&self) -> Result<Vec<String>, CodecError> {
        self.entries.iter().map(|e| e.get_uncompressed()).collect()
    }
}

impl Serialize for ClusterMachineConfigPatches {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let patches = self.get_patches().map_err(serde::ser::Error::custom)?;
        patches.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClusterMachineConfigPatches {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let patches = Vec::<String>::deserialize(deserializer)?;
        let mut out = ClusterMachineConfigPatches::default();
        out.set_patches(patches).map_err(D::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_value_stays_uncompressed() {
        omnicore_codec::init_config(true, None, 1024).ok();
        let mut cfg = ClusterMachineConfig::default();
        cfg.set_uncompressed("short".into()).unwrap();
        assert!(!cfg.is_compressed());
        assert_eq!(cfg.get_uncompressed().unwrap(), "short");
    }

    #[test]
    fn large_value_compresses_and_roundtrips() {
        omnicore_codec::init_config(true, None, 16).ok();
        let mut cfg = ClusterMachineConfig::default();
        let big = "x".repeat(10_000);
        cfg.set_uncompressed(big.clone()).unwrap();
        assert!(cfg.is_compressed());
        assert_eq!(cfg.get_uncompressed().unwrap(), big);
    }

    #[test]
    fn json_roundtrip_reserializes_uncompressed_form() {
        omnicore_codec::init_config(true, None, 16).ok();
        let mut cfg = ClusterMachineConfig::default();
        let big = "y".repeat(5_000);
        cfg.set_uncompressed(big.clone()).unwrap();

        let json = serde_json::to_string(&cfg).unwrap();
        // the JSON form is the plain string, not a compressed blob
        assert_eq!(json, serde_json::to_string(&big).unwrap());

        let back: ClusterMachineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_uncompressed().unwrap(), big);
    }
}
