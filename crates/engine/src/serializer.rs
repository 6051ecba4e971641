//! Pluggable document serialization.
//!
//! The engine never interprets raw bytes itself — a [`Serializer`]
//! collaborator turns stored bytes into ordered mappings and back.
//! Round-trips must be lossless for strings, numbers, booleans, null,
//! sequences, and nested mappings, preserving key order.

use anyhow::{Context, Result};
use serde_yml::Mapping;

/// Decode and encode document data.
pub trait Serializer: Send + Sync {
    /// Parse raw bytes into an ordered key→value mapping.
    fn decode(&self, bytes: &[u8]) -> Result<Mapping>;

    /// Serialize an ordered mapping back to raw bytes.
    fn encode(&self, data: &Mapping) -> Result<Vec<u8>>;
}

/// YAML serializer, the format used by the file-backed stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping> {
        let text = std::str::from_utf8(bytes).context("document is not valid UTF-8")?;
        serde_yml::from_str(text).context("document is not a YAML mapping")
    }

    fn encode(&self, data: &Mapping) -> Result<Vec<u8>> {
        let yaml = serde_yml::to_string(data).context("failed to serialize document")?;
        Ok(yaml.into_bytes())
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_lossless() {
        let yaml = r"name: a
data:
  dependencies:
    config:
      - b
  value: 42
  ratio: 1.5
  enabled: true
  missing: null
  list:
    - one
    - two
";
        let serializer = YamlSerializer;
        let decoded = serializer.decode(yaml.as_bytes()).unwrap();
        let encoded = serializer.encode(&decoded).unwrap();
        let redecoded = serializer.decode(&encoded).unwrap();

        assert_eq!(decoded, redecoded);
        // Canonical form is stable: encode(decode(bytes)) == bytes.
        assert_eq!(serializer.encode(&redecoded).unwrap(), encoded);
    }

    #[test]
    fn key_order_preserved() {
        let yaml = "zebra: 1\nalpha: 2\nmiddle: 3\n";
        let serializer = YamlSerializer;
        let decoded = serializer.decode(yaml.as_bytes()).unwrap();
        let keys: Vec<_> = decoded
            .keys()
            .filter_map(|k| k.as_str().map(String::from))
            .collect();
        assert_eq!(keys, vec!["zebra", "alpha", "middle"]);
    }

    #[test]
    fn non_mapping_rejected() {
        let serializer = YamlSerializer;
        assert!(serializer.decode(b"- just\n- a\n- list\n").is_err());
    }

    #[test]
    fn invalid_utf8_rejected() {
        let serializer = YamlSerializer;
        assert!(serializer.decode(&[0xff, 0xfe, 0x00]).is_err());
    }
}
