//! Raw payload rendering, the fallback of every chain.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{DecodeError, Deserializer, Encoding, Field};

/// Renders payloads as opaque bytes in a text encoding. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDeserializer {
    encoding: Encoding,
}

impl RawDeserializer {
    /// Creates a raw deserializer with the given encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    /// The configured encoding.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encodes `payload` as text.
    pub fn encode(&self, payload: &[u8]) -> String {
        match self.encoding {
            Encoding::Raw => String::from_utf8_lossy(payload).into_owned(),
            Encoding::Hex => hex::encode(payload),
            Encoding::Base64 => STANDARD.encode(payload),
        }
    }
}

impl Deserializer for RawDeserializer {
    fn name(&self) -> &str {
        "raw"
    }

    fn applies_to(&self, _field: Field, _payload: &[u8]) -> bool {
        true
    }

    fn deserialize(&self, _field: Field, payload: &[u8]) -> Result<String, DecodeError> {
        Ok(self.encode(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_is_lossy_utf8() {
        let raw = RawDeserializer::new(Encoding::Raw);
        assert_eq!(raw.encode(b"hello"), "hello");
        assert_eq!(raw.encode(&[0x66, 0xff, 0x6f]), "f\u{fffd}o");
    }

    #[test]
    fn test_hex_and_base64() {
        assert_eq!(RawDeserializer::new(Encoding::Hex).encode(&[0, 171, 255]), "00abff");
        assert_eq!(
            RawDeserializer::new(Encoding::Base64).encode(b"kafka"),
            "a2Fma2E="
        );
    }

    #[test]
    fn test_raw_claims_everything() {
        let raw = RawDeserializer::default();
        assert!(raw.applies_to(Field::Key, &[]));
        assert_eq!(raw.deserialize(Field::Value, b"").unwrap(), "");
    }
}
