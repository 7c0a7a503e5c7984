//! JSON pretty-printing.

use serde::de::IgnoredAny;

use super::{DecodeError, Deserializer, Field};

/// Pretty-prints values that are JSON documents.
///
/// A value is claimed when it opens an object or an array and parses as
/// JSON. Anything else, such as a `[INFO] ...` log line, is left to the
/// next deserializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeserializer;

impl JsonDeserializer {
    /// Creates a JSON deserializer.
    pub fn new() -> Self {
        Self
    }
}

impl Deserializer for JsonDeserializer {
    fn name(&self) -> &str {
        "json"
    }

    fn applies_to(&self, field: Field, payload: &[u8]) -> bool {
        field == Field::Value
            && matches!(
                payload.iter().find(|b| !b.is_ascii_whitespace()),
                Some(b'{') | Some(b'[')
            )
            && serde_json::from_slice::<IgnoredAny>(payload).is_ok()
    }

    fn deserialize(&self, _field: Field, payload: &[u8]) -> Result<String, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::new(self.name(), e.to_string()))?;
        serde_json::to_string_pretty(&value).map_err(|e| DecodeError::new(self.name(), e.to_string()))
    }
}
