#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ledger::ParticipantId;
use crate::ContractViolation;

pub const STATE_DICT_FIELD: &str = "state_dict";
pub const PARTICIPANT_ID_FIELD: &str = "participant_id";

/// Off-chain document body. Opaque apart from the payload field; metadata the
/// store adds (`_id`, `_rev`, ...) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn model_update(participant_id: &ParticipantId, state_dict: Value) -> Self {
        let mut body = Map::new();
        body.insert(
            PARTICIPANT_ID_FIELD.to_string(),
            Value::String(participant_id.as_str().to_string()),
        );
        body.insert(STATE_DICT_FIELD.to_string(), state_dict);
        Self(body)
    }

    pub fn from_value(value: Value) -> Result<Self, ContractViolation> {
        match value {
            Value::Object(body) => Ok(Self(body)),
            _ => Err(ContractViolation::InvalidValue {
                field: "document",
                reason: "must be a JSON object",
            }),
        }
    }

    /// Payload field, absent when missing or explicitly `null`.
    pub fn state_dict(&self) -> Option<&Value> {
        self.0.get(STATE_DICT_FIELD).filter(|v| !v.is_null())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn at_document_01_model_update_carries_participant_and_payload() {
        let doc = Document::model_update(&ParticipantId::new("client1").unwrap(), json!({"w": [1]}));
        assert_eq!(doc.state_dict(), Some(&json!({"w": [1]})));
        assert_eq!(doc.get(PARTICIPANT_ID_FIELD), Some(&json!("client1")));
    }

    #[test]
    fn at_document_02_null_payload_counts_as_absent() {
        let doc = Document::from_value(json!({"state_dict": null, "_id": "x"})).unwrap();
        assert!(doc.state_dict().is_none());
        assert_eq!(doc.get("_id"), Some(&json!("x")));
    }

    #[test]
    fn at_document_03_non_object_is_rejected() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!("blob")).is_err());
    }
}
