#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize};

use crate::common::{validate_ledger_text, validate_token};
use crate::{ContractViolation, Validate};

pub const RECORD_TYPE_MODEL_UPDATE: &str = "modelUpdate";
pub const SENTINEL_PARTICIPANT_ID: &str = "default";
pub const SENTINEL_DOCUMENT_ID: &str = "0";
pub const LEDGER_ID_MAX_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    /// Accepts any participant id another ledger writer may have stored.
    pub fn from_ledger(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_ledger_text("participant_id", &id, LEDGER_ID_MAX_LEN)?;
        Ok(Self(id))
    }

    pub fn sentinel() -> Self {
        Self(SENTINEL_PARTICIPANT_ID.to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_PARTICIPANT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ParticipantId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("participant_id", &self.0, 128)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn from_ledger(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_ledger_text("document_id", &id, LEDGER_ID_MAX_LEN)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DocumentId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("document_id", &self.0, 256)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pointer from a participant to its latest off-chain document, as written by
/// the pointer contract. Field names follow the contract's JSON encoding.
///
/// Decoding uses the ledger-side id check: records written by other clients
/// of the same partition may carry ids the gateway itself would refuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    #[serde(rename = "docType")]
    pub record_type: String,
    #[serde(rename = "ParticipantID", deserialize_with = "participant_from_ledger")]
    pub participant_id: ParticipantId,
    #[serde(rename = "DocID", deserialize_with = "document_from_ledger")]
    pub document_id: DocumentId,
}

fn participant_from_ledger<'de, D>(deserializer: D) -> Result<ParticipantId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    ParticipantId::from_ledger(raw).map_err(serde::de::Error::custom)
}

fn document_from_ledger<'de, D>(deserializer: D) -> Result<DocumentId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DocumentId::from_ledger(raw).map_err(serde::de::Error::custom)
}

impl PointerRecord {
    pub fn v1(participant_id: ParticipantId, document_id: DocumentId) -> Self {
        Self {
            record_type: RECORD_TYPE_MODEL_UPDATE.to_string(),
            participant_id,
            document_id,
        }
    }

    pub fn sentinel() -> Self {
        Self {
            record_type: RECORD_TYPE_MODEL_UPDATE.to_string(),
            participant_id: ParticipantId::sentinel(),
            document_id: DocumentId(SENTINEL_DOCUMENT_ID.to_string()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.participant_id.is_sentinel()
    }
}

impl Validate for PointerRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.record_type != RECORD_TYPE_MODEL_UPDATE {
            return Err(ContractViolation::InvalidValue {
                field: "pointer_record.record_type",
                reason: "must be modelUpdate",
            });
        }
        validate_ledger_text("participant_id", self.participant_id.as_str(), LEDGER_ID_MAX_LEN)?;
        validate_ledger_text("document_id", self.document_id.as_str(), LEDGER_ID_MAX_LEN)?;
        Ok(())
    }
}

/// Functions exposed by the pointer contract deployed on every partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFunction {
    InitLedger,
    StoreUpdate,
    QueryUpdate,
    QueryByParticipantId,
}

impl LedgerFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerFunction::InitLedger => "InitLedger",
            LedgerFunction::StoreUpdate => "StoreUpdate",
            LedgerFunction::QueryUpdate => "QueryUpdate",
            LedgerFunction::QueryByParticipantId => "QueryByParticipantID",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "InitLedger" => Some(LedgerFunction::InitLedger),
            "StoreUpdate" => Some(LedgerFunction::StoreUpdate),
            "QueryUpdate" => Some(LedgerFunction::QueryUpdate),
            "QueryByParticipantID" => Some(LedgerFunction::QueryByParticipantId),
            _ => None,
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            LedgerFunction::QueryUpdate | LedgerFunction::QueryByParticipantId
        )
    }
}
