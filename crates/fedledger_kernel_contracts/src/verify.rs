#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::Value;

use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerificationScheme {
    #[default]
    SaltedHash,
    ZkProof,
}

impl VerificationScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationScheme::SaltedHash => "salted_hash",
            VerificationScheme::ZkProof => "zk_proof",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "salted_hash" | "hash" => Ok(VerificationScheme::SaltedHash),
            "zk_proof" | "zkp" => Ok(VerificationScheme::ZkProof),
            _ => Err(ContractViolation::InvalidValue {
                field: "scheme",
                reason: "must be salted_hash or zk_proof",
            }),
        }
    }

    pub fn requires_zk_proof(self) -> bool {
        self == VerificationScheme::ZkProof
    }
}

/// Body sent to the oracle. The scheme travels in the body; the zk flag is
/// also passed as a query parameter by the HTTP backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRequest {
    #[serde(serialize_with = "serialize_scheme")]
    pub scheme: VerificationScheme,
    #[serde(rename = "state_dict")]
    pub payload: Value,
    pub proof: Value,
}

impl VerificationRequest {
    pub fn v1(
        scheme: VerificationScheme,
        payload: Value,
        proof: Value,
    ) -> Result<Self, ContractViolation> {
        let req = Self {
            scheme,
            payload,
            proof,
        };
        req.validate()?;
        Ok(req)
    }
}

impl Validate for VerificationRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.payload.is_null() {
            return Err(ContractViolation::Missing {
                field: "state_dict",
            });
        }
        match &self.proof {
            Value::Null => Err(ContractViolation::Missing { field: "proof" }),
            Value::Object(fields) if fields.is_empty() => Err(ContractViolation::InvalidValue {
                field: "proof",
                reason: "must not be empty",
            }),
            Value::Object(_) => Ok(()),
            _ => Err(ContractViolation::InvalidValue {
                field: "proof",
                reason: "must be a JSON object",
            }),
        }
    }
}

fn serialize_scheme<S>(scheme: &VerificationScheme, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(scheme.as_str())
}
