#![forbid(unsafe_code)]

use crate::{ContractViolation, Validate};

pub const LEDGER_PARTITION_SUFFIX: &str = "channel";
pub const DOCUMENT_COLLECTION_SUFFIX: &str = "_model_updates";
pub const LOCALITY_MAX_LEN: usize = 48;

/// Tenant identifier. Restricted to a shape that is a legal ledger channel name
/// and a legal document database name once the suffixes are appended.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locality(String);

impl Locality {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Locality {
    fn validate(&self) -> Result<(), ContractViolation> {
        let mut chars = self.0.chars();
        let Some(first) = chars.next() else {
            return Err(ContractViolation::Missing { field: "locality" });
        };
        if self.0.len() > LOCALITY_MAX_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "locality",
                reason: "exceeds max length",
            });
        }
        if !first.is_ascii_lowercase() {
            return Err(ContractViolation::InvalidValue {
                field: "locality",
                reason: "must start with a lowercase ASCII letter",
            });
        }
        if chars.any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')) {
            return Err(ContractViolation::InvalidValue {
                field: "locality",
                reason: "must contain only [a-z0-9-]",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRoute {
    pub locality: Locality,
    pub ledger_partition: String,
    pub document_collection: String,
}

impl TenantRoute {
    pub fn for_locality(locality: &Locality) -> Self {
        Self {
            locality: locality.clone(),
            ledger_partition: format!("{}{}", locality.as_str(), LEDGER_PARTITION_SUFFIX),
            document_collection: format!("{}{}", locality.as_str(), DOCUMENT_COLLECTION_SUFFIX),
        }
    }
}
