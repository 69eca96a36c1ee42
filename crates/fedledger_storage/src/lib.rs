#![forbid(unsafe_code)]

pub mod document_store;
pub mod ledger_store;
pub mod repo;

use fedledger_kernel_contracts::ContractViolation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    UnknownFunction { name: String },
    FunctionNotAllowed { function: &'static str, mode: &'static str },
    ContractArgs { function: &'static str, expected: usize, got: usize },
    InvalidDocument { reason: &'static str },
    Encoding { detail: String },
    LockPoisoned { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::UnknownFunction { name } => write!(f, "unknown contract function '{name}'"),
            StorageError::FunctionNotAllowed { function, mode } => {
                write!(f, "contract function {function} is not allowed as {mode}")
            }
            StorageError::ContractArgs {
                function,
                expected,
                got,
            } => write!(f, "{function} expects {expected} args, got {got}"),
            StorageError::InvalidDocument { reason } => write!(f, "invalid document: {reason}"),
            StorageError::Encoding { detail } => write!(f, "encoding failed: {detail}"),
            StorageError::LockPoisoned { table } => write!(f, "{table} lock poisoned"),
            StorageError::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

pub(crate) fn sha256_hex(parts: &[&[u8]]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}
