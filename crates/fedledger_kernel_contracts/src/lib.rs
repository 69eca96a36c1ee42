#![forbid(unsafe_code)]

pub mod backend;
pub mod common;
pub mod document;
pub mod ledger;
pub mod tenant;
pub mod verify;

pub use backend::{CollaboratorError, DocumentBackend, LedgerBackend, OracleBackend};
pub use common::{ContractViolation, Validate};
