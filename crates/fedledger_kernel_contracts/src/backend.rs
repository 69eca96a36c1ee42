#![forbid(unsafe_code)]

use std::fmt;

use crate::document::Document;
use crate::ledger::{DocumentId, LedgerFunction, TransactionId};
use crate::verify::VerificationRequest;

pub const COLLABORATOR_DETAIL_MAX_LEN: usize = 1024;

/// Failure of one outbound call to a collaborator. The gateway attaches the
/// pipeline step; this type only says what went wrong on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    Transport { detail: String },
    Timeout { detail: String },
    Status { status: u16, body: String },
    NotFound { detail: String },
    Decode { detail: String },
    Backend { detail: String },
}

impl CollaboratorError {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: bounded(detail.into()),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout {
            detail: bounded(detail.into()),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: bounded(body.into()),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound {
            detail: bounded(detail.into()),
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: bounded(detail.into()),
        }
    }

    pub fn backend(detail: impl Into<String>) -> Self {
        Self::Backend {
            detail: bounded(detail.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CollaboratorError::Transport { .. } => "transport",
            CollaboratorError::Timeout { .. } => "timeout",
            CollaboratorError::Status { .. } => "http_status",
            CollaboratorError::NotFound { .. } => "not_found",
            CollaboratorError::Decode { .. } => "decode",
            CollaboratorError::Backend { .. } => "backend",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CollaboratorError::NotFound { .. })
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            CollaboratorError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorError::Status { status, body } => {
                write!(f, "http status {status}: {body}")
            }
            CollaboratorError::Transport { detail }
            | CollaboratorError::Timeout { detail }
            | CollaboratorError::NotFound { detail }
            | CollaboratorError::Decode { detail }
            | CollaboratorError::Backend { detail } => write!(f, "{}: {detail}", self.kind()),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Caps the detail at `COLLABORATOR_DETAIL_MAX_LEN` bytes on a char boundary.
fn bounded(mut msg: String) -> String {
    if msg.len() > COLLABORATOR_DETAIL_MAX_LEN {
        let mut end = COLLABORATOR_DETAIL_MAX_LEN;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        msg.truncate(end);
    }
    msg
}

/// Raw ledger surface: submit a contract transaction or evaluate a read-only one.
pub trait LedgerBackend: Send + Sync {
    fn label(&self) -> &'static str;

    fn invoke(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<TransactionId, CollaboratorError>;

    /// Returns the contract's raw JSON result bytes.
    fn query(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<Vec<u8>, CollaboratorError>;
}

/// Raw document store surface: one call per document, no bulk operations.
pub trait DocumentBackend: Send + Sync {
    fn label(&self) -> &'static str;

    fn create(&self, collection: &str, document: &Document)
        -> Result<DocumentId, CollaboratorError>;

    fn get(&self, collection: &str, document_id: &DocumentId)
        -> Result<Document, CollaboratorError>;
}

pub trait OracleBackend: Send + Sync {
    fn label(&self) -> &'static str;

    fn verify(&self, request: &VerificationRequest) -> Result<bool, CollaboratorError>;
}
