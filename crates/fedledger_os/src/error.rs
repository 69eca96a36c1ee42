#![forbid(unsafe_code)]

use std::fmt;

use fedledger_kernel_contracts::ledger::DocumentId;
use fedledger_kernel_contracts::{CollaboratorError, ContractViolation};
use thiserror::Error;

/// Pipeline step that produced an error. Reported verbatim to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Route,
    Received,
    Verifying,
    Persisting,
    Pointing,
    ListPointers,
    FetchDocuments,
    Aggregate,
    InitPartition,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Route => "route",
            PipelineStep::Received => "received",
            PipelineStep::Verifying => "verifying",
            PipelineStep::Persisting => "persisting",
            PipelineStep::Pointing => "pointing",
            PipelineStep::ListPointers => "list_pointers",
            PipelineStep::FetchDocuments => "fetch_documents",
            PipelineStep::Aggregate => "aggregate",
            PipelineStep::InitPartition => "init_partition",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one gateway operation. Nothing is retried; the collaborator
/// detail is carried as received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("validation failed at {step}: {violation}")]
    Validation {
        step: PipelineStep,
        violation: ContractViolation,
    },

    #[error("verification oracle unavailable: {detail}")]
    OracleUnavailable {
        step: PipelineStep,
        #[source]
        detail: CollaboratorError,
    },

    #[error("document store write failed: {detail}")]
    StoreWrite {
        step: PipelineStep,
        #[source]
        detail: CollaboratorError,
    },

    #[error("document store read failed{}: {}", for_document(.document_id.as_ref()), .detail)]
    StoreRead {
        step: PipelineStep,
        document_id: Option<DocumentId>,
        #[source]
        detail: CollaboratorError,
    },

    #[error("ledger invoke failed: {detail}")]
    LedgerInvoke {
        step: PipelineStep,
        orphan_document_id: Option<DocumentId>,
        #[source]
        detail: CollaboratorError,
    },

    #[error("ledger query failed: {detail}")]
    LedgerQuery {
        step: PipelineStep,
        #[source]
        detail: CollaboratorError,
    },

    /// The ledger answered, but the result cannot be used.
    #[error("ledger result rejected: {reason}")]
    LedgerResult { step: PipelineStep, reason: String },

    #[error(
        "consistency violation: {} pointer(s) reference missing documents: {}",
        .missing_document_ids.len(),
        join_document_ids(.missing_document_ids)
    )]
    ConsistencyViolation {
        step: PipelineStep,
        missing_document_ids: Vec<DocumentId>,
    },
}

impl GatewayError {
    pub fn validation(step: PipelineStep, violation: ContractViolation) -> Self {
        GatewayError::Validation { step, violation }
    }

    pub fn step(&self) -> PipelineStep {
        match self {
            GatewayError::Validation { step, .. }
            | GatewayError::OracleUnavailable { step, .. }
            | GatewayError::StoreWrite { step, .. }
            | GatewayError::StoreRead { step, .. }
            | GatewayError::LedgerInvoke { step, .. }
            | GatewayError::LedgerQuery { step, .. }
            | GatewayError::LedgerResult { step, .. }
            | GatewayError::ConsistencyViolation { step, .. } => *step,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation",
            GatewayError::OracleUnavailable { .. } => "oracle_unavailable",
            GatewayError::StoreWrite { .. } => "store_write",
            GatewayError::StoreRead { .. } => "store_read",
            GatewayError::LedgerInvoke { .. } => "ledger_invoke",
            GatewayError::LedgerQuery { .. } | GatewayError::LedgerResult { .. } => {
                "ledger_query"
            }
            GatewayError::ConsistencyViolation { .. } => "consistency_violation",
        }
    }

    /// Caller errors are detected before any outbound call is made.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, GatewayError::Validation { .. })
    }

    /// Document persisted without a pointer; external reconciliation needs it.
    pub fn orphan_document_id(&self) -> Option<&DocumentId> {
        match self {
            GatewayError::LedgerInvoke {
                orphan_document_id, ..
            } => orphan_document_id.as_ref(),
            _ => None,
        }
    }

    /// Document whose read failed, when the failure is tied to one.
    pub fn document_id(&self) -> Option<&DocumentId> {
        match self {
            GatewayError::StoreRead { document_id, .. } => document_id.as_ref(),
            _ => None,
        }
    }

    pub fn missing_document_ids(&self) -> &[DocumentId] {
        match self {
            GatewayError::ConsistencyViolation {
                missing_document_ids,
                ..
            } => missing_document_ids,
            _ => &[],
        }
    }

    pub(crate) fn with_orphan_document(self, document_id: &DocumentId) -> Self {
        match self {
            GatewayError::LedgerInvoke { step, detail, .. } => GatewayError::LedgerInvoke {
                step,
                orphan_document_id: Some(document_id.clone()),
                detail,
            },
            other => other,
        }
    }
}

fn for_document(document_id: Option<&DocumentId>) -> String {
    document_id
        .map(|id| format!(" for {}", id.as_str()))
        .unwrap_or_default()
}

pub(crate) fn join_document_ids(ids: &[DocumentId]) -> String {
    ids.iter()
        .map(DocumentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
