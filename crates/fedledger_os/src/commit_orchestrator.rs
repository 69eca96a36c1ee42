#![forbid(unsafe_code)]

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::{DocumentId, ParticipantId, TransactionId};
use fedledger_kernel_contracts::tenant::{Locality, TenantRoute};
use fedledger_kernel_contracts::verify::{VerificationRequest, VerificationScheme};
use fedledger_kernel_contracts::ContractViolation;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::document_client::DocumentStoreClient;
use crate::error::{GatewayError, PipelineStep};
use crate::ledger_client::LedgerClient;
use crate::verification_client::VerificationClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Received,
    Verifying,
    Verified,
    Rejected,
    Persisting,
    Pointed,
    Done,
    Failed,
}

impl SubmissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionState::Received => "received",
            SubmissionState::Verifying => "verifying",
            SubmissionState::Verified => "verified",
            SubmissionState::Rejected => "rejected",
            SubmissionState::Persisting => "persisting",
            SubmissionState::Pointed => "pointed",
            SubmissionState::Done => "done",
            SubmissionState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionState::Done | SubmissionState::Rejected | SubmissionState::Failed
        )
    }
}

/// Unvalidated submission as received from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitUpdateRequest {
    pub participant_id: String,
    pub state_dict: Value,
    pub proof: Value,
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub locality: String,
    pub participant_id: ParticipantId,
    pub document_id: DocumentId,
    pub transaction_id: String,
    pub trail: Vec<SubmissionState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Done(SubmissionReceipt),
    /// Oracle said no. Nothing was written.
    Rejected { trail: Vec<SubmissionState> },
}

struct Trail<'a> {
    locality: &'a Locality,
    participant_id: Option<&'a str>,
    states: Vec<SubmissionState>,
}

impl<'a> Trail<'a> {
    fn start(locality: &'a Locality) -> Self {
        let mut trail = Self {
            locality,
            participant_id: None,
            states: Vec::with_capacity(6),
        };
        trail.enter(SubmissionState::Received);
        trail
    }

    fn enter(&mut self, state: SubmissionState) {
        info!(
            locality = self.locality.as_str(),
            participant_id = self.participant_id.unwrap_or(""),
            state = state.as_str(),
            "submission state"
        );
        self.states.push(state);
    }

    fn fail(&mut self, err: GatewayError) -> GatewayError {
        warn!(
            locality = self.locality.as_str(),
            participant_id = self.participant_id.unwrap_or(""),
            step = err.step().as_str(),
            kind = err.kind(),
            orphan_document_id = err.orphan_document_id().map(DocumentId::as_str),
            "submission failed: {err}"
        );
        self.states.push(SubmissionState::Failed);
        err
    }
}

/// Verify, then persist, then point. The document write always precedes the
/// pointer write, so a pointer never references a missing document.
#[derive(Clone)]
pub struct CommitOrchestrator {
    verifier: VerificationClient,
    documents: DocumentStoreClient,
    ledger: LedgerClient,
}

impl CommitOrchestrator {
    pub fn new(
        verifier: VerificationClient,
        documents: DocumentStoreClient,
        ledger: LedgerClient,
    ) -> Self {
        Self {
            verifier,
            documents,
            ledger,
        }
    }

    pub fn submit(
        &self,
        route: &TenantRoute,
        request: SubmitUpdateRequest,
    ) -> Result<SubmissionOutcome, GatewayError> {
        let mut trail = Trail::start(&route.locality);

        let (participant_id, verification) = match validate_submission(request) {
            Ok(valid) => valid,
            Err(v) => return Err(trail.fail(GatewayError::validation(PipelineStep::Received, v))),
        };
        let participant = participant_id.as_str().to_string();
        trail.participant_id = Some(participant.as_str());

        trail.enter(SubmissionState::Verifying);
        let verified = match self.verifier.verify(&verification) {
            Ok(verified) => verified,
            Err(err) => return Err(trail.fail(err)),
        };
        if !verified {
            trail.enter(SubmissionState::Rejected);
            return Ok(SubmissionOutcome::Rejected {
                trail: trail.states,
            });
        }
        trail.enter(SubmissionState::Verified);

        trail.enter(SubmissionState::Persisting);
        let document = Document::model_update(&participant_id, verification.payload);
        let document_id = match self.documents.create(&route.document_collection, &document) {
            Ok(id) => id,
            Err(err) => return Err(trail.fail(err)),
        };

        let transaction_id = match self.ledger.record_pointer(
            &route.ledger_partition,
            &participant_id,
            &document_id,
        ) {
            Ok(tx) => tx,
            Err(err) => return Err(trail.fail(err.with_orphan_document(&document_id))),
        };
        trail.enter(SubmissionState::Pointed);
        trail.enter(SubmissionState::Done);

        let TransactionId(transaction_id) = transaction_id;
        Ok(SubmissionOutcome::Done(SubmissionReceipt {
            locality: route.locality.as_str().to_string(),
            participant_id,
            document_id,
            transaction_id,
            trail: trail.states,
        }))
    }
}

fn validate_submission(
    request: SubmitUpdateRequest,
) -> Result<(ParticipantId, VerificationRequest), ContractViolation> {
    if request.participant_id.is_empty() {
        return Err(ContractViolation::Missing {
            field: "participant_id",
        });
    }
    let participant_id = ParticipantId::new(request.participant_id)?;
    if participant_id.is_sentinel() {
        return Err(ContractViolation::InvalidValue {
            field: "participant_id",
            reason: "is reserved",
        });
    }
    let scheme = match request.scheme.as_deref() {
        Some(raw) => VerificationScheme::parse(raw)?,
        None => VerificationScheme::default(),
    };
    let verification = VerificationRequest::v1(scheme, request.state_dict, request.proof)?;
    Ok((participant_id, verification))
}
