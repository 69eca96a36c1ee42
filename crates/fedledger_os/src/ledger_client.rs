#![forbid(unsafe_code)]

use std::sync::Arc;

use fedledger_kernel_contracts::ledger::{
    DocumentId, LedgerFunction, ParticipantId, PointerRecord, TransactionId,
};
use fedledger_kernel_contracts::{CollaboratorError, LedgerBackend, Validate};
use tracing::{debug, warn};

use crate::error::{GatewayError, PipelineStep};

/// Typed facade over the pointer contract. Every call names its partition.
#[derive(Clone)]
pub struct LedgerClient {
    backend: Arc<dyn LedgerBackend>,
}

impl LedgerClient {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    pub fn record_pointer(
        &self,
        partition: &str,
        participant_id: &ParticipantId,
        document_id: &DocumentId,
    ) -> Result<TransactionId, GatewayError> {
        let args = [
            participant_id.as_str().to_string(),
            document_id.as_str().to_string(),
        ];
        let tx = self
            .invoke(partition, LedgerFunction::StoreUpdate, &args)
            .map_err(|detail| GatewayError::LedgerInvoke {
                step: PipelineStep::Pointing,
                orphan_document_id: None,
                detail,
            })?;
        debug!(
            partition,
            participant_id = participant_id.as_str(),
            document_id = document_id.as_str(),
            transaction_id = tx.as_str(),
            "pointer recorded"
        );
        Ok(tx)
    }

    pub fn init_partition(&self, partition: &str) -> Result<TransactionId, GatewayError> {
        self.invoke(partition, LedgerFunction::InitLedger, &[])
            .map_err(|detail| GatewayError::LedgerInvoke {
                step: PipelineStep::InitPartition,
                orphan_document_id: None,
                detail,
            })
    }

    /// Pointers in the order the ledger returns them, sentinel included.
    pub fn list_pointers(
        &self,
        partition: &str,
        participant_filter: Option<&ParticipantId>,
    ) -> Result<Vec<PointerRecord>, GatewayError> {
        let (function, args) = match participant_filter {
            Some(participant_id) => (
                LedgerFunction::QueryByParticipantId,
                vec![participant_id.as_str().to_string()],
            ),
            None => (LedgerFunction::QueryUpdate, Vec::new()),
        };
        let bytes = self
            .backend
            .query(partition, function, &args)
            .map_err(|detail| {
                warn!(
                    backend = self.backend.label(),
                    partition,
                    function = function.as_str(),
                    kind = detail.kind(),
                    "ledger query failed"
                );
                GatewayError::LedgerQuery {
                    step: PipelineStep::ListPointers,
                    detail,
                }
            })?;
        let pointers = decode_pointers(&bytes).map_err(|reason| {
            warn!(partition, function = function.as_str(), %reason, "ledger result rejected");
            GatewayError::LedgerResult {
                step: PipelineStep::ListPointers,
                reason,
            }
        })?;
        debug!(
            partition,
            function = function.as_str(),
            count = pointers.len(),
            "pointers listed"
        );
        Ok(pointers)
    }

    fn invoke(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<TransactionId, CollaboratorError> {
        self.backend
            .invoke(partition, function, args)
            .map_err(|detail| {
                warn!(
                    backend = self.backend.label(),
                    partition,
                    function = function.as_str(),
                    kind = detail.kind(),
                    "ledger invoke failed"
                );
                detail
            })
    }
}

/// Contract output is a JSON array of pointer records; an empty body or
/// `null` is an empty result set.
fn decode_pointers(bytes: &[u8]) -> Result<Vec<PointerRecord>, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let pointers: Option<Vec<PointerRecord>> = serde_json::from_slice(bytes)
        .map_err(|err| format!("undecodable pointer list: {err}"))?;
    let pointers = pointers.unwrap_or_default();
    for pointer in &pointers {
        pointer
            .validate()
            .map_err(|v| format!("invalid pointer record: {v}"))?;
    }
    Ok(pointers)
}
