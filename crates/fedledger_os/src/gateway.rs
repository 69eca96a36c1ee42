#![forbid(unsafe_code)]

use std::sync::Arc;

use fedledger_kernel_contracts::ledger::{ParticipantId, TransactionId};
use fedledger_kernel_contracts::{
    ContractViolation, DocumentBackend, LedgerBackend, OracleBackend,
};
use tracing::info;

use crate::commit_orchestrator::{CommitOrchestrator, SubmissionOutcome, SubmitUpdateRequest};
use crate::document_client::{
    DocumentStoreClient, MAX_FETCH_CONCURRENCY_DEFAULT, MAX_FETCH_CONCURRENCY_LIMIT,
};
use crate::error::{GatewayError, PipelineStep};
use crate::ledger_client::LedgerClient;
use crate::query_aggregator::{QueryAggregator, ResolvedUpdate, MAX_POINTERS_PER_READ_DEFAULT};
use crate::tenant_router::TenantRouter;
use crate::verification_client::VerificationClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub max_fetch_concurrency: usize,
    pub max_pointers_per_read: usize,
}

impl GatewayConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_fetch_concurrency: MAX_FETCH_CONCURRENCY_DEFAULT,
            max_pointers_per_read: MAX_POINTERS_PER_READ_DEFAULT,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

/// Labels of the three collaborator backends, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLabels {
    pub ledger: &'static str,
    pub documents: &'static str,
    pub oracle: &'static str,
}

/// Entry point for every inbound operation. Holds no per-request state; one
/// instance is shared across all workers.
#[derive(Clone)]
pub struct Gateway {
    router: TenantRouter,
    ledger: LedgerClient,
    aggregator: QueryAggregator,
    orchestrator: CommitOrchestrator,
    labels: BackendLabels,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        router: TenantRouter,
        ledger: Arc<dyn LedgerBackend>,
        documents: Arc<dyn DocumentBackend>,
        oracle: Arc<dyn OracleBackend>,
    ) -> Result<Self, ContractViolation> {
        if config.max_fetch_concurrency == 0
            || config.max_fetch_concurrency > MAX_FETCH_CONCURRENCY_LIMIT
        {
            return Err(ContractViolation::InvalidValue {
                field: "gateway_config.max_fetch_concurrency",
                reason: "must be within 1..=64",
            });
        }
        if config.max_pointers_per_read == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "gateway_config.max_pointers_per_read",
                reason: "must be > 0",
            });
        }

        let labels = BackendLabels {
            ledger: ledger.label(),
            documents: documents.label(),
            oracle: oracle.label(),
        };
        let ledger = LedgerClient::new(ledger);
        let documents = DocumentStoreClient::new(documents, config.max_fetch_concurrency);
        let verifier = VerificationClient::new(oracle);
        Ok(Self {
            router,
            aggregator: QueryAggregator::new(documents.clone(), config.max_pointers_per_read),
            orchestrator: CommitOrchestrator::new(verifier, documents, ledger.clone()),
            ledger,
            labels,
        })
    }

    pub fn backend_labels(&self) -> BackendLabels {
        self.labels
    }

    pub fn submit_update(
        &self,
        locality: &str,
        request: SubmitUpdateRequest,
    ) -> Result<SubmissionOutcome, GatewayError> {
        let route = self.router.resolve(locality)?;
        self.orchestrator.submit(&route, request)
    }

    pub fn list_updates(&self, locality: &str) -> Result<Vec<ResolvedUpdate>, GatewayError> {
        let route = self.router.resolve(locality)?;
        let pointers = self.ledger.list_pointers(&route.ledger_partition, None)?;
        self.aggregator
            .resolve(&route.document_collection, &pointers)
    }

    pub fn list_updates_by_participant(
        &self,
        locality: &str,
        participant_id: &str,
    ) -> Result<Vec<ResolvedUpdate>, GatewayError> {
        let route = self.router.resolve(locality)?;
        let participant_id = ParticipantId::new(participant_id)
            .map_err(|v| GatewayError::validation(PipelineStep::Route, v))?;
        let pointers = self
            .ledger
            .list_pointers(&route.ledger_partition, Some(&participant_id))?;
        self.aggregator
            .resolve(&route.document_collection, &pointers)
    }

    pub fn init_tenant(&self, locality: &str) -> Result<TransactionId, GatewayError> {
        let route = self.router.resolve(locality)?;
        let tx = self.ledger.init_partition(&route.ledger_partition)?;
        info!(
            locality = route.locality.as_str(),
            partition = route.ledger_partition.as_str(),
            transaction_id = tx.as_str(),
            "tenant partition initialised"
        );
        Ok(tx)
    }
}
