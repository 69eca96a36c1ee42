#![forbid(unsafe_code)]

pub mod commit_orchestrator;
pub mod document_client;
pub mod error;
pub mod gateway;
pub mod ledger_client;
pub mod query_aggregator;
pub mod tenant_router;
pub mod verification_client;

pub use commit_orchestrator::{
    SubmissionOutcome, SubmissionReceipt, SubmissionState, SubmitUpdateRequest,
};
pub use error::{GatewayError, PipelineStep};
pub use gateway::{BackendLabels, Gateway, GatewayConfig};
pub use query_aggregator::ResolvedUpdate;
pub use tenant_router::TenantRouter;
