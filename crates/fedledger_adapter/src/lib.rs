#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fedledger_engines::document_http::DOCUMENT_STORE_ENDPOINT_DEFAULT;
use fedledger_engines::http::{CONNECT_TIMEOUT_MS_DEFAULT, REQUEST_TIMEOUT_MS_DEFAULT};
use fedledger_engines::ledger_http::LEDGER_CHAINCODE_DEFAULT;
use fedledger_engines::oracle_http::ORACLE_ENDPOINT_DEFAULT;
use fedledger_engines::{
    BasicAuth, DocumentStoreHttpBackend, HttpEndpointConfig, LedgerHttpBackend, OracleHttpBackend,
};
use fedledger_kernel_contracts::{ContractViolation, DocumentBackend, LedgerBackend};
use fedledger_os::document_client::MAX_FETCH_CONCURRENCY_DEFAULT;
use fedledger_os::{
    Gateway, GatewayConfig, GatewayError, ResolvedUpdate, SubmissionOutcome, SubmissionState,
    SubmitUpdateRequest, TenantRouter,
};
use fedledger_storage::repo::{InMemoryDocumentStore, InMemoryLedger};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

pub const HTTP_BIND_DEFAULT: &str = "127.0.0.1:50051";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterConfigError {
    #[error("{key} is required when FEDLEDGER_BACKEND=http")]
    Missing { key: &'static str },

    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("gateway config rejected: {0}")]
    Gateway(#[from] ContractViolation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeBackend {
    Http,
    /// In-process ledger and document store; the oracle is still remote.
    Memory,
}

impl RuntimeBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeBackend::Http => "http",
            RuntimeBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub backend: RuntimeBackend,
    pub ledger_endpoint: Option<String>,
    pub ledger_chaincode: String,
    pub ledger_bearer: Option<String>,
    pub docstore_endpoint: String,
    pub docstore_auth: Option<BasicAuth>,
    pub oracle_endpoint: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_fetch_concurrency: usize,
    pub allowed_localities: Option<String>,
}

impl AdapterConfig {
    pub fn default_from_env() -> Result<Self, AdapterConfigError> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    /// Blank values count as unset. Out-of-range numbers fall back to defaults.
    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, AdapterConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |key: &str| {
            env_getter(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = var("FEDLEDGER_HTTP_BIND").unwrap_or_else(|| HTTP_BIND_DEFAULT.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|err| AdapterConfigError::Invalid {
                key: "FEDLEDGER_HTTP_BIND",
                reason: format!("'{bind_raw}': {err}"),
            })?;

        let backend = match var("FEDLEDGER_BACKEND")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("http") => RuntimeBackend::Http,
            Some("memory") => RuntimeBackend::Memory,
            Some(other) => {
                return Err(AdapterConfigError::Invalid {
                    key: "FEDLEDGER_BACKEND",
                    reason: format!("'{other}' is not one of http, memory"),
                })
            }
        };

        let ledger_endpoint = var("FEDLEDGER_LEDGER_ENDPOINT");
        if backend == RuntimeBackend::Http && ledger_endpoint.is_none() {
            return Err(AdapterConfigError::Missing {
                key: "FEDLEDGER_LEDGER_ENDPOINT",
            });
        }

        let docstore_auth = match (
            var("FEDLEDGER_DOCSTORE_USERNAME"),
            var("FEDLEDGER_DOCSTORE_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BasicAuth { username, password }),
            (None, None) => None,
            _ => {
                return Err(AdapterConfigError::Invalid {
                    key: "FEDLEDGER_DOCSTORE_USERNAME",
                    reason: "username and password must be set together".to_string(),
                })
            }
        };

        Ok(Self {
            bind,
            backend,
            ledger_endpoint,
            ledger_chaincode: var("FEDLEDGER_LEDGER_CHAINCODE")
                .unwrap_or_else(|| LEDGER_CHAINCODE_DEFAULT.to_string()),
            ledger_bearer: var("FEDLEDGER_LEDGER_BEARER"),
            docstore_endpoint: var("FEDLEDGER_DOCSTORE_ENDPOINT")
                .unwrap_or_else(|| DOCUMENT_STORE_ENDPOINT_DEFAULT.to_string()),
            docstore_auth,
            oracle_endpoint: var("FEDLEDGER_ORACLE_ENDPOINT")
                .unwrap_or_else(|| ORACLE_ENDPOINT_DEFAULT.to_string()),
            connect_timeout_ms: var("FEDLEDGER_CONNECT_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| (100..=60_000).contains(v))
                .unwrap_or(CONNECT_TIMEOUT_MS_DEFAULT),
            request_timeout_ms: var("FEDLEDGER_REQUEST_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| (100..=120_000).contains(v))
                .unwrap_or(REQUEST_TIMEOUT_MS_DEFAULT),
            max_fetch_concurrency: var("FEDLEDGER_MAX_FETCH_CONCURRENCY")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| (1..=64).contains(v))
                .unwrap_or(MAX_FETCH_CONCURRENCY_DEFAULT),
            allowed_localities: var("FEDLEDGER_ALLOWED_LOCALITIES"),
        })
    }

    fn endpoint(&self, key: &'static str, raw: &str) -> Result<HttpEndpointConfig, AdapterConfigError> {
        HttpEndpointConfig::new(raw)
            .map(|c| c.with_timeouts(self.connect_timeout_ms, self.request_timeout_ms))
            .map_err(|reason| AdapterConfigError::Invalid { key, reason })
    }
}

#[derive(Clone)]
pub struct AdapterRuntime {
    gateway: Gateway,
    backend: RuntimeBackend,
}

impl AdapterRuntime {
    pub fn new(gateway: Gateway, backend: RuntimeBackend) -> Self {
        Self { gateway, backend }
    }

    pub fn default_from_env() -> Result<Self, AdapterConfigError> {
        Self::from_config(&AdapterConfig::default_from_env()?)
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, AdapterConfigError> {
        let router = match config.allowed_localities.as_deref() {
            Some(raw) => TenantRouter::from_allow_list_csv(raw).map_err(|v| {
                AdapterConfigError::Invalid {
                    key: "FEDLEDGER_ALLOWED_LOCALITIES",
                    reason: v.to_string(),
                }
            })?,
            None => TenantRouter::open(),
        };

        let oracle = OracleHttpBackend::new(
            config.endpoint("FEDLEDGER_ORACLE_ENDPOINT", &config.oracle_endpoint)?,
        );
        let (ledger, documents): (Arc<dyn LedgerBackend>, Arc<dyn DocumentBackend>) =
            match config.backend {
                RuntimeBackend::Memory => (
                    Arc::new(InMemoryLedger::new()),
                    Arc::new(InMemoryDocumentStore::new()),
                ),
                RuntimeBackend::Http => {
                    let ledger_raw = config.ledger_endpoint.as_deref().ok_or(
                        AdapterConfigError::Missing {
                            key: "FEDLEDGER_LEDGER_ENDPOINT",
                        },
                    )?;
                    let ledger = config
                        .endpoint("FEDLEDGER_LEDGER_ENDPOINT", ledger_raw)?
                        .with_bearer_token(config.ledger_bearer.clone());
                    let documents = config
                        .endpoint("FEDLEDGER_DOCSTORE_ENDPOINT", &config.docstore_endpoint)?
                        .with_basic_auth(config.docstore_auth.clone());
                    (
                        Arc::new(LedgerHttpBackend::new(ledger, config.ledger_chaincode.clone())),
                        Arc::new(DocumentStoreHttpBackend::new(documents)),
                    )
                }
            };

        let gateway_config = GatewayConfig {
            max_fetch_concurrency: config.max_fetch_concurrency,
            ..GatewayConfig::mvp_v1()
        };
        let gateway = Gateway::new(gateway_config, router, ledger, documents, Arc::new(oracle))?;
        Ok(Self::new(gateway, config.backend))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        let labels = self.gateway.backend_labels();
        AdapterHealthResponse {
            status: "ok".to_string(),
            backend: self.backend.as_str().to_string(),
            ledger: labels.ledger.to_string(),
            documents: labels.documents.to_string(),
            oracle: labels.oracle.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitUpdateAdapterRequest {
    #[serde(default)]
    pub participant_id: String,
    #[serde(default)]
    pub state_dict: Value,
    #[serde(default)]
    pub proof: Value,
    #[serde(default)]
    pub scheme: Option<String>,
}

impl From<SubmitUpdateAdapterRequest> for SubmitUpdateRequest {
    fn from(req: SubmitUpdateAdapterRequest) -> Self {
        SubmitUpdateRequest {
            participant_id: req.participant_id,
            state_dict: req.state_dict,
            proof: req.proof,
            scheme: req.scheme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitUpdateAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub locality: String,
    pub participant_id: String,
    pub document_id: String,
    pub transaction_id: String,
    pub trail: Vec<SubmissionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListUpdatesAdapterResponse {
    pub status: String,
    pub locality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub count: usize,
    pub updates: Vec<ResolvedUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitTenantAdapterResponse {
    pub status: String,
    pub locality: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub backend: String,
    pub ledger: String,
    pub documents: String,
    pub oracle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterErrorResponse {
    pub status: String,
    pub kind: String,
    pub step: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan_document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_document_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail: Option<Vec<SubmissionState>>,
}

impl AdapterErrorResponse {
    fn new(kind: &str, step: &str, reason: String) -> Self {
        Self {
            status: "error".to_string(),
            kind: kind.to_string(),
            step: step.to_string(),
            reason,
            orphan_document_id: None,
            document_id: None,
            missing_document_ids: Vec::new(),
            trail: None,
        }
    }
}

impl From<&GatewayError> for AdapterErrorResponse {
    fn from(err: &GatewayError) -> Self {
        let mut body = Self::new(err.kind(), err.step().as_str(), err.to_string());
        body.orphan_document_id = err.orphan_document_id().map(|id| id.as_str().to_string());
        body.document_id = err.document_id().map(|id| id.as_str().to_string());
        body.missing_document_ids = err
            .missing_document_ids()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        body
    }
}

pub fn status_for_error(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
        GatewayError::OracleUnavailable { .. }
        | GatewayError::StoreWrite { .. }
        | GatewayError::StoreRead { .. }
        | GatewayError::LedgerInvoke { .. }
        | GatewayError::LedgerQuery { .. }
        | GatewayError::LedgerResult { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::ConsistencyViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(runtime: Arc<AdapterRuntime>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/v1/tenants/:locality/updates",
            post(submit_update).get(list_updates),
        )
        .route(
            "/v1/tenants/:locality/participants/:participant_id/updates",
            get(list_updates_by_participant),
        )
        .route("/v1/tenants/:locality/init", post(init_tenant))
        .with_state(runtime)
}

async fn healthz(State(runtime): State<Arc<AdapterRuntime>>) -> Response {
    (StatusCode::OK, Json(runtime.health_report())).into_response()
}

async fn submit_update(
    State(runtime): State<Arc<AdapterRuntime>>,
    Path(locality): Path<String>,
    body: Result<Json<SubmitUpdateAdapterRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                AdapterErrorResponse::new("validation", "received", rejection.body_text()),
            )
        }
    };
    let result = run_blocking(runtime, {
        let locality = locality.clone();
        move |rt| rt.gateway().submit_update(&locality, body.into())
    })
    .await;
    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => return gateway_error_response(&err),
        Err(resp) => return resp,
    };
    match outcome {
        SubmissionOutcome::Done(receipt) => {
            info!(
                locality = receipt.locality.as_str(),
                participant_id = receipt.participant_id.as_str(),
                document_id = receipt.document_id.as_str(),
                transaction_id = receipt.transaction_id.as_str(),
                "update committed"
            );
            (
                StatusCode::CREATED,
                Json(SubmitUpdateAdapterResponse {
                    status: "ok".to_string(),
                    outcome: "DONE".to_string(),
                    locality: receipt.locality,
                    participant_id: receipt.participant_id.as_str().to_string(),
                    document_id: receipt.document_id.as_str().to_string(),
                    transaction_id: receipt.transaction_id,
                    trail: receipt.trail,
                }),
            )
                .into_response()
        }
        SubmissionOutcome::Rejected { trail } => {
            info!(locality = locality.as_str(), "update rejected by oracle");
            let mut body = AdapterErrorResponse::new(
                "rejected",
                SubmissionState::Verifying.as_str(),
                "verification oracle rejected the update".to_string(),
            );
            body.trail = Some(trail);
            error_response(StatusCode::FORBIDDEN, body)
        }
    }
}

async fn list_updates(
    State(runtime): State<Arc<AdapterRuntime>>,
    Path(locality): Path<String>,
) -> Response {
    let result = run_blocking(runtime, {
        let locality = locality.clone();
        move |rt| rt.gateway().list_updates(&locality)
    })
    .await;
    list_response(result, locality, None)
}

async fn list_updates_by_participant(
    State(runtime): State<Arc<AdapterRuntime>>,
    Path((locality, participant_id)): Path<(String, String)>,
) -> Response {
    let result = run_blocking(runtime, {
        let locality = locality.clone();
        let participant_id = participant_id.clone();
        move |rt| {
            rt.gateway()
                .list_updates_by_participant(&locality, &participant_id)
        }
    })
    .await;
    list_response(result, locality, Some(participant_id))
}

async fn init_tenant(
    State(runtime): State<Arc<AdapterRuntime>>,
    Path(locality): Path<String>,
) -> Response {
    let result = run_blocking(runtime, {
        let locality = locality.clone();
        move |rt| rt.gateway().init_tenant(&locality)
    })
    .await;
    match result {
        Ok(Ok(tx)) => (
            StatusCode::OK,
            Json(InitTenantAdapterResponse {
                status: "ok".to_string(),
                locality,
                transaction_id: tx.as_str().to_string(),
            }),
        )
            .into_response(),
        Ok(Err(err)) => gateway_error_response(&err),
        Err(resp) => resp,
    }
}

fn list_response(
    result: Result<Result<Vec<ResolvedUpdate>, GatewayError>, Response>,
    locality: String,
    participant_id: Option<String>,
) -> Response {
    match result {
        Ok(Ok(updates)) => (
            StatusCode::OK,
            Json(ListUpdatesAdapterResponse {
                status: "ok".to_string(),
                locality,
                participant_id,
                count: updates.len(),
                updates,
            }),
        )
            .into_response(),
        Ok(Err(err)) => gateway_error_response(&err),
        Err(resp) => resp,
    }
}

/// Gateway calls block on outbound HTTP; keep them off the async workers.
async fn run_blocking<T, F>(runtime: Arc<AdapterRuntime>, f: F) -> Result<T, Response>
where
    F: FnOnce(&AdapterRuntime) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&runtime))
        .await
        .map_err(|err| {
            error!(error = %err, "gateway worker did not complete");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                AdapterErrorResponse::new("internal", "worker", "gateway worker failed".to_string()),
            )
        })
}

fn gateway_error_response(err: &GatewayError) -> Response {
    let status = status_for_error(err);
    if status.is_server_error() {
        warn!(kind = err.kind(), step = err.step().as_str(), "request failed: {err}");
    }
    error_response(status, AdapterErrorResponse::from(err))
}

fn error_response(status: StatusCode, body: AdapterErrorResponse) -> Response {
    (status, Json(body)).into_response()
}
