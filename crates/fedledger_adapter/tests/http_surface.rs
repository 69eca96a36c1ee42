#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use fedledger_adapter::{router, AdapterRuntime, RuntimeBackend};
use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::{LedgerFunction, ParticipantId, TransactionId};
use fedledger_kernel_contracts::verify::VerificationRequest;
use fedledger_kernel_contracts::{
    CollaboratorError, DocumentBackend, LedgerBackend, OracleBackend,
};
use fedledger_os::{Gateway, GatewayConfig, TenantRouter};
use fedledger_storage::repo::{InMemoryDocumentStore, InMemoryLedger};
use serde_json::{json, Value};
use tower::ServiceExt;

struct ScriptedOracle {
    verdict: AtomicBool,
}

impl OracleBackend for ScriptedOracle {
    fn label(&self) -> &'static str {
        "scripted_oracle"
    }

    fn verify(&self, _: &VerificationRequest) -> Result<bool, CollaboratorError> {
        Ok(self.verdict.load(Ordering::SeqCst))
    }
}

struct DownLedger;

impl LedgerBackend for DownLedger {
    fn label(&self) -> &'static str {
        "down_ledger"
    }

    fn invoke(
        &self,
        _: &str,
        _: LedgerFunction,
        _: &[String],
    ) -> Result<TransactionId, CollaboratorError> {
        Err(CollaboratorError::transport("connection refused"))
    }

    fn query(&self, _: &str, _: LedgerFunction, _: &[String]) -> Result<Vec<u8>, CollaboratorError> {
        Err(CollaboratorError::transport("connection refused"))
    }
}

/// Read-only ledger that answers every query with a fixed contract result.
struct FixedLedger {
    result: Vec<u8>,
}

impl LedgerBackend for FixedLedger {
    fn label(&self) -> &'static str {
        "fixed_ledger"
    }

    fn invoke(
        &self,
        _: &str,
        _: LedgerFunction,
        _: &[String],
    ) -> Result<TransactionId, CollaboratorError> {
        Err(CollaboratorError::backend("read only"))
    }

    fn query(&self, _: &str, _: LedgerFunction, _: &[String]) -> Result<Vec<u8>, CollaboratorError> {
        Ok(self.result.clone())
    }
}

fn app_with(ledger: Arc<dyn LedgerBackend>, verdict: bool) -> Router {
    app_with_documents(ledger, InMemoryDocumentStore::new(), verdict)
}

fn app_with_documents(
    ledger: Arc<dyn LedgerBackend>,
    documents: InMemoryDocumentStore,
    verdict: bool,
) -> Router {
    let gateway = Gateway::new(
        GatewayConfig::mvp_v1(),
        TenantRouter::from_allow_list_csv("org1,org2").unwrap(),
        ledger,
        Arc::new(documents),
        Arc::new(ScriptedOracle {
            verdict: AtomicBool::new(verdict),
        }),
    )
    .unwrap();
    router(Arc::new(AdapterRuntime::new(gateway, RuntimeBackend::Memory)))
}

fn app() -> Router {
    app_with(Arc::new(InMemoryLedger::new()), true)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn update(participant_id: &str, state_dict: Value) -> Value {
    json!({
        "participant_id": participant_id,
        "state_dict": state_dict,
        "proof": {"salt": "s1", "hash": "h1"},
        "scheme": "hash"
    })
}

#[tokio::test]
async fn at_http_surface_01_submit_then_list() {
    let app = app();
    let (status, body) = send(&app, "POST", "/v1/tenants/org1/init", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org1/updates",
        Some(update("client1", json!({"w": [1.5]}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "DONE");
    assert_eq!(body["trail"].as_array().unwrap().len(), 6);
    let document_id = body["document_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/v1/tenants/org1/updates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["updates"][0]["document_id"], document_id.as_str());
    assert_eq!(body["updates"][0]["state_dict"], json!({"w": [1.5]}));

    let (status, body) = send(
        &app,
        "GET",
        "/v1/tenants/org1/participants/client1/updates",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_id"], "client1");
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn at_http_surface_02_rejected_verification_is_403() {
    let app = app_with(Arc::new(InMemoryLedger::new()), false);
    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org1/updates",
        Some(update("client1", json!({"w": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "rejected");
    assert_eq!(body["step"], "verifying");

    let (_, body) = send(&app, "GET", "/v1/tenants/org1/updates", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn at_http_surface_03_validation_errors_are_400() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org3/updates",
        Some(update("client1", json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["step"], "route");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org1/updates",
        Some(json!({"participant_id": "client1", "state_dict": {"w": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["step"], "received");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org1/updates",
        Some(update("default", json!({"w": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn at_http_surface_04_malformed_json_is_400_error_body() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/tenants/org1/updates")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn at_http_surface_05_ledger_down_is_502_with_orphan() {
    let app = app_with(Arc::new(DownLedger), true);
    let (status, body) = send(
        &app,
        "POST",
        "/v1/tenants/org1/updates",
        Some(update("client1", json!({"w": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "ledger_invoke");
    assert!(body["orphan_document_id"].as_str().is_some());

    let (status, body) = send(&app, "GET", "/v1/tenants/org1/updates", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "ledger_query");
}

#[tokio::test]
async fn at_http_surface_06_healthz_reports_backends() {
    let app = app();
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["ledger"], "ledger_memory");
    assert_eq!(body["documents"], "document_store_memory");
    assert_eq!(body["oracle"], "scripted_oracle");
}

#[tokio::test]
async fn at_http_surface_07_foreign_participant_ids_are_listed() {
    let documents = InMemoryDocumentStore::new();
    let document_id = documents
        .create(
            "org1_model_updates",
            &Document::model_update(&ParticipantId::new("seed").unwrap(), json!({"w": [2.0]})),
        )
        .unwrap();
    let result = json!([
        {"docType": "modelUpdate", "ParticipantID": "default", "DocID": "0"},
        {"docType": "modelUpdate", "ParticipantID": "client@org1", "DocID": document_id.as_str()}
    ]);
    let ledger = Arc::new(FixedLedger {
        result: result.to_string().into_bytes(),
    });
    let app = app_with_documents(ledger, documents, true);

    let (status, body) = send(&app, "GET", "/v1/tenants/org1/updates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["updates"][0]["participant_id"], "client@org1");
    assert_eq!(body["updates"][0]["state_dict"], json!({"w": [2.0]}));
}

#[tokio::test]
async fn at_http_surface_08_dangling_pointer_names_missing_document() {
    let ledger = InMemoryLedger::new();
    ledger
        .invoke(
            "org1channel",
            LedgerFunction::StoreUpdate,
            &["client1".to_string(), "d404".to_string()],
        )
        .unwrap();
    let app = app_with(Arc::new(ledger), true);

    let (status, body) = send(&app, "GET", "/v1/tenants/org1/updates", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "consistency_violation");
    assert_eq!(body["step"], "aggregate");
    assert_eq!(body["missing_document_ids"], json!(["d404"]));
    assert!(body["reason"].as_str().unwrap().contains("d404"));
}
