#![forbid(unsafe_code)]

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::DocumentId;
use fedledger_kernel_contracts::{CollaboratorError, DocumentBackend};
use serde::Deserialize;
use tracing::debug;

use crate::http::{
    build_http_agent, collaborator_error_from_ureq, read_success_body, HttpEndpointConfig,
};

pub const DOCUMENT_STORE_ENDPOINT_DEFAULT: &str = "http://localhost:5984";

#[derive(Debug, Deserialize)]
struct CreateReply {
    id: String,
}

/// CouchDB-compatible document store: `POST /{db}` creates, `GET /{db}/{id}`
/// reads. Collections are databases.
#[derive(Debug, Clone)]
pub struct DocumentStoreHttpBackend {
    config: HttpEndpointConfig,
    agent: ureq::Agent,
}

impl DocumentStoreHttpBackend {
    pub fn new(config: HttpEndpointConfig) -> Self {
        let agent = build_http_agent(&config);
        Self { config, agent }
    }
}

impl DocumentBackend for DocumentStoreHttpBackend {
    fn label(&self) -> &'static str {
        "document_store_http"
    }

    fn create(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<DocumentId, CollaboratorError> {
        let url = self.config.url_for(&[collection])?;
        let req = self
            .config
            .authorize(self.agent.post(url.as_str()))
            .set("accept", "application/json");
        let resp = req.send_json(document).map_err(collaborator_error_from_ureq)?;
        let body = read_success_body(resp)?;
        let document_id = decode_create_reply(&body)?;
        debug!(collection, document_id = document_id.as_str(), "document created");
        Ok(document_id)
    }

    fn get(
        &self,
        collection: &str,
        document_id: &DocumentId,
    ) -> Result<Document, CollaboratorError> {
        let url = self.config.url_for(&[collection, document_id.as_str()])?;
        let req = self
            .config
            .authorize(self.agent.get(url.as_str()))
            .set("accept", "application/json");
        let resp = req
            .call()
            .map_err(|err| map_get_error(collection, document_id, err))?;
        let body = read_success_body(resp)?;
        decode_document(&body)
    }
}

/// A 404 on read means the document is absent; every other failure is a
/// store error carrying the raw reply.
fn map_get_error(
    collection: &str,
    document_id: &DocumentId,
    err: ureq::Error,
) -> CollaboratorError {
    match err {
        ureq::Error::Status(404, resp) => {
            let body = resp.into_string().unwrap_or_default();
            CollaboratorError::not_found(format!("{collection}/{}: {body}", document_id.as_str()))
        }
        err => collaborator_error_from_ureq(err),
    }
}

fn decode_create_reply(body: &[u8]) -> Result<DocumentId, CollaboratorError> {
    let reply: CreateReply = serde_json::from_slice(body)
        .map_err(|err| CollaboratorError::decode(format!("document create reply: {err}")))?;
    DocumentId::new(reply.id)
        .map_err(|err| CollaboratorError::decode(format!("document create reply: {err}")))
}

fn decode_document(body: &[u8]) -> Result<Document, CollaboratorError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| CollaboratorError::decode(format!("document body: {err}")))?;
    Document::from_value(value)
        .map_err(|err| CollaboratorError::decode(format!("document body: {err}")))
}
