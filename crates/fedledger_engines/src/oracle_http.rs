#![forbid(unsafe_code)]

use fedledger_kernel_contracts::verify::VerificationRequest;
use fedledger_kernel_contracts::{CollaboratorError, OracleBackend};
use serde::Deserialize;
use tracing::debug;

use crate::http::{
    build_http_agent, collaborator_error_from_ureq, read_success_body, HttpEndpointConfig,
};

pub const ORACLE_ENDPOINT_DEFAULT: &str = "http://localhost:5000";

#[derive(Debug, Deserialize)]
struct VerdictReply {
    #[serde(alias = "verification")]
    verified: bool,
}

/// Verification oracle. Stateless from our side: exactly one POST per verdict.
#[derive(Debug, Clone)]
pub struct OracleHttpBackend {
    config: HttpEndpointConfig,
    agent: ureq::Agent,
}

impl OracleHttpBackend {
    pub fn new(config: HttpEndpointConfig) -> Self {
        let agent = build_http_agent(&config);
        Self { config, agent }
    }
}

impl OracleBackend for OracleHttpBackend {
    fn label(&self) -> &'static str {
        "oracle_http"
    }

    fn verify(&self, request: &VerificationRequest) -> Result<bool, CollaboratorError> {
        let url = self.config.url_for(&["verify"])?;
        let req = self
            .config
            .authorize(self.agent.post(url.as_str()))
            .set("accept", "application/json")
            .query("zkp", zkp_flag(request));
        let resp = req.send_json(request).map_err(collaborator_error_from_ureq)?;
        let body = read_success_body(resp)?;
        let verified = decode_verdict(&body)?;
        debug!(
            scheme = request.scheme.as_str(),
            verified, "oracle verdict received"
        );
        Ok(verified)
    }
}

fn zkp_flag(request: &VerificationRequest) -> &'static str {
    if request.scheme.requires_zk_proof() {
        "True"
    } else {
        "False"
    }
}

fn decode_verdict(body: &[u8]) -> Result<bool, CollaboratorError> {
    let reply: VerdictReply = serde_json::from_slice(body)
        .map_err(|err| CollaboratorError::decode(format!("oracle verdict: {err}")))?;
    Ok(reply.verified)
}
