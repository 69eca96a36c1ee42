#![forbid(unsafe_code)]

use fedledger_kernel_contracts::ledger::{LedgerFunction, TransactionId};
use fedledger_kernel_contracts::{CollaboratorError, LedgerBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{
    build_http_agent, collaborator_error_from_ureq, read_success_body, HttpEndpointConfig,
};

pub const LEDGER_CHAINCODE_DEFAULT: &str = "mycc";

#[derive(Debug, Serialize)]
struct ContractCallBody<'a> {
    function: &'a str,
    args: &'a [String],
}

#[derive(Debug, Deserialize)]
struct InvokeReply {
    #[serde(alias = "txid", alias = "transactionId")]
    transaction_id: String,
}

/// Ledger gateway reached over REST. One contract (`chaincode`) serves every
/// partition; partitions map to channels in the URL path.
#[derive(Debug, Clone)]
pub struct LedgerHttpBackend {
    config: HttpEndpointConfig,
    chaincode: String,
    agent: ureq::Agent,
}

impl LedgerHttpBackend {
    pub fn new(config: HttpEndpointConfig, chaincode: impl Into<String>) -> Self {
        let agent = build_http_agent(&config);
        Self {
            config,
            chaincode: chaincode.into(),
            agent,
        }
    }

    fn contract_url(&self, partition: &str, action: &str) -> Result<url::Url, CollaboratorError> {
        self.config.url_for(&[
            "channels",
            partition,
            "chaincodes",
            self.chaincode.as_str(),
            action,
        ])
    }

    fn call(
        &self,
        partition: &str,
        action: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<Vec<u8>, CollaboratorError> {
        let url = self.contract_url(partition, action)?;
        debug!(
            partition,
            chaincode = %self.chaincode,
            function = function.as_str(),
            action,
            "ledger call"
        );
        let req = self
            .config
            .authorize(self.agent.post(url.as_str()))
            .set("accept", "application/json");
        let body = ContractCallBody {
            function: function.as_str(),
            args,
        };
        let resp = req.send_json(&body).map_err(collaborator_error_from_ureq)?;
        read_success_body(resp)
    }
}

impl LedgerBackend for LedgerHttpBackend {
    fn label(&self) -> &'static str {
        "ledger_http"
    }

    fn invoke(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<TransactionId, CollaboratorError> {
        let body = self.call(partition, "invoke", function, args)?;
        decode_invoke_reply(&body)
    }

    fn query(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.call(partition, "query", function, args)
    }
}

fn decode_invoke_reply(body: &[u8]) -> Result<TransactionId, CollaboratorError> {
    let reply: InvokeReply = serde_json::from_slice(body)
        .map_err(|err| CollaboratorError::decode(format!("ledger invoke reply: {err}")))?;
    if reply.transaction_id.trim().is_empty() {
        return Err(CollaboratorError::decode(
            "ledger invoke reply: empty transaction_id",
        ));
    }
    Ok(TransactionId(reply.transaction_id))
}
