#![forbid(unsafe_code)]

pub mod document_http;
pub mod http;
pub mod ledger_http;
pub mod oracle_http;

pub use document_http::DocumentStoreHttpBackend;
pub use http::{BasicAuth, HttpEndpointConfig};
pub use ledger_http::LedgerHttpBackend;
pub use oracle_http::OracleHttpBackend;
