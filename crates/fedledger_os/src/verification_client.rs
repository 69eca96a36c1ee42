#![forbid(unsafe_code)]

use std::sync::Arc;

use fedledger_kernel_contracts::verify::VerificationRequest;
use fedledger_kernel_contracts::OracleBackend;
use tracing::{debug, warn};

use crate::error::{GatewayError, PipelineStep};

/// Admission gate. One outbound call per verdict, no retries.
#[derive(Clone)]
pub struct VerificationClient {
    oracle: Arc<dyn OracleBackend>,
}

impl VerificationClient {
    pub fn new(oracle: Arc<dyn OracleBackend>) -> Self {
        Self { oracle }
    }

    pub fn backend_label(&self) -> &'static str {
        self.oracle.label()
    }

    /// `Ok(false)` is a verdict, not a failure.
    pub fn verify(&self, request: &VerificationRequest) -> Result<bool, GatewayError> {
        match self.oracle.verify(request) {
            Ok(verified) => {
                debug!(
                    backend = self.oracle.label(),
                    scheme = request.scheme.as_str(),
                    verified,
                    "verification verdict"
                );
                Ok(verified)
            }
            Err(detail) => {
                warn!(
                    backend = self.oracle.label(),
                    kind = detail.kind(),
                    "verification oracle call failed"
                );
                Err(GatewayError::OracleUnavailable {
                    step: PipelineStep::Verifying,
                    detail,
                })
            }
        }
    }
}
