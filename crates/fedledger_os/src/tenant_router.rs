#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use fedledger_kernel_contracts::tenant::{Locality, TenantRoute};
use fedledger_kernel_contracts::ContractViolation;
use tracing::debug;

use crate::error::{GatewayError, PipelineStep};

/// Maps a locality to its ledger partition and document collection. The
/// mapping itself is a pure function; the router only guards its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantRouter {
    allowed: Option<BTreeSet<Locality>>,
}

impl TenantRouter {
    /// Any locality matching the identifier pattern is routed.
    pub fn open() -> Self {
        Self { allowed: None }
    }

    /// An empty list leaves the router open.
    pub fn with_allow_list(localities: impl IntoIterator<Item = Locality>) -> Self {
        let allowed: BTreeSet<Locality> = localities.into_iter().collect();
        Self {
            allowed: (!allowed.is_empty()).then_some(allowed),
        }
    }

    /// Comma separated localities; blank entries are skipped.
    pub fn from_allow_list_csv(raw: &str) -> Result<Self, ContractViolation> {
        let localities = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Locality::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_allow_list(localities))
    }

    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn resolve(&self, locality: &str) -> Result<TenantRoute, GatewayError> {
        let locality =
            Locality::new(locality).map_err(|v| GatewayError::validation(PipelineStep::Route, v))?;
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(&locality) {
                return Err(GatewayError::validation(
                    PipelineStep::Route,
                    ContractViolation::InvalidValue {
                        field: "locality",
                        reason: "is not an allowed tenant",
                    },
                ));
            }
        }
        let route = TenantRoute::for_locality(&locality);
        debug!(
            locality = locality.as_str(),
            partition = route.ledger_partition.as_str(),
            collection = route.document_collection.as_str(),
            "tenant routed"
        );
        Ok(route)
    }
}
