#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use fedledger_kernel_contracts::ledger::{DocumentId, ParticipantId, PointerRecord};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document_client::DocumentStoreClient;
use crate::error::{join_document_ids, GatewayError, PipelineStep};

pub const MAX_POINTERS_PER_READ_DEFAULT: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedUpdate {
    pub participant_id: ParticipantId,
    pub document_id: DocumentId,
    pub state_dict: Value,
}

/// Resolves ledger pointers into the payloads they reference.
#[derive(Clone)]
pub struct QueryAggregator {
    documents: DocumentStoreClient,
    max_pointers_per_read: usize,
}

impl QueryAggregator {
    pub fn new(documents: DocumentStoreClient, max_pointers_per_read: usize) -> Self {
        Self {
            documents,
            max_pointers_per_read,
        }
    }

    /// Output follows pointer order. The sentinel and documents without a
    /// payload are dropped; a pointer whose document is missing fails the read.
    pub fn resolve(
        &self,
        collection: &str,
        pointers: &[PointerRecord],
    ) -> Result<Vec<ResolvedUpdate>, GatewayError> {
        let live: Vec<&PointerRecord> = pointers.iter().filter(|p| !p.is_sentinel()).collect();
        if live.len() > self.max_pointers_per_read {
            return Err(GatewayError::LedgerResult {
                step: PipelineStep::Aggregate,
                reason: format!(
                    "{} pointers exceed the per-read limit of {}",
                    live.len(),
                    self.max_pointers_per_read
                ),
            });
        }

        let wanted: BTreeSet<DocumentId> = live.iter().map(|p| p.document_id.clone()).collect();
        let documents = self.documents.fetch(collection, &wanted)?;

        let mut missing: Vec<DocumentId> = Vec::new();
        let mut resolved = Vec::with_capacity(live.len());
        for pointer in &live {
            let Some(document) = documents.get(&pointer.document_id) else {
                if !missing.contains(&pointer.document_id) {
                    missing.push(pointer.document_id.clone());
                }
                continue;
            };
            match document.state_dict() {
                Some(state_dict) => resolved.push(ResolvedUpdate {
                    participant_id: pointer.participant_id.clone(),
                    document_id: pointer.document_id.clone(),
                    state_dict: state_dict.clone(),
                }),
                None => debug!(
                    collection,
                    document_id = pointer.document_id.as_str(),
                    "document has no state_dict; skipped"
                ),
            }
        }

        if !missing.is_empty() {
            warn!(
                collection,
                missing = missing.len(),
                missing_document_ids = %join_document_ids(&missing),
                "pointers reference missing documents"
            );
            return Err(GatewayError::ConsistencyViolation {
                step: PipelineStep::Aggregate,
                missing_document_ids: missing,
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedledger_kernel_contracts::document::Document;
    use fedledger_kernel_contracts::{CollaboratorError, DocumentBackend};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockDocs {
        docs: BTreeMap<String, Value>,
        gets: AtomicUsize,
    }

    impl DocumentBackend for MockDocs {
        fn label(&self) -> &'static str {
            "mock_docs"
        }

        fn create(&self, _: &str, _: &Document) -> Result<DocumentId, CollaboratorError> {
            Err(CollaboratorError::backend("read only"))
        }

        fn get(&self, _: &str, id: &DocumentId) -> Result<Document, CollaboratorError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            match self.docs.get(id.as_str()) {
                Some(body) => Ok(Document::from_value(body.clone()).unwrap()),
                None => Err(CollaboratorError::not_found(id.as_str())),
            }
        }
    }

    fn ptr(pid: &str, did: &str) -> PointerRecord {
        PointerRecord::v1(ParticipantId::new(pid).unwrap(), DocumentId::new(did).unwrap())
    }

    fn aggregator(docs: &[(&str, Value)]) -> (QueryAggregator, Arc<MockDocs>) {
        let mock = Arc::new(MockDocs {
            docs: docs
                .iter()
                .map(|(id, body)| (id.to_string(), body.clone()))
                .collect(),
            gets: AtomicUsize::new(0),
        });
        let client = DocumentStoreClient::new(mock.clone(), 4);
        (QueryAggregator::new(client, 16), mock)
    }

    #[test]
    fn at_aggregate_01_sentinel_dropped_order_kept() {
        let (agg, _) = aggregator(&[
            ("d1", json!({"state_dict": "X"})),
            ("d2", json!({"state_dict": "Y"})),
        ]);
        let out = agg
            .resolve(
                "c",
                &[ptr("b", "d2"), PointerRecord::sentinel(), ptr("a", "d1")],
            )
            .unwrap();
        let payloads: Vec<&Value> = out.iter().map(|u| &u.state_dict).collect();
        assert_eq!(payloads, vec![&json!("Y"), &json!("X")]);
        assert_eq!(out[0].participant_id.as_str(), "b");
    }

    #[test]
    fn at_aggregate_02_missing_document_is_consistency_violation() {
        let (agg, _) = aggregator(&[("d1", json!({"state_dict": "X"}))]);
        let err = agg
            .resolve("c", &[ptr("a", "d1"), ptr("b", "d404")])
            .unwrap_err();
        match err {
            GatewayError::ConsistencyViolation {
                missing_document_ids,
                ..
            } => assert_eq!(missing_document_ids, vec![DocumentId::new("d404").unwrap()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn at_aggregate_03_documents_without_payload_are_skipped() {
        let (agg, _) = aggregator(&[
            ("d1", json!({"state_dict": null})),
            ("d2", json!({"participant_id": "b"})),
            ("d3", json!({"state_dict": {"w": 1}})),
        ]);
        let out = agg
            .resolve("c", &[ptr("a", "d1"), ptr("b", "d2"), ptr("c", "d3")])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].document_id.as_str(), "d3");
    }

    #[test]
    fn at_aggregate_04_shared_document_fetched_once() {
        let (agg, mock) = aggregator(&[("d1", json!({"state_dict": 1}))]);
        let out = agg.resolve("c", &[ptr("a", "d1"), ptr("b", "d1")]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(mock.gets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn at_aggregate_05_oversized_read_refused_before_fetch() {
        let (agg, mock) = aggregator(&[]);
        let pointers: Vec<PointerRecord> =
            (0..17).map(|i| ptr(&format!("p{i}"), &format!("d{i}"))).collect();
        let err = agg.resolve("c", &pointers).unwrap_err();
        assert_eq!(err.kind(), "ledger_query");
        assert_eq!(mock.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn at_aggregate_06_only_sentinel_yields_empty_without_calls() {
        let (agg, mock) = aggregator(&[]);
        assert!(agg.resolve("c", &[PointerRecord::sentinel()]).unwrap().is_empty());
        assert_eq!(mock.gets.load(Ordering::SeqCst), 0);
    }
}
