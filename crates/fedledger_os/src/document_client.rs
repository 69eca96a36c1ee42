#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::DocumentId;
use fedledger_kernel_contracts::{CollaboratorError, DocumentBackend};
use tracing::{debug, warn};

use crate::error::{GatewayError, PipelineStep};

pub const MAX_FETCH_CONCURRENCY_DEFAULT: usize = 8;
pub const MAX_FETCH_CONCURRENCY_LIMIT: usize = 64;

type FetchBatch = Result<Vec<(DocumentId, Option<Document>)>, (DocumentId, CollaboratorError)>;

/// Typed facade over the document store. Reads are per id; there is no bulk get.
#[derive(Clone)]
pub struct DocumentStoreClient {
    backend: Arc<dyn DocumentBackend>,
    max_fetch_concurrency: usize,
}

impl DocumentStoreClient {
    pub fn new(backend: Arc<dyn DocumentBackend>, max_fetch_concurrency: usize) -> Self {
        Self {
            backend,
            max_fetch_concurrency: max_fetch_concurrency.clamp(1, MAX_FETCH_CONCURRENCY_LIMIT),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    pub fn create(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<DocumentId, GatewayError> {
        match self.backend.create(collection, document) {
            Ok(document_id) => {
                debug!(
                    backend = self.backend.label(),
                    collection,
                    document_id = document_id.as_str(),
                    "document persisted"
                );
                Ok(document_id)
            }
            Err(detail) => {
                warn!(
                    backend = self.backend.label(),
                    collection,
                    kind = detail.kind(),
                    "document create failed"
                );
                Err(GatewayError::StoreWrite {
                    step: PipelineStep::Persisting,
                    detail,
                })
            }
        }
    }

    /// Fetches every id, fanned out over at most `max_fetch_concurrency`
    /// workers. Ids the store reports as not found are absent from the map;
    /// any other failure aborts the whole fetch.
    pub fn fetch(
        &self,
        collection: &str,
        document_ids: &BTreeSet<DocumentId>,
    ) -> Result<BTreeMap<DocumentId, Document>, GatewayError> {
        if document_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let ids: Vec<&DocumentId> = document_ids.iter().collect();
        let workers = self.max_fetch_concurrency.min(ids.len());
        let chunk_len = ids.len().div_ceil(workers);
        let backend: &dyn DocumentBackend = self.backend.as_ref();

        let batches: Vec<thread::Result<FetchBatch>> = thread::scope(|scope| {
            let handles: Vec<_> = ids
                .chunks(chunk_len)
                .map(|chunk| scope.spawn(move || fetch_batch(backend, collection, chunk)))
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut found = BTreeMap::new();
        for batch in batches {
            let rows = match batch {
                Ok(Ok(rows)) => rows,
                Ok(Err((document_id, detail))) => {
                    warn!(
                        backend = backend.label(),
                        collection,
                        document_id = document_id.as_str(),
                        kind = detail.kind(),
                        "document fetch failed"
                    );
                    return Err(GatewayError::StoreRead {
                        step: PipelineStep::FetchDocuments,
                        document_id: Some(document_id),
                        detail,
                    });
                }
                Err(_) => {
                    return Err(GatewayError::StoreRead {
                        step: PipelineStep::FetchDocuments,
                        document_id: None,
                        detail: CollaboratorError::backend("fetch worker panicked"),
                    });
                }
            };
            for (document_id, document) in rows {
                if let Some(document) = document {
                    found.insert(document_id, document);
                }
            }
        }
        debug!(
            collection,
            requested = ids.len(),
            found = found.len(),
            workers,
            "documents fetched"
        );
        Ok(found)
    }
}

fn fetch_batch(backend: &dyn DocumentBackend, collection: &str, ids: &[&DocumentId]) -> FetchBatch {
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        match backend.get(collection, id) {
            Ok(document) => rows.push(((*id).clone(), Some(document))),
            Err(err) if err.is_not_found() => rows.push(((*id).clone(), None)),
            Err(err) => return Err(((*id).clone(), err)),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockDocs {
        docs: BTreeMap<String, Document>,
        failing: BTreeSet<String>,
        create_reply: Option<Result<DocumentId, CollaboratorError>>,
        gets: AtomicUsize,
        created: Mutex<Vec<Document>>,
    }

    impl DocumentBackend for MockDocs {
        fn label(&self) -> &'static str {
            "mock_docs"
        }

        fn create(
            &self,
            _collection: &str,
            document: &Document,
        ) -> Result<DocumentId, CollaboratorError> {
            self.created.lock().unwrap().push(document.clone());
            self.create_reply
                .clone()
                .unwrap_or_else(|| Ok(DocumentId::new("new1").unwrap()))
        }

        fn get(
            &self,
            _collection: &str,
            document_id: &DocumentId,
        ) -> Result<Document, CollaboratorError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(document_id.as_str()) {
                return Err(CollaboratorError::status(500, "couch down"));
            }
            self.docs
                .get(document_id.as_str())
                .cloned()
                .ok_or_else(|| CollaboratorError::not_found("missing"))
        }
    }

    fn doc(state: serde_json::Value) -> Document {
        Document::from_value(json!({ "state_dict": state })).unwrap()
    }

    fn ids(values: &[&str]) -> BTreeSet<DocumentId> {
        values.iter().map(|v| DocumentId::new(*v).unwrap()).collect()
    }

    fn mock_with(n: usize) -> MockDocs {
        let mut mock = MockDocs::default();
        for i in 0..n {
            mock.docs.insert(format!("d{i}"), doc(json!(i)));
        }
        mock
    }

    #[test]
    fn at_doc_client_01_fetch_returns_every_present_id() {
        let backend = Arc::new(mock_with(20));
        let client = DocumentStoreClient::new(backend.clone(), 4);
        let wanted: Vec<String> = (0..20).map(|i| format!("d{i}")).collect();
        let wanted: Vec<&str> = wanted.iter().map(String::as_str).collect();
        let out = client.fetch("c", &ids(&wanted)).unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(backend.gets.load(Ordering::SeqCst), 20);
        assert_eq!(
            out[&DocumentId::new("d7").unwrap()].state_dict(),
            Some(&json!(7))
        );
    }

    #[test]
    fn at_doc_client_02_not_found_is_absent_not_error() {
        let client = DocumentStoreClient::new(Arc::new(mock_with(1)), 8);
        let out = client.fetch("c", &ids(&["d0", "gone"])).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out.contains_key(&DocumentId::new("gone").unwrap()));
    }

    #[test]
    fn at_doc_client_03_single_failure_aborts_fetch() {
        let mut mock = mock_with(10);
        mock.failing.insert("d3".to_string());
        let client = DocumentStoreClient::new(Arc::new(mock), 3);
        let wanted = ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "d8", "d9"];
        let err = client.fetch("c", &ids(&wanted)).unwrap_err();
        match err {
            GatewayError::StoreRead {
                document_id,
                detail,
                step,
            } => {
                assert_eq!(document_id, Some(DocumentId::new("d3").unwrap()));
                assert_eq!(detail.http_status(), Some(500));
                assert_eq!(step, PipelineStep::FetchDocuments);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn at_doc_client_04_create_failure_is_store_write_with_body() {
        let mock = MockDocs {
            create_reply: Some(Err(CollaboratorError::status(
                412,
                r#"{"error":"file_exists"}"#,
            ))),
            ..MockDocs::default()
        };
        let client = DocumentStoreClient::new(Arc::new(mock), 8);
        let err = client.create("c", &doc(json!({}))).unwrap_err();
        assert_eq!(err.kind(), "store_write");
        assert!(err.to_string().contains("file_exists"));
    }

    #[test]
    fn at_doc_client_05_empty_fetch_makes_no_calls() {
        let backend = Arc::new(mock_with(1));
        let client = DocumentStoreClient::new(backend.clone(), 0);
        assert!(client.fetch("c", &BTreeSet::new()).unwrap().is_empty());
        assert_eq!(backend.gets.load(Ordering::SeqCst), 0);
    }
}
