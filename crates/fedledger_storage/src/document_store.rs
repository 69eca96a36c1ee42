#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::DocumentId;
use serde_json::Value;

use crate::{sha256_hex, StorageError};

const DOCUMENT_ID_HEX_LEN: usize = 32;

/// In-memory document collections. Create-only: no update or delete path.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    collections: BTreeMap<String, BTreeMap<DocumentId, Document>>,
    next_seq: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl DocumentStore {
    pub fn new_in_memory() -> Self {
        Self {
            collections: BTreeMap::new(),
            next_seq: 1,
        }
    }

    pub fn create(
        &mut self,
        collection: &str,
        document: &Document,
    ) -> Result<DocumentId, StorageError> {
        if collection.is_empty() {
            return Err(StorageError::InvalidDocument {
                reason: "collection must be non-empty",
            });
        }
        let body = serde_json::to_vec(document).map_err(|err| StorageError::Encoding {
            detail: err.to_string(),
        })?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let digest = sha256_hex(&[collection.as_bytes(), &seq.to_be_bytes(), &body]);
        let document_id = DocumentId::new(&digest[..DOCUMENT_ID_HEX_LEN])?;

        let mut stored = document.as_map().clone();
        stored.insert(
            "_id".to_string(),
            Value::String(document_id.as_str().to_string()),
        );
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(document_id.clone(), Document::from_value(Value::Object(stored))?);
        Ok(document_id)
    }

    pub fn get(&self, collection: &str, document_id: &DocumentId) -> Option<&Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(document_id))
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn document_ids(&self, collection: &str) -> Vec<DocumentId> {
        self.collections
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }
}
