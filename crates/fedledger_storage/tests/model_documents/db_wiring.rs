#![forbid(unsafe_code)]

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::{DocumentId, ParticipantId};
use fedledger_kernel_contracts::DocumentBackend;
use fedledger_storage::repo::InMemoryDocumentStore;
use serde_json::json;

fn update(participant: &str, state: serde_json::Value) -> Document {
    Document::model_update(&ParticipantId::new(participant).unwrap(), state)
}

#[test]
fn at_doc_db_01_create_then_get_roundtrips_state_dict() {
    let docs = InMemoryDocumentStore::new();
    let id = docs
        .create("berlin_model_updates", &update("client1", json!({"fc.weight": [0.1, 0.2]})))
        .unwrap();
    let doc = docs.get("berlin_model_updates", &id).unwrap();
    assert_eq!(doc.state_dict(), Some(&json!({"fc.weight": [0.1, 0.2]})));
    assert_eq!(doc.get("participant_id"), Some(&json!("client1")));
}

#[test]
fn at_doc_db_02_tenant_collections_isolated() {
    let docs = InMemoryDocumentStore::new();
    let id = docs
        .create("berlin_model_updates", &update("client1", json!({})))
        .unwrap();
    assert!(docs.get("munich_model_updates", &id).unwrap_err().is_not_found());
    assert_eq!(docs.document_count("berlin_model_updates").unwrap(), 1);
    assert_eq!(docs.document_count("munich_model_updates").unwrap(), 0);
}

#[test]
fn at_doc_db_03_every_create_is_a_new_document() {
    let docs = InMemoryDocumentStore::new();
    for _ in 0..3 {
        docs.create("berlin_model_updates", &update("client1", json!({"w": 1})))
            .unwrap();
    }
    let ids = docs.document_ids("berlin_model_updates").unwrap();
    assert_eq!(ids.len(), 3);
}

#[test]
fn at_doc_db_04_unknown_id_is_not_found() {
    let docs = InMemoryDocumentStore::new();
    let err = docs
        .get("berlin_model_updates", &DocumentId::new("missing").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
