#![forbid(unsafe_code)]

use fedledger_kernel_contracts::ledger::{
    DocumentId, LedgerFunction, ParticipantId, PointerRecord,
};
use fedledger_kernel_contracts::LedgerBackend;
use fedledger_storage::ledger_store::{ContractOutput, PointerLedgerStore};
use fedledger_storage::repo::InMemoryLedger;
use fedledger_storage::StorageError;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn rows(bytes: &[u8]) -> Vec<PointerRecord> {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn at_ptr_db_01_tenant_partitions_isolated() {
    let ledger = InMemoryLedger::new();
    ledger
        .invoke("berlinchannel", LedgerFunction::StoreUpdate, &args(&["client1", "d_b"]))
        .unwrap();
    ledger
        .invoke("munichchannel", LedgerFunction::StoreUpdate, &args(&["client1", "d_m"]))
        .unwrap();

    let berlin = rows(
        &ledger
            .query(
                "berlinchannel",
                LedgerFunction::QueryByParticipantId,
                &args(&["client1"]),
            )
            .unwrap(),
    );
    let munich = rows(
        &ledger
            .query(
                "munichchannel",
                LedgerFunction::QueryByParticipantId,
                &args(&["client1"]),
            )
            .unwrap(),
    );
    assert_eq!(berlin.len(), 1);
    assert_eq!(berlin[0].document_id.as_str(), "d_b");
    assert_eq!(munich[0].document_id.as_str(), "d_m");
}

#[test]
fn at_ptr_db_02_latest_pointer_wins_and_tx_log_keeps_history() {
    let ledger = InMemoryLedger::new();
    let tx1 = ledger
        .invoke("berlinchannel", LedgerFunction::StoreUpdate, &args(&["client1", "d1"]))
        .unwrap();
    let tx2 = ledger
        .invoke("berlinchannel", LedgerFunction::StoreUpdate, &args(&["client1", "d2"]))
        .unwrap();
    assert_ne!(tx1, tx2);

    let current = ledger
        .current_pointer("berlinchannel", &ParticipantId::new("client1").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(current.document_id, DocumentId::new("d2").unwrap());

    let history = ledger.tx_rows("berlinchannel").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].transaction_id, tx1);
    assert_eq!(history[1].document_id.as_str(), "d2");
    assert!(history[0].seq < history[1].seq);
}

#[test]
fn at_ptr_db_03_query_all_includes_sentinel_once() {
    let ledger = InMemoryLedger::new();
    ledger
        .invoke("berlinchannel", LedgerFunction::InitLedger, &[])
        .unwrap();
    ledger
        .invoke("berlinchannel", LedgerFunction::StoreUpdate, &args(&["client2", "d2"]))
        .unwrap();

    let all = rows(
        &ledger
            .query("berlinchannel", LedgerFunction::QueryUpdate, &[])
            .unwrap(),
    );
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|r| r.is_sentinel()).count(), 1);
}

#[test]
fn at_ptr_db_04_unknown_participant_query_is_empty_list() {
    let ledger = InMemoryLedger::new();
    let bytes = ledger
        .query(
            "berlinchannel",
            LedgerFunction::QueryByParticipantId,
            &args(&["ghost"]),
        )
        .unwrap();
    assert_eq!(bytes, b"[]");
}

#[test]
fn at_ptr_db_05_unknown_function_name_is_rejected() {
    let mut store = PointerLedgerStore::new_in_memory();
    let err = store
        .execute_named("berlinchannel", "DeleteUpdate", &[])
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::UnknownFunction {
            name: "DeleteUpdate".to_string()
        }
    );
    let out = store
        .execute_named("berlinchannel", "QueryByParticipantID", &args(&["default"]))
        .unwrap();
    let ContractOutput::Evaluated(bytes) = out else {
        panic!("expected evaluated output");
    };
    assert_eq!(rows(&bytes), vec![PointerRecord::sentinel()]);
}
