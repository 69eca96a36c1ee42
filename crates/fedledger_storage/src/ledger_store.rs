#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use fedledger_kernel_contracts::ledger::{
    DocumentId, LedgerFunction, ParticipantId, PointerRecord, TransactionId,
};

use crate::{sha256_hex, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTxRow {
    pub seq: u64,
    pub transaction_id: TransactionId,
    pub function: LedgerFunction,
    pub participant_id: ParticipantId,
    pub document_id: DocumentId,
}

#[derive(Debug, Clone, Default)]
struct PartitionLedger {
    // World state keyed by participant: last writer wins.
    world_state: BTreeMap<ParticipantId, PointerRecord>,
    tx_log: Vec<LedgerTxRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractOutput {
    Committed(TransactionId),
    Evaluated(Vec<u8>),
}

/// In-memory pointer ledger that executes the pointer contract functions.
/// A partition is provisioned (sentinel seeded) the first time it is touched.
#[derive(Debug, Clone)]
pub struct PointerLedgerStore {
    partitions: BTreeMap<String, PartitionLedger>,
    next_tx_seq: u64,
}

impl Default for PointerLedgerStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl PointerLedgerStore {
    pub fn new_in_memory() -> Self {
        Self {
            partitions: BTreeMap::new(),
            next_tx_seq: 1,
        }
    }

    pub fn execute(
        &mut self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<ContractOutput, StorageError> {
        match function {
            LedgerFunction::InitLedger => {
                expect_args(function, args, 0)?;
                Ok(ContractOutput::Committed(self.init_partition(partition)))
            }
            LedgerFunction::StoreUpdate => {
                expect_args(function, args, 2)?;
                let participant_id = ParticipantId::new(args[0].clone())?;
                let document_id = DocumentId::new(args[1].clone())?;
                let tx = self.store_update(partition, participant_id, document_id);
                Ok(ContractOutput::Committed(tx))
            }
            LedgerFunction::QueryUpdate => {
                expect_args(function, args, 0)?;
                encode_rows(&self.query_update(partition)).map(ContractOutput::Evaluated)
            }
            LedgerFunction::QueryByParticipantId => {
                expect_args(function, args, 1)?;
                let participant_id = ParticipantId::new(args[0].clone())?;
                encode_rows(&self.query_by_participant(partition, &participant_id))
                    .map(ContractOutput::Evaluated)
            }
        }
    }

    pub fn execute_named(
        &mut self,
        partition: &str,
        name: &str,
        args: &[String],
    ) -> Result<ContractOutput, StorageError> {
        let function = LedgerFunction::parse(name).ok_or_else(|| StorageError::UnknownFunction {
            name: name.to_string(),
        })?;
        self.execute(partition, function, args)
    }

    pub fn init_partition(&mut self, partition: &str) -> TransactionId {
        let sentinel = PointerRecord::sentinel();
        self.put(partition, LedgerFunction::InitLedger, sentinel)
    }

    pub fn store_update(
        &mut self,
        partition: &str,
        participant_id: ParticipantId,
        document_id: DocumentId,
    ) -> TransactionId {
        let row = PointerRecord::v1(participant_id, document_id);
        self.put(partition, LedgerFunction::StoreUpdate, row)
    }

    pub fn query_update(&mut self, partition: &str) -> Vec<PointerRecord> {
        self.partition_mut(partition)
            .world_state
            .values()
            .cloned()
            .collect()
    }

    pub fn query_by_participant(
        &mut self,
        partition: &str,
        participant_id: &ParticipantId,
    ) -> Vec<PointerRecord> {
        self.partition_mut(partition)
            .world_state
            .get(participant_id)
            .cloned()
            .into_iter()
            .collect()
    }

    pub fn tx_rows(&self, partition: &str) -> &[LedgerTxRow] {
        self.partitions
            .get(partition)
            .map(|p| p.tx_log.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_pointer(
        &self,
        partition: &str,
        participant_id: &ParticipantId,
    ) -> Option<&PointerRecord> {
        self.partitions
            .get(partition)
            .and_then(|p| p.world_state.get(participant_id))
    }

    fn put(
        &mut self,
        partition: &str,
        function: LedgerFunction,
        row: PointerRecord,
    ) -> TransactionId {
        let seq = self.next_tx_seq;
        self.next_tx_seq = self.next_tx_seq.saturating_add(1);
        let transaction_id = TransactionId(sha256_hex(&[
            partition.as_bytes(),
            &seq.to_be_bytes(),
            function.as_str().as_bytes(),
            row.participant_id.as_str().as_bytes(),
            row.document_id.as_str().as_bytes(),
        ]));
        let ledger = self.partition_mut(partition);
        ledger.tx_log.push(LedgerTxRow {
            seq,
            transaction_id: transaction_id.clone(),
            function,
            participant_id: row.participant_id.clone(),
            document_id: row.document_id.clone(),
        });
        ledger.world_state.insert(row.participant_id.clone(), row);
        transaction_id
    }

    fn partition_mut(&mut self, partition: &str) -> &mut PartitionLedger {
        self.partitions
            .entry(partition.to_string())
            .or_insert_with(|| {
                let mut ledger = PartitionLedger::default();
                let sentinel = PointerRecord::sentinel();
                ledger
                    .world_state
                    .insert(sentinel.participant_id.clone(), sentinel);
                ledger
            })
    }
}

fn expect_args(
    function: LedgerFunction,
    args: &[String],
    expected: usize,
) -> Result<(), StorageError> {
    if args.len() != expected {
        return Err(StorageError::ContractArgs {
            function: function.as_str(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn encode_rows(rows: &[PointerRecord]) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(rows).map_err(|err| StorageError::Encoding {
        detail: err.to_string(),
    })
}
