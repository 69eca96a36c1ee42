#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use fedledger_kernel_contracts::document::Document;
use fedledger_kernel_contracts::ledger::{
    DocumentId, LedgerFunction, ParticipantId, PointerRecord, TransactionId,
};
use fedledger_kernel_contracts::{CollaboratorError, DocumentBackend, LedgerBackend};

use crate::document_store::DocumentStore;
use crate::ledger_store::{ContractOutput, LedgerTxRow, PointerLedgerStore};
use crate::StorageError;

/// Shared handle over a [`PointerLedgerStore`]. Clones see the same ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<Mutex<PointerLedgerStore>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PointerLedgerStore>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::LockPoisoned { table: "pointer_ledger" })
    }

    pub fn current_pointer(
        &self,
        partition: &str,
        participant_id: &ParticipantId,
    ) -> Result<Option<PointerRecord>, StorageError> {
        Ok(self.lock()?.current_pointer(partition, participant_id).cloned())
    }

    pub fn tx_rows(&self, partition: &str) -> Result<Vec<LedgerTxRow>, StorageError> {
        Ok(self.lock()?.tx_rows(partition).to_vec())
    }
}

impl LedgerBackend for InMemoryLedger {
    fn label(&self) -> &'static str {
        "ledger_memory"
    }

    fn invoke(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<TransactionId, CollaboratorError> {
        if function.is_read_only() {
            return Err(storage_to_collaborator(StorageError::FunctionNotAllowed {
                function: function.as_str(),
                mode: "invoke",
            }));
        }
        let mut store = self.lock().map_err(storage_to_collaborator)?;
        match store
            .execute(partition, function, args)
            .map_err(storage_to_collaborator)?
        {
            ContractOutput::Committed(tx) => Ok(tx),
            ContractOutput::Evaluated(_) => Err(CollaboratorError::backend(
                "write function produced a read result",
            )),
        }
    }

    fn query(
        &self,
        partition: &str,
        function: LedgerFunction,
        args: &[String],
    ) -> Result<Vec<u8>, CollaboratorError> {
        if !function.is_read_only() {
            return Err(storage_to_collaborator(StorageError::FunctionNotAllowed {
                function: function.as_str(),
                mode: "query",
            }));
        }
        let mut store = self.lock().map_err(storage_to_collaborator)?;
        match store
            .execute(partition, function, args)
            .map_err(storage_to_collaborator)?
        {
            ContractOutput::Evaluated(bytes) => Ok(bytes),
            ContractOutput::Committed(_) => Err(CollaboratorError::backend(
                "read function produced a transaction",
            )),
        }
    }
}

/// Shared handle over a [`DocumentStore`]. Clones see the same collections.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Mutex<DocumentStore>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, DocumentStore>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::LockPoisoned { table: "documents" })
    }

    pub fn document_count(&self, collection: &str) -> Result<usize, StorageError> {
        Ok(self.lock()?.document_count(collection))
    }

    pub fn document_ids(&self, collection: &str) -> Result<Vec<DocumentId>, StorageError> {
        Ok(self.lock()?.document_ids(collection))
    }
}

impl DocumentBackend for InMemoryDocumentStore {
    fn label(&self) -> &'static str {
        "document_store_memory"
    }

    fn create(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<DocumentId, CollaboratorError> {
        self.lock()
            .and_then(|mut store| store.create(collection, document))
            .map_err(storage_to_collaborator)
    }

    fn get(
        &self,
        collection: &str,
        document_id: &DocumentId,
    ) -> Result<Document, CollaboratorError> {
        let store = self.lock().map_err(storage_to_collaborator)?;
        store.get(collection, document_id).cloned().ok_or_else(|| {
            CollaboratorError::not_found(format!("{collection}/{}", document_id.as_str()))
        })
    }
}

fn storage_to_collaborator(err: StorageError) -> CollaboratorError {
    CollaboratorError::backend(err.to_string())
}
