// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process ledger for offline runs and tests. Assigns ids the way the real
// ledger does and records every write in order.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DefinedValue, FinancialBatch, SessionLookups, guids};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::{BinaryFile, BinaryFileData, EntityRef, FinancialTransaction, FinancialTransactionImage, LedgerClient};

const CURRENCY_TYPE_ID: i32 = 1;
const SOURCE_TYPE_ID: i32 = 2;

#[derive(Debug, Default)]
struct LedgerState {
    next_id: i32,
    binary_files: Vec<BinaryFile>,
    file_data: Vec<BinaryFileData>,
    transactions: Vec<FinancialTransaction>,
    images: Vec<FinancialTransactionImage>,
    writes: usize,
    transaction_calls: usize,
    fail_transaction_call: Option<usize>,
}

impl LedgerState {
    fn assign_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// `LedgerClient` backed by in-memory lists.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    lookups: SessionLookups,
    batches: Vec<FinancialBatch>,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(lookups: SessionLookups, batches: Vec<FinancialBatch>) -> Self {
        Self {
            lookups,
            batches,
            state: Mutex::new(LedgerState {
                next_id: 100,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the `call`-th transaction post (1-based, counted over the ledger's
    /// lifetime) fail with an upload error.
    pub fn fail_transaction_call(&self, call: usize) {
        self.state().fail_transaction_call = Some(call);
    }

    /// Number of create/upload requests accepted so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    pub fn transactions(&self) -> Vec<FinancialTransaction> {
        self.state().transactions.clone()
    }

    pub fn binary_files(&self) -> Vec<BinaryFile> {
        self.state().binary_files.clone()
    }

    pub fn file_data(&self) -> Vec<BinaryFileData> {
        self.state().file_data.clone()
    }

    pub fn images(&self) -> Vec<FinancialTransactionImage> {
        self.state().images.clone()
    }
}

fn missing(what: &str, guid: Uuid) -> CheckscanError {
    CheckscanError::LookupMissing(format!("{what} {guid}"))
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn login(&self, username: &str, _password: &str) -> Result<()> {
        debug!(username, "in-memory ledger login");
        Ok(())
    }

    async fn create_binary_file(&self, file: &BinaryFile) -> Result<()> {
        let mut state = self.state();
        if state.binary_files.iter().any(|f| f.guid == file.guid) {
            return Err(CheckscanError::RemoteValidation(format!("duplicate binary file {}", file.guid)));
        }
        let mut file = file.clone();
        file.id = state.assign_id();
        state.binary_files.push(file);
        state.writes += 1;
        Ok(())
    }

    async fn binary_file_by_guid(&self, guid: Uuid) -> Result<BinaryFile> {
        self.state()
            .binary_files
            .iter()
            .find(|f| f.guid == guid)
            .cloned()
            .ok_or_else(|| missing("binary file", guid))
    }

    async fn upload_binary_file_data(&self, data: &BinaryFileData) -> Result<()> {
        let mut state = self.state();
        if !state.binary_files.iter().any(|f| f.id == data.id) {
            return Err(CheckscanError::RemoteValidation(format!("no binary file with id {}", data.id)));
        }
        state.file_data.push(data.clone());
        state.writes += 1;
        Ok(())
    }

    async fn create_transaction(&self, transaction: &FinancialTransaction) -> Result<()> {
        let mut state = self.state();
        state.transaction_calls += 1;
        if state.fail_transaction_call == Some(state.transaction_calls) {
            return Err(CheckscanError::Upload("503 Service Unavailable".into()));
        }
        let mut transaction = transaction.clone();
        transaction.id = state.assign_id();
        state.transactions.push(transaction);
        state.writes += 1;
        Ok(())
    }

    async fn transaction_by_guid(&self, guid: Uuid) -> Result<FinancialTransaction> {
        self.state()
            .transactions
            .iter()
            .find(|t| t.guid == guid)
            .cloned()
            .ok_or_else(|| missing("transaction", guid))
    }

    async fn create_transaction_image(&self, image: &FinancialTransactionImage) -> Result<()> {
        let mut state = self.state();
        let mut image = image.clone();
        image.id = state.assign_id();
        state.images.push(image);
        state.writes += 1;
        Ok(())
    }

    async fn defined_type_by_guid(&self, guid: Uuid) -> Result<EntityRef> {
        let id = if guid == guids::DEFINED_TYPE_CURRENCY_TYPE {
            CURRENCY_TYPE_ID
        } else if guid == guids::DEFINED_TYPE_SOURCE_TYPE {
            SOURCE_TYPE_ID
        } else {
            return Err(missing("defined type", guid));
        };
        Ok(EntityRef {
            id,
            guid,
            name: String::new(),
        })
    }

    async fn defined_value_by_guid(&self, guid: Uuid) -> Result<DefinedValue> {
        if guid == guids::TRANSACTION_TYPE_CONTRIBUTION {
            return Ok(DefinedValue {
                id: self.lookups.transaction_type_id,
                guid,
                value: "Contribution".into(),
                description: None,
            });
        }
        self.lookups
            .currency_types
            .iter()
            .chain(&self.lookups.source_types)
            .find(|v| v.guid == guid)
            .cloned()
            .ok_or_else(|| missing("defined value", guid))
    }

    async fn defined_values(&self, defined_type_id: i32) -> Result<Vec<DefinedValue>> {
        Ok(match defined_type_id {
            CURRENCY_TYPE_ID => self.lookups.currency_types.clone(),
            SOURCE_TYPE_ID => self.lookups.source_types.clone(),
            _ => Vec::new(),
        })
    }

    async fn binary_file_type_by_guid(&self, guid: Uuid) -> Result<EntityRef> {
        if guid != guids::BINARY_FILE_TYPE_CONTRIBUTION_IMAGE {
            return Err(missing("binary file type", guid));
        }
        Ok(EntityRef {
            id: self.lookups.binary_file_type_id,
            guid,
            name: "Contribution Image".into(),
        })
    }

    async fn pending_batches(&self) -> Result<Vec<FinancialBatch>> {
        Ok(self.batches.clone())
    }
}
