//! In-memory snapshot provider for testing and embedding

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::snapshot::resolve_patterns;
use crate::traits::*;
use crate::types::*;

/// In-memory snapshot provider
///
/// Holds open accounts and their transactions; reconciled transactions may be
/// stored but are never returned.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotProvider {
    accounts: Arc<RwLock<Vec<AccountSnapshot>>>,
    transactions: Arc<RwLock<HashMap<String, Vec<Transaction>>>>,
}

fn poisoned<T>(_: T) -> ReconcileError {
    ReconcileError::Storage("Snapshot lock poisoned".to_string())
}

impl MemorySnapshotProvider {
    /// Create a new empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account
    pub fn add_account(&self, account: AccountSnapshot) -> ReconcileResult<()> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        accounts.retain(|existing| existing.account_id != account.account_id);
        accounts.push(account);
        Ok(())
    }

    /// Add a transaction to its account
    pub fn add_transaction(&self, transaction: Transaction) -> ReconcileResult<()> {
        self.transactions
            .write()
            .map_err(poisoned)?
            .entry(transaction.account_id.clone())
            .or_default()
            .push(transaction);
        Ok(())
    }

    /// Clear all data
    pub fn clear(&self) -> ReconcileResult<()> {
        self.accounts.write().map_err(poisoned)?.clear();
        self.transactions.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[async_trait]
impl SnapshotProvider for MemorySnapshotProvider {
    async fn find_accounts(&self, patterns: &[String]) -> ReconcileResult<Vec<AccountSnapshot>> {
        let accounts = self.accounts.read().map_err(poisoned)?;
        resolve_patterns(&accounts, patterns)
    }

    async fn unreconciled_transactions(
        &self,
        accounts: &[AccountSnapshot],
    ) -> ReconcileResult<Vec<Vec<Transaction>>> {
        let transactions = self.transactions.read().map_err(poisoned)?;

        Ok(accounts
            .iter()
            .map(|account| {
                let mut pending: Vec<Transaction> = transactions
                    .get(&account.account_id)
                    .into_iter()
                    .flatten()
                    .filter(|t| t.cleared != ClearedStatus::Reconciled)
                    .cloned()
                    .collect();
                pending.sort_by_key(|t| t.date);
                pending
            })
            .collect())
    }
}
