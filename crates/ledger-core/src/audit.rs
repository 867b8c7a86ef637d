// ledger-core/src/audit.rs

use crate::{
    chain::Ledger, mempool::TransactionPool, transaction::Transaction, types::*,
};
use serde::{Deserialize, Serialize};

/// One transaction in an audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub transaction: Transaction,
    /// Block holding the transaction, `None` while it is still pending
    pub block_index: Option<BlockNumber>,
}

impl TrailEntry {
    pub fn status(&self) -> TransactionStatus {
        match self.block_index {
            Some(_) => TransactionStatus::Confirmed,
            None => TransactionStatus::Pending,
        }
    }
}

/// Every transaction referencing `reference_id`, oldest first.
///
/// Pending transactions are gathered in submission order, then confirmed
/// ones in chain order, and the whole list is stably sorted by `recorded_at`.
/// Ties therefore keep pending entries ahead of confirmed ones.
pub fn audit_trail(
    ledger: &Ledger,
    pool: &TransactionPool,
    reference_id: &str,
) -> Vec<TrailEntry> {
    collect_trail(ledger, [pool.pending()], reference_id)
}

/// Like `audit_trail`, over several pending batches given oldest first
/// (e.g. a batch that is out for sealing, then the pool).
pub fn collect_trail<'a>(
    ledger: &Ledger,
    pending: impl IntoIterator<Item = &'a [Transaction]>,
    reference_id: &str,
) -> Vec<TrailEntry> {
    let mut entries: Vec<TrailEntry> = pending
        .into_iter()
        .flat_map(|batch| batch.iter())
        .filter(|tx| tx.reference_id == reference_id)
        .map(|tx| TrailEntry {
            transaction: tx.clone(),
            block_index: None,
        })
        .collect();

    entries.extend(
        ledger
            .transactions_for(reference_id)
            .map(|(tx, index)| TrailEntry {
                transaction: tx.clone(),
                block_index: Some(index),
            }),
    );

    entries.sort_by_key(|entry| entry.transaction.recorded_at);
    entries
}
