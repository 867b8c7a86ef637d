// ledger-core/src/mempool.rs

use crate::{transaction::Transaction, LedgerResult, TransactionStatus};
use ledger_crypto::Hash;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Transaction pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pending count at which a block should be sealed
    pub seal_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { seal_threshold: 5 }
    }
}

/// Pool metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub pending_count: usize,
    pub total_added: u64,
    pub total_drained: u64,
    pub total_requeued: u64,
}

/// Returned to the submitter of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub transaction_hash: Hash,
    pub status: TransactionStatus,
}

/// Transactions waiting to be sealed into a block.
///
/// The pool owns its transactions until `drain` moves them out.
#[derive(Debug)]
pub struct TransactionPool {
    config: PoolConfig,
    /// Pending transactions in submission order
    pending: Vec<Transaction>,
    /// Hashes of everything in `pending`
    by_hash: HashSet<Hash>,
    metrics: PoolMetrics,
}

impl TransactionPool {
    /// Create new transaction pool
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            by_hash: HashSet::new(),
            metrics: PoolMetrics::default(),
        }
    }

    /// Add transaction to pool.
    ///
    /// Submitting a transaction that is already pending is idempotent: the
    /// existing entry keeps its place and the same handle is returned.
    pub fn submit(&mut self, tx: Transaction) -> LedgerResult<TransactionHandle> {
        tx.validate_submission()?;

        let tx_hash = tx.transaction_hash;

        if self.by_hash.contains(&tx_hash) {
            tracing::debug!(hash = %tx_hash, "Transaction already pending; submit is a no-op");
            return Ok(TransactionHandle {
                transaction_hash: tx_hash,
                status: TransactionStatus::Pending,
            });
        }

        self.by_hash.insert(tx_hash);
        self.pending.push(tx);
        self.metrics.total_added += 1;
        self.metrics.pending_count = self.pending.len();

        Ok(TransactionHandle {
            transaction_hash: tx_hash,
            status: TransactionStatus::Pending,
        })
    }

    /// Whether enough transactions have accumulated to seal a block
    pub fn should_seal(&self) -> bool {
        self.pending.len() >= self.config.seal_threshold
    }

    /// Remove and return every pending transaction
    pub fn drain(&mut self) -> Vec<Transaction> {
        let drained = std::mem::take(&mut self.pending);
        self.by_hash.clear();
        self.metrics.total_drained += drained.len() as u64;
        self.metrics.pending_count = 0;
        drained
    }

    /// Put drained transactions back in front of anything submitted since.
    ///
    /// A transaction resubmitted while its batch was out is kept only once.
    pub fn requeue(&mut self, transactions: Vec<Transaction>) {
        let mut restored: Vec<Transaction> = transactions
            .into_iter()
            .filter(|tx| !self.by_hash.contains(&tx.transaction_hash))
            .collect();

        self.metrics.total_requeued += restored.len() as u64;
        self.by_hash.extend(restored.iter().map(|tx| tx.transaction_hash));
        restored.append(&mut self.pending);
        self.pending = restored;
        self.metrics.pending_count = self.pending.len();
    }

    /// Pending transactions in submission order
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Get transaction by hash
    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        if !self.by_hash.contains(hash) {
            return None;
        }
        self.pending.iter().find(|tx| tx.transaction_hash == *hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains(hash)
    }

    /// Get pending count
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerError, TransactionKind};
    use ledger_crypto::digest;

    fn create_test_tx(n: u64) -> Transaction {
        Transaction::new(
            TransactionKind::BidSubmission,
            "OPP-1",
            format!("bidder-{}", n),
            digest(&n.to_be_bytes()),
            n,
        ).unwrap()
    }

    #[test]
    fn test_pool_submit_pending() {
        let mut pool = TransactionPool::default();
        let tx = create_test_tx(0);
        let expected = tx.transaction_hash;

        let handle = pool.submit(tx).unwrap();
        assert_eq!(handle.transaction_hash, expected);
        assert_eq!(handle.status, TransactionStatus::Pending);
        assert_eq!(pool.pending_count(), 1);
        assert!(pool.get(&expected).is_some());
    }

    #[test]
    fn test_submit_rejects_invalid() {
        let mut pool = TransactionPool::default();
        let empty_ref = Transaction::new(
            TransactionKind::BidSubmission, "", "a", digest(b"x"), 1,
        ).unwrap();
        assert!(matches!(pool.submit(empty_ref), Err(LedgerError::Validation(_))));

        let mut forged = create_test_tx(1);
        forged.actor_id = "someone-else".into();
        assert!(matches!(pool.submit(forged), Err(LedgerError::Validation(_))));

        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn test_submit_duplicate_is_idempotent() {
        let mut pool = TransactionPool::default();
        let tx = create_test_tx(1);
        let first = pool.submit(tx.clone()).unwrap();
        pool.submit(create_test_tx(2)).unwrap();

        let again = pool.submit(tx).unwrap();
        assert_eq!(again, first);
        assert_eq!(pool.pending_count(), 2);
        assert_eq!(pool.pending()[0].transaction_hash, first.transaction_hash);
        assert_eq!(pool.metrics().total_added, 2);
    }

    #[test]
    fn test_should_seal_at_threshold() {
        let mut pool = TransactionPool::new(PoolConfig { seal_threshold: 3 });
        pool.submit(create_test_tx(1)).unwrap();
        pool.submit(create_test_tx(2)).unwrap();
        assert!(!pool.should_seal());
        pool.submit(create_test_tx(3)).unwrap();
        assert!(pool.should_seal());
    }

    #[test]
    fn test_drain_empties_pool_in_order() {
        let mut pool = TransactionPool::default();
        for n in 0..4 {
            pool.submit(create_test_tx(n)).unwrap();
        }

        let drained = pool.drain();
        assert_eq!(drained.len(), 4);
        assert!(drained.windows(2).all(|w| w[0].recorded_at < w[1].recorded_at));
        assert_eq!(pool.pending_count(), 0);
        assert!(pool.get(&drained[0].transaction_hash).is_none());
        assert_eq!(pool.metrics().total_drained, 4);
    }

    #[test]
    fn test_requeue_restores_front() {
        let mut pool = TransactionPool::default();
        pool.submit(create_test_tx(1)).unwrap();
        pool.submit(create_test_tx(2)).unwrap();
        let drained = pool.drain();

        pool.submit(create_test_tx(3)).unwrap();
        // resubmitted while the batch was out
        pool.submit(drained[1].clone()).unwrap();
        pool.requeue(drained);

        let order: Vec<u64> = pool.pending().iter().map(|tx| tx.recorded_at).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(pool.metrics().total_requeued, 1);
        assert_eq!(pool.metrics().pending_count, 3);
    }
}
