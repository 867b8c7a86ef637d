// ledger-core/src/sealing.rs

//! The drain → seal → append workflow for single-threaded embeddings.
//!
//! Concurrent embeddings run the nonce search elsewhere and only use
//! `commit_block` for the final step.

use crate::{
    block::Block,
    chain::Ledger,
    mempool::TransactionPool,
    miner::{CancelFlag, Miner, SealOutcome},
    types::*,
    LedgerResult,
};
use ledger_crypto::Hash;
use serde::{Deserialize, Serialize};

/// Summary of a block that made it onto the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealReport {
    pub block_index: BlockNumber,
    pub block_hash: Hash,
    pub nonce: Nonce,
    pub transaction_hashes: Vec<Hash>,
}

impl SealReport {
    fn of(block: &Block) -> Self {
        Self {
            block_index: block.index,
            block_hash: block.hash,
            nonce: block.nonce,
            transaction_hashes: block.transactions.iter().map(|tx| tx.transaction_hash).collect(),
        }
    }
}

/// Append a sealed block, returning its transactions to the pool on rejection
pub fn commit_block(
    pool: &mut TransactionPool,
    ledger: &mut Ledger,
    block: Block,
) -> LedgerResult<SealReport> {
    if let Err(e) = ledger.check_extends(&block) {
        // The miner always builds on the tip it was given, so this means
        // the chain moved underneath it or state is corrupted.
        tracing::error!(
            index = block.index,
            error = %e,
            "Sealed block rejected by ledger; requeueing {} transactions",
            block.transactions.len()
        );
        pool.requeue(block.transactions);
        return Err(e);
    }

    let report = SealReport::of(&block);
    ledger.append(block)?;
    Ok(report)
}

/// Seal everything pending into one block, synchronously.
///
/// Returns `Ok(None)` when the pool is empty.
pub fn seal_pending(
    pool: &mut TransactionPool,
    ledger: &mut Ledger,
    miner: &Miner,
    timestamp: Timestamp,
    cancel: &CancelFlag,
) -> LedgerResult<Option<SealReport>> {
    if pool.is_empty() {
        return Ok(None);
    }

    let batch = pool.drain();
    match miner.seal(ledger.tip(), batch, timestamp, cancel) {
        SealOutcome::Sealed(block) => commit_block(pool, ledger, block).map(Some),
        SealOutcome::Aborted { transactions, reason } => {
            pool.requeue(transactions);
            Err(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{validate, LedgerError, MinerConfig, PoolConfig, Transaction, TransactionKind};
    use ledger_crypto::digest;

    fn submit(pool: &mut TransactionPool, n: u64) {
        pool.submit(Transaction::new(
            TransactionKind::BidSubmission,
            "OPP-1",
            format!("bidder-{}", n),
            digest(&n.to_be_bytes()),
            n,
        ).unwrap()).unwrap();
    }

    #[test]
    fn test_seal_pending_extends_chain() {
        let mut pool = TransactionPool::new(PoolConfig::default());
        let mut ledger = Ledger::with_genesis(0).unwrap();
        let miner = Miner::new(MinerConfig { difficulty: 2 });

        for n in 1..=5 {
            submit(&mut pool, n);
        }
        assert!(pool.should_seal());

        let report = seal_pending(&mut pool, &mut ledger, &miner, 100, &CancelFlag::new())
            .unwrap()
            .unwrap();

        assert_eq!(report.block_index, 1);
        assert_eq!(report.transaction_hashes.len(), 5);
        assert_eq!(ledger.len(), 2);
        assert_eq!(pool.pending_count(), 0);
        assert!(validate(&ledger).valid);
    }

    #[test]
    fn test_seal_pending_empty_pool() {
        let mut pool = TransactionPool::default();
        let mut ledger = Ledger::with_genesis(0).unwrap();
        let result = seal_pending(&mut pool, &mut ledger, &Miner::default(), 1, &CancelFlag::new());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_cancelled_seal_requeues() {
        let mut pool = TransactionPool::default();
        let mut ledger = Ledger::with_genesis(0).unwrap();
        submit(&mut pool, 1);
        submit(&mut pool, 2);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = seal_pending(&mut pool, &mut ledger, &Miner::default(), 1, &cancel);

        assert!(matches!(result, Err(LedgerError::Cancelled)));
        assert_eq!(pool.pending_count(), 2);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_rejected_commit_requeues() {
        let mut pool = TransactionPool::default();
        let mut ledger = Ledger::with_genesis(0).unwrap();
        let stale_tip = ledger.tip().clone();
        let miner = Miner::new(MinerConfig { difficulty: 0 });

        submit(&mut pool, 1);
        seal_pending(&mut pool, &mut ledger, &miner, 10, &CancelFlag::new()).unwrap();

        // A block mined against the old tip can no longer be appended
        submit(&mut pool, 2);
        let batch = pool.drain();
        let block = match miner.seal(&stale_tip, batch, 20, &CancelFlag::new()) {
            SealOutcome::Sealed(block) => block,
            SealOutcome::Aborted { reason, .. } => panic!("unexpected abort: {}", reason),
        };

        let result = commit_block(&mut pool, &mut ledger, block);
        assert!(matches!(result, Err(LedgerError::Integrity(_))));
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(ledger.len(), 2);
    }
}
