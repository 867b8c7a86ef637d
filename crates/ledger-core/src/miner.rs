// ledger-core/src/miner.rs

use crate::{block::Block, transaction::Transaction, types::*, LedgerError};
use ledger_crypto::HASH_SIZE;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Largest satisfiable difficulty: every hex digit of the hash is zero
pub const MAX_DIFFICULTY: usize = HASH_SIZE * 2;

/// How often the search loop polls the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 1_024;

/// Miner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Required number of leading zero hex digits in a block hash
    pub difficulty: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self { difficulty: 4 }
    }
}

/// Shared flag that aborts an in-flight nonce search
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a nonce search
#[derive(Debug)]
pub enum SealOutcome {
    /// A block whose hash meets the difficulty
    Sealed(Block),
    /// The search stopped early; the batch is handed back untouched
    Aborted {
        transactions: Vec<Transaction>,
        reason: LedgerError,
    },
}

/// Proof-of-work block sealer
#[derive(Debug, Clone, Default)]
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    /// Search for a nonce that seals `transactions` on top of `previous`.
    ///
    /// Pure apart from reading `cancel`: nothing is appended anywhere.
    pub fn seal(
        &self,
        previous: &Block,
        transactions: Vec<Transaction>,
        timestamp: Timestamp,
        cancel: &CancelFlag,
    ) -> SealOutcome {
        let difficulty = self.config.difficulty;

        if transactions.is_empty() {
            return SealOutcome::Aborted {
                transactions,
                reason: LedgerError::Validation("Cannot seal an empty block".into()),
            };
        }

        if difficulty > MAX_DIFFICULTY {
            return SealOutcome::Aborted {
                transactions,
                reason: LedgerError::Validation(format!(
                    "Difficulty {} exceeds the maximum of {}",
                    difficulty, MAX_DIFFICULTY
                )),
            };
        }

        let mut block = Block::candidate(
            previous.index + 1,
            timestamp,
            transactions,
            previous.hash,
        );

        let mut preimage = match block.preimage() {
            Ok(preimage) => preimage,
            Err(reason) => {
                return SealOutcome::Aborted {
                    transactions: block.transactions,
                    reason,
                }
            }
        };

        tracing::debug!(
            index = block.index,
            transactions = block.transactions.len(),
            difficulty,
            "Starting nonce search"
        );

        let mut nonce: Nonce = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                tracing::warn!(index = block.index, attempts = nonce, "Nonce search cancelled");
                return SealOutcome::Aborted {
                    transactions: block.transactions,
                    reason: LedgerError::Cancelled,
                };
            }

            let hash = preimage.hash_with_nonce(nonce);
            if hash.meets_difficulty(difficulty) {
                block.nonce = nonce;
                block.hash = hash;
                tracing::info!(
                    index = block.index,
                    nonce,
                    hash = %block.hash,
                    "Block sealed"
                );
                return SealOutcome::Sealed(block);
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    return SealOutcome::Aborted {
                        transactions: block.transactions,
                        reason: LedgerError::Validation("Nonce space exhausted".into()),
                    }
                }
            };
        }
    }
}
