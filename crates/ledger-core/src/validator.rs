// ledger-core/src/validator.rs

use crate::{block::Block, chain::Ledger, types::*};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a block failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    /// Stored hash differs from the recomputed one
    #[serde(rename = "hash mismatch")]
    HashMismatch,
    /// `previous_hash` differs from the prior block's hash
    #[serde(rename = "broken linkage")]
    BrokenLinkage,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::HashMismatch => write!(f, "hash mismatch"),
            InvalidReason::BrokenLinkage => write!(f, "broken linkage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidBlock {
    pub index: BlockNumber,
    pub reason: InvalidReason,
}

/// Outcome of a full chain walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub invalid_blocks: Vec<InvalidBlock>,
}

/// Validate every block of `ledger`
pub fn validate(ledger: &Ledger) -> ValidationReport {
    validate_blocks(ledger.blocks())
}

/// Validate a block sequence starting at genesis.
///
/// Indices in the report are positions in `blocks`, so a block whose own
/// `index` field was altered is still reported where it sits. Genesis is
/// checked for hash consistency only.
pub fn validate_blocks(blocks: &[Block]) -> ValidationReport {
    let mut invalid_blocks = Vec::new();

    for (position, block) in blocks.iter().enumerate() {
        let index = position as BlockNumber;

        if !block.has_consistent_hash() {
            invalid_blocks.push(InvalidBlock { index, reason: InvalidReason::HashMismatch });
        }

        if position > 0 && block.previous_hash != blocks[position - 1].hash {
            invalid_blocks.push(InvalidBlock { index, reason: InvalidReason::BrokenLinkage });
        }
    }

    if !invalid_blocks.is_empty() {
        tracing::warn!(
            failures = invalid_blocks.len(),
            blocks = blocks.len(),
            "Chain validation found tampering"
        );
    }

    ValidationReport {
        valid: invalid_blocks.is_empty(),
        invalid_blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CancelFlag, Miner, MinerConfig, SealOutcome, Transaction, TransactionKind};
    use ledger_crypto::digest;

    fn ledger_with_blocks(count: u64) -> Ledger {
        let mut ledger = Ledger::with_genesis(0).unwrap();
        let miner = Miner::new(MinerConfig { difficulty: 1 });
        for i in 1..=count {
            let txs = vec![Transaction::new(
                TransactionKind::BidSubmission,
                "OPP-1",
                "bidder",
                digest(&i.to_be_bytes()),
                i,
            ).unwrap()];
            match miner.seal(ledger.tip(), txs, i * 10, &CancelFlag::new()) {
                SealOutcome::Sealed(block) => ledger.append(block).unwrap(),
                SealOutcome::Aborted { reason, .. } => panic!("unexpected abort: {}", reason),
            }
        }
        ledger
    }

    #[test]
    fn test_valid_chain() {
        let report = validate(&ledger_with_blocks(3));
        assert!(report.valid);
        assert!(report.invalid_blocks.is_empty());
    }

    #[test]
    fn test_tampered_transaction_is_hash_mismatch() {
        let mut blocks = ledger_with_blocks(3).blocks().to_vec();
        blocks[2].transactions[0].actor_id = "mallory".into();

        let report = validate_blocks(&blocks);
        assert!(!report.valid);
        assert_eq!(
            report.invalid_blocks,
            vec![InvalidBlock { index: 2, reason: InvalidReason::HashMismatch }]
        );
    }

    #[test]
    fn test_resealed_block_breaks_linkage_downstream() {
        let mut blocks = ledger_with_blocks(3).blocks().to_vec();
        blocks[1].timestamp += 1;
        blocks[1].hash = blocks[1].compute_hash().unwrap();

        let report = validate_blocks(&blocks);
        assert_eq!(
            report.invalid_blocks,
            vec![InvalidBlock { index: 2, reason: InvalidReason::BrokenLinkage }]
        );
    }

    #[test]
    fn test_genesis_only_checked_for_consistency() {
        let mut blocks = ledger_with_blocks(1).blocks().to_vec();
        blocks[0].timestamp = 77;

        let report = validate_blocks(&blocks);
        assert!(report.invalid_blocks.contains(
            &InvalidBlock { index: 0, reason: InvalidReason::HashMismatch }
        ));
    }

    #[test]
    fn test_reason_serializes_as_text() {
        let json = serde_json::to_string(&InvalidReason::BrokenLinkage).unwrap();
        assert_eq!(json, "\"broken linkage\"");
        assert_eq!(InvalidReason::HashMismatch.to_string(), "hash mismatch");
    }
}
