// ledger-core/src/block.rs
use crate::{transaction::Transaction, types::*, LedgerResult};
use ledger_crypto::{codec, hash::Hashable, Hash};
use serde::{Deserialize, Serialize};

/// A sealed group of transactions plus linkage metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, 0 for genesis
    pub index: BlockNumber,
    /// Sealing time
    pub timestamp: Timestamp,
    /// Transactions in submission order
    pub transactions: Vec<Transaction>,
    /// Hash of the preceding block, zero for genesis
    pub previous_hash: Hash,
    /// Proof-of-work nonce
    pub nonce: Nonce,
    /// Digest of the five fields above
    pub hash: Hash,
}

/// Everything the block hash covers except the nonce, which is appended last
#[derive(Serialize)]
struct SealedFields<'a> {
    index: BlockNumber,
    timestamp: Timestamp,
    transactions: &'a [Transaction],
    previous_hash: &'a Hash,
}

/// Encoded block fields with a replaceable nonce suffix.
///
/// The nonce is the final field of the canonical layout, so the miner encodes
/// the rest once and only rewrites the trailing eight bytes per attempt.
pub(crate) struct HashPreimage {
    bytes: Vec<u8>,
    prefix_len: usize,
}

impl HashPreimage {
    pub(crate) fn hash_with_nonce(&mut self, nonce: Nonce) -> Hash {
        self.bytes.truncate(self.prefix_len);
        self.bytes.extend_from_slice(&nonce.to_be_bytes());
        self.bytes.hash()
    }
}

impl Block {
    /// Create an unsealed candidate (nonce 0, hash not yet computed)
    pub fn candidate(
        index: BlockNumber,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        previous_hash: Hash,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: Hash::zero(),
        }
    }

    /// Create the genesis block. Genesis is exempt from proof of work.
    pub fn genesis(timestamp: Timestamp) -> LedgerResult<Self> {
        let mut block = Self::candidate(0, timestamp, Vec::new(), Hash::zero());
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    pub(crate) fn preimage(&self) -> LedgerResult<HashPreimage> {
        let bytes = codec::encode(&SealedFields {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
        })?;
        let prefix_len = bytes.len();
        Ok(HashPreimage { bytes, prefix_len })
    }

    /// Recompute the block hash from the current field values
    pub fn compute_hash(&self) -> LedgerResult<Hash> {
        Ok(self.preimage()?.hash_with_nonce(self.nonce))
    }

    /// Whether the stored hash matches the recomputed one
    pub fn has_consistent_hash(&self) -> bool {
        matches!(self.compute_hash(), Ok(computed) if computed == self.hash)
    }

    /// Get block number
    pub fn number(&self) -> BlockNumber {
        self.index
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_zero() && self.transactions.is_empty()
    }

    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.transactions.iter().any(|tx| tx.transaction_hash == *tx_hash)
    }
}
