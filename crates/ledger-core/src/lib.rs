// ledger-core/src/lib.rs

//! Core ledger data structures and logic
//!
//! This crate provides:
//! - Transaction and block structures with canonical hashing
//! - The pending transaction pool
//! - The proof-of-work miner
//! - The append-only ledger
//! - Audit trail queries and chain integrity validation

pub mod audit;
pub mod block;
pub mod chain;
pub mod mempool;
pub mod miner;
pub mod sealing;
pub mod transaction;
pub mod types;
pub mod validator;

pub use audit::{audit_trail, collect_trail, TrailEntry};
pub use block::Block;
pub use chain::Ledger;
pub use mempool::{PoolConfig, PoolMetrics, TransactionHandle, TransactionPool};
pub use miner::{CancelFlag, Miner, MinerConfig, SealOutcome};
pub use sealing::{commit_block, seal_pending, SealReport};
pub use transaction::{Transaction, TransactionKind};
pub use types::*;
pub use validator::{validate, validate_blocks, InvalidBlock, InvalidReason, ValidationReport};

use ledger_crypto::Hash;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(String),

    #[error("Sealing cancelled")]
    Cancelled,

    #[error("Sealing worker failed: {0}")]
    Worker(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(#[from] ledger_crypto::CryptoError),
}

/// Reasons a block cannot extend the chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("Invalid block index: expected {expected}, got {actual}")]
    IndexMismatch { expected: BlockNumber, actual: BlockNumber },

    #[error("Previous hash mismatch at block {index}: expected {expected}, got {actual}")]
    LinkageMismatch { index: BlockNumber, expected: Hash, actual: Hash },

    #[error("Hash mismatch at block {index}: stored {stored}, computed {computed}")]
    HashMismatch { index: BlockNumber, stored: Hash, computed: Hash },

    #[error("Block {0} carries no transactions")]
    EmptyBlock(BlockNumber),
}
