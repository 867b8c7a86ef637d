// ledger-node/src/backend.rs

//! The operations the rest of the application uses to record and check
//! procurement facts. `LedgerEngine` implements them in-process; an adapter
//! mirroring to a hosted ledger can implement the same trait and be chosen
//! once at startup.

use async_trait::async_trait;
use ledger_core::{
    BlockNumber, LedgerResult, Timestamp, TrailEntry, TransactionKind, TransactionStatus,
    ValidationReport,
};
use ledger_crypto::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub transaction_hash: Hash,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    /// Stored digest equals the digest of the supplied payload
    Match,
    /// Transaction exists but the payload differs
    DigestMismatch,
    /// No transaction with that hash (or reference id)
    NotFound,
}

impl fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationReason::Match => write!(f, "content digest matches"),
            VerificationReason::DigestMismatch => write!(f, "content digest mismatch"),
            VerificationReason::NotFound => write!(f, "transaction not found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub reason: VerificationReason,
    /// The transaction that was checked, when one was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<Hash>,
}

impl Verification {
    pub(crate) fn not_found() -> Self {
        Self {
            verified: false,
            reason: VerificationReason::NotFound,
            transaction_hash: None,
        }
    }

    pub(crate) fn compare(transaction_hash: Hash, stored: &Hash, supplied: &Hash) -> Self {
        let verified = stored == supplied;
        Self {
            verified,
            reason: if verified {
                VerificationReason::Match
            } else {
                VerificationReason::DigestMismatch
            },
            transaction_hash: Some(transaction_hash),
        }
    }
}

/// Audit trail row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub transaction_hash: Hash,
    pub kind: TransactionKind,
    pub reference_id: String,
    pub actor_id: String,
    pub content_digest: Hash,
    pub recorded_at: Timestamp,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_index: Option<BlockNumber>,
}

impl From<TrailEntry> for TransactionSummary {
    fn from(entry: TrailEntry) -> Self {
        let status = entry.status();
        let tx = entry.transaction;
        Self {
            transaction_hash: tx.transaction_hash,
            kind: tx.kind,
            reference_id: tx.reference_id,
            actor_id: tx.actor_id,
            content_digest: tx.content_digest,
            recorded_at: tx.recorded_at,
            status,
            block_index: entry.block_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    /// Blocks on the ledger, genesis included
    pub block_count: usize,
    /// Transactions not yet on the ledger, including any batch being sealed
    pub pending_count: usize,
    pub confirmed_transaction_count: usize,
    pub last_block_index: BlockNumber,
    pub last_block_hash: Hash,
    pub last_block_timestamp: Timestamp,
    pub genesis_timestamp: Timestamp,
    pub difficulty: usize,
    pub sealing: bool,
    /// Why the most recent sealing failed; `None` once a later one succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seal_error: Option<String>,
}

/// Ledger capability consumed by the application layers
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Record a fact; only the digest of `payload` is kept
    async fn record_transaction(
        &self,
        kind: TransactionKind,
        reference_id: &str,
        actor_id: &str,
        payload: &[u8],
    ) -> LedgerResult<RecordReceipt>;

    /// Check `payload` against the digest stored for `transaction_hash`
    async fn verify_transaction(
        &self,
        transaction_hash: &Hash,
        payload: &[u8],
    ) -> LedgerResult<Verification>;

    /// Transactions for `reference_id`, oldest first
    async fn audit_trail(&self, reference_id: &str) -> LedgerResult<Vec<TransactionSummary>>;

    async fn chain_status(&self) -> LedgerResult<ChainStatus>;

    async fn validate_chain(&self) -> LedgerResult<ValidationReport>;
}
