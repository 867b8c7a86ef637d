// ledger-core/src/transaction.rs

use crate::{types::*, LedgerError, LedgerResult};
use ledger_crypto::{codec, Hash};
use serde::{Deserialize, Serialize};

/// Kinds of fact the ledger records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// A bidder submitted a bid for an opportunity
    BidSubmission,
    /// An author saved a new version of a document
    DocumentVersion,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::BidSubmission => write!(f, "bid_submission"),
            TransactionKind::DocumentVersion => write!(f, "document_version"),
        }
    }
}

/// One recorded fact.
///
/// Field order is part of the block hash preimage; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// What kind of fact this is
    pub kind: TransactionKind,
    /// Opportunity or document id the fact refers to
    pub reference_id: String,
    /// Bidder or author id
    pub actor_id: String,
    /// Digest of the caller's payload (the payload itself is never stored)
    pub content_digest: Hash,
    /// Submission time
    pub recorded_at: Timestamp,
    /// Digest of the five fields above
    pub transaction_hash: Hash,
}

/// The fields covered by `transaction_hash`, in canonical order
#[derive(Serialize)]
struct TransactionPreimage<'a> {
    kind: TransactionKind,
    reference_id: &'a str,
    actor_id: &'a str,
    content_digest: &'a Hash,
    recorded_at: Timestamp,
}

impl Transaction {
    /// Create a transaction and compute its content address
    pub fn new(
        kind: TransactionKind,
        reference_id: impl Into<String>,
        actor_id: impl Into<String>,
        content_digest: Hash,
        recorded_at: Timestamp,
    ) -> LedgerResult<Self> {
        let mut tx = Self {
            kind,
            reference_id: reference_id.into(),
            actor_id: actor_id.into(),
            content_digest,
            recorded_at,
            transaction_hash: Hash::zero(),
        };
        tx.transaction_hash = tx.compute_hash()?;
        Ok(tx)
    }

    /// Hash of the transaction's canonical encoding
    pub fn hash(&self) -> Hash {
        self.transaction_hash
    }

    /// Recompute the content address from the current field values
    pub fn compute_hash(&self) -> LedgerResult<Hash> {
        let preimage = TransactionPreimage {
            kind: self.kind,
            reference_id: &self.reference_id,
            actor_id: &self.actor_id,
            content_digest: &self.content_digest,
            recorded_at: self.recorded_at,
        };
        Ok(codec::digest_of(&preimage)?)
    }

    /// Validate the fields a submission must carry
    pub fn validate_basic(&self) -> LedgerResult<()> {
        if self.reference_id.trim().is_empty() {
            return Err(LedgerError::Validation("Reference id cannot be empty".into()));
        }

        if self.actor_id.trim().is_empty() {
            return Err(LedgerError::Validation("Actor id cannot be empty".into()));
        }

        // An all-zero digest is the sentinel value, never a real SHA-256 output
        if self.content_digest.is_zero() {
            return Err(LedgerError::Validation("Content digest is malformed".into()));
        }

        Ok(())
    }

    /// Full admission check: field validation plus a stored hash that
    /// matches the fields it claims to address
    pub fn validate_submission(&self) -> LedgerResult<()> {
        self.validate_basic()?;
        if self.compute_hash()? != self.transaction_hash {
            return Err(LedgerError::Validation(
                "Transaction hash does not match its fields".into()
            ));
        }
        Ok(())
    }

    /// Whether the stored content digest matches `payload`
    pub fn matches_payload(&self, payload: &[u8]) -> bool {
        self.content_digest == ledger_crypto::digest(payload)
    }
}

/// Parse a caller-supplied hex content digest
pub fn parse_content_digest(hex: &str) -> LedgerResult<Hash> {
    Hash::from_hex(hex)
        .map_err(|e| LedgerError::Validation(format!("Content digest is malformed: {}", e)))
}
