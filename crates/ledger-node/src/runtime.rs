// ledger-node/src/runtime.rs
use crate::backend::{
    ChainStatus, LedgerBackend, RecordReceipt, TransactionSummary, Verification,
};
use crate::EngineConfig;
use async_trait::async_trait;
use ledger_core::{
    collect_trail, commit_block, transaction::parse_content_digest, validate, Block, BlockNumber,
    CancelFlag, Ledger, LedgerError, LedgerResult, Miner, MonotonicClock, SealOutcome,
    SealReport, TrailEntry, Transaction, TransactionKind, TransactionPool, TransactionStatus,
    ValidationReport,
};
use ledger_crypto::{digest, Hash};
use ledger_storage::TransactionCache;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{oneshot, watch, RwLock};

/// Shared engine state.
///
/// Lock order is pool, then ledger, then `in_flight`. Drains and commits hold
/// the pool write lock, so a reader holding the pool read lock sees every
/// transaction in exactly one of pool, `in_flight` or ledger.
struct EngineInner {
    config: EngineConfig,
    pool: RwLock<TransactionPool>,
    ledger: RwLock<Ledger>,
    /// Read-only snapshot of the batch the miner currently owns
    in_flight: StdRwLock<Vec<Transaction>>,
    cache: TransactionCache,
    miner: Miner,
    clock: MonotonicClock,
    /// `true` while a sealing workflow is running
    sealing: watch::Sender<bool>,
    /// Error of the most recent sealing workflow, cleared when one succeeds
    last_seal_error: StdRwLock<Option<String>>,
    cancel: CancelFlag,
}

/// In-process ledger engine.
///
/// Cheap to clone; clones are handles to the same ledger.
#[derive(Clone)]
pub struct LedgerEngine {
    inner: Arc<EngineInner>,
}

/// Result of submitting a transaction
#[derive(Debug)]
pub struct Submission {
    pub receipt: RecordReceipt,
    /// Present when this submission started a sealing workflow
    pub sealing: Option<SealHandle>,
}

/// Completion of a background sealing workflow
#[derive(Debug)]
pub struct SealHandle {
    rx: oneshot::Receiver<LedgerResult<SealReport>>,
}

impl SealHandle {
    /// Wait for the block to be appended (or for the workflow to fail)
    pub async fn wait(self) -> LedgerResult<SealReport> {
        self.rx.await.unwrap_or_else(|_| {
            Err(LedgerError::Worker("sealing task ended without reporting".into()))
        })
    }
}

impl LedgerEngine {
    /// Create an engine with a fresh genesis block
    pub fn new(config: EngineConfig) -> LedgerResult<Self> {
        config.validate()?;
        let clock = MonotonicClock::new();
        let ledger = Ledger::with_genesis(clock.now())?;
        Ok(Self::assemble(config, ledger, clock))
    }

    /// Create an engine over blocks restored from an external store.
    ///
    /// A chain that fails validation is still loaded so it can be inspected;
    /// the failure is logged and reported by `validate`.
    pub fn from_ledger(config: EngineConfig, ledger: Ledger) -> LedgerResult<Self> {
        config.validate()?;
        let report = validate(&ledger);
        if !report.valid {
            tracing::error!(
                invalid_blocks = report.invalid_blocks.len(),
                "Restored ledger failed integrity validation"
            );
        }
        Ok(Self::assemble(config, ledger, MonotonicClock::new()))
    }

    fn assemble(config: EngineConfig, ledger: Ledger, clock: MonotonicClock) -> Self {
        let (sealing, _) = watch::channel(false);

        tracing::info!(
            "Ledger engine initialized: seal_threshold={}, difficulty={}, cache_capacity={}",
            config.pool.seal_threshold,
            config.miner.difficulty,
            config.cache.capacity
        );

        Self {
            inner: Arc::new(EngineInner {
                pool: RwLock::new(TransactionPool::new(config.pool.clone())),
                ledger: RwLock::new(ledger),
                in_flight: StdRwLock::new(Vec::new()),
                cache: TransactionCache::new(config.cache.clone()),
                miner: Miner::new(config.miner.clone()),
                clock,
                sealing,
                last_seal_error: StdRwLock::new(None),
                cancel: CancelFlag::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &TransactionCache {
        &self.inner.cache
    }

    /// Record a fact, storing only the digest of `payload`
    pub async fn record(
        &self,
        kind: TransactionKind,
        reference_id: &str,
        actor_id: &str,
        payload: &[u8],
    ) -> LedgerResult<Submission> {
        self.record_with_digest(kind, reference_id, actor_id, digest(payload)).await
    }

    /// Record a fact whose payload the caller already hashed (hex SHA-256)
    pub async fn record_digest(
        &self,
        kind: TransactionKind,
        reference_id: &str,
        actor_id: &str,
        content_digest: &str,
    ) -> LedgerResult<Submission> {
        let content_digest = parse_content_digest(content_digest)?;
        self.record_with_digest(kind, reference_id, actor_id, content_digest).await
    }

    async fn record_with_digest(
        &self,
        kind: TransactionKind,
        reference_id: &str,
        actor_id: &str,
        content_digest: Hash,
    ) -> LedgerResult<Submission> {
        let mut pool = self.inner.pool.write().await;
        let ledger = self.inner.ledger.read().await;
        // Stamped under the pool lock so pool order matches time order
        let tx = Transaction::new(
            kind,
            reference_id,
            actor_id,
            content_digest,
            self.inner.clock.now(),
        )?;
        self.submit_locked(&mut pool, &ledger, tx)
    }

    /// Submit a prebuilt transaction.
    ///
    /// Resubmitting a transaction the engine already holds is idempotent:
    /// the receipt reports where it currently lives and nothing is re-added.
    pub async fn submit(&self, tx: Transaction) -> LedgerResult<Submission> {
        let mut pool = self.inner.pool.write().await;
        let ledger = self.inner.ledger.read().await;
        self.submit_locked(&mut pool, &ledger, tx)
    }

    fn submit_locked(
        &self,
        pool: &mut TransactionPool,
        ledger: &Ledger,
        tx: Transaction,
    ) -> LedgerResult<Submission> {
        if self.inner.cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        tx.validate_submission()?;
        let tx_hash = tx.transaction_hash;

        if ledger.find_transaction(&tx_hash).is_some() {
            tracing::debug!(hash = %tx_hash, "Transaction already confirmed; submit is a no-op");
            return Ok(Submission {
                receipt: RecordReceipt {
                    transaction_hash: tx_hash,
                    status: TransactionStatus::Confirmed,
                },
                sealing: None,
            });
        }

        let sealing_now = self
            .in_flight()
            .iter()
            .any(|pending| pending.transaction_hash == tx_hash);
        if sealing_now {
            tracing::debug!(hash = %tx_hash, "Transaction already being sealed; submit is a no-op");
            return Ok(Submission {
                receipt: RecordReceipt {
                    transaction_hash: tx_hash,
                    status: TransactionStatus::Pending,
                },
                sealing: None,
            });
        }

        let cached = tx.clone();
        let handle = pool.submit(tx)?;
        self.inner.cache.put(handle.transaction_hash, cached);

        tracing::debug!(
            hash = %handle.transaction_hash,
            pending = pool.pending_count(),
            "Transaction submitted"
        );

        let sealing = if pool.should_seal() {
            self.begin_sealing(pool)
        } else {
            None
        };

        Ok(Submission {
            receipt: RecordReceipt {
                transaction_hash: handle.transaction_hash,
                status: handle.status,
            },
            sealing,
        })
    }

    /// Seal whatever is pending now, regardless of the threshold.
    ///
    /// Returns `None` if the pool is empty or a sealing is already running.
    pub async fn seal_now(&self) -> Option<SealHandle> {
        let mut pool = self.inner.pool.write().await;
        self.begin_sealing(&mut pool)
    }

    /// Wait for any running sealing, then seal the remainder of the pool
    pub async fn flush(&self) -> LedgerResult<Option<SealReport>> {
        loop {
            self.wait_idle().await;
            if let Some(handle) = self.seal_now().await {
                return handle.wait().await.map(Some);
            }
            if self.inner.pool.read().await.is_empty() {
                self.wait_idle().await;
                return Ok(None);
            }
        }
    }

    /// Wait until no sealing workflow is running
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.sealing.subscribe();
        // The sender lives as long as `inner`, so this cannot fail
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    pub fn is_sealing(&self) -> bool {
        *self.inner.sealing.borrow()
    }

    /// Abort any nonce search and refuse further submissions.
    ///
    /// Drained transactions go back to the pool; nothing is lost.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.wait_idle().await;
        let pending = self.inner.pool.read().await.pending_count();
        tracing::info!(pending, "Ledger engine stopped");
    }

    /// Start the sealing workflow if none is running. Caller holds the pool
    /// write lock, which makes the drain atomic with respect to submits.
    fn begin_sealing(&self, pool: &mut TransactionPool) -> Option<SealHandle> {
        if pool.is_empty() {
            return None;
        }

        let acquired = self.inner.sealing.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !acquired {
            tracing::debug!("Sealing already in flight; trigger ignored");
            return None;
        }

        let batch = pool.drain();
        *self.in_flight_mut() = batch.clone();
        tracing::debug!(transactions = batch.len(), "Sealing started");

        let (tx, rx) = oneshot::channel();
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.run_sealing(batch).await;
            *engine.last_seal_error_mut() = result.as_ref().err().map(ToString::to_string);
            engine.inner.sealing.send_replace(false);

            match &result {
                Ok(report) => tracing::info!(
                    "Sealed block {} with {} transactions (nonce {})",
                    report.block_index,
                    report.transaction_hashes.len(),
                    report.nonce
                ),
                Err(LedgerError::Cancelled) => {
                    tracing::warn!("Sealing cancelled; batch returned to pool")
                }
                Err(e) => tracing::error!(error = %e, "Sealing failed"),
            }

            let _ = tx.send(result);
        });

        Some(SealHandle { rx })
    }

    async fn run_sealing(&self, batch: Vec<Transaction>) -> LedgerResult<SealReport> {
        let previous = self.inner.ledger.read().await.tip().clone();
        let miner = self.inner.miner.clone();
        let cancel = self.inner.cancel.clone();
        let timestamp = self.inner.clock.now();

        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = outcome_tx.send(miner.seal(&previous, batch, timestamp, &cancel));
        });

        let outcome = match outcome_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                // The worker died holding the batch; restore it from the snapshot
                let mut pool = self.inner.pool.write().await;
                let batch = std::mem::take(&mut *self.in_flight_mut());
                pool.requeue(batch);
                return Err(LedgerError::Worker(
                    "nonce search exited without a result".into()
                ));
            }
        };

        match outcome {
            SealOutcome::Sealed(block) => {
                let mut pool = self.inner.pool.write().await;
                let mut ledger = self.inner.ledger.write().await;
                let result = commit_block(&mut pool, &mut ledger, block);
                self.in_flight_mut().clear();

                if let Ok(report) = &result {
                    if let Some(block) = ledger.block(report.block_index) {
                        for tx in &block.transactions {
                            self.inner.cache.put(tx.transaction_hash, tx.clone());
                        }
                    }
                }
                result
            }
            SealOutcome::Aborted { transactions, reason } => {
                let mut pool = self.inner.pool.write().await;
                pool.requeue(transactions);
                self.in_flight_mut().clear();
                Err(reason)
            }
        }
    }

    /// Find a transaction: cache, then pool, then the batch being sealed,
    /// then a scan of the ledger. Ledger hits are written back to the cache.
    pub async fn lookup(&self, hash: &Hash) -> Option<Transaction> {
        if let Some(tx) = self.inner.cache.get(hash) {
            return Some(tx);
        }

        let pool = self.inner.pool.read().await;
        if let Some(tx) = pool.get(hash) {
            return Some(tx.clone());
        }

        let sealing_hit = self
            .in_flight()
            .iter()
            .find(|tx| tx.transaction_hash == *hash)
            .cloned();
        if sealing_hit.is_some() {
            return sealing_hit;
        }

        let ledger = self.inner.ledger.read().await;
        let found = ledger.find_transaction(hash).map(|(tx, _)| tx.clone());
        if let Some(tx) = &found {
            tracing::debug!(hash = %hash, "Cache miss resolved from ledger");
            self.inner.cache.put(*hash, tx.clone());
        }
        found
    }

    /// Check `payload` against the digest stored for `transaction_hash`
    pub async fn verify(&self, transaction_hash: &Hash, payload: &[u8]) -> Verification {
        let supplied = digest(payload);
        match self.lookup(transaction_hash).await {
            Some(tx) => Verification::compare(tx.transaction_hash, &tx.content_digest, &supplied),
            None => Verification::not_found(),
        }
    }

    /// Check `payload` against the most recent transaction for `reference_id`
    pub async fn verify_latest(&self, reference_id: &str, payload: &[u8]) -> Verification {
        let supplied = digest(payload);
        match self.trail_entries(reference_id).await.pop() {
            Some(entry) => Verification::compare(
                entry.transaction.transaction_hash,
                &entry.transaction.content_digest,
                &supplied,
            ),
            None => Verification::not_found(),
        }
    }

    /// Where a transaction currently lives
    pub async fn transaction_status(&self, hash: &Hash) -> Option<TransactionSummary> {
        let pool = self.inner.pool.read().await;
        let ledger = self.inner.ledger.read().await;

        let pending = pool.get(hash).cloned().or_else(|| {
            self.in_flight()
                .iter()
                .find(|tx| tx.transaction_hash == *hash)
                .cloned()
        });

        let entry = match pending {
            Some(transaction) => TrailEntry { transaction, block_index: None },
            None => {
                let (tx, index) = ledger.find_transaction(hash)?;
                TrailEntry { transaction: tx.clone(), block_index: Some(index) }
            }
        };
        Some(entry.into())
    }

    /// Transactions for `reference_id`, oldest first, pending ones included
    pub async fn trail(&self, reference_id: &str) -> Vec<TransactionSummary> {
        self.trail_entries(reference_id)
            .await
            .into_iter()
            .map(TransactionSummary::from)
            .collect()
    }

    async fn trail_entries(&self, reference_id: &str) -> Vec<TrailEntry> {
        let pool = self.inner.pool.read().await;
        let ledger = self.inner.ledger.read().await;
        let in_flight = self.in_flight();
        collect_trail(&ledger, [in_flight.as_slice(), pool.pending()], reference_id)
    }

    pub async fn status(&self) -> ChainStatus {
        let pool = self.inner.pool.read().await;
        let ledger = self.inner.ledger.read().await;
        let in_flight = self.in_flight().len();
        let tip = ledger.tip();

        ChainStatus {
            block_count: ledger.len(),
            pending_count: pool.pending_count() + in_flight,
            confirmed_transaction_count: ledger.transaction_count(),
            last_block_index: tip.index,
            last_block_hash: tip.hash,
            last_block_timestamp: tip.timestamp,
            genesis_timestamp: ledger.genesis_block().timestamp,
            difficulty: self.inner.miner.difficulty(),
            sealing: self.is_sealing(),
            last_seal_error: self.last_seal_error(),
        }
    }

    /// Error reported by the most recent sealing workflow, if it failed
    pub fn last_seal_error(&self) -> Option<String> {
        self.inner
            .last_seal_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Walk the whole chain, recomputing hashes and linkage
    pub async fn validate(&self) -> ValidationReport {
        validate(&*self.inner.ledger.read().await)
    }

    pub async fn block(&self, index: BlockNumber) -> Option<Block> {
        self.inner.ledger.read().await.block(index).cloned()
    }

    fn in_flight(&self) -> RwLockReadGuard<'_, Vec<Transaction>> {
        self.inner.in_flight.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight_mut(&self) -> RwLockWriteGuard<'_, Vec<Transaction>> {
        self.inner.in_flight.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_seal_error_mut(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.inner.last_seal_error.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LedgerBackend for LedgerEngine {
    async fn record_transaction(
        &self,
        kind: TransactionKind,
        reference_id: &str,
        actor_id: &str,
        payload: &[u8],
    ) -> LedgerResult<RecordReceipt> {
        // Sealing outcomes are logged by the workflow itself
        Ok(self.record(kind, reference_id, actor_id, payload).await?.receipt)
    }

    async fn verify_transaction(
        &self,
        transaction_hash: &Hash,
        payload: &[u8],
    ) -> LedgerResult<Verification> {
        Ok(self.verify(transaction_hash, payload).await)
    }

    async fn audit_trail(&self, reference_id: &str) -> LedgerResult<Vec<TransactionSummary>> {
        Ok(self.trail(reference_id).await)
    }

    async fn chain_status(&self) -> LedgerResult<ChainStatus> {
        Ok(self.status().await)
    }

    async fn validate_chain(&self) -> LedgerResult<ValidationReport> {
        Ok(self.validate().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VerificationReason;
    use ledger_core::{MinerConfig, PoolConfig};

    fn quick_config(threshold: usize) -> EngineConfig {
        EngineConfig {
            pool: PoolConfig { seal_threshold: threshold },
            miner: MinerConfig { difficulty: 1 },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_engine_starts_at_genesis() {
        let engine = LedgerEngine::new(EngineConfig::default()).unwrap();
        let status = engine.status().await;
        assert_eq!(status.block_count, 1);
        assert_eq!(status.pending_count, 0);
        assert_eq!(status.difficulty, 4);
        assert!(!status.sealing);
        assert_eq!(status.last_block_timestamp, status.genesis_timestamp);
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        assert!(LedgerEngine::new(quick_config(0)).is_err());
    }

    #[tokio::test]
    async fn test_record_below_threshold_stays_pending() {
        let engine = LedgerEngine::new(quick_config(3)).unwrap();
        let submission = engine
            .record(TransactionKind::BidSubmission, "OPP-1", "acme", b"bid")
            .await
            .unwrap();

        assert!(submission.sealing.is_none());
        assert_eq!(submission.receipt.status, TransactionStatus::Pending);

        let status = engine
            .transaction_status(&submission.receipt.transaction_hash)
            .await
            .unwrap();
        assert_eq!(status.status, TransactionStatus::Pending);
        assert_eq!(status.block_index, None);
    }

    #[tokio::test]
    async fn test_record_validation_error() {
        let engine = LedgerEngine::new(quick_config(3)).unwrap();
        let result = engine
            .record(TransactionKind::BidSubmission, "", "acme", b"bid")
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let result = engine
            .record_digest(TransactionKind::DocumentVersion, "DOC-1", "author", "abc")
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(engine.status().await.pending_count, 0);
    }

    #[tokio::test]
    async fn test_record_digest() {
        let engine = LedgerEngine::new(quick_config(3)).unwrap();
        let hex = digest(b"v1").to_hex();
        let submission = engine
            .record_digest(TransactionKind::DocumentVersion, "DOC-1", "author", &hex)
            .await
            .unwrap();

        let verification = engine.verify(&submission.receipt.transaction_hash, b"v1").await;
        assert!(verification.verified);
    }

    #[tokio::test]
    async fn test_threshold_triggers_sealing() {
        let engine = LedgerEngine::new(quick_config(2)).unwrap();
        engine.record(TransactionKind::BidSubmission, "OPP-1", "a", b"1").await.unwrap();
        let second = engine
            .record(TransactionKind::BidSubmission, "OPP-1", "b", b"2")
            .await
            .unwrap();

        let report = second.sealing.expect("threshold reached").wait().await.unwrap();
        assert_eq!(report.block_index, 1);
        assert_eq!(report.transaction_hashes.len(), 2);

        let status = engine.transaction_status(&second.receipt.transaction_hash).await.unwrap();
        assert_eq!(status.status, TransactionStatus::Confirmed);
        assert_eq!(status.block_index, Some(1));
        assert_eq!(engine.status().await.last_seal_error, None);
    }

    #[tokio::test]
    async fn test_flush_seals_remainder() {
        let engine = LedgerEngine::new(quick_config(10)).unwrap();
        engine.record(TransactionKind::DocumentVersion, "DOC-1", "a", b"v1").await.unwrap();

        let report = engine.flush().await.unwrap().unwrap();
        assert_eq!(report.transaction_hashes.len(), 1);
        assert!(engine.flush().await.unwrap().is_none());
        assert_eq!(engine.status().await.block_count, 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_requeues() {
        let config = EngineConfig {
            miner: MinerConfig { difficulty: 64 },
            ..quick_config(1)
        };
        let engine = LedgerEngine::new(config).unwrap();
        let submission = engine
            .record(TransactionKind::BidSubmission, "OPP-1", "a", b"1")
            .await
            .unwrap();
        let handle = submission.sealing.expect("threshold of one seals immediately");

        engine.shutdown().await;
        assert!(matches!(handle.wait().await, Err(LedgerError::Cancelled)));

        let status = engine.status().await;
        assert_eq!(status.block_count, 1);
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.last_seal_error.as_deref(), Some("Sealing cancelled"));
        assert!(engine.verify(&submission.receipt.transaction_hash, b"1").await.verified);

        let after = engine.record(TransactionKind::BidSubmission, "OPP-1", "b", b"2").await;
        assert!(matches!(after, Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_verify_unknown_hash() {
        let engine = LedgerEngine::new(quick_config(3)).unwrap();
        let verification = engine.verify(&digest(b"nothing"), b"payload").await;
        assert!(!verification.verified);
        assert_eq!(verification.reason, VerificationReason::NotFound);
    }

    #[tokio::test]
    async fn test_verify_latest_uses_newest_version() {
        let engine = LedgerEngine::new(quick_config(10)).unwrap();
        engine.record(TransactionKind::DocumentVersion, "DOC-1", "a", b"v1").await.unwrap();
        engine.record(TransactionKind::DocumentVersion, "DOC-1", "a", b"v2").await.unwrap();

        assert!(engine.verify_latest("DOC-1", b"v2").await.verified);
        let stale = engine.verify_latest("DOC-1", b"v1").await;
        assert_eq!(stale.reason, VerificationReason::DigestMismatch);
        assert_eq!(
            engine.verify_latest("DOC-404", b"v1").await.reason,
            VerificationReason::NotFound
        );
    }
}
