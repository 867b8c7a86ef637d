// ledger-node/src/lib.rs
pub mod backend;
pub mod config;
pub mod runtime;

pub use backend::{
    ChainStatus, LedgerBackend, RecordReceipt, TransactionSummary, Verification,
    VerificationReason,
};
pub use config::EngineConfig;
pub use runtime::{LedgerEngine, SealHandle, Submission};
