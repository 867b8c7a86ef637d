// ledger-storage/src/lib.rs

//! In-process lookup caches for the ledger
//!
//! Caches here are accelerators only. Durable storage is provided by an
//! external backend and is not part of this crate.

pub mod cache;

pub use cache::{CacheConfig, CacheStats, TransactionCache};
