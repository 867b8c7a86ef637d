// ledger-crypto/src/lib.rs

//! Hashing primitives for the bid ledger
//!
//! This crate provides:
//! - The 32-byte `Hash` type and SHA-256 digests
//! - The canonical byte encoding every ledger digest is computed over

pub mod codec;
pub mod hash;

pub use codec::{digest_of, encode};
pub use hash::{digest, Hash, Hashable, HASH_SIZE};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during hashing and encoding
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
