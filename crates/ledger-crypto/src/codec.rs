// ledger-crypto/src/codec.rs

//! Canonical byte encoding.
//!
//! Every digest in the ledger is SHA-256 over bytes produced here. The layout
//! is bincode 1.x with fixed-width big-endian integers, so a struct encodes as
//! the concatenation of its fields in declaration order:
//!
//! | value            | bytes                                   |
//! |------------------|-----------------------------------------|
//! | `u32` / `u64`    | 4 / 8 bytes, big-endian                 |
//! | `str` / `String` | `u64` byte length, then UTF-8 bytes     |
//! | `Hash`           | 32 raw bytes                            |
//! | unit enum        | `u32` variant index                     |
//! | `Vec<T>` / slice | `u64` element count, then each element  |
//!
//! Map types are never encoded, so no output depends on iteration order.

use crate::{hash::Hashable, CryptoError, CryptoResult, Hash};
use bincode::Options;
use serde::Serialize;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
}

/// Encode `value` into its canonical byte form
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CryptoResult<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| CryptoError::SerializationError(e.to_string()))
}

/// Digest of the canonical encoding of `value`
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> CryptoResult<Hash> {
    Ok(encode(value)?.hash())
}
