//! Canonical hashing for fingerprints and content digests.
//!
//! Two kinds of hash live here:
//!
//! - **Canonical hashes** (xxh64 over canonical JSON) identify structured
//!   values such as a policy or a reachable set. Structs serialize in field
//!   declaration order and only ordered collections are hashed, so the same
//!   value always yields the same hash.
//! - **Content digests** (SHA-256) identify raw bytes such as compiled PDFs.

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Only used on crate types whose `Serialize` impls are derived and whose
/// maps have string keys, for which JSON serialization cannot fail.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization of derived type")
}

/// Compute the canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute the canonical hash as a 16-character hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// SHA-256 digest of raw bytes as 64 lowercase hex characters.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Offset of the first byte at which two buffers differ.
///
/// When one buffer is a prefix of the other this is the shorter length;
/// equal buffers return `None`.
pub fn first_difference(a: &[u8], b: &[u8]) -> Option<u64> {
    if a == b {
        return None;
    }
    let common = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    Some(common as u64)
}
