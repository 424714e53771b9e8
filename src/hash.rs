//! Content-hashing helpers shared by the snapshot/context store, the
//! selection id resolver, and the inputs_hash computation (§4.B, §4.C, §6).

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Full lowercase-hex SHA-256 digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Hashes a value's canonical JSON form: `serde_json::Value`'s default map
/// representation sorts keys (the `preserve_order` feature is not enabled),
/// so two structurally-equal values always serialize identically regardless
/// of field-declaration order.
pub fn canonical_json_hash<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_value(value).expect("value must serialize");
    let bytes = serde_json::to_vec(&canonical).expect("canonical value must serialize");
    sha256_hex(&bytes)
}

/// First 16 hex characters of a SHA-256 digest, used for selection ids.
pub fn sha256_hex16(bytes: &[u8]) -> String {
    sha256_hex(bytes)[..16].to_string()
}
