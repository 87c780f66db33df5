//! Blake3 hashing primitives.
//!
//! - Blocks: `blake3(encoding)`
//! - Internal nodes: `blake3(left_hash || right_hash)`, raw concatenation
//!   with no separator and no length prefix.

/// Length of every digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// Number of output bits that can be extracted from one digest.
pub const DIGEST_BITS: usize = HASH_LENGTH * 8;

/// A Blake3 digest.
pub type CryptoHash = [u8; HASH_LENGTH];

/// The all-zero digest.
pub const NULL_HASH: CryptoHash = [0; HASH_LENGTH];

/// Hash an arbitrary byte string.
pub fn hash_bytes(bytes: &[u8]) -> CryptoHash {
    *blake3::hash(bytes).as_bytes()
}

/// Hash the UTF-8 bytes of a string.
pub fn hash_str(value: &str) -> CryptoHash {
    hash_bytes(value.as_bytes())
}

/// Hash the concatenation `left || right`.
pub fn hash_pair(left: &CryptoHash, right: &CryptoHash) -> CryptoHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// Extract output bit `idx` of a digest: bit `idx % 8` (least significant
/// first) of byte `idx / 8`.
///
/// Returns `None` once `idx` runs past the digest.
pub fn output_bit(hash: &CryptoHash, idx: usize) -> Option<bool> {
    hash.get(idx / 8).map(|byte| (byte >> (idx % 8)) & 1 == 1)
}
