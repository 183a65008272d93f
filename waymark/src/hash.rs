//! Content hashing for fingerprints and ids.
//!
//! SHA-256 truncated to 64 bits: stable across processes, platforms and
//! toolchains, which `DefaultHasher` does not promise.

use sha2::{Digest, Sha256};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 64-bit content hash.
pub fn hash64(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Base-36 rendering of [`hash64`].
pub fn hash36(input: &str) -> String {
    to_base36(hash64(input))
}

/// Short (at most 6 chars) base-36 hash, used for collision suffixes.
pub fn short_hash(input: &str) -> String {
    to_base36(hash64(input) % 36u64.pow(6))
}

pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while value > 0 {
        out.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    // Only ASCII digits and lowercase letters were pushed.
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
    }

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(hash36("hello"), hash36("hello"));
        assert_ne!(hash36("hello"), hash36("hello!"));
    }

    #[test]
    fn short_hash_is_short() {
        for input in ["", "a", "fingerprint|1", "fingerprint|10"] {
            let h = short_hash(input);
            assert!(!h.is_empty() && h.len() <= 6, "{h}");
        }
    }
}
