//! SHA-256 fingerprints for change scripts and backup statements.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hex digest of a string
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash several parts as one digest, separated so that `("ab", "c")` and
/// `("a", "bc")` never collide.
pub fn compute_checksum_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
