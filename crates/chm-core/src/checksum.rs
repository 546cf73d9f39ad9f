//! Content fingerprint stored in the ledger for drift detection.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the fully substituted migration text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
