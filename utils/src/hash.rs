use sha2::{Digest, Sha256};

/// Lowercase hex sha256 of `content`, used for rollout annotations.
pub fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}
