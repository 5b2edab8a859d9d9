use sha2::{Digest, Sha256};

/// Hex SHA-256 of an input file's bytes, logged with each load so two runs over the
/// same extract can be matched up.
pub fn compute_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}
