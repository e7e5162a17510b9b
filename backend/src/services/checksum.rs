//! Checksum computation and side-file verification.
//!
//! Maven uploads `<artifact>.sha1` after the artifact itself. The digest is
//! already recorded on the package file, so the side file is only checked
//! against it, never stored. Both operands are reduced through SHA-256
//! before comparison: the recorded SHA-1 hex string on one side, the raw
//! side-file payload on the other.

use sha2::{Digest, Sha256};

/// Outcome of checking a checksum side file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumVerdict {
    Match,
    Mismatch,
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    use sha1::Sha1;
    let mut hasher = Sha1::new();
    sha1::Digest::update(&mut hasher, data);
    format!("{:x}", sha1::Digest::finalize(hasher))
}

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    use md5::Md5;
    let mut hasher = Md5::new();
    md5::Digest::update(&mut hasher, data);
    format!("{:x}", md5::Digest::finalize(hasher))
}

/// Compare a stored SHA-1 against an uploaded side file.
///
/// `uploaded_sha256` is the SHA-256 of the side-file payload, as reported by
/// the upload proxy or computed from the payload. Case is ignored on that
/// operand only; the stored digest is hashed exactly as recorded.
pub fn verify_sha1_side_file(stored_sha1: &str, uploaded_sha256: &str) -> ChecksumVerdict {
    let expected = sha256_hex(stored_sha1.as_bytes());
    if expected == uploaded_sha256.to_ascii_lowercase() {
        ChecksumVerdict::Match
    } else {
        ChecksumVerdict::Mismatch
    }
}
