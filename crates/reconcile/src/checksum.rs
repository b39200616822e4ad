//! Checksum gate
//!
//! The gate hashes the raw bytes of the desired document, so any byte change
//! (including whitespace) forces a pass, even when the diff turns out empty.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha512};

/// SHA-512 of `data`, URL-safe base64 with padding
pub fn digest(data: &[u8]) -> String {
    let hash = Sha512::digest(data);
    URL_SAFE.encode(hash)
}

/// Whether a pass must run for the given raw desired bytes
///
/// An empty locked checksum (no lock file yet) always proceeds.
pub fn should_proceed(raw_desired: &[u8], locked_checksum: &str) -> bool {
    if locked_checksum.is_empty() {
        return true;
    }
    digest(raw_desired) != locked_checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = digest(b"{}");
        let b = digest(b"{}");
        assert_eq!(a, b);
        // 64-byte digest -> 88 base64 chars with padding
        assert_eq!(a.len(), 88);
        assert!(a.ends_with("=="));
    }

    #[test]
    fn test_digest_is_url_safe() {
        for sample in [&b"alpha"[..], b"beta", b"{\"alice\": {}}", b"\xff\xfe\xfd"] {
            let d = digest(sample);
            assert!(!d.contains('+') && !d.contains('/'), "{d}");
        }
    }

    #[test]
    fn test_gate_skips_on_match() {
        let raw = b"{\n    \"alice\": {}\n}";
        assert!(!should_proceed(raw, &digest(raw)));
    }

    #[test]
    fn test_gate_proceeds_on_whitespace_change() {
        let raw = b"{\n    \"alice\": {}\n}";
        let reformatted = b"{\"alice\": {}}";
        assert!(should_proceed(reformatted, &digest(raw)));
    }

    #[test]
    fn test_gate_proceeds_without_lock() {
        assert!(should_proceed(b"{}", ""));
    }
}
