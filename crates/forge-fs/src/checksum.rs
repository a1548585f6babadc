//! SHA-256 checksums for downloaded registry content
//!
//! Registry and plugin manifests publish checksums as `sha256:<hex>`. This
//! colon-prefixed form is distinct from the `sha256-<hex>` integrity strings
//! written into lockfiles and the two must not be mixed.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
pub const PREFIX: &str = "sha256:";

/// Compute the checksum of raw bytes as `"sha256:<hex>"`.
pub fn compute_bytes_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the checksum of string content as `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &str) -> String {
    compute_bytes_checksum(content.as_bytes())
}

/// Verify downloaded bytes against a published `sha256:<hex>` checksum.
///
/// Hex digits are compared case-insensitively.
pub fn verify_checksum(content: &[u8], expected: &str) -> Result<()> {
    let actual = compute_bytes_checksum(content);
    let matches = expected
        .strip_prefix(PREFIX)
        .is_some_and(|hex| hex.eq_ignore_ascii_case(&actual[PREFIX.len()..]));

    if matches {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_has_prefix() {
        let checksum = compute_content_checksum("hello world");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn content_checksum_known_value() {
        let checksum = compute_content_checksum("hello world");
        assert_eq!(
            checksum,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn verify_accepts_matching_checksum() {
        let expected = compute_bytes_checksum(b"payload");
        verify_checksum(b"payload", &expected).unwrap();
        verify_checksum(b"payload", &expected.to_uppercase().replace("SHA256:", "sha256:"))
            .unwrap();
    }

    #[test]
    fn verify_rejects_hyphen_prefix() {
        let hex = &compute_bytes_checksum(b"payload")[PREFIX.len()..];
        let err = verify_checksum(b"payload", &format!("sha256-{hex}")).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn verify_reports_expected_and_actual() {
        let err = verify_checksum(b"tampered", "sha256:00").unwrap_err();
        match err {
            Error::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, "sha256:00");
                assert_eq!(actual, compute_bytes_checksum(b"tampered"));
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
