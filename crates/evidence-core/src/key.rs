//! Object-store key derivation.
//!
//! Canonical layout: `sha256/<d[0:2]>/<d[2:4]>/<digest>/<sanitized-filename>`.
//! The two-level fan-out keeps listings shallow on backends that charge for
//! prefix scans. Keys are opaque to external callers.

use crate::digest::Digest;

/// Characters replaced by `_` during filename sanitization.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Fallback display name when sanitization consumes the whole input.
const FALLBACK_NAME: &str = "file";

/// Derives the canonical object-store key for a digest and display name.
pub fn bucket_key(digest: &Digest, filename: &str) -> String {
    let d = digest.as_str();
    format!(
        "sha256/{}/{}/{}/{}",
        &d[0..2],
        &d[2..4],
        d,
        sanitize_filename(filename)
    )
}

/// Derives the staging key for a session without a declared digest.
///
/// The session id makes the key unique; the object is moved to its
/// canonical key once the actual digest is known at complete time.
pub fn staging_key(session_id: &str, filename: &str) -> String {
    format!("staging/{}/{}", session_id, sanitize_filename(filename))
}

/// Sanitizes a display filename for embedding in an object key.
///
/// Deterministic and idempotent: forbidden characters and `..` become `_`,
/// leading dots and surrounding whitespace are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let no_dotdot = replaced.replace("..", "_");
    let stripped = no_dotdot.trim_start_matches('.').trim();
    if stripped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> Digest {
        Digest::parse("7509e5bda0c762d2bac7f90d758b5b2263fa01ccbc542ab5e3df163be08e6ca9").unwrap()
    }

    #[test]
    fn test_bucket_key_layout() {
        assert_eq!(
            bucket_key(&digest(), "e.pdf"),
            "sha256/75/09/7509e5bda0c762d2bac7f90d758b5b2263fa01ccbc542ab5e3df163be08e6ca9/e.pdf"
        );
    }

    #[test]
    fn test_bucket_key_is_pure() {
        assert_eq!(bucket_key(&digest(), "a.pdf"), bucket_key(&digest(), "a.pdf"));
    }

    #[test]
    fn test_sanitize_forbidden_chars() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_dotdot_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
    }

    #[test]
    fn test_sanitize_leading_dots_and_whitespace() {
        assert_eq!(sanitize_filename("  .hidden.txt  "), "hidden.txt");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let once = sanitize_filename("..\\..\\evil<name>.pdf");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename("   "), "file");
        assert_eq!(sanitize_filename("."), "file");
    }

    #[test]
    fn test_staging_key_contains_session_id() {
        let key = staging_key("0b8c8464-6bf6-4b10-9b2f-4d4b3f3a9f01", "report.pdf");
        assert_eq!(
            key,
            "staging/0b8c8464-6bf6-4b10-9b2f-4d4b3f3a9f01/report.pdf"
        );
    }
}
