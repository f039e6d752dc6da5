//! Upload MIME allow-list and extension hints.

use crate::Error;

/// MIME types accepted at upload init.
pub const DEFAULT_ALLOWED_MIME: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "text/csv",
    "application/json",
    "application/zip",
    "application/x-zip-compressed",
    "text/plain",
    "application/octet-stream",
];

/// Checks a declared MIME type against the allow-list (case-insensitive).
pub fn validate_mime(mime: &str) -> Result<(), Error> {
    let lowered = mime.trim().to_lowercase();
    if DEFAULT_ALLOWED_MIME.contains(&lowered.as_str()) {
        Ok(())
    } else {
        Err(Error::UnsupportedMime(mime.to_string()))
    }
}

/// Best-effort MIME guess from a trailing file extension.
pub fn guess_from_filename(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "zip" => Some("application/zip"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_allowed() {
        assert!(validate_mime("application/pdf").is_ok());
        assert!(validate_mime("application/octet-stream").is_ok());
    }

    #[test]
    fn test_validate_case_insensitive() {
        assert!(validate_mime("Application/PDF").is_ok());
        assert!(validate_mime("IMAGE/PNG").is_ok());
    }

    #[test]
    fn test_validate_rejects_executables() {
        assert!(validate_mime("application/x-msdownload").is_err());
        assert!(validate_mime("text/html").is_err());
    }

    #[test]
    fn test_guess_known_extensions() {
        assert_eq!(guess_from_filename("report.pdf"), Some("application/pdf"));
        assert_eq!(guess_from_filename("photo.JPEG"), Some("image/jpeg"));
        assert_eq!(guess_from_filename("data.csv"), Some("text/csv"));
        assert_eq!(guess_from_filename("notes.txt"), Some("text/plain"));
    }

    #[test]
    fn test_guess_uses_trailing_extension() {
        assert_eq!(guess_from_filename("archive.tar.zip"), Some("application/zip"));
    }

    #[test]
    fn test_guess_unknown_is_none() {
        assert_eq!(guess_from_filename("binary.exe"), None);
        assert_eq!(guess_from_filename("no-extension"), None);
    }
}
