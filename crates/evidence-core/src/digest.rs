//! Streaming SHA-256 digest engine.
//!
//! All stored evidence is addressed by the lowercase 64-hex SHA-256 of its
//! bytes. The engine consumes readers in a single pass with a fixed-size
//! buffer; the full object is never held in memory. I/O errors abort the
//! pass and discard partial hash state; retry policy belongs to callers.

use sha2::{Digest as _, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Error;

/// Read buffer size for streaming hashing.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// A validated lowercase 64-hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Digest(String);

impl Digest {
    /// Parses a digest string, normalizing first.
    ///
    /// Accepts an optional `0x`/`0X` prefix and uppercase hex; rejects
    /// anything that is not exactly 64 hex characters after normalization.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let normalized = normalize(s);
        if normalized.len() != 64 {
            return Err(Error::InvalidDigest(format!(
                "must be 64 hex characters, got {}",
                normalized.len()
            )));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(Error::InvalidDigest(
                "contains non-hex characters".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    /// Builds a digest from a finalized SHA-256 hash.
    fn from_hash(hash: &[u8]) -> Self {
        Self(hex::encode(hash))
    }

    /// Returns the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true iff `s` is already a valid lowercase 64-hex digest.
    pub fn is_valid(s: &str) -> bool {
        s.len() == 64
            && s.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Strips a leading `0x`/`0X` and lowercases.
pub fn normalize(s: &str) -> String {
    let trimmed = s.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_lowercase()
}

/// Result of hashing a stream: the digest plus the byte count observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    pub digest: Digest,
    pub size_bytes: u64,
}

/// Hashes a reader in a single streaming pass.
///
/// Returns the digest and total bytes consumed. The reader is read to EOF;
/// an I/O error discards all partial state.
pub async fn hash_stream<R>(mut reader: R) -> Result<StreamDigest, Error>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    let mut size_bytes: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size_bytes += n as u64;
    }

    Ok(StreamDigest {
        digest: Digest::from_hash(&hasher.finalize()),
        size_bytes,
    })
}

/// Hashes an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> StreamDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    StreamDigest {
        digest: Digest::from_hash(&hasher.finalize()),
        size_bytes: bytes.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_DIGEST: &str = "7509e5bda0c762d2bac7f90d758b5b2263fa01ccbc542ab5e3df163be08e6ca9";

    #[test]
    fn test_hash_bytes_known_vector() {
        let out = hash_bytes(b"hello world!");
        assert_eq!(out.digest.as_str(), HELLO_DIGEST);
        assert_eq!(out.size_bytes, 12);
    }

    #[test]
    fn test_hash_bytes_empty() {
        let out = hash_bytes(b"");
        assert_eq!(
            out.digest.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(out.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_hash_stream_matches_hash_bytes() {
        let data = b"hello world!".to_vec();
        let out = hash_stream(&data[..]).await.unwrap();
        assert_eq!(out, hash_bytes(&data));
    }

    #[tokio::test]
    async fn test_hash_stream_large_input_spans_buffers() {
        // Cross the 64 KiB buffer boundary several times.
        let data = vec![0xa7u8; HASH_BUF_SIZE * 3 + 17];
        let out = hash_stream(&data[..]).await.unwrap();
        assert_eq!(out.size_bytes, data.len() as u64);
        assert_eq!(out.digest, hash_bytes(&data).digest);
    }

    #[test]
    fn test_parse_normalizes_prefix_and_case() {
        let upper = format!("0x{}", HELLO_DIGEST.to_uppercase());
        let digest = Digest::parse(&upper).unwrap();
        assert_eq!(digest.as_str(), HELLO_DIGEST);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(Digest::parse("abcd").is_err());
        assert!(Digest::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(Digest::parse(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(Digest::is_valid(HELLO_DIGEST));
        assert!(!Digest::is_valid(&HELLO_DIGEST.to_uppercase()));
        assert!(!Digest::is_valid("short"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let digest = Digest::parse(HELLO_DIGEST).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(digest, back);
    }

    #[test]
    fn test_deserialize_rejects_invalid() {
        let result: Result<Digest, _> = serde_json::from_str("\"not-a-digest\"");
        assert!(result.is_err());
    }
}
