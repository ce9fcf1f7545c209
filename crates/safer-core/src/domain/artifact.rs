//! Captured images.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// One encoded still image captured for the current cycle.
///
/// The artifact is immutable once built and is dropped by the controller as
/// soon as classification has finished with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    bytes: Vec<u8>,
    captured_at: DateTime<Utc>,
    digest: String,
}

impl CaptureArtifact {
    /// Wrap encoded image bytes captured now.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::captured_at(bytes, Utc::now())
    }

    /// Wrap encoded image bytes captured at a known instant.
    pub fn captured_at(bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());
        Self {
            bytes,
            captured_at,
            digest,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// SHA-256 of the image bytes (lowercase hex).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Short digest (first 12 hex chars) for log lines.
    pub fn short_digest(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}
