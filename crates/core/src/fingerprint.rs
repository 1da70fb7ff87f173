use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// 128-bit content digest: the leading 16 bytes of SHA-256 over the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint([u8; 16]);

impl ContentFingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut truncated = [0u8; 16];
        truncated.copy_from_slice(&digest[..16]);
        Self(truncated)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

pub fn fingerprint(bytes: &[u8]) -> ContentFingerprint {
    ContentFingerprint::of(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    New,
    Duplicate { first_seen_as: String },
}

#[derive(Debug, Default)]
pub struct FingerprintIndex {
    seen: Mutex<HashMap<ContentFingerprint, String>>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, digest: &ContentFingerprint) -> bool {
        self.seen.lock().contains_key(digest)
    }

    pub fn record(&self, digest: ContentFingerprint, source_name: impl Into<String>) {
        self.seen
            .lock()
            .entry(digest)
            .or_insert_with(|| source_name.into());
    }

    /// Check-and-insert under one lock.
    pub fn claim(&self, digest: ContentFingerprint, source_name: &str) -> Claim {
        let mut seen = self.seen.lock();
        match seen.get(&digest) {
            Some(first) => Claim::Duplicate {
                first_seen_as: first.clone(),
            },
            None => {
                seen.insert(digest, source_name.to_string());
                Claim::New
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
