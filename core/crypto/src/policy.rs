//! Encryption policy attached to read and write option bundles.
//!
//! A policy is a pure function of the configured key: it seals payloads on
//! upload and opens them on download. The [`EncryptionInfo`] it produces is
//! stored by the transport next to the blob, never inside user metadata.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::keys::{ContentKey, EncryptionKey, KeyFingerprint};
use crate::stream::{open_bytes, seal_bytes, DEFAULT_CHUNK_SIZE, STREAM_VERSION};
use axiomstore_common::{Error, Result};

/// Algorithm identifier recorded with encrypted blobs.
pub const ALGORITHM: &str = "XChaCha20-Poly1305";

/// Description of how a stored blob was encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// AEAD algorithm name.
    pub algorithm: String,
    /// Sealed payload format version.
    pub format_version: u8,
    /// Fingerprint of the content key used.
    pub key_fingerprint: KeyFingerprint,
}

/// Encryption parameters for a single read or write.
#[derive(Debug, Clone)]
pub struct EncryptionPolicy {
    key: ContentKey,
    fingerprint: KeyFingerprint,
    chunk_size: usize,
}

impl EncryptionPolicy {
    /// Build a policy from a configured key.
    pub fn new(key: &EncryptionKey) -> Result<Self> {
        let content_key = key.content_key()?;
        let fingerprint = crate::kdf::fingerprint(&content_key)?;
        Ok(Self {
            key: content_key,
            fingerprint,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set the plaintext chunk size used when sealing.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Fingerprint of the key this policy encrypts with.
    pub fn fingerprint(&self) -> KeyFingerprint {
        self.fingerprint
    }

    /// Description to store alongside blobs sealed by this policy.
    pub fn info(&self) -> EncryptionInfo {
        EncryptionInfo {
            algorithm: ALGORITHM.to_string(),
            format_version: STREAM_VERSION,
            key_fingerprint: self.fingerprint,
        }
    }

    /// Seal a plaintext payload.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        seal_bytes(&self.key, self.chunk_size, plaintext)
    }

    /// Open a payload that was sealed under `info`.
    ///
    /// # Errors
    /// - `Crypto` if the algorithm is unknown, the blob was sealed under a
    ///   different key, or authentication fails
    pub fn open(&self, info: &EncryptionInfo, sealed: &[u8]) -> Result<Vec<u8>> {
        if info.algorithm != ALGORITHM {
            return Err(Error::Crypto(format!(
                "Unsupported encryption algorithm: {}",
                info.algorithm
            )));
        }
        let expected = &self.fingerprint.as_bytes()[..];
        if !bool::from(info.key_fingerprint.as_bytes()[..].ct_eq(expected)) {
            return Err(Error::Crypto(format!(
                "Blob was encrypted with a different key (fingerprint {})",
                info.key_fingerprint
            )));
        }

        open_bytes(&self.key, sealed)
    }
}
