//! Per-call read and write option bundles.
//!
//! Bundles are built fresh by the provider for every I/O call and carry the
//! encryption policy, if any. Transports apply them through
//! [`WriteOptions::encode`] and [`ReadOptions::decode`] so every backend
//! honors the same encryption contract.

use axiomstore_common::{Error, Result};
use axiomstore_crypto::{EncryptionInfo, EncryptionPolicy};

/// Options for reading a blob.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    encryption: Option<EncryptionPolicy>,
}

impl ReadOptions {
    /// A bundle that applies no decryption.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// A bundle that decrypts with the given policy.
    pub fn with_encryption(policy: EncryptionPolicy) -> Self {
        Self {
            encryption: Some(policy),
        }
    }

    /// The decryption policy, if any.
    pub fn encryption(&self) -> Option<&EncryptionPolicy> {
        self.encryption.as_ref()
    }

    /// Whether this bundle carries no encryption policy.
    pub fn is_neutral(&self) -> bool {
        self.encryption.is_none()
    }

    /// Turn stored bytes back into plaintext.
    ///
    /// Unencrypted blobs pass through unchanged regardless of the bundle.
    ///
    /// # Errors
    /// - `EncryptionNotConfigured` if the blob is encrypted and the bundle is neutral
    /// - `Crypto` if the blob was sealed under another key or fails authentication
    pub fn decode(&self, info: Option<&EncryptionInfo>, stored: Vec<u8>) -> Result<Vec<u8>> {
        match (info, &self.encryption) {
            (None, _) => Ok(stored),
            (Some(_), None) => Err(Error::EncryptionNotConfigured),
            (Some(info), Some(policy)) => policy.open(info, &stored),
        }
    }
}

/// Options for writing a blob.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    encryption: Option<EncryptionPolicy>,
}

impl WriteOptions {
    /// A bundle that writes plaintext.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// A bundle that encrypts with the given policy.
    pub fn with_encryption(policy: EncryptionPolicy) -> Self {
        Self {
            encryption: Some(policy),
        }
    }

    /// The encryption policy, if any.
    pub fn encryption(&self) -> Option<&EncryptionPolicy> {
        self.encryption.as_ref()
    }

    /// Whether this bundle carries no encryption policy.
    pub fn is_neutral(&self) -> bool {
        self.encryption.is_none()
    }

    /// Turn plaintext into the bytes to store, plus the info to record with them.
    pub fn encode(&self, plaintext: Vec<u8>) -> Result<(Vec<u8>, Option<EncryptionInfo>)> {
        match &self.encryption {
            None => Ok((plaintext, None)),
            Some(policy) => Ok((policy.seal(&plaintext)?, Some(policy.info()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axiomstore_crypto::EncryptionKey;

    fn policy(byte: u8) -> EncryptionPolicy {
        EncryptionPolicy::new(&EncryptionKey::from_bytes(vec![byte; 32]).unwrap()).unwrap()
    }

    #[test]
    fn test_neutral_roundtrip_is_identity() {
        let (stored, info) = WriteOptions::neutral().encode(b"plain".to_vec()).unwrap();
        assert_eq!(stored, b"plain");
        assert!(info.is_none());

        let read = ReadOptions::neutral().decode(None, stored).unwrap();
        assert_eq!(read, b"plain");
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let (stored, info) = WriteOptions::with_encryption(policy(1))
            .encode(b"secret".to_vec())
            .unwrap();
        assert_ne!(stored, b"secret");

        let read = ReadOptions::with_encryption(policy(1))
            .decode(info.as_ref(), stored)
            .unwrap();
        assert_eq!(read, b"secret");
    }

    #[test]
    fn test_keyed_read_of_plain_blob_passes_through() {
        let read = ReadOptions::with_encryption(policy(1))
            .decode(None, b"plain".to_vec())
            .unwrap();
        assert_eq!(read, b"plain");
    }

    #[test]
    fn test_neutral_read_of_encrypted_blob_fails() {
        let (stored, info) = WriteOptions::with_encryption(policy(1))
            .encode(b"secret".to_vec())
            .unwrap();

        let err = ReadOptions::neutral().decode(info.as_ref(), stored).unwrap_err();
        assert!(matches!(err, Error::EncryptionNotConfigured));
    }
}
