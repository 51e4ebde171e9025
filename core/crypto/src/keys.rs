//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use axiomstore_common::{Error, Result};

/// Length of the derived content key in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Permitted lengths of a configured encryption key, in bytes.
///
/// These correspond to 128, 192, 256, 384 and 512-bit keys.
pub const ALLOWED_KEY_LENGTHS: [usize; 5] = [16, 24, 32, 48, 64];

/// Length of a key fingerprint in bytes.
pub const FINGERPRINT_LENGTH: usize = 8;

/// Symmetric key configured on a storage provider.
///
/// The raw key is never used for encryption directly; a fixed-size
/// [`ContentKey`] is derived from it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: Vec<u8>,
}

impl EncryptionKey {
    /// Create a key from raw bytes.
    ///
    /// # Errors
    /// - `InvalidConfiguration` if the length is not one of [`ALLOWED_KEY_LENGTHS`]
    pub fn from_bytes(key: Vec<u8>) -> Result<Self> {
        if !ALLOWED_KEY_LENGTHS.contains(&key.len()) {
            let len = key.len();
            let mut key = key;
            key.zeroize();
            return Err(Error::InvalidConfiguration(format!(
                "Invalid encryption key length: {} bytes (expected one of {:?})",
                len, ALLOWED_KEY_LENGTHS
            )));
        }
        Ok(Self { key })
    }

    /// Decode a key from standard base64.
    ///
    /// # Errors
    /// - `InvalidConfiguration` if the input is not valid base64 or has a bad length
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = STANDARD.decode(encoded.trim()).map_err(|e| {
            Error::InvalidConfiguration(format!("Encryption key is not valid base64: {}", e))
        })?;
        Self::from_bytes(decoded)
    }

    /// Generate a random key of the given length.
    pub fn generate(len: usize) -> Result<Self> {
        let mut key = vec![0u8; len];
        OsRng.fill_bytes(&mut key);
        Self::from_bytes(key)
    }

    /// Encode the key as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.key)
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Always false: a valid key is never empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Key strength in bits.
    pub fn bits(&self) -> usize {
        self.key.len() * 8
    }

    /// Derive the content key used by the AEAD.
    pub fn content_key(&self) -> Result<ContentKey> {
        crate::kdf::derive_content_key(self)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED; {} bits])", self.bits())
    }
}

/// Key for encrypting blob contents.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_LENGTH],
}

impl ContentKey {
    /// Create a content key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

/// Short public identifier of a content key.
///
/// Recorded next to encrypted blobs so a read with the wrong key fails
/// before decryption is attempted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFingerprint(pub [u8; FINGERPRINT_LENGTH]);

impl KeyFingerprint {
    /// Get the fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allowed_lengths_accepted() {
        for len in ALLOWED_KEY_LENGTHS {
            let key = EncryptionKey::from_bytes(vec![7u8; len]).unwrap();
            assert_eq!(key.len(), len);
            assert_eq!(key.bits(), len * 8);
        }
    }

    #[test]
    fn test_base64_roundtrip() {
        let key = EncryptionKey::generate(32).unwrap();
        let decoded = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let err = EncryptionKey::from_base64("not base64!!").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_generate_is_random() {
        let a = EncryptionKey::generate(32).unwrap();
        let b = EncryptionKey::generate(32).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_debug_redacts() {
        let key = EncryptionKey::from_bytes(vec![1u8; 16]).unwrap();
        assert_eq!(format!("{:?}", key), "EncryptionKey([REDACTED; 128 bits])");
    }

    #[test]
    fn test_fingerprint_display_is_hex() {
        let fp = KeyFingerprint([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        assert_eq!(fp.to_string(), "deadbeef00010203");
    }

    proptest! {
        #[test]
        fn prop_only_allowed_lengths_construct(len in 0usize..128) {
            let result = EncryptionKey::from_bytes(vec![0x5a; len]);
            if ALLOWED_KEY_LENGTHS.contains(&len) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
            }
        }
    }
}
