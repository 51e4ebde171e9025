//! Content key derivation using BLAKE2b.
//!
//! A configured key may be 128 to 512 bits long, while XChaCha20-Poly1305
//! needs exactly 256 bits. The content key is BLAKE2b-256 keyed with the
//! configured key over a fixed domain label, so every permitted length maps
//! to a uniformly distributed content key.

use blake2::digest::consts::{U32, U8};
use blake2::digest::Mac;
use blake2::Blake2bMac;

use crate::keys::{ContentKey, EncryptionKey, KeyFingerprint, FINGERPRINT_LENGTH, KEY_LENGTH};
use axiomstore_common::{Error, Result};

const CONTENT_KEY_LABEL: &[u8] = b"axiomstore.content-key.v1";
const FINGERPRINT_LABEL: &[u8] = b"axiomstore.key-fingerprint.v1";

/// Derive the content key for a configured encryption key.
///
/// # Postconditions
/// - The derived key is deterministic given the same input key
///
/// # Errors
/// - Returns error if the key is longer than BLAKE2b accepts (64 bytes)
pub fn derive_content_key(key: &EncryptionKey) -> Result<ContentKey> {
    let mut mac = <Blake2bMac<U32> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;
    mac.update(CONTENT_KEY_LABEL);

    let mut derived = [0u8; KEY_LENGTH];
    derived.copy_from_slice(&mac.finalize().into_bytes());
    Ok(ContentKey::from_bytes(derived))
}

/// Compute the public fingerprint of a content key.
pub fn fingerprint(key: &ContentKey) -> Result<KeyFingerprint> {
    let mut mac = <Blake2bMac<U8> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Crypto(format!("Fingerprint failed: {}", e)))?;
    mac.update(FINGERPRINT_LABEL);

    let mut out = [0u8; FINGERPRINT_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(KeyFingerprint(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ALLOWED_KEY_LENGTHS;

    #[test]
    fn test_derivation_is_deterministic() {
        let key = EncryptionKey::from_bytes(vec![9u8; 32]).unwrap();
        let a = derive_content_key(&key).unwrap();
        let b = derive_content_key(&key).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_every_allowed_length_derives() {
        for len in ALLOWED_KEY_LENGTHS {
            let key = EncryptionKey::from_bytes(vec![3u8; len]).unwrap();
            assert!(derive_content_key(&key).is_ok());
        }
    }

    #[test]
    fn test_different_keys_differ() {
        let a = EncryptionKey::from_bytes(vec![1u8; 16]).unwrap();
        let b = EncryptionKey::from_bytes(vec![2u8; 16]).unwrap();
        let ka = derive_content_key(&a).unwrap();
        let kb = derive_content_key(&b).unwrap();
        assert_ne!(ka.as_bytes(), kb.as_bytes());
        assert_ne!(fingerprint(&ka).unwrap(), fingerprint(&kb).unwrap());
    }

    #[test]
    fn test_fingerprint_differs_from_key_prefix() {
        let key = EncryptionKey::from_bytes(vec![4u8; 48]).unwrap();
        let content = derive_content_key(&key).unwrap();
        let fp = fingerprint(&content).unwrap();
        assert_ne!(&fp.as_bytes()[..], &content.as_bytes()[..FINGERPRINT_LENGTH]);
    }
}
