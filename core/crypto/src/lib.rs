//! Cryptographic primitives for AxiomStore.
//!
//! This module provides:
//! - Validated encryption keys (128 to 512 bits) with automatic zeroization
//! - Content key derivation using BLAKE2b
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Chunked sealing for blob payloads
//! - The encryption policy attached to read/write option bundles
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Key fingerprints are compared in constant time

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod policy;
pub mod stream;

pub use aead::{open_chunk, seal_chunk};
pub use kdf::{derive_content_key, fingerprint};
pub use keys::{ContentKey, EncryptionKey, KeyFingerprint, ALLOWED_KEY_LENGTHS};
pub use policy::{EncryptionInfo, EncryptionPolicy, ALGORITHM};
pub use stream::{StreamOpener, StreamSealer};
