//! Chunk sealing with XChaCha20-Poly1305.
//!
//! The 24-byte nonce is drawn at random for every chunk, which is safe at
//! any realistic chunk count. Output layout is `nonce || ciphertext || tag`.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305,
};

use crate::keys::ContentKey;
use axiomstore_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Bytes a sealed chunk adds on top of its plaintext.
pub const CHUNK_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

fn cipher(key: &ContentKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()))
}

/// Seal one chunk, authenticating `aad` alongside it.
///
/// `aad` is not part of the output; [`open_chunk`] must be given the same bytes.
pub fn seal_chunk(key: &ContentKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = cipher(key)
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a chunk produced by [`seal_chunk`].
///
/// # Errors
/// - `Crypto` if the input is shorter than [`CHUNK_OVERHEAD`]
/// - `Crypto` if the key, the associated data or the bytes do not match
pub fn open_chunk(key: &ContentKey, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < CHUNK_OVERHEAD {
        return Err(Error::Crypto(format!(
            "Sealed chunk too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, body) = sealed.split_at(NONCE_SIZE);
    cipher(key)
        .decrypt(GenericArray::from_slice(nonce), Payload { msg: body, aad })
        .map_err(|_| Error::Crypto("Chunk authentication failed".to_string()))
}
