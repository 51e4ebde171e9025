//! Chunked sealing for blob payloads.
//!
//! Payloads are split into fixed-size chunks, each independently
//! authenticated. Every chunk binds its index and a final-chunk flag as
//! associated data, so reordering, duplication and truncation are all
//! detected on open.
//!
//! # Format
//! - Header: version (1) + chunk_size (4, LE) + chunk_count (8, LE)
//! - Chunks: nonce (24) + ciphertext + tag (16)
//!
//! Every chunk except the last carries exactly `chunk_size` bytes of
//! plaintext. At least one chunk is always written, so an empty payload
//! is still authenticated.

use std::io::{Read, Write};

use crate::aead::{open_chunk, seal_chunk, CHUNK_OVERHEAD};
use crate::keys::ContentKey;
use axiomstore_common::{Error, Result};

/// Default chunk size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest chunk size accepted when opening a payload (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Header size: version (1) + chunk_size (4) + chunk_count (8).
pub const HEADER_SIZE: usize = 13;

/// Sealed payload format version.
pub const STREAM_VERSION: u8 = 1;

fn chunk_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_le_bytes());
    aad[8] = last as u8;
    aad
}

/// Seals a reader into the chunked format.
pub struct StreamSealer<'a> {
    key: &'a ContentKey,
    chunk_size: usize,
}

impl<'a> StreamSealer<'a> {
    /// Create a sealer with the default chunk size.
    pub fn new(key: &'a ContentKey) -> Self {
        Self {
            key,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set custom chunk size. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Encrypt data from reader and write to writer.
    ///
    /// Returns the number of plaintext bytes sealed.
    ///
    /// # Errors
    /// - I/O errors from reader/writer
    /// - Encryption errors
    pub fn seal<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let mut chunks = Vec::new();
        let mut total_bytes = 0u64;

        // The chunk count goes in the header, so read everything first.
        loop {
            let mut chunk = vec![0u8; self.chunk_size];
            let filled = read_full(&mut reader, &mut chunk)?;
            if filled == 0 {
                break;
            }
            chunk.truncate(filled);
            total_bytes += filled as u64;
            chunks.push(chunk);
            if filled < self.chunk_size {
                break;
            }
        }
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }

        writer.write_all(&[STREAM_VERSION])?;
        writer.write_all(&(self.chunk_size as u32).to_le_bytes())?;
        writer.write_all(&(chunks.len() as u64).to_le_bytes())?;

        let last_index = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let aad = chunk_aad(i as u64, i == last_index);
            let encrypted = seal_chunk(self.key, chunk, &aad)?;
            writer.write_all(&encrypted)?;
        }

        Ok(total_bytes)
    }
}

/// Opens payloads produced by [`StreamSealer`].
pub struct StreamOpener<'a> {
    key: &'a ContentKey,
}

impl<'a> StreamOpener<'a> {
    /// Create an opener for the given key.
    pub fn new(key: &'a ContentKey) -> Self {
        Self { key }
    }

    /// Decrypt data from reader and write to writer.
    ///
    /// Returns the number of plaintext bytes recovered.
    ///
    /// # Errors
    /// - I/O errors
    /// - Invalid format or unsupported version
    /// - Authentication failure (tampered, reordered or truncated data)
    pub fn open<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|_| Error::Crypto("Sealed payload header truncated".to_string()))?;

        if header[0] != STREAM_VERSION {
            return Err(Error::Crypto(format!(
                "Unsupported stream version: {}",
                header[0]
            )));
        }

        let chunk_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::Crypto(format!("Invalid chunk size: {}", chunk_size)));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[5..]);
        let total_chunks = u64::from_le_bytes(count_bytes);
        if total_chunks == 0 {
            return Err(Error::Crypto("Sealed payload has no chunks".to_string()));
        }

        let sealed_chunk_size = chunk_size + CHUNK_OVERHEAD;
        let mut buffer = vec![0u8; sealed_chunk_size];
        let mut total_bytes = 0u64;

        for i in 0..total_chunks {
            let last = i + 1 == total_chunks;
            let len = if last {
                // The final chunk may be short; anything beyond a full chunk is trailing garbage.
                let mut rest = Vec::with_capacity(sealed_chunk_size);
                reader.read_to_end(&mut rest)?;
                if rest.len() > sealed_chunk_size {
                    return Err(Error::Crypto("Trailing data after final chunk".to_string()));
                }
                buffer[..rest.len()].copy_from_slice(&rest);
                rest.len()
            } else {
                reader
                    .read_exact(&mut buffer)
                    .map_err(|_| Error::Crypto("Unexpected end of stream".to_string()))?;
                sealed_chunk_size
            };

            let plaintext = open_chunk(self.key, &buffer[..len], &chunk_aad(i, last))?;
            writer.write_all(&plaintext)?;
            total_bytes += plaintext.len() as u64;
        }

        Ok(total_bytes)
    }
}

/// Fill `buf` from the reader, stopping early only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Seal a complete byte slice in chunks of `chunk_size`.
pub(crate) fn seal_bytes(key: &ContentKey, chunk_size: usize, data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(HEADER_SIZE + data.len() + CHUNK_OVERHEAD);
    StreamSealer::new(key)
        .with_chunk_size(chunk_size)
        .seal(data, &mut output)?;
    Ok(output)
}

/// Open a complete sealed byte slice.
pub(crate) fn open_bytes(key: &ContentKey, data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len());
    StreamOpener::new(key).open(data, &mut output)?;
    Ok(output)
}
