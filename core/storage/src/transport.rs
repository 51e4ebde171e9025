//! Blob transport abstraction.
//!
//! A transport performs the actual I/O against a storage backend. The
//! provider/client/container/file layers configure it per call but never
//! reimplement it. Transports perform no retries.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::cancel;
use crate::options::{ReadOptions, WriteOptions};
use axiomstore_common::{ContainerName, Error, ObjectRef, Result};
use axiomstore_crypto::EncryptionInfo;

/// Content type recorded when none has been set.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Chunk size used when handing stored data out as a stream (64 KiB).
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// User metadata attached to a blob.
pub type Metadata = HashMap<String, String>;

/// Byte stream type for upload/download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Attributes of a stored blob, as returned by an attribute fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    /// MIME content type.
    pub content_type: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Entity tag, changes on every mutation.
    pub etag: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// User metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// How the payload was encrypted, if at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionInfo>,
}

impl BlobProperties {
    /// Properties for a freshly written blob.
    pub fn new(size: u64, encryption: Option<EncryptionInfo>) -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            last_modified: Utc::now(),
            etag: new_etag(),
            size,
            metadata: Metadata::new(),
            encryption,
        }
    }

    /// Properties after replacing the content of an existing blob.
    ///
    /// Content type and user metadata survive an upload.
    pub fn replaced(previous: Option<&BlobProperties>, size: u64, encryption: Option<EncryptionInfo>) -> Self {
        let mut props = Self::new(size, encryption);
        if let Some(prev) = previous {
            props.content_type = prev.content_type.clone();
            props.metadata = prev.metadata.clone();
        }
        props
    }

    /// Mark the blob as modified now.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
        self.etag = new_etag();
    }
}

fn new_etag() -> String {
    format!("\"{}\"", uuid::Uuid::new_v4())
}

/// Settable standard properties of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSettings {
    /// MIME content type.
    pub content_type: String,
}

/// Destination of a streaming upload.
///
/// The upload is finalized by [`BlobSink::finish`]; dropping a sink
/// without finishing it abandons the upload.
#[async_trait]
pub trait BlobSink: Send {
    /// Append bytes to the upload.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Complete the upload.
    async fn finish(self: Box<Self>) -> Result<()>;
}

/// Backend transport interface.
///
/// All operations are async. Failures are reported as-is; a missing
/// container or blob is `NotFound` except where the operation's return
/// value expresses absence.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Get the transport name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Check whether a container exists.
    async fn container_exists(&self, container: &ContainerName) -> Result<bool>;

    /// Check whether a blob exists.
    async fn exists(&self, object: &ObjectRef) -> Result<bool>;

    /// Upload a complete blob, replacing any existing content.
    ///
    /// # Errors
    /// - Container not found
    /// - Encryption failure
    async fn upload(&self, object: &ObjectRef, data: ByteStream, options: &WriteOptions) -> Result<()>;

    /// Open a blob for streaming reads.
    ///
    /// # Errors
    /// - Blob not found
    /// - `EncryptionNotConfigured` if the blob is encrypted and `options` is neutral
    async fn open_read(&self, object: &ObjectRef, options: &ReadOptions) -> Result<ByteStream>;

    /// Open a blob for streaming writes.
    async fn open_write(&self, object: &ObjectRef, options: &WriteOptions) -> Result<Box<dyn BlobSink>>;

    /// Download a blob into `target`, returning the number of bytes written.
    async fn download(
        &self,
        object: &ObjectRef,
        target: &mut (dyn AsyncWrite + Unpin + Send),
        options: &ReadOptions,
    ) -> Result<u64> {
        let mut stream = self.open_read(object, options).await?;
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            target.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        target.flush().await?;
        Ok(total)
    }

    /// Fetch the blob's attributes.
    async fn fetch_attributes(&self, object: &ObjectRef) -> Result<BlobProperties>;

    /// Set standard properties such as the content type.
    async fn set_properties(&self, object: &ObjectRef, settings: &ContentSettings) -> Result<()>;

    /// Replace the blob's user metadata.
    async fn set_metadata(&self, object: &ObjectRef, metadata: &Metadata) -> Result<()>;

    /// Delete the blob if present; returns whether it existed.
    async fn delete_if_exists(&self, object: &ObjectRef) -> Result<bool>;
}

/// Sink that buffers writes and uploads them in one call on finish.
pub struct BufferedSink<T> {
    transport: T,
    object: ObjectRef,
    options: WriteOptions,
    buffer: Vec<u8>,
}

impl<T> BufferedSink<T>
where
    T: BlobTransport + 'static,
{
    /// Create a sink that uploads to `object` through `transport`.
    pub fn new(transport: T, object: ObjectRef, options: WriteOptions) -> Self {
        Self {
            transport,
            object,
            options,
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl<T> BlobSink for BufferedSink<T>
where
    T: BlobTransport + 'static,
{
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.transport
            .upload(&this.object, byte_stream(this.buffer), &this.options)
            .await
    }
}

/// Writable stream returned by a file's `open_write`.
///
/// Closing the stream finalizes the upload.
pub struct WriteStream {
    sink: Box<dyn BlobSink>,
    cancel: CancellationToken,
    written: u64,
}

impl WriteStream {
    pub(crate) fn new(sink: Box<dyn BlobSink>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            written: 0,
        }
    }

    /// Append bytes to the upload.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        cancel::run(&self.cancel, self.sink.write(data)).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Append every chunk of `stream` to the upload.
    pub async fn write_stream(&mut self, mut stream: ByteStream) -> Result<()> {
        while let Some(chunk) = stream.next().await {
            self.write(&chunk?).await?;
        }
        Ok(())
    }

    /// Number of plaintext bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Finalize the upload, returning the number of bytes written.
    pub async fn close(self) -> Result<u64> {
        let written = self.written;
        cancel::run(&self.cancel, self.sink.finish()).await?;
        Ok(written)
    }
}

/// Wrap a complete buffer as a byte stream.
pub fn byte_stream(data: impl Into<Bytes>) -> ByteStream {
    let data: Bytes = data.into();
    let len = data.len();
    let chunks: Vec<Result<Bytes>> = (0..len)
        .step_by(READ_CHUNK_SIZE)
        .map(|start| Ok(data.slice(start..(start + READ_CHUNK_SIZE).min(len))))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}

/// Wrap an async reader as a byte stream.
pub fn reader_stream<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(ReaderStream::new(reader).map(|chunk| chunk.map_err(Error::from)))
}

/// Drain a byte stream into a buffer.
pub async fn collect_stream(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}
