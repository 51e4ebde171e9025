//! Blocking forms of the storage handles.
//!
//! Each wrapper drives its async counterpart on a process-wide tokio
//! runtime. Semantics are identical to the async API. These calls block the
//! current thread and must not be made from inside an async context.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use once_cell::sync::OnceCell;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::blob::{BlobClient, BlobContainer, BlobFile, BlobProvider};
use crate::provider::{CreateFileOptions, StorageClient, StorageContainer, StorageFile, StorageProvider};
use crate::transport::{byte_stream, BlobProperties, ByteStream, Metadata, WriteStream};
use axiomstore_common::{Error, Result};

static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Get or create the shared runtime.
fn runtime() -> Result<Arc<Runtime>> {
    RUNTIME
        .get_or_try_init(|| Runtime::new().map(Arc::new))
        .cloned()
        .map_err(Error::from)
}

fn read_all(source: &mut dyn Read) -> Result<ByteStream> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(byte_stream(data))
}

/// Blocking client.
#[derive(Debug, Clone)]
pub struct Client {
    inner: BlobClient,
    runtime: Arc<Runtime>,
}

impl Client {
    /// Get a blocking client from `provider`.
    pub fn new(provider: &BlobProvider) -> Result<Self> {
        Self::from_async(provider.client())
    }

    /// Wrap an async client.
    pub fn from_async(inner: BlobClient) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    /// Use `token` for this client and every handle obtained from it.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            inner: self.inner.with_cancellation(token),
            runtime: self.runtime,
        }
    }

    /// Get a container, or `None` if it does not exist.
    pub fn container(&self, name: &str) -> Result<Option<Container>> {
        let container = self.runtime.block_on(self.inner.container(name))?;
        Ok(container.map(|inner| Container {
            inner,
            runtime: Arc::clone(&self.runtime),
        }))
    }

    /// The wrapped async client.
    pub fn as_async(&self) -> &BlobClient {
        &self.inner
    }
}

/// Blocking container.
#[derive(Debug, Clone)]
pub struct Container {
    inner: BlobContainer,
    runtime: Arc<Runtime>,
}

impl Container {
    /// Container name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Container URI.
    pub fn uri(&self) -> &Url {
        self.inner.uri()
    }

    /// Create a file, uploading everything `payload` yields if given.
    pub fn create_file(
        &self,
        name: &str,
        content_type: &str,
        payload: Option<&mut dyn Read>,
        options: CreateFileOptions,
    ) -> Result<File> {
        let payload = payload.map(read_all).transpose()?;
        let inner = self
            .runtime
            .block_on(self.inner.create_file(name, content_type, payload, options))?;
        Ok(self.wrap(inner))
    }

    /// Delete a file; returns false if it did not exist.
    pub fn delete_file(&self, name: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.delete_file(name))
    }

    /// Check whether a file exists.
    pub fn file_exists(&self, name: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.file_exists(name))
    }

    /// Get a file with attributes fetched, or `None` if absent.
    pub fn file(&self, name: &str) -> Result<Option<File>> {
        let file = self.runtime.block_on(self.inner.file(name))?;
        Ok(file.map(|inner| self.wrap(inner)))
    }

    fn wrap(&self, inner: BlobFile) -> File {
        File {
            inner,
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// Blocking file.
#[derive(Debug)]
pub struct File {
    inner: BlobFile,
    runtime: Arc<Runtime>,
}

impl File {
    /// Blob name within its container.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Absolute URI of the blob.
    pub fn uri(&self) -> &Url {
        self.inner.uri()
    }

    /// Content type as of the last fetch.
    pub fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    /// Last modification time as of the last fetch.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.inner.last_modified()
    }

    /// Plaintext size in bytes as of the last fetch.
    pub fn size(&self) -> u64 {
        self.inner.size()
    }

    /// All attributes as of the last fetch.
    pub fn properties(&self) -> &BlobProperties {
        self.inner.properties()
    }

    /// Re-fetch attributes.
    pub fn refresh(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.refresh())
    }

    /// Open a reader over the file content.
    pub fn open_read(&self) -> Result<BlobReader> {
        let stream = self.runtime.block_on(self.inner.open_read())?;
        Ok(BlobReader {
            stream,
            pending: Bytes::new(),
            runtime: Arc::clone(&self.runtime),
        })
    }

    /// Open a writer that uploads on [`BlobWriter::close`].
    pub fn open_write(&self, encrypt: bool) -> Result<BlobWriter> {
        let stream = self.runtime.block_on(self.inner.open_write(encrypt))?;
        Ok(BlobWriter {
            stream,
            runtime: Arc::clone(&self.runtime),
        })
    }

    /// Drain the file content into `target`, returning the bytes written.
    pub fn download_to(&self, target: &mut dyn Write) -> Result<u64> {
        let mut reader = self.open_read()?;
        let written = io::copy(&mut reader, target)?;
        target.flush()?;
        Ok(written)
    }

    /// Upload everything `source` yields, then refresh attributes.
    pub fn upload_from(&mut self, source: &mut dyn Read, encrypt: bool) -> Result<()> {
        let stream = read_all(source)?;
        self.runtime.block_on(self.inner.upload_from(stream, encrypt))
    }

    /// Refresh attributes, then expose the metadata.
    pub fn metadata(&mut self) -> Result<&mut Metadata> {
        self.runtime.block_on(self.inner.metadata())
    }

    /// Persist the in-memory metadata.
    pub fn save_metadata(&self) -> Result<()> {
        self.runtime.block_on(self.inner.save_metadata())
    }

    /// The wrapped async file.
    pub fn as_async(&self) -> &BlobFile {
        &self.inner
    }
}

/// `Read` adapter over a file's content stream.
pub struct BlobReader {
    stream: ByteStream,
    pending: Bytes,
    runtime: Arc<Runtime>,
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            match self.runtime.block_on(self.stream.next()) {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(io::Error::other(e)),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }
}

/// `Write` adapter over an upload.
///
/// The upload is finalized by [`BlobWriter::close`]; dropping the writer
/// abandons it.
pub struct BlobWriter {
    stream: WriteStream,
    runtime: Arc<Runtime>,
}

impl BlobWriter {
    /// Finalize the upload, returning the number of bytes written.
    pub fn close(self) -> Result<u64> {
        self.runtime.block_on(self.stream.close())
    }
}

impl Write for BlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.runtime
            .block_on(self.stream.write(buf))
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
