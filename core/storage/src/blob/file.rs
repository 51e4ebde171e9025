use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{container_uri, upgrade, BlobContainer, ProviderInner};
use crate::cancel;
use crate::provider::StorageFile;
use crate::transport::{BlobProperties, BlobTransport, ByteStream, Metadata, WriteStream};
use axiomstore_common::{ObjectRef, Result};

/// A stored blob together with its attributes as of the last fetch.
pub struct BlobFile {
    object: ObjectRef,
    uri: Url,
    properties: BlobProperties,
    provider: Weak<ProviderInner>,
    transport: Arc<dyn BlobTransport>,
    url_base: Url,
    cancel: CancellationToken,
}

impl BlobFile {
    pub(crate) fn new(
        object: ObjectRef,
        uri: Url,
        properties: BlobProperties,
        provider: Weak<ProviderInner>,
        transport: Arc<dyn BlobTransport>,
        url_base: Url,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            object,
            uri,
            properties,
            provider,
            transport,
            url_base,
            cancel,
        }
    }

    /// Use `token` for the operations of this file.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Container and blob name of this file.
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// The container holding this file.
    pub fn container(&self) -> Result<BlobContainer> {
        let name = self.object.container().clone();
        let uri = container_uri(&self.url_base, &name)?;
        Ok(BlobContainer::new(
            name,
            uri,
            self.provider.clone(),
            Arc::clone(&self.transport),
            self.url_base.clone(),
            self.cancel.clone(),
        ))
    }

    /// All attributes as of the last fetch.
    pub fn properties(&self) -> &BlobProperties {
        &self.properties
    }

    /// Plaintext size in bytes as of the last fetch.
    pub fn size(&self) -> u64 {
        self.properties.size
    }

    /// Entity tag as of the last fetch.
    pub fn etag(&self) -> &str {
        &self.properties.etag
    }

    /// Whether the stored content is encrypted, as of the last fetch.
    pub fn is_encrypted(&self) -> bool {
        self.properties.encryption.is_some()
    }
}

#[async_trait]
impl StorageFile for BlobFile {
    fn name(&self) -> &str {
        self.object.name().as_str()
    }

    fn uri(&self) -> &Url {
        &self.uri
    }

    fn content_type(&self) -> &str {
        &self.properties.content_type
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.properties.last_modified
    }

    async fn refresh(&mut self) -> Result<()> {
        debug!(blob = %self.object, "Fetching attributes");
        let properties =
            cancel::run(&self.cancel, self.transport.fetch_attributes(&self.object)).await?;
        self.properties = properties;
        Ok(())
    }

    async fn open_read(&self) -> Result<ByteStream> {
        let options = upgrade(&self.provider)?.read_options()?;
        debug!(blob = %self.object, "Opening read stream");
        cancel::run(&self.cancel, self.transport.open_read(&self.object, &options)).await
    }

    async fn open_write(&self, encrypt: bool) -> Result<WriteStream> {
        let options = upgrade(&self.provider)?.write_options(encrypt)?;
        debug!(blob = %self.object, encrypted = encrypt, "Opening write stream");
        let sink =
            cancel::run(&self.cancel, self.transport.open_write(&self.object, &options)).await?;
        Ok(WriteStream::new(sink, self.cancel.clone()))
    }

    async fn download_to(&self, target: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let options = upgrade(&self.provider)?.read_options()?;
        debug!(blob = %self.object, "Downloading");
        let written = cancel::run(
            &self.cancel,
            self.transport.download(&self.object, target, &options),
        )
        .await?;
        debug!(blob = %self.object, size = written, "Download complete");
        Ok(written)
    }

    async fn upload_from(&mut self, source: ByteStream, encrypt: bool) -> Result<()> {
        let options = upgrade(&self.provider)?.write_options(encrypt)?;
        debug!(blob = %self.object, encrypted = encrypt, "Uploading");
        cancel::run(
            &self.cancel,
            self.transport.upload(&self.object, source, &options),
        )
        .await?;
        self.refresh().await?;
        info!(blob = %self.object, size = self.properties.size, encrypted = encrypt, "File uploaded");
        Ok(())
    }

    async fn metadata(&mut self) -> Result<&mut Metadata> {
        self.refresh().await?;
        Ok(&mut self.properties.metadata)
    }

    async fn save_metadata(&self) -> Result<()> {
        debug!(blob = %self.object, entries = self.properties.metadata.len(), "Saving metadata");
        cancel::run(
            &self.cancel,
            self.transport
                .set_metadata(&self.object, &self.properties.metadata),
        )
        .await?;
        info!(blob = %self.object, "Metadata saved");
        Ok(())
    }
}

impl fmt::Debug for BlobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobFile")
            .field("object", &self.object)
            .field("uri", &self.uri.as_str())
            .field("properties", &self.properties)
            .finish()
    }
}
