use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{blob_uri, upgrade, BlobClient, BlobFile, ProviderInner};
use crate::cancel;
use crate::provider::{CreateFileOptions, StorageContainer};
use crate::transport::{byte_stream, BlobTransport, ByteStream, ContentSettings};
use axiomstore_common::{BlobName, ContainerName, Error, ObjectRef, Result};

/// A container of blobs, confirmed to exist when the handle was obtained.
#[derive(Clone)]
pub struct BlobContainer {
    name: ContainerName,
    uri: Url,
    provider: Weak<ProviderInner>,
    transport: Arc<dyn BlobTransport>,
    url_base: Url,
    cancel: CancellationToken,
}

impl BlobContainer {
    pub(crate) fn new(
        name: ContainerName,
        uri: Url,
        provider: Weak<ProviderInner>,
        transport: Arc<dyn BlobTransport>,
        url_base: Url,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            uri,
            provider,
            transport,
            url_base,
            cancel,
        }
    }

    /// Use `token` for this container and every file obtained from it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A client bound to the same provider.
    pub fn client(&self) -> BlobClient {
        BlobClient::from_parts(
            self.provider.clone(),
            Arc::clone(&self.transport),
            self.url_base.clone(),
            self.cancel.clone(),
        )
    }

    /// URI a file of this name has or would have.
    pub fn file_uri(&self, name: &str) -> Result<Url> {
        blob_uri(&self.url_base, &self.object(name)?)
    }

    fn object(&self, name: &str) -> Result<ObjectRef> {
        Ok(ObjectRef::new(self.name.clone(), BlobName::new(name)?))
    }

    async fn open_file(&self, object: ObjectRef) -> Result<BlobFile> {
        let properties =
            cancel::run(&self.cancel, self.transport.fetch_attributes(&object)).await?;
        let uri = blob_uri(&self.url_base, &object)?;
        Ok(BlobFile::new(
            object,
            uri,
            properties,
            self.provider.clone(),
            Arc::clone(&self.transport),
            self.url_base.clone(),
            self.cancel.clone(),
        ))
    }
}

#[async_trait]
impl StorageContainer for BlobContainer {
    type File = BlobFile;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        payload: Option<ByteStream>,
        options: CreateFileOptions,
    ) -> Result<BlobFile> {
        let object = self.object(name)?;
        if content_type.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Content type must not be empty".to_string(),
            ));
        }
        let write_options = upgrade(&self.provider)?.write_options(options.encrypt)?;
        debug!(
            blob = %object,
            content_type,
            overwrite = options.overwrite,
            encrypted = options.encrypt,
            "Creating file"
        );

        let exists = cancel::run(&self.cancel, self.transport.exists(&object)).await?;
        if exists && !options.overwrite {
            return Err(Error::FileAlreadyExists(object.to_string()));
        }

        match payload {
            Some(stream) => {
                cancel::run(
                    &self.cancel,
                    self.transport.upload(&object, stream, &write_options),
                )
                .await?;
            }
            None if !exists => {
                cancel::run(
                    &self.cancel,
                    self.transport
                        .upload(&object, byte_stream(Vec::new()), &write_options),
                )
                .await?;
            }
            None => {}
        }

        let settings = ContentSettings {
            content_type: content_type.to_string(),
        };
        cancel::run(
            &self.cancel,
            self.transport.set_properties(&object, &settings),
        )
        .await?;

        let file = self.open_file(object).await?;
        info!(blob = %file.object(), size = file.size(), "File created");
        Ok(file)
    }

    async fn delete_file(&self, name: &str) -> Result<bool> {
        let object = self.object(name)?;
        debug!(blob = %object, "Deleting file");

        let deleted = cancel::run(&self.cancel, self.transport.delete_if_exists(&object)).await?;
        if deleted {
            info!(blob = %object, "File deleted");
        }
        Ok(deleted)
    }

    async fn file_exists(&self, name: &str) -> Result<bool> {
        let object = self.object(name)?;
        debug!(blob = %object, "Checking file existence");
        cancel::run(&self.cancel, self.transport.exists(&object)).await
    }

    async fn file(&self, name: &str) -> Result<Option<BlobFile>> {
        let object = self.object(name)?;
        debug!(blob = %object, "Resolving file");

        if !cancel::run(&self.cancel, self.transport.exists(&object)).await? {
            return Ok(None);
        }
        match self.open_file(object).await {
            Ok(file) => Ok(Some(file)),
            // deleted between the existence check and the attribute fetch
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for BlobContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobContainer")
            .field("name", &self.name)
            .field("uri", &self.uri.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobProvider;
    use crate::config::ConnectionDescriptor;
    use crate::memory::MemoryTransport;
    use crate::provider::{StorageClient, StorageFile, StorageProvider};
    use crate::transport::collect_stream;
    use axiomstore_crypto::EncryptionKey;

    struct Fixture {
        transport: MemoryTransport,
        provider: BlobProvider,
    }

    impl Fixture {
        fn new(key: Option<&str>) -> Self {
            let transport = MemoryTransport::new();
            transport.create_container("docs").unwrap();
            let provider = BlobProvider::with_transport(
                Arc::new(transport.clone()),
                ConnectionDescriptor::memory("container-tests"),
                "https://acct.blob.example.net",
                key,
            )
            .unwrap();
            Self {
                transport,
                provider,
            }
        }

        async fn container(&self) -> BlobContainer {
            self.provider
                .client()
                .container("docs")
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_without_payload_creates_empty_file() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;

        let file = container
            .create_file("empty.txt", "text/plain", None, CreateFileOptions::default())
            .await
            .unwrap();

        assert_eq!(file.content_type(), "text/plain");
        assert_eq!(file.size(), 0);
        assert!(container.file_exists("empty.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_without_payload_keeps_existing_bytes() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;
        container
            .create_file(
                "a.bin",
                "application/octet-stream",
                Some(byte_stream(b"abc".to_vec())),
                CreateFileOptions::default(),
            )
            .await
            .unwrap();

        let file = container
            .create_file("a.bin", "image/png", None, CreateFileOptions::default())
            .await
            .unwrap();
        assert_eq!(file.content_type(), "image/png");
        let data = collect_stream(file.open_read().await.unwrap()).await.unwrap();
        assert_eq!(data, b"abc");
    }

    #[tokio::test]
    async fn test_no_overwrite_rejects_existing() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;
        let options = CreateFileOptions::default().no_overwrite();

        container
            .create_file("a.txt", "text/plain", None, options)
            .await
            .unwrap();
        let err = container
            .create_file("a.txt", "text/plain", None, options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_encrypted_create_requires_key() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;

        let err = container
            .create_file(
                "s.txt",
                "text/plain",
                Some(byte_stream(b"secret".to_vec())),
                CreateFileOptions::default().encrypted(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncryptionNotConfigured));
        assert!(!container.file_exists("s.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_encrypted_create_stores_ciphertext() {
        let key = EncryptionKey::from_bytes(vec![5u8; 32]).unwrap().to_base64();
        let fixture = Fixture::new(Some(&key));
        let container = fixture.container().await;

        let file = container
            .create_file(
                "s.txt",
                "text/plain",
                Some(byte_stream(b"secret".to_vec())),
                CreateFileOptions::default().encrypted(),
            )
            .await
            .unwrap();

        let raw = fixture.transport.raw_bytes(file.object()).unwrap();
        assert_ne!(raw, b"secret");
        assert!(file.is_encrypted());

        let data = collect_stream(file.open_read().await.unwrap()).await.unwrap();
        assert_eq!(data, b"secret");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;
        container
            .create_file("a.txt", "text/plain", None, CreateFileOptions::default())
            .await
            .unwrap();

        assert!(container.delete_file("a.txt").await.unwrap());
        assert!(!container.delete_file("a.txt").await.unwrap());
        assert!(container.file("a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;

        let err = container.file_exists("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = container
            .create_file("a.txt", "", None, CreateFileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_file_uri_and_client_roundtrip() {
        let fixture = Fixture::new(None);
        let container = fixture.container().await;

        assert_eq!(
            container.file_uri("dir/a b.txt").unwrap().as_str(),
            "https://acct.blob.example.net/docs/dir/a%20b.txt"
        );
        let again = container.client().container("docs").await.unwrap();
        assert!(again.is_some());
    }
}
