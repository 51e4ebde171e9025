use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{container_uri, upgrade, BlobContainer, BlobProvider, ProviderInner};
use crate::cancel;
use crate::options::{ReadOptions, WriteOptions};
use crate::provider::StorageClient;
use crate::transport::BlobTransport;
use axiomstore_common::{ContainerName, Result};

/// Client over a blob transport. Resolves containers by name.
#[derive(Clone)]
pub struct BlobClient {
    provider: Weak<ProviderInner>,
    transport: Arc<dyn BlobTransport>,
    url_base: Url,
    cancel: CancellationToken,
}

impl BlobClient {
    pub(crate) fn new(provider: &Arc<ProviderInner>) -> Self {
        Self {
            provider: Arc::downgrade(provider),
            transport: Arc::clone(&provider.transport),
            url_base: provider.url_base.clone(),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn from_parts(
        provider: Weak<ProviderInner>,
        transport: Arc<dyn BlobTransport>,
        url_base: Url,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            transport,
            url_base,
            cancel,
        }
    }

    /// Use `token` for this client and every handle obtained from it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The cancellation token in effect.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The provider this client was obtained from.
    ///
    /// # Errors
    /// - `InvalidConfiguration` once every clone of the provider is dropped
    pub fn provider(&self) -> Result<BlobProvider> {
        upgrade(&self.provider).map(BlobProvider::from_inner)
    }

    /// Current read options of the owning provider.
    pub fn read_options(&self) -> Result<ReadOptions> {
        upgrade(&self.provider)?.read_options()
    }

    /// Current write options of the owning provider.
    pub fn write_options(&self, encrypt: bool) -> Result<WriteOptions> {
        upgrade(&self.provider)?.write_options(encrypt)
    }
}

#[async_trait]
impl StorageClient for BlobClient {
    type Container = BlobContainer;

    async fn container(&self, name: &str) -> Result<Option<BlobContainer>> {
        let name = ContainerName::new(name)?;
        debug!(container = %name, "Resolving container");

        let exists = cancel::run(&self.cancel, self.transport.container_exists(&name)).await?;
        if !exists {
            debug!(container = %name, "Container not found");
            return Ok(None);
        }

        let uri = container_uri(&self.url_base, &name)?;
        Ok(Some(BlobContainer::new(
            name,
            uri,
            self.provider.clone(),
            Arc::clone(&self.transport),
            self.url_base.clone(),
            self.cancel.clone(),
        )))
    }
}

impl fmt::Debug for BlobClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobClient")
            .field("transport", &self.transport.name())
            .field("url_base", &self.url_base.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionDescriptor;
    use crate::memory::MemoryTransport;
    use crate::provider::{StorageContainer, StorageProvider};
    use axiomstore_common::Error;

    fn provider_with(transport: &MemoryTransport) -> BlobProvider {
        BlobProvider::with_transport(
            Arc::new(transport.clone()),
            ConnectionDescriptor::memory("client-tests"),
            "https://acct.blob.example.net",
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_container_lookup() {
        let transport = MemoryTransport::new();
        transport.create_container("docs").unwrap();
        let provider = provider_with(&transport);
        let client = provider.client();

        let container = client.container("docs").await.unwrap().unwrap();
        assert_eq!(container.name(), "docs");
        assert_eq!(container.uri().as_str(), "https://acct.blob.example.net/docs");

        assert!(client.container("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_container_name() {
        let provider = provider_with(&MemoryTransport::new());
        let result = provider.client().container("").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_cancelled_client_does_no_io() {
        let transport = MemoryTransport::new();
        transport.create_container("docs").unwrap();
        let provider = provider_with(&transport);

        let token = CancellationToken::new();
        token.cancel();
        let client = provider.client().with_cancellation(token);

        let result = client.container("docs").await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_options_fail_after_provider_dropped() {
        let provider = provider_with(&MemoryTransport::new());
        let client = provider.client();
        drop(provider);

        assert!(matches!(
            client.read_options(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_back_link() {
        let provider = BlobProvider::with_transport(
            Arc::new(MemoryTransport::new()),
            ConnectionDescriptor::memory("client-tests"),
            "https://acct.blob.example.net",
            Some("AAAAAAAAAAAAAAAAAAAAAA=="),
        )
        .unwrap();
        let client = provider.client();

        let owner = client.provider().unwrap();
        assert!(owner.has_encryption_key());
        assert_eq!(owner.url_base(), provider.url_base());
        drop(owner);
        drop(provider);

        assert!(matches!(
            client.provider(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
