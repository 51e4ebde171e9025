use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::BlobClient;
use crate::config::{ConnectionDescriptor, ProviderConfig};
use crate::options::{ReadOptions, WriteOptions};
use crate::provider::StorageProvider;
use crate::registry::{create_default_registry, TransportRegistry};
use crate::transport::BlobTransport;
use axiomstore_common::{Error, Result};
use axiomstore_crypto::{EncryptionKey, EncryptionPolicy};

/// Immutable provider state shared with every descendant handle.
pub(crate) struct ProviderInner {
    pub(crate) connection: ConnectionDescriptor,
    pub(crate) url_base: Url,
    key: Option<EncryptionKey>,
    pub(crate) transport: Arc<dyn BlobTransport>,
}

impl ProviderInner {
    pub(crate) fn read_options(&self) -> Result<ReadOptions> {
        match &self.key {
            Some(key) => Ok(ReadOptions::with_encryption(EncryptionPolicy::new(key)?)),
            None => Ok(ReadOptions::neutral()),
        }
    }

    pub(crate) fn write_options(&self, encrypt: bool) -> Result<WriteOptions> {
        if !encrypt {
            return Ok(WriteOptions::neutral());
        }
        let key = self.key.as_ref().ok_or(Error::EncryptionNotConfigured)?;
        Ok(WriteOptions::with_encryption(EncryptionPolicy::new(key)?))
    }
}

/// Storage provider over a blob transport.
///
/// Cheap to clone; clones share the same state. Descendant handles hold
/// only a weak link, so they stop working once every clone is dropped.
#[derive(Clone)]
pub struct BlobProvider {
    inner: Arc<ProviderInner>,
}

impl BlobProvider {
    /// Create a provider, resolving the connection through the default registry.
    ///
    /// # Errors
    /// - `InvalidConfiguration` if the URL base is empty or not a URL, the
    ///   connection kind is unknown, or the key is not valid base64 of a
    ///   permitted length
    pub fn new(
        connection: ConnectionDescriptor,
        url_base: &str,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        Self::with_registry(&create_default_registry(), connection, url_base, encryption_key)
    }

    /// Create a provider, resolving the connection through `registry`.
    pub fn with_registry(
        registry: &TransportRegistry,
        connection: ConnectionDescriptor,
        url_base: &str,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let url_base = parse_url_base(url_base)?;
        let key = parse_key(encryption_key)?;
        let transport = registry.resolve(&connection)?;
        Ok(Self::assemble(connection, url_base, key, transport))
    }

    /// Create a provider over an already constructed transport.
    pub fn with_transport(
        transport: Arc<dyn BlobTransport>,
        connection: ConnectionDescriptor,
        url_base: &str,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        connection.validate()?;
        let url_base = parse_url_base(url_base)?;
        let key = parse_key(encryption_key)?;
        Ok(Self::assemble(connection, url_base, key, transport))
    }

    /// Create a provider from a loaded configuration.
    pub fn from_config(config: &ProviderConfig, registry: &TransportRegistry) -> Result<Self> {
        Self::with_registry(
            registry,
            config.connection.clone(),
            &config.url_base,
            config.encryption_key.as_deref(),
        )
    }

    fn assemble(
        connection: ConnectionDescriptor,
        url_base: Url,
        key: Option<EncryptionKey>,
        transport: Arc<dyn BlobTransport>,
    ) -> Self {
        debug!(
            kind = %connection.kind,
            transport = transport.name(),
            url_base = %url_base,
            encrypted = key.is_some(),
            "Storage provider created"
        );
        Self {
            inner: Arc::new(ProviderInner {
                connection,
                url_base,
                key,
                transport,
            }),
        }
    }

    /// Rewrap shared state reached through a handle's back-link.
    pub(crate) fn from_inner(inner: Arc<ProviderInner>) -> Self {
        Self { inner }
    }

    /// The connection descriptor this provider was built from.
    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.inner.connection
    }

    /// Whether an encryption key is configured.
    pub fn has_encryption_key(&self) -> bool {
        self.inner.key.is_some()
    }

    /// The transport this provider's clients use.
    pub fn transport(&self) -> Arc<dyn BlobTransport> {
        Arc::clone(&self.inner.transport)
    }
}

impl StorageProvider for BlobProvider {
    type Client = BlobClient;

    fn url_base(&self) -> &Url {
        &self.inner.url_base
    }

    fn client(&self) -> BlobClient {
        BlobClient::new(&self.inner)
    }

    fn read_options(&self) -> Result<ReadOptions> {
        self.inner.read_options()
    }

    fn write_options(&self, encrypt: bool) -> Result<WriteOptions> {
        self.inner.write_options(encrypt)
    }
}

impl fmt::Debug for BlobProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobProvider")
            .field("connection", &self.inner.connection)
            .field("url_base", &self.inner.url_base.as_str())
            .field("transport", &self.inner.transport.name())
            .field("encrypted", &self.inner.key.is_some())
            .finish()
    }
}

fn parse_url_base(url_base: &str) -> Result<Url> {
    if url_base.trim().is_empty() {
        return Err(Error::InvalidConfiguration(
            "URL base must not be empty".to_string(),
        ));
    }
    let url = Url::parse(url_base)
        .map_err(|e| Error::InvalidConfiguration(format!("Invalid URL base '{}': {}", url_base, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidConfiguration(format!(
            "URL base cannot hold paths: {}",
            url_base
        )));
    }
    Ok(url)
}

fn parse_key(encoded: Option<&str>) -> Result<Option<EncryptionKey>> {
    encoded.map(EncryptionKey::from_base64).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use proptest::prelude::*;

    fn key_of(len: usize) -> String {
        EncryptionKey::from_bytes(vec![9u8; len]).unwrap().to_base64()
    }

    fn provider(key: Option<&str>) -> Result<BlobProvider> {
        BlobProvider::with_transport(
            Arc::new(MemoryTransport::new()),
            ConnectionDescriptor::memory("provider-tests"),
            "https://acct.blob.example.net",
            key,
        )
    }

    #[test]
    fn test_rejects_missing_url_base() {
        let result = provider_with_base("");
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = provider_with_base("not a url");
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = provider_with_base("mailto:ops@example.net");
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    fn provider_with_base(base: &str) -> Result<BlobProvider> {
        BlobProvider::new(ConnectionDescriptor::memory("provider-tests"), base, None)
    }

    #[test]
    fn test_rejects_empty_connection_kind() {
        let result = BlobProvider::new(
            ConnectionDescriptor::new("", serde_json::Value::Null),
            "https://acct.blob.example.net",
            None,
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_malformed_base64_key() {
        let result = provider(Some("***not base64***"));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_write_options_without_key() {
        let provider = provider(None).unwrap();
        assert!(!provider.has_encryption_key());
        assert!(matches!(
            provider.write_options(true),
            Err(Error::EncryptionNotConfigured)
        ));
        assert!(provider.write_options(false).unwrap().is_neutral());
        assert!(provider.read_options().unwrap().is_neutral());
    }

    #[test]
    fn test_write_options_without_encrypt_stay_neutral_with_key() {
        let provider = provider(Some(&key_of(32))).unwrap();
        assert!(provider.write_options(false).unwrap().is_neutral());
        assert!(!provider.read_options().unwrap().is_neutral());
    }

    #[test]
    fn test_write_policy_derives_from_configured_key() {
        let encoded = key_of(48);
        let provider = provider(Some(&encoded)).unwrap();

        let expected = EncryptionPolicy::new(&EncryptionKey::from_base64(&encoded).unwrap())
            .unwrap()
            .fingerprint();
        let options = provider.write_options(true).unwrap();
        assert_eq!(options.encryption().unwrap().fingerprint(), expected);
    }

    #[test]
    fn test_debug_hides_key() {
        let encoded = key_of(32);
        let provider = provider(Some(&encoded)).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains(&encoded));
        assert!(debug.contains("encrypted: true"));
    }

    proptest! {
        #[test]
        fn prop_key_length_gates_construction(len in 0usize..100) {
            let encoded = base64_of(len);
            let result = provider(Some(&encoded));
            if [16, 24, 32, 48, 64].contains(&len) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
            }
        }
    }

    fn base64_of(len: usize) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(vec![1u8; len])
    }
}
