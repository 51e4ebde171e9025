//! Blob-backed implementation of the storage contract.
//!
//! [`BlobProvider`] owns the connection, URL base and optional key, and
//! hands out [`BlobClient`]s. Every handle below the provider keeps its own
//! transport handle and a weak link back to the provider state, which it
//! consults on each I/O call for the current read/write options.

mod client;
mod container;
mod file;
mod provider;

pub use client::BlobClient;
pub use container::BlobContainer;
pub use file::BlobFile;
pub use provider::BlobProvider;

pub(crate) use provider::ProviderInner;

use std::sync::{Arc, Weak};
use url::Url;

use axiomstore_common::{ContainerName, Error, ObjectRef, Result};

/// Upgrade a handle's link to its provider.
pub(crate) fn upgrade(provider: &Weak<ProviderInner>) -> Result<Arc<ProviderInner>> {
    provider.upgrade().ok_or_else(|| {
        Error::InvalidConfiguration("Storage provider has been dropped".to_string())
    })
}

/// URI of a container: `<base>/<container>`.
pub(crate) fn container_uri(base: &Url, container: &ContainerName) -> Result<Url> {
    let mut uri = base.clone();
    uri.path_segments_mut()
        .map_err(|_| Error::InvalidConfiguration(format!("URL base cannot be a base: {}", base)))?
        .pop_if_empty()
        .push(container.as_str());
    Ok(uri)
}

/// URI of a blob: `<base>/<container>/<blob>`, one path segment per `/` in the name.
pub(crate) fn blob_uri(base: &Url, object: &ObjectRef) -> Result<Url> {
    let mut uri = container_uri(base, object.container())?;
    uri.path_segments_mut()
        .map_err(|_| Error::InvalidConfiguration(format!("URL base cannot be a base: {}", base)))?
        .extend(object.name().as_str().split('/'));
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_uri_appends_segment() {
        let base = Url::parse("https://acct.blob.example.net").unwrap();
        let name = ContainerName::new("docs").unwrap();
        assert_eq!(
            container_uri(&base, &name).unwrap().as_str(),
            "https://acct.blob.example.net/docs"
        );

        let nested = Url::parse("https://acct.blob.example.net/root/").unwrap();
        assert_eq!(
            container_uri(&nested, &name).unwrap().as_str(),
            "https://acct.blob.example.net/root/docs"
        );
    }

    #[test]
    fn test_blob_uri_encodes_names() {
        let base = Url::parse("https://acct.blob.example.net/").unwrap();
        let object = ObjectRef::parse("docs", "reports/q1 summary.txt").unwrap();
        assert_eq!(
            blob_uri(&base, &object).unwrap().as_str(),
            "https://acct.blob.example.net/docs/reports/q1%20summary.txt"
        );
    }

    #[test]
    fn test_upgrade_fails_after_drop() {
        let weak: Weak<ProviderInner> = Weak::new();
        assert!(matches!(upgrade(&weak), Err(Error::InvalidConfiguration(_))));
    }
}
