//! Storage contract: provider, client, container and file.
//!
//! Each level is a trait with one concrete implementation per supported
//! backend. Construction is strictly top-down; each level refers back to
//! its parent only to look up policy, never to own it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWrite;
use url::Url;

use crate::options::{ReadOptions, WriteOptions};
use crate::transport::{ByteStream, Metadata, WriteStream};
use axiomstore_common::Result;

/// Options for creating a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateFileOptions {
    /// Replace an existing blob of the same name. Defaults to true.
    pub overwrite: bool,
    /// Encrypt the supplied payload with the provider's key. Defaults to false.
    pub encrypt: bool,
}

impl CreateFileOptions {
    /// Fail with `FileAlreadyExists` instead of replacing an existing blob.
    pub fn no_overwrite(mut self) -> Self {
        self.overwrite = false;
        self
    }

    /// Encrypt the payload.
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }
}

impl Default for CreateFileOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            encrypt: false,
        }
    }
}

/// Root of the contract: owns connection info and the optional key.
///
/// Implementations must be safe to share between threads; all state is
/// immutable after construction.
pub trait StorageProvider: Send + Sync {
    /// Client type produced by this provider.
    type Client: StorageClient;

    /// The URL base of the files provided by the account.
    fn url_base(&self) -> &Url;

    /// Get a client for file operations. Performs no I/O.
    fn client(&self) -> Self::Client;

    /// Options for reading, with the decryption policy when a key is configured.
    fn read_options(&self) -> Result<ReadOptions>;

    /// Options for writing.
    ///
    /// # Errors
    /// - `EncryptionNotConfigured` if `encrypt` is true and no key is configured
    fn write_options(&self, encrypt: bool) -> Result<WriteOptions>;
}

/// Resolves containers by name.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Container type produced by this client.
    type Container: StorageContainer;

    /// Get a container, or `None` if it does not exist.
    ///
    /// # Errors
    /// - `InvalidArgument` if the name is malformed
    /// - Transport failures
    async fn container(&self, name: &str) -> Result<Option<Self::Container>>;
}

/// Creates, resolves and deletes files within one container.
#[async_trait]
pub trait StorageContainer: Send + Sync {
    /// File type produced by this container.
    type File: StorageFile;

    /// Container name.
    fn name(&self) -> &str;

    /// Container URI.
    fn uri(&self) -> &Url;

    /// Create a file, optionally uploading `payload` before returning.
    ///
    /// The overwrite check is a best-effort existence check, not an atomic
    /// guarantee against concurrent writers.
    ///
    /// # Postconditions
    /// - The content type is set on the backend
    /// - The returned handle carries freshly fetched attributes
    ///
    /// # Errors
    /// - `FileAlreadyExists` if `overwrite` is false and the blob exists
    /// - `EncryptionNotConfigured` if `encrypt` is requested without a key
    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        payload: Option<ByteStream>,
        options: CreateFileOptions,
    ) -> Result<Self::File>;

    /// Delete a file; returns false if it did not exist.
    async fn delete_file(&self, name: &str) -> Result<bool>;

    /// Check whether a file exists.
    async fn file_exists(&self, name: &str) -> Result<bool>;

    /// Get a file with attributes already fetched, or `None` if absent.
    async fn file(&self, name: &str) -> Result<Option<Self::File>>;
}

/// A single stored object.
///
/// Attributes reflect the last fetch; they are refreshed by `file`,
/// `create_file`, `refresh`, `metadata` and `upload_from`.
#[async_trait]
pub trait StorageFile: Send + Sync {
    /// File name (blob key).
    fn name(&self) -> &str;

    /// File URI.
    fn uri(&self) -> &Url;

    /// Content type as of the last attribute fetch.
    fn content_type(&self) -> &str;

    /// Last modification time as of the last attribute fetch.
    fn last_modified(&self) -> DateTime<Utc>;

    /// Re-fetch attributes from the backend.
    async fn refresh(&mut self) -> Result<()>;

    /// Open a stream over the file content, decrypted with current read options.
    ///
    /// # Errors
    /// - `NotFound` if the blob vanished since the handle was obtained
    async fn open_read(&self) -> Result<ByteStream>;

    /// Open a stream that uploads on close.
    async fn open_write(&self, encrypt: bool) -> Result<WriteStream>;

    /// Drain the file content into `target`, returning the bytes written.
    async fn download_to(&self, target: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64>;

    /// Upload `source` as the new content, then refresh attributes.
    async fn upload_from(&mut self, source: ByteStream, encrypt: bool) -> Result<()>;

    /// Refresh attributes, then expose the metadata for reading or editing.
    ///
    /// Edits are local until [`StorageFile::save_metadata`] is called.
    async fn metadata(&mut self) -> Result<&mut Metadata>;

    /// Persist the in-memory metadata. Other attributes are not refreshed.
    async fn save_metadata(&self) -> Result<()>;
}
