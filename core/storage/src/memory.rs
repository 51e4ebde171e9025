//! In-memory blob transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::options::{ReadOptions, WriteOptions};
use crate::transport::{
    byte_stream, collect_stream, BlobProperties, BlobSink, BlobTransport, BufferedSink,
    ByteStream, ContentSettings, Metadata,
};
use axiomstore_common::{BlobName, ContainerName, Error, ObjectRef, Result};

/// In-memory stored blob.
#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    properties: BlobProperties,
}

type Containers = HashMap<ContainerName, HashMap<BlobName, StoredBlob>>;

/// In-memory blob transport.
///
/// Useful for testing and development. All data is stored in memory and
/// lost when the last clone is dropped. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    storage: Arc<RwLock<Containers>>,
}

impl MemoryTransport {
    /// Create a new empty memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Containers>> {
        self.storage
            .read()
            .map_err(|_| Error::Transport("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Containers>> {
        self.storage
            .write()
            .map_err(|_| Error::Transport("Memory store lock poisoned".to_string()))
    }

    /// Create a container; returns false if it already existed.
    pub fn create_container(&self, name: &str) -> Result<bool> {
        let name = ContainerName::new(name)?;
        let mut storage = self.write()?;
        if storage.contains_key(&name) {
            return Ok(false);
        }
        storage.insert(name, HashMap::new());
        Ok(true)
    }

    /// Delete a container and every blob in it; returns whether it existed.
    pub fn delete_container(&self, name: &str) -> Result<bool> {
        let name = ContainerName::new(name)?;
        Ok(self.write()?.remove(&name).is_some())
    }

    /// Raw stored bytes of a blob, exactly as persisted.
    pub fn raw_bytes(&self, object: &ObjectRef) -> Result<Vec<u8>> {
        let storage = self.read()?;
        storage
            .get(object.container())
            .and_then(|blobs| blobs.get(object.name()))
            .map(|blob| blob.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", object)))
    }

    /// Apply `f` to an existing blob.
    fn with_blob_mut<T>(
        &self,
        object: &ObjectRef,
        f: impl FnOnce(&mut StoredBlob) -> T,
    ) -> Result<T> {
        let mut storage = self.write()?;
        let blob = storage
            .get_mut(object.container())
            .ok_or_else(|| Error::NotFound(format!("Container not found: {}", object.container())))?
            .get_mut(object.name())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", object)))?;
        Ok(f(blob))
    }

    fn snapshot(&self, object: &ObjectRef) -> Result<StoredBlob> {
        let storage = self.read()?;
        storage
            .get(object.container())
            .and_then(|blobs| blobs.get(object.name()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", object)))
    }
}

#[async_trait]
impl BlobTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn container_exists(&self, container: &ContainerName) -> Result<bool> {
        Ok(self.read()?.contains_key(container))
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self
            .read()?
            .get(object.container())
            .is_some_and(|blobs| blobs.contains_key(object.name())))
    }

    async fn upload(&self, object: &ObjectRef, data: ByteStream, options: &WriteOptions) -> Result<()> {
        let plaintext = collect_stream(data).await?;
        let size = plaintext.len() as u64;
        let (stored, encryption) = options.encode(plaintext)?;

        let mut storage = self.write()?;
        let blobs = storage
            .get_mut(object.container())
            .ok_or_else(|| Error::NotFound(format!("Container not found: {}", object.container())))?;

        let properties = BlobProperties::replaced(
            blobs.get(object.name()).map(|b| &b.properties),
            size,
            encryption,
        );
        blobs.insert(
            object.name().clone(),
            StoredBlob {
                data: stored,
                properties,
            },
        );

        Ok(())
    }

    async fn open_read(&self, object: &ObjectRef, options: &ReadOptions) -> Result<ByteStream> {
        let blob = self.snapshot(object)?;
        let plaintext = options.decode(blob.properties.encryption.as_ref(), blob.data)?;
        Ok(byte_stream(plaintext))
    }

    async fn open_write(&self, object: &ObjectRef, options: &WriteOptions) -> Result<Box<dyn BlobSink>> {
        if !self.container_exists(object.container()).await? {
            return Err(Error::NotFound(format!(
                "Container not found: {}",
                object.container()
            )));
        }
        Ok(Box::new(BufferedSink::new(
            self.clone(),
            object.clone(),
            options.clone(),
        )))
    }

    async fn fetch_attributes(&self, object: &ObjectRef) -> Result<BlobProperties> {
        Ok(self.snapshot(object)?.properties)
    }

    async fn set_properties(&self, object: &ObjectRef, settings: &ContentSettings) -> Result<()> {
        self.with_blob_mut(object, |blob| {
            blob.properties.content_type = settings.content_type.clone();
            blob.properties.touch();
        })
    }

    async fn set_metadata(&self, object: &ObjectRef, metadata: &Metadata) -> Result<()> {
        self.with_blob_mut(object, |blob| {
            blob.properties.metadata = metadata.clone();
            blob.properties.touch();
        })
    }

    async fn delete_if_exists(&self, object: &ObjectRef) -> Result<bool> {
        let mut storage = self.write()?;
        Ok(storage
            .get_mut(object.container())
            .is_some_and(|blobs| blobs.remove(object.name()).is_some()))
    }
}
