//! Local filesystem blob transport.
//!
//! Layout under the root directory:
//! - one sub-directory per container
//! - `<encoded name>.props.json`, the blob record: its [`BlobProperties`]
//!   plus the name of the data file currently holding its stored bytes
//! - `<encoded name>.<generation>.blob`, one data file per upload
//!
//! Blob names are percent-encoded so any name maps to a single flat file.
//! The record is the existence marker and the only commit point: an upload
//! writes a new data file, then atomically replaces the record, then removes
//! the previous data file. Bytes and the properties describing them always
//! change together. An interrupted upload may leave an unreferenced data file
//! behind; it is never read.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::options::{ReadOptions, WriteOptions};
use crate::transport::{
    byte_stream, collect_stream, BlobProperties, BlobSink, BlobTransport, BufferedSink,
    ByteStream, ContentSettings, Metadata,
};
use axiomstore_common::{ContainerName, Error, ObjectRef, Result};

/// Characters left unencoded in on-disk blob names.
const NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Longest encoded blob name that still leaves room for generation and suffixes.
const MAX_ENCODED_NAME_LEN: usize = 200;

const DATA_SUFFIX: &str = ".blob";
const PROPS_SUFFIX: &str = ".props.json";

/// Attempts at reading a blob whose data file a concurrent upload replaced.
const READ_ATTEMPTS: usize = 3;

/// On-disk record of a blob.
#[derive(Debug, Serialize, Deserialize)]
struct BlobRecord {
    /// File name of the committed data generation.
    data: String,
    #[serde(flatten)]
    properties: BlobProperties,
}

/// Where the files of one blob live.
struct BlobPaths {
    dir: PathBuf,
    stem: String,
}

impl BlobPaths {
    fn record(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, PROPS_SUFFIX))
    }

    fn new_generation(&self) -> String {
        format!("{}.{}{}", self.stem, Uuid::new_v4().simple(), DATA_SUFFIX)
    }

    fn data(&self, name: &str) -> Result<PathBuf> {
        if name.contains(['/', '\\']) || !name.starts_with(self.stem.as_str()) {
            return Err(Error::Transport(format!("Corrupt blob record: {}", name)));
        }
        Ok(self.dir.join(name))
    }
}

/// Local filesystem blob transport.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    /// Create a new local transport with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Invalid path
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a container directory; returns false if it already existed.
    pub async fn create_container(&self, name: &str) -> Result<bool> {
        let name = ContainerName::new(name)?;
        let dir = self.container_dir(&name);
        if fs::try_exists(&dir).await? {
            return Ok(false);
        }
        fs::create_dir_all(&dir).await?;
        Ok(true)
    }

    fn container_dir(&self, container: &ContainerName) -> PathBuf {
        self.root.join(container.as_str())
    }

    fn blob_paths(&self, object: &ObjectRef) -> Result<BlobPaths> {
        let stem = utf8_percent_encode(object.name().as_str(), NAME_ENCODE_SET).to_string();
        if stem.len() > MAX_ENCODED_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "File name too long for local storage: {}",
                object.name()
            )));
        }
        Ok(BlobPaths {
            dir: self.container_dir(object.container()),
            stem,
        })
    }

    async fn ensure_container(&self, container: &ContainerName) -> Result<()> {
        if !self.container_exists(container).await? {
            return Err(Error::NotFound(format!("Container not found: {}", container)));
        }
        Ok(())
    }

    async fn read_record(&self, object: &ObjectRef, paths: &BlobPaths) -> Result<BlobRecord> {
        match fs::read(paths.record()).await {
            Ok(json) => Ok(serde_json::from_slice(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", object)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, paths: &BlobPaths, record: &BlobRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&paths.record(), &json).await
    }

    /// Write stored bytes to a fresh data file and return its name.
    ///
    /// The file is invisible to readers until a record names it.
    async fn write_generation(&self, paths: &BlobPaths, stored: &[u8]) -> Result<String> {
        let name = paths.new_generation();
        fs::write(paths.data(&name)?, stored).await?;
        Ok(name)
    }

    async fn update_properties<F>(&self, object: &ObjectRef, update: F) -> Result<()>
    where
        F: FnOnce(&mut BlobProperties) + Send,
    {
        let paths = self.blob_paths(object)?;
        let mut record = self.read_record(object, &paths).await?;
        update(&mut record.properties);
        record.properties.touch();
        self.write_record(&paths, &record).await
    }
}

/// Write to a temporary sibling, then rename over the target.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobTransport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn container_exists(&self, container: &ContainerName) -> Result<bool> {
        match fs::metadata(self.container_dir(container)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool> {
        let paths = self.blob_paths(object)?;
        Ok(fs::try_exists(paths.record()).await?)
    }

    async fn upload(&self, object: &ObjectRef, data: ByteStream, options: &WriteOptions) -> Result<()> {
        self.ensure_container(object.container()).await?;
        let paths = self.blob_paths(object)?;

        let plaintext = collect_stream(data).await?;
        let size = plaintext.len() as u64;
        let (stored, encryption) = options.encode(plaintext)?;

        let previous = match self.read_record(object, &paths).await {
            Ok(record) => Some(record),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let data = self.write_generation(&paths, &stored).await?;
        let record = BlobRecord {
            properties: BlobProperties::replaced(
                previous.as_ref().map(|r| &r.properties),
                size,
                encryption,
            ),
            data,
        };
        if let Err(e) = self.write_record(&paths, &record).await {
            let _ = remove_if_present(&paths.dir.join(&record.data)).await;
            return Err(e);
        }

        if let Some(previous) = previous {
            if let Err(e) = remove_if_present(&paths.data(&previous.data)?).await {
                debug!(object = %object, error = %e, "Stale data file left behind");
            }
        }
        Ok(())
    }

    async fn open_read(&self, object: &ObjectRef, options: &ReadOptions) -> Result<ByteStream> {
        let paths = self.blob_paths(object)?;

        for _ in 0..READ_ATTEMPTS {
            let record = self.read_record(object, &paths).await?;
            match fs::read(paths.data(&record.data)?).await {
                Ok(stored) => {
                    let plaintext = options.decode(record.properties.encryption.as_ref(), stored)?;
                    return Ok(byte_stream(plaintext));
                }
                // replaced by a concurrent upload, or deleted
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::NotFound(format!("Blob not found: {}", object)))
    }

    async fn open_write(&self, object: &ObjectRef, options: &WriteOptions) -> Result<Box<dyn BlobSink>> {
        self.ensure_container(object.container()).await?;
        self.blob_paths(object)?;
        Ok(Box::new(BufferedSink::new(
            self.clone(),
            object.clone(),
            options.clone(),
        )))
    }

    async fn fetch_attributes(&self, object: &ObjectRef) -> Result<BlobProperties> {
        let paths = self.blob_paths(object)?;
        Ok(self.read_record(object, &paths).await?.properties)
    }

    async fn set_properties(&self, object: &ObjectRef, settings: &ContentSettings) -> Result<()> {
        let content_type = settings.content_type.clone();
        self.update_properties(object, move |props| props.content_type = content_type)
            .await
    }

    async fn set_metadata(&self, object: &ObjectRef, metadata: &Metadata) -> Result<()> {
        let metadata = metadata.clone();
        self.update_properties(object, move |props| props.metadata = metadata)
            .await
    }

    async fn delete_if_exists(&self, object: &ObjectRef) -> Result<bool> {
        let paths = self.blob_paths(object)?;
        let record = match self.read_record(object, &paths).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        let existed = match fs::remove_file(paths.record()).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        remove_if_present(&paths.data(&record.data)?).await?;

        Ok(existed)
    }
}
