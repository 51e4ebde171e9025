//! Common types used throughout AxiomStore.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a blob name in bytes.
pub const MAX_BLOB_NAME_LEN: usize = 1024;

/// Name of a container (backend namespace such as a bucket).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerName(String);

impl ContainerName {
    /// Create a new ContainerName from a string.
    ///
    /// # Preconditions
    /// - `name` must be non-empty
    /// - `name` must not contain path separators and must not be `.` or `..`
    ///
    /// # Errors
    /// - Returns `InvalidArgument` if the name is rejected
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "Container name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(crate::Error::InvalidArgument(format!(
                "Container name cannot contain separators: {}",
                name
            )));
        }
        if name == "." || name == ".." {
            return Err(crate::Error::InvalidArgument(format!(
                "Invalid container name: {}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name (key) of a blob within a container.
///
/// Blob names are opaque to this layer: `/` is allowed and carries no
/// directory semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobName(String);

impl BlobName {
    /// Create a new BlobName.
    ///
    /// # Errors
    /// - Returns `InvalidArgument` if the name is empty, too long, or contains NUL
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "File name cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_BLOB_NAME_LEN {
            return Err(crate::Error::InvalidArgument(format!(
                "File name exceeds {} bytes",
                MAX_BLOB_NAME_LEN
            )));
        }
        if name.contains('\0') {
            return Err(crate::Error::InvalidArgument(
                "File name cannot contain NUL".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully-qualified reference to a blob: container plus blob name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    container: ContainerName,
    name: BlobName,
}

impl ObjectRef {
    /// Create a reference from validated parts.
    pub fn new(container: ContainerName, name: BlobName) -> Self {
        Self { container, name }
    }

    /// Parse a `container/blob` pair from raw strings.
    pub fn parse(container: &str, name: &str) -> crate::Result<Self> {
        Ok(Self {
            container: ContainerName::new(container)?,
            name: BlobName::new(name)?,
        })
    }

    /// The container holding the blob.
    pub fn container(&self) -> &ContainerName {
        &self.container
    }

    /// The blob name.
    pub fn name(&self) -> &BlobName {
        &self.name
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}
