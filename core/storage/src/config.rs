//! Provider configuration.
//!
//! This is the only persisted, user-facing state: the connection
//! descriptor, the public URL base and an optional base64 encryption key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use axiomstore_common::{Error, Result};

/// Opaque description of how to reach a storage backend.
///
/// `kind` selects a transport from the registry; `settings` is handed to
/// that transport's factory unmodified.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Transport kind (e.g., "memory", "local").
    pub kind: String,
    /// Transport-specific settings.
    #[serde(default)]
    pub settings: Value,
}

impl ConnectionDescriptor {
    /// Create a descriptor from a kind and raw settings.
    pub fn new(kind: impl Into<String>, settings: Value) -> Self {
        Self {
            kind: kind.into(),
            settings,
        }
    }

    /// Descriptor for a named in-process memory account.
    pub fn memory(account: impl Into<String>) -> Self {
        Self::new("memory", serde_json::json!({ "account": account.into() }))
    }

    /// Descriptor for a local filesystem root.
    pub fn local(root: impl AsRef<Path>) -> Self {
        Self::new(
            "local",
            serde_json::json!({ "root": root.as_ref().to_string_lossy() }),
        )
    }

    /// Look up a string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    /// Check that the descriptor names a transport.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "Connection descriptor is missing a transport kind".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("kind", &self.kind)
            .field("settings", &"[REDACTED]")
            .finish()
    }
}

/// Construction parameters of a storage provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend connection descriptor.
    pub connection: ConnectionDescriptor,
    /// Public URL base of the stored files.
    pub url_base: String,
    /// Optional base64-encoded encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl ProviderConfig {
    /// Create a configuration without an encryption key.
    pub fn new(connection: ConnectionDescriptor, url_base: impl Into<String>) -> Self {
        Self {
            connection,
            url_base: url_base.into(),
            encryption_key: None,
        }
    }

    /// Set the base64-encoded encryption key.
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfiguration(format!("Malformed provider config: {}", e)))
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Write configuration to a JSON file, creating parent directories.
    ///
    /// On Unix the file is readable by its owner only, since it may hold
    /// the encryption key.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = self.to_json()?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        // mode only applies on creation
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        write_all(file, json.as_bytes())
    }
}

fn write_all(mut file: std::fs::File, data: &[u8]) -> Result<()> {
    use std::io::Write;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("connection", &self.connection)
            .field("url_base", &self.url_base)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
