//! Transport registry for resolving connection descriptors.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::ConnectionDescriptor;
use crate::local::LocalTransport;
use crate::memory::MemoryTransport;
use crate::transport::BlobTransport;
use axiomstore_common::{Error, Result};

/// Factory function type for creating transports from descriptor settings.
pub type TransportFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn BlobTransport>> + Send + Sync>;

/// In-process memory accounts, shared by every default registry.
static MEMORY_ACCOUNTS: Lazy<Mutex<HashMap<String, MemoryTransport>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Registry for blob transport factories.
///
/// Allows dynamic registration and resolution of transports by the
/// `kind` of a [`ConnectionDescriptor`].
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
}

impl TransportRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a transport factory.
    ///
    /// # Errors
    /// - Returns error if `kind` is already registered
    pub fn register(&mut self, kind: impl Into<String>, factory: TransportFactory) -> Result<()> {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(Error::InvalidConfiguration(format!(
                "Transport '{}' is already registered",
                kind
            )));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Build the transport a descriptor points at.
    ///
    /// # Errors
    /// - `InvalidConfiguration` if the kind is unknown or the settings are rejected
    pub fn resolve(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn BlobTransport>> {
        descriptor.validate()?;
        let factory = self.factories.get(&descriptor.kind).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "Transport '{}' is not registered",
                descriptor.kind
            ))
        })?;
        factory(&descriptor.settings)
    }

    /// Get list of registered transport kinds.
    pub fn kinds(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Check if a transport kind is registered.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory transport for a named in-process account, created on first use.
fn memory_account(account: &str) -> Result<MemoryTransport> {
    let mut accounts = MEMORY_ACCOUNTS
        .lock()
        .map_err(|_| Error::Transport("Memory account table lock poisoned".to_string()))?;
    Ok(accounts.entry(account.to_string()).or_default().clone())
}

/// Create a registry with the built-in transports.
///
/// - `memory`: optional `account` setting; descriptors naming the same
///   account share one in-process store, an unnamed one gets a fresh store
/// - `local`: required `root` setting
pub fn create_default_registry() -> TransportRegistry {
    let mut registry = TransportRegistry::new();

    registry.factories.insert(
        "memory".to_string(),
        Box::new(|settings: &Value| -> Result<Arc<dyn BlobTransport>> {
            let transport = match settings.get("account").and_then(|v| v.as_str()) {
                Some(account) => memory_account(account)?,
                None => MemoryTransport::new(),
            };
            Ok(Arc::new(transport))
        }),
    );

    registry.factories.insert(
        "local".to_string(),
        Box::new(|settings: &Value| -> Result<Arc<dyn BlobTransport>> {
            let root = settings
                .get("root")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    Error::InvalidConfiguration("Local transport requires 'root' path".to_string())
                })?;
            Ok(Arc::new(LocalTransport::new(root)?))
        }),
    );

    registry
}
