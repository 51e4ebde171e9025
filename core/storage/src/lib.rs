//! Provider-agnostic blob storage for AxiomStore.
//!
//! The contract is a strict chain of four traits (see [`provider`]):
//! provider → client → container → file. [`blob`] implements it over any
//! [`BlobTransport`]; the encryption policy is injected top-down and
//! rebuilt on every I/O call.
//!
//! # Design Principles
//! - Transport isolation: backends only move bytes and attributes
//! - Async first: every I/O operation is async, with [`blocking`] forms
//! - Streaming: payloads travel as [`ByteStream`]s
//! - Unified errors: one [`axiomstore_common::Error`] across backends
//!
//! # Example
//! ```no_run
//! use axiomstore_storage::prelude::*;
//! use axiomstore_storage::{byte_stream, BlobProvider, ConnectionDescriptor};
//!
//! # async fn demo() -> axiomstore_common::Result<()> {
//! let provider = BlobProvider::new(
//!     ConnectionDescriptor::local("/var/lib/axiomstore"),
//!     "https://files.example.net",
//!     None,
//! )?;
//! if let Some(container) = provider.client().container("docs").await? {
//!     let file = container
//!         .create_file("a.txt", "text/plain", Some(byte_stream("hello")), Default::default())
//!         .await?;
//!     println!("{} ({})", file.uri(), file.content_type());
//! }
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod blocking;
mod cancel;
pub mod config;
pub mod local;
pub mod memory;
pub mod options;
pub mod provider;
pub mod registry;
pub mod transport;

pub use blob::{BlobClient, BlobContainer, BlobFile, BlobProvider};
pub use config::{ConnectionDescriptor, ProviderConfig};
pub use local::LocalTransport;
pub use memory::MemoryTransport;
pub use options::{ReadOptions, WriteOptions};
pub use provider::{CreateFileOptions, StorageClient, StorageContainer, StorageFile, StorageProvider};
pub use registry::{create_default_registry, TransportFactory, TransportRegistry};
pub use transport::{
    byte_stream, collect_stream, reader_stream, BlobProperties, BlobSink, BlobTransport,
    ByteStream, ContentSettings, Metadata, WriteStream, DEFAULT_CONTENT_TYPE,
};

pub use tokio_util::sync::CancellationToken;

/// The contract traits, for method resolution on concrete handles.
pub mod prelude {
    pub use crate::provider::{StorageClient, StorageContainer, StorageFile, StorageProvider};
}
