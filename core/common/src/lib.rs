//! Common utilities and types shared across AxiomStore modules.
//!
//! This module provides the error taxonomy used by every layer and the
//! validated name types that address containers and blobs.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{BlobName, ContainerName, ObjectRef};
