//! Filesystem primitives for the Forge definition registry
//!
//! Provides locked atomic writes, format-detected document storage and the
//! `sha256:` content checksum used by remote registry manifests.

pub mod checksum;
pub mod document;
pub mod error;
pub mod io;

pub use document::{DocumentFormat, DocumentStore};
pub use error::{Error, Result};
