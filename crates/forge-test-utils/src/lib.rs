//! Shared test utilities for the forge workspace.
//!
//! A dev-dependency only, never published.
//!
//! - [`registry`]: [`TestRegistry`](registry::TestRegistry) with a temporary
//!   project and global root
//! - [`yaml`]: small builders for definition documents

pub mod registry;
pub mod yaml;

pub use registry::TestRegistry;
