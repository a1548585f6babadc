//! Remote registry access.
//!
//! A registry is an opaque manifest URL. Its [`RegistryManifest`] lists
//! plugins; each plugin's [`PluginManifest`] lists downloadable items with
//! `sha256:` checksums. Fetching goes through the [`ManifestFetcher`] trait so
//! tests can serve manifests from memory.

mod client;
mod installer;
mod manifest;

pub use client::{HttpFetcher, ItemMatch, ItemSearch, ManifestFetcher, RegistryClient, resolve_url};
pub use installer::{FailedItem, InstallReport, InstalledItem, Installer};
pub use manifest::{ItemKind, ManifestEntry, PluginManifest, RegistryManifest};
