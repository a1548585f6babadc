//! Definition registry and resolution engine for Forge agents and tools
//!
//! Agents and tools are YAML or Markdown-with-front-matter documents looked up
//! by `name[@range]` across three storage tiers:
//!
//! - **Local**: `{project}/.fractary/{agents|tools}/{name}.{md|yaml}`
//! - **Global**: `~/.fractary/registry/{agents|tools}/{name}@{version}/`
//! - **Remote**: registry manifests fetched over HTTP
//!
//! On top of resolution the crate provides:
//!
//! - **Inheritance**: `extends` chains flattened with cycle detection
//! - **Dependencies**: transitive tool graphs with topological ordering
//! - **Forks**: local copies that track upstream and three-way merge updates
//! - **Lockfile**: pinned versions with `sha256-` integrity hashes
//!
//! # Architecture
//!
//! ```text
//!                       Forge
//!                         |
//!      +--------+---------+---------+-----------+
//!      |        |         |         |           |
//!  lockfile   fork   dependency  registry    config
//!      |        |         |         |
//!      +--------+----+----+         |
//!                    |              |
//!                 resolver ---------+
//!                    |
//!      +------+------+------+-------+
//!      |      |      |      |       |
//!   loader  cache  layout version inheritance
//!                    |
//!                 forge-fs
//! ```
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> forge_registry::Result<()> {
//! use forge_registry::{DefinitionKind, Forge};
//!
//! let forge = Forge::open(".")?;
//! // Embedding binaries install the subscriber once, at startup.
//! if let Err(e) = forge_registry::init_logging(Some(&forge.config().logging.level)) {
//!     eprintln!("logging already initialized: {e}");
//! }
//!
//! let tool = forge.resolve("web-search@^1.0.0", DefinitionKind::Tool).await?;
//! println!("{}@{} ({})", tool.name(), tool.version, tool.source);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod fork;
pub mod forge;
pub mod graph;
pub mod inheritance;
pub mod layout;
pub mod loader;
pub mod lockfile;
pub mod logging;
pub mod name;
pub mod registry;
pub mod resolver;
pub mod version;

pub use cache::{DefinitionCache, ManifestCache};
pub use config::{ConfigLoader, ForgeConfig, RegistryConfig};
pub use definition::{
    AgentDefinition, Definition, DefinitionKind, DefinitionSummary, ForkOf, ResolvedDefinition,
    Source, ToolDefinition,
};
pub use dependency::{DependencyOptions, DependencyResolution, DependencyResolver};
pub use error::{Error, ErrorKind, Result};
pub use fork::{ForkManager, MergeResult, MergeStrategy};
pub use forge::Forge;
pub use graph::{CycleDetector, DependencyGraph, DependencyNode};
pub use inheritance::InheritanceResolver;
pub use layout::StorageLayout;
pub use loader::{DefinitionFormat, DefinitionLoader, FileLoader};
pub use lockfile::{Lockfile, LockfileEntry, LockfileManager};
pub use logging::init as init_logging;
pub use name::ParsedName;
pub use registry::{Installer, RegistryClient};
pub use resolver::{Resolver, ResolverOptions};
pub use version::VersionRange;
