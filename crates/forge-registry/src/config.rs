//! Layered configuration.
//!
//! Sources, later overriding earlier with a deep merge of mappings:
//! 1. built-in defaults
//! 2. global `{global}/config.yaml`
//! 3. project `{project}/.fractary/config.yaml`
//! 4. `FORGE_*` environment variables
//!
//! Sequences (`registries`, `agents`, `tools`) are replaced, not concatenated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};
use crate::layout::StorageLayout;

pub const ENV_LOCAL_PATH: &str = "FORGE_REGISTRY_LOCAL_PATH";
pub const ENV_GLOBAL_PATH: &str = "FORGE_REGISTRY_GLOBAL_PATH";
pub const ENV_REMOTE_URL: &str = "FORGE_REGISTRY_REMOTE_URL";
pub const ENV_CACHE_ENABLED: &str = "FORGE_CACHE_ENABLED";
pub const ENV_LOG_LEVEL: &str = "FORGE_LOG_LEVEL";

/// Name given to the registry configured through `FORGE_REGISTRY_REMOTE_URL`.
pub const ENV_REGISTRY_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
    pub registries: Vec<RegistryConfig>,
    pub logging: LoggingConfig,
    /// Agents used by the project, as `name[@range]`.
    pub agents: Vec<String>,
    /// Tools used by the project, as `name[@range]`.
    pub tools: Vec<String>,
    /// Root overrides taken from the environment.
    #[serde(skip)]
    pub paths: PathOverrides,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            cache: CacheConfig::default(),
            registries: Vec::new(),
            logging: LoggingConfig::default(),
            agents: Vec::new(),
            tools: Vec::new(),
            paths: PathOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub global_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub local: TierConfig,
    pub global: TierConfig,
    pub remote: RemoteTierConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            local: TierConfig { enabled: true },
            global: TierConfig { enabled: true },
            remote: RemoteTierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub enabled: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteTierConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for RemoteTierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: 30_000,
        }
    }
}

impl RemoteTierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A remote registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub name: String,
    /// URL of the registry manifest.
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lower values are consulted first.
    #[serde(default)]
    pub priority: i32,
    /// Manifest cache lifetime in seconds.
    #[serde(default = "default_registry_ttl")]
    pub cache_ttl: u64,
}

impl RegistryConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            priority: 0,
            cache_ttl: default_registry_ttl(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

fn default_true() -> bool {
    true
}

fn default_registry_ttl() -> u64 {
    3600
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ForgeConfig {
    /// Enabled registries, lowest priority value first.
    pub fn active_registries(&self) -> Vec<&RegistryConfig> {
        let mut registries: Vec<&RegistryConfig> =
            self.registries.iter().filter(|r| r.enabled).collect();
        registries.sort_by_key(|r| r.priority);
        registries
    }

    /// Apply `FORGE_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOCAL_PATH).filter(|v| !v.is_empty()) {
            self.paths.project_root = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_GLOBAL_PATH).filter(|v| !v.is_empty()) {
            self.paths.global_root = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(ENV_REMOTE_URL).filter(|v| !v.is_empty()) {
            self.resolver.remote.enabled = true;
            match self
                .registries
                .iter_mut()
                .find(|r| r.name == ENV_REGISTRY_NAME)
            {
                Some(existing) => {
                    existing.url = url;
                    existing.enabled = true;
                }
                None => self.registries.push(RegistryConfig::new(ENV_REGISTRY_NAME, url)),
            }
        }
        if let Some(flag) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            );
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }
}

/// Loads [`ForgeConfig`] from the global and project config files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_config: PathBuf,
    project_config: PathBuf,
}

impl ConfigLoader {
    pub fn new(global_config: impl Into<PathBuf>, project_config: impl Into<PathBuf>) -> Self {
        Self {
            global_config: global_config.into(),
            project_config: project_config.into(),
        }
    }

    pub fn for_layout(layout: &StorageLayout) -> Self {
        Self::new(layout.global_config_path(), layout.project_config_path())
    }

    /// Load the file layers and apply overrides from the process environment.
    pub fn load(&self) -> Result<ForgeConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load the file layers and apply overrides read through `lookup`.
    pub fn load_with_env<F>(&self, lookup: F) -> Result<ForgeConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut merged = serde_yaml::to_value(ForgeConfig::default()).map_err(|e| Error::Config {
            path: PathBuf::from("<defaults>"),
            message: e.to_string(),
        })?;

        for (layer, path) in [("global", &self.global_config), ("project", &self.project_config)] {
            match read_layer(path)? {
                Some(value) => {
                    tracing::debug!(layer, path = %path.display(), "loading config layer");
                    deep_merge(&mut merged, value);
                }
                None => tracing::debug!(layer, path = %path.display(), "no config layer, skipping"),
            }
        }

        let mut config: ForgeConfig =
            serde_yaml::from_value(merged).map_err(|e| Error::Config {
                path: self.project_config.clone(),
                message: e.to_string(),
            })?;
        config.apply_env_overrides(lookup);
        Ok(config)
    }
}

fn read_layer(path: &Path) -> Result<Option<YamlValue>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = forge_fs::io::read_text(path)?;
    let value: YamlValue = serde_yaml::from_str(&content).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match value {
        YamlValue::Null => Ok(None),
        YamlValue::Mapping(_) => Ok(Some(value)),
        _ => Err(Error::Config {
            path: path.to_path_buf(),
            message: "expected a mapping at the top level".to_string(),
        }),
    }
}

/// Recursively merge `overlay` into `base`; mappings merge, everything else replaces.
fn deep_merge(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
