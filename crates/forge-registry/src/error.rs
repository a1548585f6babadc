//! Error types for forge-registry
//!
//! Every engine failure carries a machine-readable [`ErrorKind`], a
//! human-readable message (the `Display` impl) and structured
//! [`details`](Error::details) for callers that format their own output.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use crate::definition::DefinitionKind;

/// Result type for forge-registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed schema check on a definition field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AgentNotFound,
    ToolNotFound,
    VersionNotFound,
    InheritanceCycle,
    InheritanceBaseNotFound,
    CircularDependency,
    DepthExceeded,
    YamlParse,
    SchemaValidation,
    ChecksumMismatch,
    Network,
    Timeout,
    Config,
    LockfileExists,
    NotAFork,
    ForkExists,
    InvalidName,
    PluginNotFound,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::VersionNotFound => "VERSION_NOT_FOUND",
            Self::InheritanceCycle => "INHERITANCE_CYCLE",
            Self::InheritanceBaseNotFound => "INHERITANCE_BASE_NOT_FOUND",
            Self::CircularDependency => "CIRCULAR_DEPENDENCY",
            Self::DepthExceeded => "DEPTH_EXCEEDED",
            Self::YamlParse => "YAML_PARSE_ERROR",
            Self::SchemaValidation => "SCHEMA_VALIDATION_ERROR",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Config => "CONFIG_ERROR",
            Self::LockfileExists => "LOCKFILE_EXISTS",
            Self::NotAFork => "NOT_A_FORK",
            Self::ForkExists => "FORK_EXISTS",
            Self::InvalidName => "INVALID_NAME",
            Self::PluginNotFound => "PLUGIN_NOT_FOUND",
            Self::Io => "IO_ERROR",
        }
    }

    /// Whether this kind means "the requested definition does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AgentNotFound | Self::ToolNotFound | Self::VersionNotFound
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in forge-registry operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Agent not found: {name}")]
    AgentNotFound {
        name: String,
        range: String,
        searched: Vec<String>,
    },

    #[error("Tool not found: {name}")]
    ToolNotFound {
        name: String,
        range: String,
        searched: Vec<String>,
    },

    #[error("No version of {kind} '{name}' satisfies '{range}' (available: {})", .available.join(", "))]
    VersionNotFound {
        kind: DefinitionKind,
        name: String,
        range: String,
        available: Vec<String>,
    },

    #[error("Inheritance cycle detected: {}", .chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error("'{child}' extends '{parent}', which could not be found")]
    InheritanceBaseNotFound { child: String, parent: String },

    #[error("Circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Dependency depth {depth} exceeds maximum {max_depth} at '{node}'")]
    DepthExceeded {
        node: String,
        depth: usize,
        max_depth: usize,
    },

    #[error("Invalid YAML in {path}: {message}")]
    YamlParse { path: String, message: String },

    #[error("Schema validation failed for {path}: {}", format_field_errors(.errors))]
    SchemaValidation {
        path: String,
        errors: Vec<FieldError>,
    },

    #[error("Checksum mismatch for '{item}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        item: String,
        expected: String,
        actual: String,
    },

    #[error("Network error fetching {url}: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Request to {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid configuration at {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Lockfile already exists at {path} (use force to overwrite)")]
    LockfileExists { path: PathBuf },

    #[error("{kind} '{name}' is not a fork")]
    NotAFork { kind: DefinitionKind, name: String },

    #[error("Cannot fork into {path}: a definition already exists there")]
    ForkExists { path: PathBuf },

    #[error("Invalid definition name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Registry '{registry}' has no plugin '{name}' matching '{range}'")]
    PluginNotFound {
        registry: String,
        name: String,
        range: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Fs(#[from] forge_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Build the not-found error matching a definition kind.
    pub fn not_found(kind: DefinitionKind, name: &str, range: &str, searched: Vec<String>) -> Self {
        let name = name.to_string();
        let range = range.to_string();
        match kind {
            DefinitionKind::Agent => Self::AgentNotFound {
                name,
                range,
                searched,
            },
            DefinitionKind::Tool => Self::ToolNotFound {
                name,
                range,
                searched,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AgentNotFound { .. } => ErrorKind::AgentNotFound,
            Self::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Self::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            Self::InheritanceCycle { .. } => ErrorKind::InheritanceCycle,
            Self::InheritanceBaseNotFound { .. } => ErrorKind::InheritanceBaseNotFound,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::YamlParse { .. } => ErrorKind::YamlParse,
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Config { .. } => ErrorKind::Config,
            Self::LockfileExists { .. } => ErrorKind::LockfileExists,
            Self::NotAFork { .. } => ErrorKind::NotAFork,
            Self::ForkExists { .. } => ErrorKind::ForkExists,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::PluginNotFound { .. } => ErrorKind::PluginNotFound,
            Self::Fs(forge_fs::Error::ChecksumMismatch { .. }) => ErrorKind::ChecksumMismatch,
            Self::Fs(forge_fs::Error::Parse { .. }) => ErrorKind::YamlParse,
            Self::Fs(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    /// Structured payload describing the failure.
    pub fn details(&self) -> Value {
        match self {
            Self::AgentNotFound {
                name,
                range,
                searched,
            }
            | Self::ToolNotFound {
                name,
                range,
                searched,
            } => json!({"name": name, "range": range, "searched": searched}),
            Self::VersionNotFound {
                kind,
                name,
                range,
                available,
            } => json!({"type": kind, "name": name, "range": range, "available": available}),
            Self::InheritanceCycle { chain } => json!({"chain": chain}),
            Self::InheritanceBaseNotFound { child, parent } => {
                json!({"child": child, "parent": parent})
            }
            Self::CircularDependency { cycle } => json!({"cycle": cycle}),
            Self::DepthExceeded {
                node,
                depth,
                max_depth,
            } => json!({"node": node, "depth": depth, "max_depth": max_depth}),
            Self::YamlParse { path, message } => json!({"path": path, "message": message}),
            Self::SchemaValidation { path, errors } => json!({"path": path, "errors": errors}),
            Self::ChecksumMismatch {
                item,
                expected,
                actual,
            } => json!({"item": item, "expected": expected, "actual": actual}),
            Self::Network {
                url,
                status,
                message,
            } => json!({"url": url, "status": status, "message": message}),
            Self::Timeout { url, timeout } => {
                json!({"url": url, "timeout_ms": timeout.as_millis() as u64})
            }
            Self::Config { path, message } => json!({"path": path, "message": message}),
            Self::LockfileExists { path } | Self::ForkExists { path } => json!({"path": path}),
            Self::NotAFork { kind, name } => json!({"type": kind, "name": name}),
            Self::InvalidName { name, reason } => json!({"name": name, "reason": reason}),
            Self::PluginNotFound {
                registry,
                name,
                range,
                available,
            } => json!({"registry": registry, "name": name, "range": range, "available": available}),
            Self::Fs(forge_fs::Error::ChecksumMismatch { expected, actual }) => {
                json!({"expected": expected, "actual": actual})
            }
            Self::Fs(e) => json!({"message": e.to_string()}),
            Self::Io(e) => json!({"message": e.to_string()}),
            Self::Json(e) => json!({"message": e.to_string()}),
        }
    }
}
