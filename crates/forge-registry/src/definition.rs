//! Agent and tool definitions.
//!
//! A [`Definition`] is a tagged union over the two definition kinds. Fields
//! the engine reasons about (names, versions, dependency lists, tags) are
//! typed; genuinely freeform sub-trees such as agent `config` and tool
//! `parameters` are kept as open string-keyed maps. Unknown top-level fields
//! are preserved in `extra` so a definition survives a load/save round trip.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Freeform string-keyed map used for `config`, `parameters` and unknown fields.
pub type FieldMap = Map<String, Value>;

/// The two kinds of definition the registry manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Agent,
    Tool,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 2] = [DefinitionKind::Agent, DefinitionKind::Tool];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
        }
    }

    /// Directory name used by the storage layout (`agents` / `tools`).
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Tool => "tools",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" | "agents" => Ok(Self::Agent),
            "tool" | "tools" => Ok(Self::Tool),
            _ => Err(Error::InvalidName {
                name: s.to_string(),
                reason: "expected 'agent' or 'tool'".to_string(),
            }),
        }
    }
}

/// The tier a definition was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Global,
    Remote,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance stamped on a forked definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkOf {
    /// Upstream definition name.
    pub name: String,
    /// Upstream version the fork was taken from, or last merged with.
    pub version: String,
    pub forked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

/// LLM settings for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// A tool declared inline on an agent rather than referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineTool {
    pub name: String,
    #[serde(flatten)]
    pub spec: FieldMap,
}

/// How a tool is executed (`bash`, `python`, `http`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolImplementation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub settings: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Names (optionally `name@range`) of tools this agent uses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_tools: Vec<InlineTool>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ForkOf>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Parameter schemas keyed by parameter name.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<ToolImplementation>,
    /// Names (optionally `name@range`) of tools this tool depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ForkOf>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// A schema-valid agent or tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Definition {
    Agent(AgentDefinition),
    Tool(ToolDefinition),
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Self::Agent(_) => DefinitionKind::Agent,
            Self::Tool(_) => DefinitionKind::Tool,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Agent(a) => &a.name,
            Self::Tool(t) => &t.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            Self::Agent(a) => a.name = name.into(),
            Self::Tool(t) => t.name = name.into(),
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Agent(a) => &a.version,
            Self::Tool(t) => &t.version,
        }
    }

    /// The declared version parsed as semver, if valid.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.version().trim_start_matches('v')).ok()
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Agent(a) => &a.description,
            Self::Tool(t) => &t.description,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Agent(a) => &a.tags,
            Self::Tool(t) => &t.tags,
        }
    }

    pub fn extends(&self) -> Option<&str> {
        match self {
            Self::Agent(a) => a.extends.as_deref(),
            Self::Tool(t) => t.extends.as_deref(),
        }
    }

    /// Referenced dependency names: `tools` for agents, `depends_on` for tools.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Self::Agent(a) => &a.tools,
            Self::Tool(t) => &t.depends_on,
        }
    }

    pub fn fork_of(&self) -> Option<&ForkOf> {
        match self {
            Self::Agent(a) => a.fork_of.as_ref(),
            Self::Tool(t) => t.fork_of.as_ref(),
        }
    }

    pub fn set_fork_of(&mut self, fork_of: Option<ForkOf>) {
        match self {
            Self::Agent(a) => a.fork_of = fork_of,
            Self::Tool(t) => t.fork_of = fork_of,
        }
    }

    /// Convert to a JSON value (including the `type` tag).
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a definition from a JSON value produced by [`to_value`](Self::to_value)
    /// or by a merge over such values.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A definition together with where and at which version it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDefinition {
    pub definition: Definition,
    pub source: Source,
    pub version: String,
    /// File path or URL the definition was loaded from.
    pub path: String,
}

impl ResolvedDefinition {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn kind(&self) -> DefinitionKind {
        self.definition.kind()
    }
}

/// Lightweight listing entry produced by [`Resolver::list`](crate::resolver::Resolver::list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSummary {
    pub name: String,
    pub kind: DefinitionKind,
    pub version: String,
    pub source: Source,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn tagged_union_round_trips_through_json() {
        let value = json!({
            "type": "tool",
            "name": "web-search",
            "version": "1.2.0",
            "description": "Search the web",
            "parameters": {"query": {"type": "string", "required": true}},
            "implementation": {"type": "http", "url": "https://example.com"},
            "depends_on": ["http-client"],
            "x-owner": "platform"
        });

        let def = Definition::from_value(value.clone()).unwrap();
        assert_eq!(def.kind(), DefinitionKind::Tool);
        assert_eq!(def.dependencies(), ["http-client".to_string()]);
        match &def {
            Definition::Tool(t) => {
                assert_eq!(t.extra.get("x-owner"), Some(&json!("platform")));
                assert_eq!(t.implementation.as_ref().unwrap().kind, "http");
            }
            Definition::Agent(_) => panic!("expected tool"),
        }
        assert_eq!(def.to_value().unwrap(), value);
    }

    #[test]
    fn agent_dependencies_are_tools() {
        let def = Definition::from_value(json!({
            "type": "agent",
            "name": "researcher",
            "version": "0.1.0",
            "description": "d",
            "tools": ["web-search", "summarize@^2"]
        }))
        .unwrap();
        assert_eq!(def.dependencies().len(), 2);
        assert_eq!(def.semver(), Some(semver::Version::new(0, 1, 0)));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("agents".parse::<DefinitionKind>().unwrap(), DefinitionKind::Agent);
        assert_eq!("Tool".parse::<DefinitionKind>().unwrap(), DefinitionKind::Tool);
        assert!("workflow".parse::<DefinitionKind>().is_err());
        assert_eq!(DefinitionKind::Tool.plural(), "tools");
    }
}
