//! Definition file loading.
//!
//! The resolver only sees the [`DefinitionLoader`] trait: given a path (or
//! downloaded content) it returns a schema-valid [`Definition`]. [`FileLoader`]
//! is the default implementation for YAML files and Markdown files with YAML
//! front matter.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::definition::{Definition, DefinitionKind};
use crate::error::{Error, FieldError, Result};
use crate::version::parse_version;

const FRONT_MATTER_FENCE: &str = "---";

/// On-disk encoding of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Yaml,
    /// YAML front matter followed by a Markdown body.
    Markdown,
}

impl DefinitionFormat {
    /// Detect the format from a file name or URL.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or_default();
        if lower.ends_with(".md") || lower.ends_with(".markdown") {
            Some(Self::Markdown)
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Markdown => "md",
        }
    }
}

/// Loader boundary consumed by the resolver.
#[async_trait]
pub trait DefinitionLoader: Send + Sync {
    /// Read and validate the definition stored at `path`.
    ///
    /// A missing file is reported as the not-found error for `kind`.
    async fn load(&self, path: &Path, kind: DefinitionKind) -> Result<Definition>;

    /// Validate already-read content. `origin` names the source in errors.
    fn parse(
        &self,
        content: &str,
        format: DefinitionFormat,
        origin: &str,
        kind: DefinitionKind,
    ) -> Result<Definition>;
}

/// Loads YAML and Markdown-front-matter definition files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DefinitionLoader for FileLoader {
    async fn load(&self, path: &Path, kind: DefinitionKind) -> Result<Definition> {
        let origin = path.display().to_string();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Err(Error::not_found(kind, &name, "*", vec![origin]));
            }
            Err(e) => return Err(forge_fs::Error::io(path, e).into()),
        };

        let format = DefinitionFormat::from_path(&origin).unwrap_or(DefinitionFormat::Yaml);
        self.parse(&content, format, &origin, kind)
    }

    fn parse(
        &self,
        content: &str,
        format: DefinitionFormat,
        origin: &str,
        kind: DefinitionKind,
    ) -> Result<Definition> {
        let (front, body) = match format {
            DefinitionFormat::Yaml => (content, None),
            DefinitionFormat::Markdown => split_front_matter(content).ok_or_else(|| {
                Error::YamlParse {
                    path: origin.to_string(),
                    message: "missing YAML front matter".to_string(),
                }
            })?,
        };

        let yaml: serde_yaml::Value =
            serde_yaml::from_str(front).map_err(|e| Error::YamlParse {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
        let mut value = serde_json::to_value(yaml).map_err(|e| Error::YamlParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;

        let fields = value.as_object_mut().ok_or_else(|| Error::SchemaValidation {
            path: origin.to_string(),
            errors: vec![FieldError::new("(root)", "expected a mapping")],
        })?;

        if let Some(body) = body.filter(|b| kind == DefinitionKind::Agent && !b.trim().is_empty()) {
            fields
                .entry("system_prompt")
                .or_insert_with(|| Value::String(body.trim().to_string()));
        }

        let errors = validate_fields(fields, kind);
        if !errors.is_empty() {
            return Err(Error::SchemaValidation {
                path: origin.to_string(),
                errors,
            });
        }

        Definition::from_value(value).map_err(|e| Error::SchemaValidation {
            path: origin.to_string(),
            errors: vec![FieldError::new("(document)", e.to_string())],
        })
    }
}

/// Split a Markdown document into its front matter and body.
fn split_front_matter(content: &str) -> Option<(&str, Option<&str>)> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix(FRONT_MATTER_FENCE)?
        .trim_start_matches([' ', '\t']);
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((front, Some(body)));
        }
        offset += line.len();
    }
    None
}

/// Check required fields and fill in a missing `type`.
fn validate_fields(fields: &mut Map<String, Value>, kind: DefinitionKind) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match fields.get("type") {
        None | Some(Value::Null) => {
            fields.insert("type".into(), Value::String(kind.as_str().into()));
        }
        Some(Value::String(t)) if t == kind.as_str() => {}
        Some(other) => errors.push(FieldError::new(
            "type",
            format!("expected '{kind}', found {other}"),
        )),
    }

    match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(Value::String(_)) => errors.push(FieldError::new("name", "must not be empty")),
        Some(_) => errors.push(FieldError::new("name", "must be a string")),
        None => errors.push(FieldError::new("name", "is required")),
    }

    match fields.get("version") {
        Some(Value::String(v)) if parse_version(v).is_some() => {}
        Some(Value::String(v)) => errors.push(FieldError::new(
            "version",
            format!("'{v}' is not a valid semver version"),
        )),
        Some(_) => errors.push(FieldError::new("version", "must be a string")),
        None => errors.push(FieldError::new("version", "is required")),
    }

    match fields.get("description") {
        Some(Value::String(_)) => {}
        Some(_) => errors.push(FieldError::new("description", "must be a string")),
        None => errors.push(FieldError::new("description", "is required")),
    }

    errors
}

/// Serialize a definition in the given on-disk format.
///
/// Markdown output puts an agent's `system_prompt` in the body.
pub fn serialize_definition(definition: &Definition, format: DefinitionFormat) -> Result<String> {
    let mut value = definition.to_value()?;

    let body = match (format, value.as_object_mut()) {
        (DefinitionFormat::Markdown, Some(fields)) => match fields.remove("system_prompt") {
            Some(Value::String(prompt)) => Some(prompt),
            Some(other) => {
                fields.insert("system_prompt".into(), other);
                None
            }
            None => None,
        },
        _ => None,
    };

    let yaml = serde_yaml::to_string(&value).map_err(|e| Error::YamlParse {
        path: definition.name().to_string(),
        message: e.to_string(),
    })?;

    Ok(match format {
        DefinitionFormat::Yaml => yaml,
        DefinitionFormat::Markdown => {
            let mut out = format!("{FRONT_MATTER_FENCE}\n{yaml}{FRONT_MATTER_FENCE}\n");
            if let Some(body) = body {
                out.push('\n');
                out.push_str(&body);
                out.push('\n');
            }
            out
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const AGENT_MD: &str = "---\nname: researcher\nversion: 1.0.0\ndescription: Finds things\ntools: [web-search]\n---\n\nYou are a careful researcher.\n";

    #[test]
    fn markdown_body_becomes_system_prompt() {
        let def = FileLoader
            .parse(AGENT_MD, DefinitionFormat::Markdown, "researcher.md", DefinitionKind::Agent)
            .unwrap();
        match def {
            Definition::Agent(agent) => {
                assert_eq!(agent.system_prompt.as_deref(), Some("You are a careful researcher."));
                assert_eq!(agent.tools, vec!["web-search".to_string()]);
            }
            Definition::Tool(_) => panic!("expected agent"),
        }
    }

    #[test]
    fn missing_type_is_filled_and_mismatch_rejected() {
        let yaml = "name: t\nversion: 1.0.0\ndescription: d\n";
        let def = FileLoader
            .parse(yaml, DefinitionFormat::Yaml, "t.yaml", DefinitionKind::Tool)
            .unwrap();
        assert_eq!(def.kind(), DefinitionKind::Tool);

        let def = FileLoader
            .parse(yaml, DefinitionFormat::Yaml, "t.yaml", DefinitionKind::Agent)
            .unwrap();
        assert_eq!(def.kind(), DefinitionKind::Agent);

        let typed = "type: tool\nname: t\nversion: 1.0.0\ndescription: d\n";
        let err = FileLoader
            .parse(typed, DefinitionFormat::Yaml, "t.yaml", DefinitionKind::Agent)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    }

    #[test]
    fn schema_errors_are_collected() {
        let err = FileLoader
            .parse("name: ''\nversion: one\n", DefinitionFormat::Yaml, "bad.yaml", DefinitionKind::Tool)
            .unwrap_err();
        match err {
            Error::SchemaValidation { errors, .. } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "version", "description"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = FileLoader
            .parse("name: [unclosed", DefinitionFormat::Yaml, "x.yaml", DefinitionKind::Tool)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::YamlParse);

        let err = FileLoader
            .parse("no front matter", DefinitionFormat::Markdown, "x.md", DefinitionKind::Agent)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::YamlParse);
    }

    #[test]
    fn markdown_round_trip_keeps_prompt_and_unknown_fields() {
        let source = "---\nname: a\nversion: 1.0.0\ndescription: d\nx-team: core\n---\nBe brief.\n";
        let def = FileLoader
            .parse(source, DefinitionFormat::Markdown, "a.md", DefinitionKind::Agent)
            .unwrap();

        let rendered = serialize_definition(&def, DefinitionFormat::Markdown).unwrap();
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.trim_end().ends_with("Be brief."));

        let reparsed = FileLoader
            .parse(&rendered, DefinitionFormat::Markdown, "a.md", DefinitionKind::Agent)
            .unwrap();
        assert_eq!(reparsed, def);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = FileLoader
            .load(&temp.path().join("ghost.yaml"), DefinitionKind::Agent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentNotFound);
    }

    #[test]
    fn format_detection() {
        assert_eq!(DefinitionFormat::from_path("a/agent.md"), Some(DefinitionFormat::Markdown));
        assert_eq!(DefinitionFormat::from_path("tool.YML"), Some(DefinitionFormat::Yaml));
        assert_eq!(
            DefinitionFormat::from_path("https://r.example/t.yaml?sig=1"),
            Some(DefinitionFormat::Yaml)
        );
        assert_eq!(DefinitionFormat::from_path("tool.json"), None);
    }
}
