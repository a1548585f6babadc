//! Parsing of `name[@range]` queries.
//!
//! The version range is separated by the last unescaped `@`. A leading `@`
//! marks a scoped identifier (`@scope/name`) and never separates a range, and
//! `\@` is a literal `@` inside the name. A query without a range means
//! `latest`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// The range used when a query does not specify one.
pub const LATEST: &str = "latest";

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(@[A-Za-z0-9][A-Za-z0-9._-]*/)?[A-Za-z0-9][A-Za-z0-9._-]*(:[A-Za-z0-9][A-Za-z0-9._-]*)*$",
    )
    .expect("name pattern is a valid regex")
});

/// A query split into a definition name and a version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedName {
    pub name: String,
    pub version_range: String,
}

impl ParsedName {
    /// Split `query` into name and range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] when the name part is empty.
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.trim();
        let chars: Vec<char> = query.chars().collect();

        let mut separator = None;
        for (idx, ch) in chars.iter().enumerate() {
            if *ch == '@' && idx > 0 && chars[idx - 1] != '\\' {
                separator = Some(idx);
            }
        }

        let (raw_name, range) = match separator {
            Some(idx) => {
                let name: String = chars[..idx].iter().collect();
                let range: String = chars[idx + 1..].iter().collect();
                (name, range.trim().to_string())
            }
            None => (query.to_string(), String::new()),
        };

        let name = raw_name.replace("\\@", "@");
        if name.is_empty() {
            return Err(Error::InvalidName {
                name: query.to_string(),
                reason: "name is empty".to_string(),
            });
        }

        let version_range = if range.is_empty() {
            LATEST.to_string()
        } else {
            range
        };

        Ok(Self {
            name,
            version_range,
        })
    }

    /// Whether the query asked for the newest available version.
    pub fn is_latest(&self) -> bool {
        self.version_range == LATEST
    }
}

impl fmt::Display for ParsedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version_range)
    }
}

/// Check that a definition name is safe to use as a storage file name.
///
/// Names are alphanumeric segments (with `.`, `_`, `-`) joined by `:` for
/// namespaces, optionally prefixed by an `@scope/`.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_string(),
            reason: "names must be alphanumeric segments separated by ':' \
                     (with '.', '_' or '-'), optionally scoped as '@scope/name'"
                .to_string(),
        })
    }
}
