//! Version range parsing and matching.
//!
//! Ranges use npm syntax (`^1.2.0`, `~1.2`, `>=1.0.0 <2.0.0`, `1.x`,
//! `1.2.3 - 2.0.0`, `^1.0.0 || ^2.0.0`, `*`, and the literal `latest`). Each
//! `||` alternative is translated to the comparator syntax understood by the
//! `semver` crate; a version satisfies the range when any alternative matches.
//!
//! Unparseable ranges do not fail: [`VersionRange::parse`] degrades to exact
//! string equality against the raw range text and logs a warning.
//!
//! # Examples
//!
//! ```
//! use forge_registry::version::VersionRange;
//!
//! let range = VersionRange::parse("^1.2.0");
//! assert_eq!(range.max_satisfying(["1.2.0", "1.3.5", "2.0.0"]), Some("1.3.5"));
//! ```

use std::fmt;

use semver::{Version, VersionReq};

use crate::name::LATEST;

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

#[derive(Debug, Clone, PartialEq)]
enum Matcher {
    /// Any alternative may match.
    Semver(Vec<VersionReq>),
    /// Fallback for unparseable ranges: exact text equality.
    Literal,
}

/// A parsed version range.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRange {
    raw: String,
    matcher: Matcher,
}

impl VersionRange {
    /// Parse a range, falling back to literal matching when it is invalid.
    pub fn parse(raw: &str) -> Self {
        match Self::try_parse(raw) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(
                    range = raw,
                    error = %e,
                    "invalid semver range, falling back to exact string match"
                );
                Self {
                    raw: raw.trim().to_string(),
                    matcher: Matcher::Literal,
                }
            }
        }
    }

    /// Parse a range strictly.
    pub fn try_parse(raw: &str) -> Result<Self, semver::Error> {
        let alternatives = raw
            .split("||")
            .map(|alt| VersionReq::parse(&translate_alternative(alt)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.trim().to_string(),
            matcher: Matcher::Semver(alternatives),
        })
    }

    /// The range matching every release version.
    pub fn any() -> Self {
        Self {
            raw: LATEST.to_string(),
            matcher: Matcher::Semver(vec![VersionReq::STAR]),
        }
    }

    /// Whether this range fell back to literal matching.
    pub fn is_literal(&self) -> bool {
        matches!(self.matcher, Matcher::Literal)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether a version string satisfies this range.
    ///
    /// Versions that are not valid semver never satisfy a semver range.
    pub fn matches(&self, version: &str) -> bool {
        match &self.matcher {
            Matcher::Literal => version.trim() == self.raw,
            Matcher::Semver(alternatives) => parse_version(version)
                .is_some_and(|v| alternatives.iter().any(|req| req.matches(&v))),
        }
    }

    /// Select the greatest version that satisfies this range.
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match &self.matcher {
            Matcher::Literal => versions.into_iter().find(|v| self.matches(v)),
            Matcher::Semver(_) => versions
                .into_iter()
                .filter(|v| self.matches(v))
                .filter_map(|v| parse_version(v).map(|parsed| (parsed, v)))
                .max_by(|a, b| a.0.cmp(&b.0))
                .map(|(_, v)| v),
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a concrete version, tolerating a leading `v`.
pub fn parse_version(s: &str) -> Option<Version> {
    Version::parse(s.trim().trim_start_matches('v')).ok()
}

/// `true` if `candidate` is strictly newer than `current`.
///
/// Unparseable versions are never considered newer.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_version(candidate), parse_version(current)) {
        (Some(c), Some(cur)) => c > cur,
        _ => false,
    }
}

/// Translate one npm `||` alternative into `semver` comparator syntax.
fn translate_alternative(alt: &str) -> String {
    let alt = alt.trim();
    if alt.is_empty() || alt == LATEST || is_any_version(strip_v(alt)) {
        return "*".to_string();
    }

    // Hyphen ranges: `1.2.3 - 2.3.4` is inclusive on both ends.
    if let Some((low, high)) = alt.split_once(" - ") {
        return format!(
            ">={}, <={}",
            strip_v(low.trim()),
            strip_v(high.trim())
        );
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alt.split_whitespace() {
        let token = token.trim_end_matches(',');
        if token.is_empty() {
            continue;
        }
        if OPERATORS.contains(&token) {
            // `>= 1.2.3` written with a space
            pending_op = Some(token);
            continue;
        }

        let (op, version) = split_operator(token);
        let op = pending_op.take().unwrap_or(op);
        let version = strip_v(version);

        if is_any_version(version) {
            // `x.x.x` with or without an operator
            comparators.push("*".to_string());
        } else if op.is_empty() && !is_wildcard_version(version) {
            // npm treats a bare version as exact; `semver` would treat it as caret.
            comparators.push(format!("={version}"));
        } else {
            comparators.push(format!("{op}{version}"));
        }
    }

    comparators.join(", ")
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("", token)
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "*" | "x" | "X")
}

fn is_any_version(version: &str) -> bool {
    version.split('.').all(is_wildcard)
}

fn is_wildcard_version(version: &str) -> bool {
    version.split('.').any(is_wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn caret_selects_highest_compatible() {
        let range = VersionRange::parse("^1.2.0");
        assert_eq!(
            range.max_satisfying(["1.2.0", "1.3.5", "2.0.0"]),
            Some("1.3.5")
        );
    }

    #[rstest]
    #[case("^1.2.0", "1.9.9", true)]
    #[case("^1.2.0", "2.0.0", false)]
    #[case("~1.2.0", "1.2.9", true)]
    #[case("~1.2.0", "1.3.0", false)]
    #[case(">=1.0.0 <2.0.0", "1.5.0", true)]
    #[case(">=1.0.0 <2.0.0", "2.0.0", false)]
    #[case(">= 1.0.0", "1.0.0", true)]
    #[case("1.x", "1.4.2", true)]
    #[case("1.x", "2.0.0", false)]
    #[case("1.2.x", "1.2.7", true)]
    #[case("*", "3.1.4", true)]
    #[case("x.x.x", "3.0.0", true)]
    #[case("X.x", "0.4.0", true)]
    #[case("*.*.*", "10.2.1", true)]
    #[case("latest", "0.0.1", true)]
    #[case("", "0.0.1", true)]
    #[case("1.2.3", "1.2.3", true)]
    #[case("1.2.3", "1.2.4", false)]
    #[case("v1.2.3", "1.2.3", true)]
    #[case("1.2", "1.2.5", true)]
    #[case("1.2", "1.3.0", false)]
    #[case("1.0.0 - 2.0.0", "2.0.0", true)]
    #[case("1.0.0 - 2.0.0", "2.0.1", false)]
    #[case("^1.0.0 || ^3.0.0", "3.2.0", true)]
    #[case("^1.0.0 || ^3.0.0", "2.2.0", false)]
    #[case("<1.0.0", "0.9.0", true)]
    #[case("^1.0.0", "not-a-version", false)]
    fn npm_range_matching(#[case] range: &str, #[case] version: &str, #[case] expected: bool) {
        let parsed = VersionRange::try_parse(range)
            .unwrap_or_else(|e| panic!("range {range:?} should parse: {e}"));
        assert_eq!(parsed.matches(version), expected, "{range} vs {version}");
    }

    #[test]
    fn invalid_range_degrades_to_literal_match() {
        let range = VersionRange::parse("stable-channel");
        assert!(range.is_literal());
        assert!(range.matches("stable-channel"));
        assert!(!range.matches("1.0.0"));
        assert_eq!(
            range.max_satisfying(["1.0.0", "stable-channel"]),
            Some("stable-channel")
        );
    }

    #[test]
    fn max_satisfying_none_when_nothing_matches() {
        let range = VersionRange::parse("^3.0.0");
        assert_eq!(range.max_satisfying(["1.0.0", "2.9.9"]), None);
    }

    #[test]
    fn is_newer_compares_semver_not_text() {
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.9.0", "1.10.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("garbage", "1.0.0"));
    }

    #[test]
    fn display_keeps_raw_text() {
        assert_eq!(VersionRange::parse(" ^1.0.0 ").to_string(), "^1.0.0");
        assert_eq!(VersionRange::any().as_str(), "latest");
    }
}
