//! Version constraint checking
//!
//! Ranges use the npm notation mods are written against: bare versions are
//! exact (`1.2.3`), partial versions and wildcards match a whole line
//! (`1.2`, `1.x`), comparators are space separated (`>=1.0.0 <2.0.0`),
//! hyphen ranges are inclusive (`1.0.0 - 1.4.0`) and `||` joins alternatives.
//! Each alternative is translated into a [`semver::VersionReq`].

use crate::error::{Result, ValidationError};
use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a semantic version, accepting a leading `v` or `=`
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);

    Version::parse(bare).map_err(|e| ValidationError::invalid_version(raw, e))
}

/// Report whether `version` satisfies `range`
pub fn satisfies(version: &Version, range: &VersionRange) -> bool {
    range.matches(version)
}

/// A parsed version range: any one of its alternatives must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse an npm style range
    pub fn parse(raw: &str) -> Result<Self> {
        let alternatives = raw
            .split("||")
            .map(|alternative| translate(alternative.trim()))
            .map(|req| {
                VersionReq::parse(&req).map_err(|e| ValidationError::invalid_range("", raw, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// A range matching every version
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    /// Check a version against the range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The range as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Translate one npm alternative into `VersionReq` syntax
fn translate(alternative: &str) -> String {
    if alternative.is_empty() || matches!(alternative, "*" | "x" | "X") {
        return "*".to_string();
    }

    if let Some((low, high)) = alternative.split_once(" - ") {
        return format!(">={}, <={}", strip_v(low.trim()), strip_v(high.trim()));
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op = Some(token);
            continue;
        }

        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{}", strip_v(token)),
            None => with_operator(token),
        };
        comparators.push(comparator);
    }

    if let Some(op) = pending_op {
        // A dangling operator is left for the parser to reject.
        comparators.push(op.to_string());
    }

    comparators.join(", ")
}

fn with_operator(token: &str) -> String {
    let starts_with_op = token.starts_with(['<', '>', '=', '~', '^']);
    let has_wildcard = version_core(token).contains(['*', 'x', 'X']);

    if starts_with_op {
        let split = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);
        format!("{op}{}", strip_v(version))
    } else if has_wildcard {
        strip_v(token).to_string()
    } else {
        // npm treats a bare version as exact, Cargo as caret.
        format!("={}", strip_v(token))
    }
}

/// The `major.minor.patch` part, without prerelease or build metadata
fn version_core(version: &str) -> &str {
    version
        .split_once(['-', '+'])
        .map_or(version, |(core, _)| core)
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

impl FromStr for VersionRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionRange::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_caret_and_tilde() {
        assert!(range("^1.0.0").matches(&v("1.2.0")));
        assert!(!range("^2.0.0").matches(&v("1.2.0")));
        assert!(range("~1.2.0").matches(&v("1.2.9")));
        assert!(!range("~1.2.0").matches(&v("1.3.0")));
    }

    #[test]
    fn test_bare_version_is_exact() {
        assert!(range("1.2.0").matches(&v("1.2.0")));
        assert!(!range("1.2.0").matches(&v("1.2.1")));
        assert!(range("1.2").matches(&v("1.2.7")));
        assert!(!range("1.2").matches(&v("1.3.0")));
    }

    #[test]
    fn test_wildcards() {
        assert!(range("*").matches(&v("0.0.0")));
        assert!(range("").matches(&v("3.1.4")));
        assert!(range("1.x").matches(&v("1.9.0")));
        assert!(!range("1.x").matches(&v("2.0.0")));
    }

    #[test]
    fn test_prerelease_pin_is_exact() {
        assert!(range("2.0.0-next.1").matches(&v("2.0.0-next.1")));
        assert!(!range("2.0.0-next.1").matches(&v("2.5.0")));
        assert!(!range("1.0.0-x.1").matches(&v("1.0.1")));
        assert!(!range("2.0.0-beta.1").matches(&v("2.5.0")));
        assert!(range("1.x.x").matches(&v("1.4.0")));
        assert!(range(">=1.x").matches(&v("3.0.0")));
    }

    #[test]
    fn test_any_matches_everything() {
        let any = VersionRange::any();
        assert_eq!(any.as_str(), "*");
        assert!(any.matches(&v("0.0.0")));
        assert!(any.matches(&v("42.1.0")));
    }

    #[test]
    fn test_space_separated_comparators() {
        let r = range(">=1.0.0 <2.0.0");
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("2.0.0")));

        let spaced = range(">= 1.4.0");
        assert!(spaced.matches(&v("1.4.0")));
        assert!(!spaced.matches(&v("1.3.9")));
    }

    #[test]
    fn test_hyphen_and_alternatives() {
        let hyphen = range("1.0.0 - 1.4.0");
        assert!(hyphen.matches(&v("1.4.0")));
        assert!(!hyphen.matches(&v("1.4.1")));

        let either = range("^1.0.0 || ^3.0.0");
        assert!(either.matches(&v("3.2.0")));
        assert!(!either.matches(&v("2.0.0")));
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse("not a range").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.2.3").unwrap(), v("1.2.3"));
        assert_eq!(parse_version(" 1.2.3 ").unwrap(), v("1.2.3"));
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("banana").is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_raw_text() {
        let r: VersionRange = serde_json::from_str("\">=1.0.0 <2.0.0\"").unwrap();
        assert_eq!(serde_json::to_string(&r).unwrap(), "\">=1.0.0 <2.0.0\"");
    }
}
