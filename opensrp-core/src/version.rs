//! Artifact version parsing and ordering
//!
//! Form, manifest and app versions are free-form dotted strings such as
//! `0.1.1`, `2.3.0-rc1` or `1.2.3.4.5`. They are compared component by
//! component rather than as plain strings:
//!
//! - components are split on `.`, `-`, `_`, `+` and on every switch between
//!   digits and letters (`1rc2` is `1`, `rc`, `2`)
//! - numeric components compare numerically, with no length limit
//! - qualifiers rank `alpha < beta < milestone < rc < snapshot < (release) < sp`,
//!   unknown qualifiers sort after `sp` alphabetically
//! - trailing zeros are insignificant, so `1.0 == 1.0.0`

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when a version string is malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Version is empty")]
    Empty,

    #[error("Version '{0}' must start with a digit")]
    LeadingNonDigit(String),

    #[error("Version '{input}' contains invalid character '{character}'")]
    InvalidCharacter { input: String, character: char },

    #[error("Version '{0}' contains an empty component")]
    EmptyComponent(String),
}

/// Rank of the implicit release qualifier (a version with no qualifier)
const RELEASE_RANK: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Component {
    /// Decimal digits with leading zeros stripped ("0" for zero)
    Number(String),
    /// Lowercase qualifier with aliases already expanded
    Qualifier(String),
}

impl Component {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Component::Number("0".to_string())
        } else {
            Component::Number(trimmed.to_string())
        }
    }

    /// Expands qualifier aliases; `None` means the qualifier denotes a release
    fn qualifier(word: &str) -> Option<Self> {
        let canonical = match word {
            "a" => "alpha",
            "b" => "beta",
            "m" => "milestone",
            "cr" => "rc",
            "ga" | "final" | "release" => return None,
            other => other,
        };
        Some(Component::Qualifier(canonical.to_string()))
    }

    fn is_zero(&self) -> bool {
        matches!(self, Component::Number(n) if n == "0")
    }
}

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" => 3,
        "snapshot" => 4,
        "sp" => 6,
        _ => 7,
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a)
        .cmp(&qualifier_rank(b))
        .then_with(|| a.cmp(b))
}

/// Compares a component against a missing one (the shorter version ran out)
fn compare_to_absent(component: &Component) -> Ordering {
    match component {
        Component::Number(n) if n == "0" => Ordering::Equal,
        Component::Number(_) => Ordering::Greater,
        Component::Qualifier(q) => qualifier_rank(q).cmp(&RELEASE_RANK),
    }
}

fn compare_components(a: &Component, b: &Component) -> Ordering {
    match (a, b) {
        (Component::Number(x), Component::Number(y)) => compare_numbers(x, y),
        (Component::Qualifier(x), Component::Qualifier(y)) => compare_qualifiers(x, y),
        (Component::Number(_), Component::Qualifier(_)) => Ordering::Greater,
        (Component::Qualifier(_), Component::Number(_)) => Ordering::Less,
    }
}

/// A parsed, totally ordered artifact version
///
/// Equality and hashing follow the version ordering, so `1.0` and `1.0.0`
/// are the same version even though they print differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactVersion {
    raw: String,
    components: Vec<Component>,
}

impl ArtifactVersion {
    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        if !raw.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(VersionError::LeadingNonDigit(raw.to_string()));
        }

        let lowered = raw.to_ascii_lowercase();
        let mut components = Vec::new();
        let mut token = String::new();
        let mut after_separator = false;

        for c in lowered.chars() {
            if matches!(c, '.' | '-' | '_' | '+') {
                if token.is_empty() {
                    return Err(VersionError::EmptyComponent(raw.to_string()));
                }
                push_token(&mut components, &token);
                token.clear();
                after_separator = true;
                continue;
            }

            if !c.is_ascii_alphanumeric() {
                return Err(VersionError::InvalidCharacter {
                    input: raw.to_string(),
                    character: c,
                });
            }

            let switches_kind = token
                .chars()
                .last()
                .is_some_and(|last| last.is_ascii_digit() != c.is_ascii_digit());
            if switches_kind {
                push_token(&mut components, &token);
                token.clear();
            }

            token.push(c);
            after_separator = false;
        }

        if after_separator {
            return Err(VersionError::EmptyComponent(raw.to_string()));
        }
        push_token(&mut components, &token);

        Ok(Self {
            raw: raw.to_string(),
            components: normalize(components),
        })
    }

    /// The version as it was written (surrounding whitespace removed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of significant components after normalization
    pub fn significant_components(&self) -> usize {
        self.components.len()
    }
}

fn push_token(components: &mut Vec<Component>, token: &str) {
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        components.push(Component::number(token));
    } else if let Some(qualifier) = Component::qualifier(token) {
        components.push(qualifier);
    }
}

/// Drops zeros that carry no ordering weight: trailing ones and those
/// directly in front of a qualifier (`1.0-rc1` is `1-rc1`)
fn normalize(components: Vec<Component>) -> Vec<Component> {
    let mut normalized: Vec<Component> = Vec::with_capacity(components.len());
    for component in components {
        if matches!(component, Component::Qualifier(_)) {
            while normalized.last().is_some_and(Component::is_zero) {
                normalized.pop();
            }
        }
        normalized.push(component);
    }
    while normalized.last().is_some_and(Component::is_zero) {
        normalized.pop();
    }
    normalized
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let longest = self.components.len().max(other.components.len());
        for i in 0..longest {
            let ordering = match (self.components.get(i), other.components.get(i)) {
                (Some(a), Some(b)) => compare_components(a, b),
                (Some(a), None) => compare_to_absent(a),
                (None, Some(b)) => compare_to_absent(b).reverse(),
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArtifactVersion {}

impl Hash for ArtifactVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ArtifactVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactVersion> for String {
    fn from(version: ArtifactVersion) -> Self {
        version.raw
    }
}
