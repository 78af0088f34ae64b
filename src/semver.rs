//! Semantic versioning parser and constraint matching
//!
//! Provides semver parsing, version precedence, and range-constraint
//! resolution for mod and loader versions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during semver parsing
#[derive(Debug, Error)]
pub enum SemverError {
    /// Invalid version format
    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    /// Invalid constraint format
    #[error("Invalid constraint format: {0}")]
    InvalidConstraint(String),

    /// Invalid pre-release tag
    #[error("Invalid pre-release tag: {0}")]
    InvalidPrerelease(String),
}

/// Semantic version (MAJOR.MINOR.PATCH with optional pre-release and build)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let mut input = s.trim();
        if let Some(tail) = input.strip_prefix('v') {
            input = tail;
        }

        // Split off build metadata first (it may itself contain '-'),
        // then the pre-release tag; what remains is the numeric core.
        let (rest, build) = match input.split_once('+') {
            Some((head, tail)) => (head, Some(tail)),
            None => (input, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };

        let mut fields = core.split('.');
        let major = numeric_field(fields.next(), s)?;
        let minor = numeric_field(fields.next(), s)?;
        let patch = numeric_field(fields.next(), s)?;
        if fields.next().is_some() {
            return Err(SemverError::InvalidVersion(format!(
                "too many version fields in '{s}'"
            )));
        }

        if let Some(pre) = prerelease {
            validate_identifiers(pre).map_err(SemverError::InvalidPrerelease)?;
        }
        if let Some(meta) = build {
            validate_identifiers(meta)
                .map_err(|bad| SemverError::InvalidVersion(format!("bad build metadata: {bad}")))?;
        }

        Ok(Version {
            major,
            minor,
            patch,
            prerelease: prerelease.map(String::from),
            build: build.map(String::from),
        })
    }

    /// Create a new version without pre-release or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Check if a string is a valid semver version
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Tolerant parser producing a canonical version when possible.
    ///
    /// Accepts bare integers ("109000" becomes 109000.0.0), two-component
    /// versions ("2.0" becomes 2.0.0), and trims anything after the numeric
    /// core ("1.2.3-beta" becomes 1.2.3). Returns `None` when no leading
    /// numeric component exists or a component overflows.
    pub fn coerce(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        let mut components: Vec<u64> = Vec::new();
        let mut current = String::new();

        for ch in s.chars() {
            if ch.is_ascii_digit() {
                current.push(ch);
            } else if ch == '.' && !current.is_empty() && components.len() < 2 {
                components.push(current.parse().ok()?);
                current.clear();
            } else {
                break;
            }
        }
        if !current.is_empty() {
            components.push(current.parse().ok()?);
        }

        let mut parts = components.into_iter();
        let major = parts.next()?;
        let minor = parts.next().unwrap_or(0);
        let patch = parts.next().unwrap_or(0);

        Some(Version::new(major, minor, patch))
    }
}

/// One numeric field of the MAJOR.MINOR.PATCH core
fn numeric_field(field: Option<&str>, source: &str) -> Result<u64, SemverError> {
    field.and_then(|f| f.parse().ok()).ok_or_else(|| {
        SemverError::InvalidVersion(format!("expected numeric MAJOR.MINOR.PATCH in '{source}'"))
    })
}

/// One numeric field of a wildcard pattern
fn wildcard_field(field: &str, source: &str) -> Result<u64, SemverError> {
    field
        .parse()
        .map_err(|_| SemverError::InvalidConstraint(format!("bad wildcard '{source}'")))
}

/// Validate dot-separated identifiers (pre-release or build metadata)
fn validate_identifiers(s: &str) -> Result<(), String> {
    for ident in s.split('.') {
        if ident.is_empty() {
            return Err(format!("empty identifier in '{}'", s));
        }
        if !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("illegal character in '{}'", ident));
        }
    }
    Ok(())
}

/// Compare dot-separated pre-release identifiers by semver precedence.
///
/// Numeric identifiers compare numerically and sort below alphanumeric ones;
/// when one set of identifiers is a prefix of the other, the shorter sorts
/// first.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.minor.cmp(&other.minor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.patch.cmp(&other.patch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A pre-release sorts below the matching release; build metadata is
        // ignored for precedence.
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A single version comparator
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    /// Pin to one version, with or without a leading `=`
    Exact(Version),

    /// `^`: anything sharing the anchor's leftmost non-zero field
    Caret(Version),

    /// `~`: patch-level movement above the anchor
    Tilde(Version),

    GreaterThan(Version),
    GreaterThanOrEqual(Version),
    LessThan(Version),
    LessThanOrEqual(Version),

    /// `1.*` or `1.2.*`
    Wildcard(u64, Option<u64>),

    /// `*`
    Any,
}

impl Comparator {
    /// Parse a single comparator
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let s = s.trim();

        // Peel an operator prefix, longest first; the remainder is always a
        // plain version.
        let operators: [(&str, fn(Version) -> Comparator); 7] = [
            (">=", Comparator::GreaterThanOrEqual),
            ("<=", Comparator::LessThanOrEqual),
            (">", Comparator::GreaterThan),
            ("<", Comparator::LessThan),
            ("^", Comparator::Caret),
            ("~", Comparator::Tilde),
            ("=", Comparator::Exact),
        ];
        for (prefix, build) in operators {
            if let Some(rest) = s.strip_prefix(prefix) {
                return Ok(build(Version::parse(rest)?));
            }
        }

        // No operator: either a wildcard pattern or a bare exact version.
        if s.contains('*') {
            Self::parse_wildcard(s)
        } else {
            Ok(Comparator::Exact(Version::parse(s)?))
        }
    }

    /// Parse `*`, `MAJOR.*`, or `MAJOR.MINOR.*`
    fn parse_wildcard(s: &str) -> Result<Self, SemverError> {
        let fields: Vec<&str> = s.split('.').collect();

        match fields.as_slice() {
            ["*"] => Ok(Comparator::Any),
            [major, "*"] => Ok(Comparator::Wildcard(wildcard_field(major, s)?, None)),
            [major, minor, "*"] => Ok(Comparator::Wildcard(
                wildcard_field(major, s)?,
                Some(wildcard_field(minor, s)?),
            )),
            _ => Err(SemverError::InvalidConstraint(format!(
                "bad wildcard '{s}'"
            ))),
        }
    }

    /// Check if a version satisfies this comparator
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Comparator::Any => true,

            Comparator::Exact(v) => {
                (version.major, version.minor, version.patch, &version.prerelease)
                    == (v.major, v.minor, v.patch, &v.prerelease)
            }

            Comparator::Caret(low) | Comparator::Tilde(low) => self
                .range_ceiling()
                .is_some_and(|cap| version >= low && *version < cap),

            Comparator::GreaterThan(v) => version > v,
            Comparator::GreaterThanOrEqual(v) => version >= v,
            Comparator::LessThan(v) => version < v,
            Comparator::LessThanOrEqual(v) => version <= v,

            Comparator::Wildcard(major, minor) => {
                version.major == *major && minor.map_or(true, |m| version.minor == m)
            }
        }
    }

    /// The exclusive upper bound a caret or tilde comparator implies: caret
    /// bumps the leftmost non-zero field, tilde always bumps the minor.
    fn range_ceiling(&self) -> Option<Version> {
        match self {
            Comparator::Caret(v) if v.major > 0 => Some(Version::new(v.major + 1, 0, 0)),
            Comparator::Caret(v) if v.minor > 0 => Some(Version::new(0, v.minor + 1, 0)),
            Comparator::Caret(v) => Some(Version::new(0, 0, v.patch + 1)),
            Comparator::Tilde(v) => Some(Version::new(v.major, v.minor + 1, 0)),
            _ => None,
        }
    }

    /// The version this comparator is anchored on, if any
    fn anchor(&self) -> Option<&Version> {
        match self {
            Comparator::Exact(v)
            | Comparator::Caret(v)
            | Comparator::Tilde(v)
            | Comparator::GreaterThan(v)
            | Comparator::GreaterThanOrEqual(v)
            | Comparator::LessThan(v)
            | Comparator::LessThanOrEqual(v) => Some(v),
            Comparator::Wildcard(..) | Comparator::Any => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, anchor) = match self {
            Comparator::Any => return f.write_str("*"),
            Comparator::Wildcard(major, None) => return write!(f, "{major}.*"),
            Comparator::Wildcard(major, Some(minor)) => return write!(f, "{major}.{minor}.*"),
            Comparator::Exact(v) => ("", v),
            Comparator::Caret(v) => ("^", v),
            Comparator::Tilde(v) => ("~", v),
            Comparator::GreaterThan(v) => (">", v),
            Comparator::GreaterThanOrEqual(v) => (">=", v),
            Comparator::LessThan(v) => ("<", v),
            Comparator::LessThanOrEqual(v) => ("<=", v),
        };
        write!(f, "{prefix}{anchor}")
    }
}

/// A version range: a whitespace-separated conjunction of comparators.
///
/// `">=1.0.0 <2.0.0"` matches versions satisfying both comparators; a single
/// comparator string (`"^1.2.0"`, `"1.0.1"`) is a one-element range.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    comparators: Vec<Comparator>,
}

impl Range {
    /// Parse a range expression
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let comparators: Vec<Comparator> = s
            .split_whitespace()
            .map(Comparator::parse)
            .collect::<Result<_, _>>()?;

        if comparators.is_empty() {
            return Err(SemverError::InvalidConstraint(format!(
                "Empty constraint: '{}'",
                s
            )));
        }

        Ok(Range { comparators })
    }

    /// Check if a version satisfies every comparator in this range.
    ///
    /// A pre-release version only matches when some comparator is anchored on
    /// a pre-release of the same MAJOR.MINOR.PATCH triple.
    pub fn matches(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(version)) {
            return false;
        }

        if version.prerelease.is_some() {
            return self.comparators.iter().any(|c| {
                c.anchor().is_some_and(|a| {
                    a.prerelease.is_some()
                        && a.major == version.major
                        && a.minor == version.minor
                        && a.patch == version.patch
                })
            });
        }

        true
    }

    /// Check if a version satisfies every range in a set (conjunction)
    pub fn matches_all(version: &Version, ranges: &[Range]) -> bool {
        ranges.iter().all(|r| r.matches(version))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.comparators.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
