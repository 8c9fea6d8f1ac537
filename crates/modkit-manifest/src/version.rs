//! Version and version-range value types.
//!
//! A version is `major[.minor[.micro[.qualifier]]]` with missing parts
//! defaulting to zero/empty; ordering is lexicographic over all four
//! fields with the qualifier compared as a plain string. A range is
//! either a bare version (meaning "at least", left-closed, unbounded
//! above) or an explicit interval with `[`/`(` and `]`/`)` markers.

use crate::errors::SyntaxError;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An immutable module or package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: Arc<str>,
}

impl Version {
    pub const EMPTY: &'static str = "0.0.0";

    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Version {
            major,
            minor,
            micro,
            qualifier: Arc::from(""),
        }
    }

    pub fn with_qualifier(
        major: u32,
        minor: u32,
        micro: u32,
        qualifier: &str,
    ) -> Result<Self, SyntaxError> {
        validate_qualifier(qualifier, qualifier)?;
        Ok(Version {
            major,
            minor,
            micro,
            qualifier: Arc::from(qualifier),
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Parse a version string. Missing trailing parts default to zero
    /// and the empty qualifier.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid_version(text, "empty version"));
        }

        let mut parts = trimmed.split('.');
        let major = parse_segment(parts.next(), text)?;
        let minor = match parts.next() {
            Some(s) => parse_segment(Some(s), text)?,
            None => 0,
        };
        let micro = match parts.next() {
            Some(s) => parse_segment(Some(s), text)?,
            None => 0,
        };
        let qualifier = match parts.next() {
            Some(q) => {
                validate_qualifier(q, text)?;
                q
            }
            None => "",
        };
        if parts.next().is_some() {
            return Err(invalid_version(text, "too many segments"));
        }
        Ok(Version {
            major,
            minor,
            micro,
            qualifier: Arc::from(qualifier),
        })
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new(0, 0, 0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.as_ref().cmp(other.qualifier.as_ref()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_segment(segment: Option<&str>, text: &str) -> Result<u32, SyntaxError> {
    let segment = segment.ok_or_else(|| invalid_version(text, "missing segment"))?;
    segment
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid_version(text, "non-numeric segment"))
}

fn validate_qualifier(qualifier: &str, text: &str) -> Result<(), SyntaxError> {
    let ok = qualifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(invalid_version(text, "invalid qualifier"))
    }
}

fn invalid_version(text: &str, reason: &str) -> SyntaxError {
    SyntaxError::InvalidVersion {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

/// Inclusivity marker for a range bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Closed,
    Open,
}

/// An interval over [`Version`]s, possibly unbounded above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    left: Version,
    left_bound: Bound,
    right: Option<(Version, Bound)>,
}

impl VersionRange {
    /// The "at least" range: `>= floor`, unbounded above, left-closed.
    pub fn at_least(floor: Version) -> Self {
        VersionRange {
            left: floor,
            left_bound: Bound::Closed,
            right: None,
        }
    }

    pub fn interval(left: Version, left_bound: Bound, right: Version, right_bound: Bound) -> Self {
        VersionRange {
            left,
            left_bound,
            right: Some((right, right_bound)),
        }
    }

    /// Parse either a bare version ("at least" form) or an explicit
    /// interval such as `[1.0,2.0)`.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let trimmed = text.trim();
        let first = trimmed.chars().next();
        let (left_bound, interval) = match first {
            Some('[') => (Bound::Closed, true),
            Some('(') => (Bound::Open, true),
            Some(_) => (Bound::Closed, false),
            None => return Err(invalid_range(text, "empty range")),
        };

        if !interval {
            return Ok(VersionRange::at_least(Version::parse(trimmed)?));
        }

        let right_bound = match trimmed.chars().last() {
            Some(']') => Bound::Closed,
            Some(')') => Bound::Open,
            _ => return Err(invalid_range(text, "missing closing bound marker")),
        };
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut sides = inner.splitn(2, ',');
        let left_text = sides.next().unwrap_or("");
        let right_text = sides
            .next()
            .ok_or_else(|| invalid_range(text, "interval requires two versions"))?;

        Ok(VersionRange::interval(
            Version::parse(left_text)?,
            left_bound,
            Version::parse(right_text)?,
            right_bound,
        ))
    }

    pub fn left(&self) -> &Version {
        &self.left
    }

    pub fn left_bound(&self) -> Bound {
        self.left_bound
    }

    pub fn right(&self) -> Option<(&Version, Bound)> {
        self.right.as_ref().map(|(v, b)| (v, *b))
    }

    /// Whether `version` falls inside the range, honoring bound
    /// inclusivity exactly at both ends. A degenerate interval with
    /// equal bounds where either end is open contains nothing.
    pub fn contains(&self, version: &Version) -> bool {
        let left_ok = match self.left_bound {
            Bound::Closed => *version >= self.left,
            Bound::Open => *version > self.left,
        };
        if !left_ok {
            return false;
        }
        match &self.right {
            None => true,
            Some((right, Bound::Closed)) => *version <= *right,
            Some((right, Bound::Open)) => *version < *right,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            None => write!(f, "{}", self.left),
            Some((right, right_bound)) => {
                let open = match self.left_bound {
                    Bound::Closed => '[',
                    Bound::Open => '(',
                };
                let close = match right_bound {
                    Bound::Closed => ']',
                    Bound::Open => ')',
                };
                write!(f, "{}{},{}{}", open, self.left, right, close)
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn invalid_range(text: &str, reason: &str) -> SyntaxError {
    SyntaxError::InvalidVersionRange {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}
