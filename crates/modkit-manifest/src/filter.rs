//! Boolean selection filters.
//!
//! Requirements carry their attribute constraints as a filter tree that
//! also serializes to the canonical `filter` directive text. The text
//! grammar is `( '&' f+ | '|' f+ | '!' f | '(' attr op value ')' )`
//! with op one of `=`, `~=`, `>=`, `<=`; `(*)` matches everything.
//! Parsing the rendered form of any built filter yields a structurally
//! equal tree.

use crate::errors::SyntaxError;
use crate::values::{AttrValue, Attrs};
use crate::version::{Bound, Version, VersionRange};
use ahash::AHashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Approx,
    Gte,
    Lte,
}

impl FilterOp {
    fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Approx => "~=",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Leaf {
        attr: Arc<str>,
        op: FilterOp,
        value: Arc<str>,
    },
    MatchAll,
}

impl Filter {
    pub fn leaf(attr: &str, op: FilterOp, value: &str) -> Self {
        Self::Leaf {
            attr: Arc::from(attr),
            op,
            value: Arc::from(value),
        }
    }

    /// Build the constraint tree for one attribute map. Version ranges
    /// expand into their bound comparisons; everything else becomes an
    /// equality leaf. A single constraint stays a bare leaf, an empty
    /// map matches everything.
    pub fn from_attrs(attrs: &Attrs) -> Self {
        let mut parts: Vec<Filter> = Vec::new();
        for (key, value) in attrs.iter() {
            match value {
                AttrValue::Range(range) => {
                    parts.push(Self::left_bound(key, range));
                    if let Some(right) = Self::right_bound(key, range) {
                        parts.push(right);
                    }
                }
                other => parts.push(Self::leaf(key, FilterOp::Eq, &other.to_string())),
            }
        }
        match parts.len() {
            0 => Self::MatchAll,
            1 => parts.swap_remove(0),
            _ => Self::And(parts),
        }
    }

    fn left_bound(key: &str, range: &VersionRange) -> Self {
        let text = range.left().to_string();
        match range.left_bound() {
            Bound::Closed => Self::leaf(key, FilterOp::Gte, &text),
            Bound::Open => Self::Not(Box::new(Self::leaf(key, FilterOp::Lte, &text))),
        }
    }

    fn right_bound(key: &str, range: &VersionRange) -> Option<Self> {
        let (right, bound) = range.right()?;
        let text = right.to_string();
        Some(match bound {
            Bound::Closed => Self::leaf(key, FilterOp::Lte, &text),
            Bound::Open => Self::Not(Box::new(Self::leaf(key, FilterOp::Gte, &text))),
        })
    }

    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let chars: Vec<char> = text.trim().chars().collect();
        let mut pos = 0usize;
        let filter = parse_subfilter(text, &chars, &mut pos)?;
        skip_whitespace(&chars, &mut pos);
        if pos != chars.len() {
            return Err(invalid(text, "trailing characters after filter"));
        }
        Ok(filter)
    }

    /// Evaluate against a flat property map. Comparisons fall back from
    /// version semantics to plain strings when either side does not
    /// parse as a version; `~=` folds case and surrounding whitespace.
    pub fn matches_props(&self, props: &AHashMap<String, String>) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|f| f.matches_props(props)),
            Self::Or(parts) => parts.iter().any(|f| f.matches_props(props)),
            Self::Not(inner) => !inner.matches_props(props),
            Self::MatchAll => true,
            Self::Leaf { attr, op, value } => props
                .get(attr.as_ref())
                .is_some_and(|actual| leaf_matches(actual, *op, value)),
        }
    }
}

fn leaf_matches(actual: &str, op: FilterOp, expected: &str) -> bool {
    match op {
        FilterOp::Approx => actual.trim().eq_ignore_ascii_case(expected.trim()),
        FilterOp::Eq => {
            // Only an explicit interval literal is a containment test
            // against a version property, as native os-version matching
            // needs. A bare value is never treated as a range floor.
            if expected.starts_with(['[', '(']) {
                match (expected.parse::<VersionRange>(), actual.parse::<Version>()) {
                    (Ok(range), Ok(version)) => range.contains(&version),
                    _ => actual == expected,
                }
            } else {
                actual == expected
            }
        }
        FilterOp::Gte | FilterOp::Lte => {
            let ordering = match (actual.parse::<Version>(), expected.parse::<Version>()) {
                (Ok(a), Ok(e)) => a.cmp(&e),
                _ => actual.cmp(expected),
            };
            match op {
                FilterOp::Gte => ordering.is_ge(),
                _ => ordering.is_le(),
            }
        }
    }
}

fn invalid(text: &str, reason: &str) -> SyntaxError {
    SyntaxError::InvalidFilter {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
        *pos += 1;
    }
}

fn parse_subfilter(text: &str, chars: &[char], pos: &mut usize) -> Result<Filter, SyntaxError> {
    skip_whitespace(chars, pos);
    if chars.get(*pos) != Some(&'(') {
        return Err(invalid(text, "expected '('"));
    }
    *pos += 1;
    skip_whitespace(chars, pos);
    let filter = match chars.get(*pos) {
        Some('&') => {
            *pos += 1;
            Filter::And(parse_list(text, chars, pos)?)
        }
        Some('|') => {
            *pos += 1;
            Filter::Or(parse_list(text, chars, pos)?)
        }
        Some('!') => {
            *pos += 1;
            Filter::Not(Box::new(parse_subfilter(text, chars, pos)?))
        }
        Some('*') if chars.get(*pos + 1) == Some(&')') => {
            *pos += 1;
            Filter::MatchAll
        }
        Some(_) => parse_leaf(text, chars, pos)?,
        None => return Err(invalid(text, "unexpected end of filter")),
    };
    skip_whitespace(chars, pos);
    if chars.get(*pos) != Some(&')') {
        return Err(invalid(text, "expected ')'"));
    }
    *pos += 1;
    Ok(filter)
}

fn parse_list(text: &str, chars: &[char], pos: &mut usize) -> Result<Vec<Filter>, SyntaxError> {
    let mut parts = Vec::new();
    loop {
        parts.push(parse_subfilter(text, chars, pos)?);
        skip_whitespace(chars, pos);
        if chars.get(*pos) != Some(&'(') {
            break;
        }
    }
    Ok(parts)
}

fn parse_leaf(text: &str, chars: &[char], pos: &mut usize) -> Result<Filter, SyntaxError> {
    let mut attr = String::new();
    loop {
        match chars.get(*pos) {
            Some('=' | '~' | '<' | '>') => break,
            Some(')' | '(') | None => return Err(invalid(text, "missing operator")),
            Some(c) => {
                attr.push(*c);
                *pos += 1;
            }
        }
    }
    let op = match chars.get(*pos) {
        Some('=') => {
            *pos += 1;
            FilterOp::Eq
        }
        Some(c @ ('~' | '<' | '>')) => {
            let op = match c {
                '~' => FilterOp::Approx,
                '>' => FilterOp::Gte,
                _ => FilterOp::Lte,
            };
            if chars.get(*pos + 1) != Some(&'=') {
                return Err(invalid(text, "invalid operator"));
            }
            *pos += 2;
            op
        }
        _ => return Err(invalid(text, "invalid operator")),
    };
    let attr = attr.trim().to_string();
    if attr.is_empty() {
        return Err(invalid(text, "missing attribute name"));
    }

    let mut value = String::new();
    loop {
        match chars.get(*pos) {
            Some(')') => break,
            Some('(') | None => return Err(invalid(text, "unterminated value")),
            Some('\\') => {
                let Some(escaped) = chars.get(*pos + 1) else {
                    return Err(invalid(text, "trailing escape in value"));
                };
                value.push(*escaped);
                *pos += 2;
            }
            Some(c) => {
                value.push(*c);
                *pos += 1;
            }
        }
    }
    Ok(Filter::leaf(&attr, op, &value))
}

fn write_escaped(out: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            out.write_str("\\")?;
        }
        write!(out, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(parts) => {
                out.write_str("(&")?;
                for part in parts {
                    write!(out, "{part}")?;
                }
                out.write_str(")")
            }
            Self::Or(parts) => {
                out.write_str("(|")?;
                for part in parts {
                    write!(out, "{part}")?;
                }
                out.write_str(")")
            }
            Self::Not(inner) => write!(out, "(!{inner})"),
            Self::Leaf { attr, op, value } => {
                write!(out, "({attr}{}", op.token())?;
                write_escaped(out, value)?;
                out.write_str(")")
            }
            Self::MatchAll => out.write_str("(*)"),
        }
    }
}
