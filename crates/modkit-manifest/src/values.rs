//! Typed attribute values and the small insertion-ordered maps that
//! carry them.
//!
//! Clause directive/attribute maps are tiny (a handful of entries), so
//! they are backed by a `SmallVec` of pairs. Insertion order is
//! preserved deliberately: converters place the namespace-identity
//! attribute first and downstream indexing observes that order.

use crate::errors::SyntaxError;
use crate::tokenizer::split_delimited;
use crate::version::{Version, VersionRange};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Insertion-ordered string-keyed map. Replacing a value keeps the
/// key's original position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: SmallVec<[(Arc<str>, V); 4]>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap {
            entries: SmallVec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn insert(&mut self, key: Arc<str>, value: V) -> Option<V> {
        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.entries.iter().position(|(k, _)| k.as_ref() == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Arc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V: Clone> OrderedMap<V> {
    /// Copy every entry of `other` into `self`, replacing in place.
    pub fn extend_from(&mut self, other: &OrderedMap<V>) {
        for (k, v) in other.iter() {
            self.insert(k.clone(), v.clone());
        }
    }
}

impl<V> FromIterator<(Arc<str>, V)> for OrderedMap<V> {
    fn from_iter<T: IntoIterator<Item = (Arc<str>, V)>>(iter: T) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k.as_ref(), v)?;
        }
        map.end()
    }
}

/// Directive map: directive name to raw string value.
pub type Dirs = OrderedMap<Arc<str>>;

/// Attribute map: attribute name to typed value.
pub type Attrs = OrderedMap<AttrValue>;

/// A typed attribute value produced by the coercion layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(Arc<str>),
    Long(i64),
    Double(f64),
    Version(Version),
    Range(VersionRange),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn str(value: &str) -> Self {
        AttrValue::Str(Arc::from(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            AttrValue::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&VersionRange> {
        match self {
            AttrValue::Range(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{s}"),
            AttrValue::Long(n) => write!(f, "{n}"),
            AttrValue::Double(d) => write!(f, "{d}"),
            AttrValue::Version(v) => write!(f, "{v}"),
            AttrValue::Range(r) => write!(f, "{r}"),
            AttrValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Str(s) => serializer.serialize_str(s),
            AttrValue::Long(n) => serializer.serialize_i64(*n),
            AttrValue::Double(d) => serializer.serialize_f64(*d),
            AttrValue::Version(v) => v.serialize(serializer),
            AttrValue::Range(r) => r.serialize(serializer),
            AttrValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// How [`coerce_typed_attrs`] treats an unrecognized type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionMode {
    /// Unknown tags are a [`SyntaxError`].
    Strict,
    /// Unknown tags on legacy export/import clauses are downgraded to a
    /// warning and the attribute is dropped. This is the one sanctioned
    /// partial-tolerance case.
    LegacyLenient,
}

/// Convert raw attribute strings into typed values according to the
/// type tags declared on the clause (`key:Type=value`).
pub fn coerce_typed_attrs(
    attrs: &mut Attrs,
    types: &OrderedMap<Arc<str>>,
    mode: CoercionMode,
) -> Result<(), SyntaxError> {
    for (key, tag) in types.iter() {
        let raw = match attrs.get(key) {
            Some(value) => value.to_string(),
            None => continue,
        };
        match coerce_one(key, tag, &raw) {
            Ok(value) => {
                attrs.insert(key.clone(), value);
            }
            Err(SyntaxError::UnknownAttributeType { .. })
                if mode == CoercionMode::LegacyLenient =>
            {
                warn!(
                    attribute = key.as_ref(),
                    r#type = tag.as_ref(),
                    "dropping attribute with unknown type tag"
                );
                attrs.remove(key);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn coerce_one(key: &str, tag: &str, raw: &str) -> Result<AttrValue, SyntaxError> {
    match tag {
        "String" => Ok(AttrValue::str(raw)),
        "Double" => parse_double(key, raw),
        "Long" => parse_long(key, raw),
        "Version" => Ok(AttrValue::Version(Version::parse(raw.trim())?)),
        _ if tag.starts_with("List") => coerce_list(key, tag, raw),
        _ => Err(SyntaxError::UnknownAttributeType {
            key: key.to_string(),
            tag: tag.to_string(),
        }),
    }
}

fn coerce_list(key: &str, tag: &str, raw: &str) -> Result<AttrValue, SyntaxError> {
    let start = tag.find('<');
    let end = tag.find('>');
    let element_tag = match (start, end) {
        (None, None) => "String".to_string(),
        (Some(s), Some(e)) if e > s => tag[s + 1..e].trim().to_string(),
        _ => {
            return Err(SyntaxError::InvalidListType {
                key: key.to_string(),
                tag: tag.to_string(),
            })
        }
    };

    let tokens = split_delimited(raw, ",", false)?;
    let mut values = Vec::with_capacity(tokens.len());
    for token in tokens {
        let value = match element_tag.as_str() {
            "String" => AttrValue::str(&token),
            "Double" => parse_double(key, token.trim())?,
            "Long" => parse_long(key, token.trim())?,
            "Version" => AttrValue::Version(Version::parse(token.trim())?),
            _ => {
                return Err(SyntaxError::UnknownAttributeType {
                    key: key.to_string(),
                    tag: tag.to_string(),
                })
            }
        };
        values.push(value);
    }
    Ok(AttrValue::List(values))
}

fn parse_double(key: &str, raw: &str) -> Result<AttrValue, SyntaxError> {
    raw.trim()
        .parse::<f64>()
        .map(AttrValue::Double)
        .map_err(|_| SyntaxError::InvalidNumber {
            key: key.to_string(),
            tag: "Double",
            value: raw.to_string(),
        })
}

fn parse_long(key: &str, raw: &str) -> Result<AttrValue, SyntaxError> {
    raw.trim()
        .parse::<i64>()
        .map(AttrValue::Long)
        .map_err(|_| SyntaxError::InvalidNumber {
            key: key.to_string(),
            tag: "Long",
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(pairs: &[(&str, &str)]) -> OrderedMap<Arc<str>> {
        pairs
            .iter()
            .map(|(k, v)| (Arc::from(*k), Arc::from(*v)))
            .collect()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        pairs
            .iter()
            .map(|(k, v)| (Arc::from(*k), AttrValue::str(v)))
            .collect()
    }

    #[test]
    fn test_ordered_map_preserves_insertion_order() {
        let mut map: OrderedMap<i32> = OrderedMap::new();
        map.insert(Arc::from("b"), 1);
        map.insert(Arc::from("a"), 2);
        map.insert(Arc::from("c"), 3);
        // Replacing keeps position.
        map.insert(Arc::from("a"), 9);
        let keys: Vec<&str> = map.keys().map(|k| k.as_ref()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(map.get("a"), Some(&9));
    }

    #[test]
    fn test_coerce_scalar_types() {
        let mut a = attrs(&[("size", "42"), ("weight", "1.5"), ("v", "1.2.3")]);
        let t = types(&[("size", "Long"), ("weight", "Double"), ("v", "Version")]);
        assert!(coerce_typed_attrs(&mut a, &t, CoercionMode::Strict).is_ok());
        assert_eq!(a.get("size"), Some(&AttrValue::Long(42)));
        assert_eq!(a.get("weight"), Some(&AttrValue::Double(1.5)));
        assert_eq!(
            a.get("v"),
            Some(&AttrValue::Version(Version::new(1, 2, 3)))
        );
    }

    #[test]
    fn test_coerce_list_types() {
        let mut a = attrs(&[("names", "a, b ,c"), ("nums", "1,2,3")]);
        let t = types(&[("names", "List<String>"), ("nums", "List<Long>")]);
        assert!(coerce_typed_attrs(&mut a, &t, CoercionMode::Strict).is_ok());
        // String list elements keep their surrounding whitespace.
        assert_eq!(
            a.get("names"),
            Some(&AttrValue::List(vec![
                AttrValue::str("a"),
                AttrValue::str(" b "),
                AttrValue::str("c"),
            ]))
        );
        assert_eq!(
            a.get("nums"),
            Some(&AttrValue::List(vec![
                AttrValue::Long(1),
                AttrValue::Long(2),
                AttrValue::Long(3),
            ]))
        );
    }

    #[test]
    fn test_bare_list_defaults_to_string() {
        let mut a = attrs(&[("names", "x,y")]);
        let t = types(&[("names", "List")]);
        assert!(coerce_typed_attrs(&mut a, &t, CoercionMode::Strict).is_ok());
        assert_eq!(
            a.get("names"),
            Some(&AttrValue::List(vec![
                AttrValue::str("x"),
                AttrValue::str("y"),
            ]))
        );
    }

    #[test]
    fn test_malformed_list_brackets() {
        let mut a = attrs(&[("names", "x")]);
        for bad in ["List<String", "List>String<", "ListString>"] {
            let t = types(&[("names", bad)]);
            assert!(
                coerce_typed_attrs(&mut a.clone(), &t, CoercionMode::Strict).is_err(),
                "tag {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_numeric_long_is_syntax_error() {
        let mut a = attrs(&[("size", "large")]);
        let t = types(&[("size", "Long")]);
        let err = coerce_typed_attrs(&mut a, &t, CoercionMode::Strict);
        assert!(matches!(err, Err(SyntaxError::InvalidNumber { .. })));
    }

    #[test]
    fn test_unknown_tag_strict_vs_lenient() {
        let t = types(&[("x", "Blob")]);

        let mut strict = attrs(&[("x", "1")]);
        assert!(matches!(
            coerce_typed_attrs(&mut strict, &t, CoercionMode::Strict),
            Err(SyntaxError::UnknownAttributeType { .. })
        ));

        let mut lenient = attrs(&[("x", "1"), ("y", "2")]);
        assert!(coerce_typed_attrs(&mut lenient, &t, CoercionMode::LegacyLenient).is_ok());
        assert!(lenient.get("x").is_none());
        assert!(lenient.get("y").is_some());
    }
}
