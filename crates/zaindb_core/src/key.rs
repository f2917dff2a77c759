//! Keys and key paths.
//!
//! Keys are totally ordered across types:
//!
//! ```text
//! Number < String < Binary < Array
//! ```
//!
//! Arrays compare element by element; a strict prefix sorts first. This
//! is the order every table and index iterates in.

use ciborium::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Largest integer a `Number` key holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A valid key.
///
/// Construct numeric keys through `From`, which folds `-0.0` into `0.0`.
/// `NaN` is never a valid key; [`Key::from_value`] rejects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    /// Numeric key.
    Number(f64),
    /// Text key.
    String(String),
    /// Byte-string key.
    Binary(Vec<u8>),
    /// Compound key.
    Array(Vec<Key>),
}

impl Key {
    /// Builds a compound key.
    pub fn array<I, K>(parts: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Self::Array(parts.into_iter().map(Into::into).collect())
    }

    /// Converts a stored value into a key.
    ///
    /// Returns `None` for values that are not valid keys: `NaN`, booleans,
    /// maps, null, or arrays containing any of those.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => {
                let n = i128::from(*n) as f64;
                Some(Self::from(n))
            }
            Value::Float(f) if !f.is_nan() => Some(Self::from(*f)),
            Value::Text(s) => Some(Self::String(s.clone())),
            Value::Bytes(b) => Some(Self::Binary(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            _ => None,
        }
    }

    /// Converts the key back into a value, using integers where exact.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                    Value::Integer((*n as i64).into())
                } else {
                    Value::Float(*n)
                }
            }
            Self::String(s) => Value::Text(s.clone()),
            Self::Binary(b) => Value::Bytes(b.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    /// Returns the numeric value, if this is a number key.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integral number key.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        self.as_number()
            .filter(|n| n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER)
            .map(|n| n as i64)
    }

    /// Returns `true` for `0` and the empty string.
    ///
    /// Range bounds that are falsy leave a query unconstrained.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Number(n) => *n == 0.0,
            Self::String(s) => s.is_empty(),
            Self::Binary(_) | Self::Array(_) => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::String(_) => 1,
            Self::Binary(_) => 2,
            Self::Array(_) => 3,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        // -0.0 and 0.0 are the same key
        Self::Number(if n == 0.0 { 0.0 } else { n })
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::from(n as f64)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self::from(f64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Self::from(f64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => match self.as_integer() {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Self::String(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Outcome of evaluating a key path against a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyLookup {
    /// Path resolved to a valid key.
    Found(Key),
    /// Some attribute on the path is absent or null.
    Missing,
    /// Path resolved to something that is not a valid key.
    Invalid,
}

/// Where a table or index finds its key inside a record.
///
/// Dotted paths (`"author.mail"`) walk nested maps. A compound path yields
/// an array key built from each attribute in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyPath {
    /// Keys are supplied out of line.
    #[default]
    None,
    /// One attribute.
    Single(String),
    /// Several attributes forming an array key.
    Compound(Vec<String>),
}

impl KeyPath {
    /// Builds a path from attribute names: one name gives a single path,
    /// several give a compound path.
    pub fn from_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        match attributes.len() {
            0 => Self::None,
            1 => Self::Single(attributes.remove(0)),
            _ => Self::Compound(attributes),
        }
    }

    /// Returns `true` if keys are supplied out of line.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Evaluates the path, returning the key if one is found.
    #[must_use]
    pub fn evaluate(&self, value: &Value) -> Option<Key> {
        match self.lookup(value) {
            KeyLookup::Found(key) => Some(key),
            KeyLookup::Missing | KeyLookup::Invalid => None,
        }
    }

    pub(crate) fn lookup(&self, value: &Value) -> KeyLookup {
        match self {
            Self::None => KeyLookup::Missing,
            Self::Single(path) => lookup_one(value, path),
            Self::Compound(paths) => {
                let mut parts = Vec::with_capacity(paths.len());
                for path in paths {
                    match lookup_one(value, path) {
                        KeyLookup::Found(key) => parts.push(key),
                        other => return other,
                    }
                }
                KeyLookup::Found(Key::Array(parts))
            }
        }
    }

    /// Writes `key` into `value` at this path.
    ///
    /// Used to stamp generated keys into records. Only single paths can be
    /// injected, and every map on the way must already exist.
    pub(crate) fn inject(&self, value: &mut Value, key: &Key) -> CoreResult<()> {
        let Self::Single(path) = self else {
            return Err(CoreError::data("generated keys need a single key path"));
        };

        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments
            .pop()
            .ok_or_else(|| CoreError::data("empty key path"))?;

        let mut target = value;
        for segment in segments {
            target = field_mut(target, segment)
                .ok_or_else(|| CoreError::data(format!("no object at '{segment}' in key path")))?;
        }

        let Value::Map(entries) = target else {
            return Err(CoreError::data("cannot store a generated key in a non-object record"));
        };

        match entries
            .iter_mut()
            .find(|(k, _)| matches!(k, Value::Text(name) if name == leaf))
        {
            Some((_, slot)) => *slot = key.to_value(),
            None => entries.push((Value::Text(leaf.to_string()), key.to_value())),
        }
        Ok(())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "<none>"),
            Self::Single(path) => f.write_str(path),
            Self::Compound(paths) => f.write_str(&paths.join(",")),
        }
    }
}

fn lookup_one(value: &Value, path: &str) -> KeyLookup {
    let mut current = value;
    if !path.is_empty() {
        for segment in path.split('.') {
            match field(current, segment) {
                Some(next) => current = next,
                None => return KeyLookup::Missing,
            }
        }
    }

    if current.is_null() {
        return KeyLookup::Missing;
    }
    Key::from_value(current).map_or(KeyLookup::Invalid, KeyLookup::Found)
}

fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Text(key) if key == name))
            .map(|(_, v)| v),
        _ => None,
    }
}

fn field_mut<'a>(value: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    match value {
        Value::Map(entries) => entries
            .iter_mut()
            .find(|(k, _)| matches!(k, Value::Text(key) if key == name))
            .map(|(_, v)| v),
        _ => None,
    }
}
