//! Key ranges and the typed range query algebra.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// A contiguous interval over the key order.
///
/// A missing bound is unbounded on that side. Ranges whose lower bound
/// lies above their upper bound, or that exclude their only key, are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
    lower_open: bool,
    upper_open: bool,
}

impl KeyRange {
    /// Matches exactly `key`.
    #[must_use]
    pub fn only(key: Key) -> Self {
        Self {
            lower: Some(key.clone()),
            upper: Some(key),
            lower_open: false,
            upper_open: false,
        }
    }

    /// Matches keys above `key`, excluding it when `open`.
    #[must_use]
    pub fn lower_bound(key: Key, open: bool) -> Self {
        Self {
            lower: Some(key),
            upper: None,
            lower_open: open,
            upper_open: false,
        }
    }

    /// Matches keys below `key`, excluding it when `open`.
    #[must_use]
    pub fn upper_bound(key: Key, open: bool) -> Self {
        Self {
            lower: None,
            upper: Some(key),
            lower_open: false,
            upper_open: open,
        }
    }

    /// Matches keys between `lower` and `upper`.
    #[must_use]
    pub fn bound(lower: Key, upper: Key, lower_open: bool, upper_open: bool) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
            lower_open,
            upper_open,
        }
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn lower(&self) -> Option<&Key> {
        self.lower.as_ref()
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn upper(&self) -> Option<&Key> {
        self.upper.as_ref()
    }

    /// Returns `true` if the lower bound is excluded.
    #[must_use]
    pub const fn lower_open(&self) -> bool {
        self.lower_open
    }

    /// Returns `true` if the upper bound is excluded.
    #[must_use]
    pub const fn upper_open(&self) -> bool {
        self.upper_open
    }

    /// Returns `true` if no key can fall inside the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => {
                lower > upper || (lower == upper && (self.lower_open || self.upper_open))
            }
            _ => false,
        }
    }

    /// Returns `true` if `key` falls inside the range.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Some(lower) if self.lower_open => key > lower,
            Some(lower) => key >= lower,
            None => true,
        };
        let below = match &self.upper {
            Some(upper) if self.upper_open => key < upper,
            Some(upper) => key <= upper,
            None => true,
        };
        above && below
    }

    /// Bounds suitable for `BTreeMap::range`, or `None` if the range is empty.
    pub(crate) fn bounds(&self) -> Option<(Bound<&Key>, Bound<&Key>)> {
        if self.is_empty() {
            return None;
        }
        let lower = match &self.lower {
            Some(key) if self.lower_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
            None => Bound::Unbounded,
        };
        let upper = match &self.upper {
            Some(key) if self.upper_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
            None => Bound::Unbounded,
        };
        Some((lower, upper))
    }
}

impl From<Key> for KeyRange {
    fn from(key: Key) -> Self {
        Self::only(key)
    }
}

/// The four range shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeKind {
    /// Exactly one key.
    Only,
    /// Everything above a key.
    LowerBound,
    /// Everything below a key.
    UpperBound,
    /// Everything between two keys.
    Bound,
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Only => "ONLY",
            Self::LowerBound => "LOWER_BOUND",
            Self::UpperBound => "UPPER_BOUND",
            Self::Bound => "BOUND",
        };
        f.write_str(name)
    }
}

impl FromStr for RangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ONLY" => Ok(Self::Only),
            "LOWER_BOUND" | "LOWER" => Ok(Self::LowerBound),
            "UPPER_BOUND" | "UPPER" => Ok(Self::UpperBound),
            "BOUND" => Ok(Self::Bound),
            other => Err(format!("unknown range kind: {other}")),
        }
    }
}

/// A typed range request against an index.
///
/// Each variant carries only the fields it uses, so an `Only` query cannot
/// be given a stray upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// Exactly `value`.
    Only {
        /// The key to match.
        value: Key,
    },
    /// Keys above `lower`.
    LowerBound {
        /// Lower bound.
        lower: Key,
        /// Exclude `lower` itself.
        exclusive: bool,
    },
    /// Keys below `upper`.
    UpperBound {
        /// Upper bound.
        upper: Key,
        /// Exclude `upper` itself.
        exclusive: bool,
    },
    /// Keys between `lower` and `upper`.
    Bound {
        /// Lower bound.
        lower: Key,
        /// Upper bound.
        upper: Key,
        /// Exclude `lower` itself.
        lower_exclusive: bool,
        /// Exclude `upper` itself.
        upper_exclusive: bool,
    },
}

impl RangeSpec {
    /// Returns the shape of this request.
    #[must_use]
    pub const fn kind(&self) -> RangeKind {
        match self {
            Self::Only { .. } => RangeKind::Only,
            Self::LowerBound { .. } => RangeKind::LowerBound,
            Self::UpperBound { .. } => RangeKind::UpperBound,
            Self::Bound { .. } => RangeKind::Bound,
        }
    }

    /// Maps the request to a key range.
    ///
    /// Returns `None` when a bound the shape needs is falsy (`0` or the
    /// empty string). Callers scan unconstrained in that case, so a filter
    /// on id `0` returns every record.
    #[must_use]
    pub fn to_key_range(&self) -> Option<KeyRange> {
        match self {
            Self::Only { value } => live(value).map(|v| KeyRange::only(v.clone())),
            Self::LowerBound { lower, exclusive } => {
                live(lower).map(|l| KeyRange::lower_bound(l.clone(), *exclusive))
            }
            Self::UpperBound { upper, exclusive } => {
                live(upper).map(|u| KeyRange::upper_bound(u.clone(), *exclusive))
            }
            Self::Bound {
                lower,
                upper,
                lower_exclusive,
                upper_exclusive,
            } => match (live(lower), live(upper)) {
                (Some(l), Some(u)) => Some(KeyRange::bound(
                    l.clone(),
                    u.clone(),
                    *lower_exclusive,
                    *upper_exclusive,
                )),
                _ => None,
            },
        }
    }
}

fn live(key: &Key) -> Option<&Key> {
    (!key.is_falsy()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn keys(range: &KeyRange, map: &BTreeMap<Key, ()>) -> Vec<i64> {
        match range.bounds() {
            Some(bounds) => map
                .range::<Key, _>(bounds)
                .filter_map(|(k, _)| k.as_integer())
                .collect(),
            None => Vec::new(),
        }
    }

    fn sample() -> BTreeMap<Key, ()> {
        (1..=6).map(|i| (Key::from(i), ())).collect()
    }

    #[test]
    fn only_matches_single_key() {
        let range = KeyRange::only(Key::from(3));
        assert!(range.contains(&Key::from(3)));
        assert!(!range.contains(&Key::from(4)));
        assert_eq!(keys(&range, &sample()), vec![3]);
    }

    #[test]
    fn half_open_bounds() {
        let map = sample();
        assert_eq!(keys(&KeyRange::lower_bound(Key::from(4), true), &map), vec![5, 6]);
        assert_eq!(keys(&KeyRange::lower_bound(Key::from(4), false), &map), vec![4, 5, 6]);
        assert_eq!(keys(&KeyRange::upper_bound(Key::from(2), true), &map), vec![1]);
        assert_eq!(
            keys(&KeyRange::bound(Key::from(2), Key::from(5), false, true), &map),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = KeyRange::bound(Key::from(5), Key::from(2), false, false);
        assert!(range.is_empty());
        assert!(range.bounds().is_none());

        let pinched = KeyRange::bound(Key::from(3), Key::from(3), true, false);
        assert!(pinched.is_empty());
        assert!(!pinched.contains(&Key::from(3)));
    }

    #[test]
    fn falsy_bounds_are_unconstrained() {
        let spec = RangeSpec::Only { value: Key::from(0) };
        assert_eq!(spec.to_key_range(), None);

        let spec = RangeSpec::Bound {
            lower: Key::from(""),
            upper: Key::from("m"),
            lower_exclusive: false,
            upper_exclusive: false,
        };
        assert_eq!(spec.to_key_range(), None);

        let spec = RangeSpec::LowerBound {
            lower: Key::from(2),
            exclusive: true,
        };
        assert_eq!(
            spec.to_key_range(),
            Some(KeyRange::lower_bound(Key::from(2), true))
        );
    }

    #[test]
    fn kind_names() {
        let spec = RangeSpec::UpperBound {
            upper: Key::from(9),
            exclusive: false,
        };
        assert_eq!(spec.kind(), RangeKind::UpperBound);
        assert_eq!(spec.kind().to_string(), "UPPER_BOUND");
        assert_eq!("lower-bound".parse::<RangeKind>(), Ok(RangeKind::LowerBound));
        assert!("sideways".parse::<RangeKind>().is_err());
    }
}
