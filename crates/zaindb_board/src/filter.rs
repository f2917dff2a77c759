//! Message search filters.
//!
//! A [`MessageFilter`] names at most one criterion that is actually used.
//! Name and mail together win, then name, mail, content and time on their
//! own, and finally the [`IdFilter`].
//!
//! Id filters read and print in interval notation:
//!
//! | expression | range |
//! |------------|-------|
//! | `5`        | only 5 |
//! | `[3, 7)`   | 3 ≤ id < 7 |
//! | `(3, ~]`   | id > 3 |
//! | `[~, 7]`   | id ≤ 7 |

use crate::error::{BoardError, BoardResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zaindb_core::{Key, RangeKind, RangeSpec};

/// Composite index covering name and mail.
const NAME_MAIL_INDEX: &str = "name,mail";

/// A range over message ids.
///
/// Only the fields the [`range_type`](Self::range_type) uses matter; the
/// others are kept so an editor can switch shapes without losing input.
/// A missing bound counts as `0`, which leaves the search unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdFilter {
    /// Which bounds apply.
    pub range_type: RangeKind,
    /// The id for [`RangeKind::Only`].
    #[serde(default)]
    pub id: Option<i64>,
    /// Lower bound.
    #[serde(default)]
    pub lower_id: Option<i64>,
    /// Exclude the lower bound itself.
    #[serde(default)]
    pub lower_id_open: bool,
    /// Upper bound.
    #[serde(default)]
    pub upper_id: Option<i64>,
    /// Exclude the upper bound itself.
    #[serde(default)]
    pub upper_id_open: bool,
}

impl IdFilter {
    /// Matches one id.
    #[must_use]
    pub const fn only(id: i64) -> Self {
        Self {
            range_type: RangeKind::Only,
            id: Some(id),
            lower_id: None,
            lower_id_open: false,
            upper_id: None,
            upper_id_open: false,
        }
    }

    /// Matches ids above `lower`.
    #[must_use]
    pub const fn at_least(lower: i64, open: bool) -> Self {
        Self {
            range_type: RangeKind::LowerBound,
            id: None,
            lower_id: Some(lower),
            lower_id_open: open,
            upper_id: None,
            upper_id_open: false,
        }
    }

    /// Matches ids below `upper`.
    #[must_use]
    pub const fn at_most(upper: i64, open: bool) -> Self {
        Self {
            range_type: RangeKind::UpperBound,
            id: None,
            lower_id: None,
            lower_id_open: false,
            upper_id: Some(upper),
            upper_id_open: open,
        }
    }

    /// Matches ids between `lower` and `upper`.
    #[must_use]
    pub const fn between(lower: i64, upper: i64, lower_open: bool, upper_open: bool) -> Self {
        Self {
            range_type: RangeKind::Bound,
            id: None,
            lower_id: Some(lower),
            lower_id_open: lower_open,
            upper_id: Some(upper),
            upper_id_open: upper_open,
        }
    }

    /// The range request this filter stands for.
    #[must_use]
    pub fn to_range(&self) -> RangeSpec {
        let key = |id: Option<i64>| Key::from(id.unwrap_or(0));
        match self.range_type {
            RangeKind::Only => RangeSpec::Only { value: key(self.id) },
            RangeKind::LowerBound => RangeSpec::LowerBound {
                lower: key(self.lower_id),
                exclusive: self.lower_id_open,
            },
            RangeKind::UpperBound => RangeSpec::UpperBound {
                upper: key(self.upper_id),
                exclusive: self.upper_id_open,
            },
            RangeKind::Bound => RangeSpec::Bound {
                lower: key(self.lower_id),
                upper: key(self.upper_id),
                lower_exclusive: self.lower_id_open,
                upper_exclusive: self.upper_id_open,
            },
        }
    }
}

impl fmt::Display for IdFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |id: Option<i64>| id.map_or_else(|| "~".to_string(), |v| v.to_string());
        let (lower, upper) = match self.range_type {
            RangeKind::Only => return f.write_str(&bound(self.id)),
            RangeKind::LowerBound => (self.lower_id, None),
            RangeKind::UpperBound => (None, self.upper_id),
            RangeKind::Bound => (self.lower_id, self.upper_id),
        };
        write!(
            f,
            "{}{}, {}{}",
            if self.lower_id_open { '(' } else { '[' },
            bound(lower),
            bound(upper),
            if self.upper_id_open { ')' } else { ']' },
        )
    }
}

impl FromStr for IdFilter {
    type Err = BoardError;

    fn from_str(input: &str) -> BoardResult<Self> {
        let text = input.trim();
        let lower_open = match text.chars().next() {
            Some('(') => true,
            Some('[') => false,
            _ => {
                return text
                    .parse()
                    .map(Self::only)
                    .map_err(|_| BoardError::invalid_filter(input, "expected an id or an interval"));
            }
        };
        let upper_open = match text.chars().last() {
            Some(')') => true,
            Some(']') => false,
            _ => return Err(BoardError::invalid_filter(input, "missing closing bracket")),
        };
        let inner = text
            .get(1..text.len().saturating_sub(1))
            .ok_or_else(|| BoardError::invalid_filter(input, "interval is too short"))?;
        let (lower, upper) = inner
            .split_once(',')
            .ok_or_else(|| BoardError::invalid_filter(input, "expected two bounds"))?;
        let parse_bound = |part: &str| -> BoardResult<Option<i64>> {
            match part.trim() {
                "" | "~" => Ok(None),
                digits => digits
                    .parse()
                    .map(Some)
                    .map_err(|_| BoardError::invalid_filter(input, format!("bad bound '{digits}'"))),
            }
        };

        match (parse_bound(lower)?, parse_bound(upper)?) {
            (Some(l), Some(u)) => Ok(Self::between(l, u, lower_open, upper_open)),
            (Some(l), None) => Ok(Self::at_least(l, lower_open)),
            (None, Some(u)) => Ok(Self::at_most(u, upper_open)),
            (None, None) => Err(BoardError::invalid_filter(input, "interval has no bounds")),
        }
    }
}

/// The search a [`MessageFilter`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Exact match on an index.
    Exact {
        /// Index name.
        index: &'static str,
        /// The key to match.
        value: Key,
    },
    /// Range over the id index.
    Range(RangeSpec),
}

/// Search criteria for messages.
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    /// Author name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact mail.
    #[serde(default)]
    pub mail: Option<String>,
    /// Message body.
    #[serde(default)]
    pub content: Option<String>,
    /// Creation time as stored.
    #[serde(default)]
    pub time: Option<String>,
    /// Id range.
    #[serde(default)]
    pub id_filter: Option<IdFilter>,
}

impl MessageFilter {
    /// Sets the name criterion.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the mail criterion.
    #[must_use]
    pub fn mail(mut self, mail: impl Into<String>) -> Self {
        self.mail = Some(mail.into());
        self
    }

    /// Sets the content criterion.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the time criterion.
    #[must_use]
    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Sets the id range.
    #[must_use]
    pub fn id_filter(mut self, filter: IdFilter) -> Self {
        self.id_filter = Some(filter);
        self
    }

    /// Returns true when no criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criterion().is_none()
    }

    /// Picks the criterion to search by.
    #[must_use]
    pub fn criterion(&self) -> Option<Criterion> {
        let exact = |index: &'static str, value: &str| Criterion::Exact {
            index,
            value: Key::from(value),
        };
        let name = set(&self.name);
        let mail = set(&self.mail);

        if let (Some(name), Some(mail)) = (name, mail) {
            return Some(Criterion::Exact {
                index: NAME_MAIL_INDEX,
                value: Key::array([name, mail]),
            });
        }
        if let Some(name) = name {
            return Some(exact("name", name));
        }
        if let Some(mail) = mail {
            return Some(exact("mail", mail));
        }
        if let Some(content) = set(&self.content) {
            return Some(exact("content", content));
        }
        if let Some(time) = set(&self.time) {
            return Some(exact("time", time));
        }
        self.id_filter
            .as_ref()
            .map(|filter| Criterion::Range(filter.to_range()))
    }
}

fn set(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_mail_use_composite_index() {
        let filter = MessageFilter::default()
            .name("zain")
            .mail("a@b.c")
            .content("ignored");
        assert_eq!(
            filter.criterion(),
            Some(Criterion::Exact {
                index: "name,mail",
                value: Key::array(["zain", "a@b.c"]),
            })
        );
    }

    #[test]
    fn precedence_order() {
        let filter = MessageFilter::default()
            .content("hi")
            .time("2024/5/1 10:00:00")
            .id_filter(IdFilter::only(3));
        assert!(matches!(
            filter.criterion(),
            Some(Criterion::Exact { index: "content", .. })
        ));

        let filter = MessageFilter::default().mail("a@b.c").content("hi");
        assert!(matches!(
            filter.criterion(),
            Some(Criterion::Exact { index: "mail", .. })
        ));

        let filter = MessageFilter::default()
            .name("")
            .id_filter(IdFilter::at_least(2, true));
        assert_eq!(
            filter.criterion(),
            Some(Criterion::Range(RangeSpec::LowerBound {
                lower: Key::from(2),
                exclusive: true,
            }))
        );
    }

    #[test]
    fn empty_filter_has_no_criterion() {
        assert!(MessageFilter::default().is_empty());
        assert!(MessageFilter::default().name("").mail("").is_empty());
    }

    #[test]
    fn missing_bound_is_unconstrained() {
        let filter = IdFilter {
            id: None,
            ..IdFilter::only(0)
        };
        assert_eq!(filter.to_range().to_key_range(), None);
    }

    #[test]
    fn parses_interval_notation() {
        assert_eq!("5".parse::<IdFilter>().unwrap(), IdFilter::only(5));
        assert_eq!(
            "[3, 7)".parse::<IdFilter>().unwrap(),
            IdFilter::between(3, 7, false, true)
        );
        assert_eq!(
            "(3, ~]".parse::<IdFilter>().unwrap(),
            IdFilter::at_least(3, true)
        );
        assert_eq!(
            " [~,7] ".parse::<IdFilter>().unwrap(),
            IdFilter::at_most(7, false)
        );
    }

    #[test]
    fn rejects_malformed_intervals() {
        for bad in ["", "abc", "[3, 7", "[~, ~]", "[x, 3]", "[3]", "("] {
            assert!(
                matches!(bad.parse::<IdFilter>(), Err(BoardError::InvalidFilter { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn prints_interval_notation() {
        assert_eq!(IdFilter::only(5).to_string(), "5");
        assert_eq!(IdFilter::between(3, 7, false, true).to_string(), "[3, 7)");
        assert_eq!(IdFilter::at_least(3, true).to_string(), "(3, ~]");
        assert_eq!(IdFilter::at_most(7, true).to_string(), "[~, 7)");
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_value(IdFilter::at_least(4, true)).unwrap();
        assert_eq!(json["rangeType"], "LowerBound");
        assert_eq!(json["lowerId"], 4);
        assert_eq!(json["lowerIdOpen"], true);
    }
}
