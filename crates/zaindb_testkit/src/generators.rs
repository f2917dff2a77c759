//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, ranges, messages and id filters.

use proptest::prelude::*;
use zaindb_board::{IdFilter, LogEntry, Message};
use zaindb_core::{Key, KeyRange};

/// Strategy for scalar keys: integral numbers, strings and binary.
pub fn scalar_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        (-1_000_i64..1_000).prop_map(Key::from),
        "[a-z]{0,6}".prop_map(Key::from),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Key::from),
    ]
}

/// Strategy for any key, including arrays of scalars.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        4 => scalar_key_strategy(),
        1 => prop::collection::vec(scalar_key_strategy(), 0..3).prop_map(Key::Array),
    ]
}

/// Strategy for numeric ranges over `lo..hi`, possibly inverted or open.
pub fn key_range_strategy(lo: i64, hi: i64) -> impl Strategy<Value = KeyRange> {
    (lo..hi, lo..hi, any::<bool>(), any::<bool>(), 0..4_u8).prop_map(
        |(a, b, lower_open, upper_open, shape)| match shape {
            0 => KeyRange::only(Key::from(a)),
            1 => KeyRange::lower_bound(Key::from(a), lower_open),
            2 => KeyRange::upper_bound(Key::from(b), upper_open),
            _ => KeyRange::bound(Key::from(a), Key::from(b), lower_open, upper_open),
        },
    )
}

/// Strategy for unsaved messages.
pub fn message_strategy() -> impl Strategy<Value = Message> {
    (
        "[a-z]{1,8}",
        "[a-z]{1,6}@[a-z]{1,5}\\.io",
        ".{0,40}",
        "20[0-9]{2}/[1-9]/[1-9] [01][0-9]:[0-5][0-9]:[0-5][0-9]",
    )
        .prop_map(|(name, mail, content, time)| Message {
            id: None,
            name,
            mail,
            content,
            time,
        })
}

/// Strategy for unsaved log entries.
pub fn log_entry_strategy() -> impl Strategy<Value = LogEntry> {
    ("[A-Za-z-]{1,16}", 0_i64..4, ".{0,40}")
        .prop_map(|(from, level, msg)| LogEntry::new(from, level, msg))
}

/// Strategy for id filters with positive bounds.
pub fn id_filter_strategy() -> impl Strategy<Value = IdFilter> {
    (1_i64..50, 1_i64..50, any::<bool>(), any::<bool>(), 0..4_u8).prop_map(
        |(a, b, lower_open, upper_open, shape)| match shape {
            0 => IdFilter::only(a),
            1 => IdFilter::at_least(a, lower_open),
            2 => IdFilter::at_most(b, upper_open),
            _ => IdFilter::between(a, b, lower_open, upper_open),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn id_filter_notation_round_trips(filter in id_filter_strategy()) {
            let parsed: IdFilter = filter.to_string().parse().unwrap();
            prop_assert_eq!(parsed.to_range(), filter.to_range());
        }

        #[test]
        fn ranges_contain_their_closed_bounds(range in key_range_strategy(0, 20)) {
            if range.is_empty() {
                for n in 0..20_i64 {
                    prop_assert!(!range.contains(&Key::from(n)));
                }
            } else {
                if let Some(lower) = range.lower() {
                    prop_assert_eq!(range.contains(lower), !range.lower_open());
                }
                if let Some(upper) = range.upper() {
                    prop_assert_eq!(range.contains(upper), !range.upper_open());
                }
            }
        }
    }
}
