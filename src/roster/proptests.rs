//! Property-based tests for roster matching and persistence
//!
//! Tests for:
//! - Normalization: case and whitespace insensitivity of name lookups
//! - Persistence: persist/load reproduces names and joined flags
//! - Single use: an entry can be marked joined only once

use super::entry::{normalize, NameKey, RosterEntry};
use super::store::{RosterError, RosterStore};
use proptest::prelude::*;
use tempfile::TempDir;

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][a-z]{0,9}( [A-Za-z][a-z]{0,9}){0,2}"
}

fn padding() -> impl Strategy<Value = String> {
    "[ \t]{0,3}"
}

fn entry_strategy() -> impl Strategy<Value = RosterEntry> {
    (name_strategy(), name_strategy(), any::<bool>()).prop_map(|(first, last, joined)| {
        RosterEntry {
            first_name: first,
            last_name: last,
            joined,
        }
    })
}

proptest! {
    /// Property: Lookups ignore case and surrounding/inner whitespace
    #[test]
    fn find_by_name_is_case_and_whitespace_insensitive(
        first in name_strategy(),
        last in name_strategy(),
        pad_a in padding(),
        pad_b in padding(),
        upper in any::<bool>(),
    ) {
        let store = RosterStore::new("unused.csv", vec![RosterEntry::new(first.clone(), last.clone())]);

        let spaced_last = last.replace(' ', "  ");
        let (query_first, query_last) = if upper {
            (first.to_uppercase(), spaced_last.to_uppercase())
        } else {
            (first.to_lowercase(), spaced_last.to_lowercase())
        };

        let found = store.find_by_name(
            &format!("{pad_a}{query_first}{pad_b}"),
            &format!("{pad_b}{query_last}{pad_a}"),
        );
        prop_assert_eq!(found, Some(0));
    }

    /// Property: Normalization is idempotent
    #[test]
    fn normalize_is_idempotent(value in "[ \tA-Za-z]{0,30}") {
        let once = normalize(&value);
        prop_assert_eq!(normalize(&once), once.clone());
    }

    /// Property: Free-text parsing agrees with the entry key
    #[test]
    fn parsed_reply_matches_entry_key(first in "[A-Za-z]{1,10}", last in name_strategy()) {
        let entry = RosterEntry::new(first.clone(), last.clone());
        let parsed = NameKey::parse(&format!("  {}   {} ", first, last));
        prop_assert_eq!(parsed, Some(entry.key()));
    }

    /// Property: persist then load reproduces the roster
    #[test]
    fn persist_load_roundtrip(entries in prop::collection::vec(entry_strategy(), 0..20)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("students.csv");
        let store = RosterStore::new(&path, entries.clone());

        store.persist().unwrap();
        let loaded = RosterStore::load(&path).unwrap();

        prop_assert_eq!(loaded.entries, entries);
        prop_assert_eq!(loaded.skipped_rows, 0);
    }

    /// Property: Each entry is marked joined at most once
    #[test]
    fn mark_joined_succeeds_exactly_once(
        entries in prop::collection::vec(entry_strategy(), 1..10),
        pick in any::<prop::sample::Index>(),
    ) {
        let index = pick.index(entries.len());
        let was_joined = entries[index].joined;
        let store = RosterStore::new("unused.csv", entries);

        let first = store.mark_joined(index);
        let second = store.mark_joined(index);

        prop_assert_eq!(first.is_ok(), !was_joined);
        prop_assert!(matches!(second, Err(RosterError::AlreadyJoined(i)) if i == index));
        prop_assert!(store.get(index).unwrap().joined);
    }
}
