//! Content fingerprinting and duplicate filtering.
//!
//! The fingerprint doubles as the event id, so it must stay stable across
//! releases; stored events are keyed by it. Do not change the normalization
//! or the hash input format.

use std::collections::HashSet;

use uuid::Uuid;

use crate::types::Event;

const PUNCTUATION: &[&str] = &[".", ",", "!", "?", ":", ";", "-", "–", "—", "'", "\""];

/// Lowercase, collapse runs of whitespace, then strip punctuation.
/// Stripping happens after collapsing, so "Pünktchen - Anton" keeps the
/// double space; that quirk is baked into existing fingerprints.
fn normalize(value: &str) -> String {
    let mut normalized = value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    for mark in PUNCTUATION {
        normalized = normalized.replace(mark, "");
    }
    normalized
}

/// Stable content hash over title, calendar day and venue name. Time of
/// day is deliberately excluded so a reschedule from 15:00 to 15:30 does
/// not duplicate the event.
pub fn fingerprint(event: &Event) -> String {
    let input = format!(
        "{}|{}|{}",
        normalize(&event.title),
        event.date_start.format("%Y-%m-%d"),
        normalize(&event.location.name)
    );
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub new_events: Vec<Event>,
    pub duplicates: Vec<Event>,
}

/// Partition events into unseen and duplicate, updating `seen` in place.
/// Unseen events get their fingerprint as id; the first occurrence within
/// the batch wins.
pub fn split(events: Vec<Event>, seen: &mut HashSet<String>, source_id: Option<Uuid>) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    for mut event in events {
        let hash = fingerprint(&event);
        if seen.insert(hash.clone()) {
            event.id = Some(hash);
            if let Some(id) = source_id {
                event.source_id = Some(id);
            }
            outcome.new_events.push(event);
        } else {
            outcome.duplicates.push(event);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::testing::sample_event;

    #[test]
    fn test_fingerprint_ignores_case_whitespace_and_punctuation() {
        let a = sample_event("Der Grüffelo!", "2026-05-10T16:00:00", "Fundus Theater");
        let b = sample_event("der  GRÜFFELO", "2026-05-10T09:00:00", "Fundus   Theater");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_days_and_venues() {
        let a = sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater");
        let b = sample_event("Grüffelo", "2026-05-11T16:00:00", "Fundus Theater");
        let c = sample_event("Grüffelo", "2026-05-10T16:00:00", "Zinnschmelze");
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn test_split_first_occurrence_wins() {
        let events = vec![
            sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater"),
            sample_event("GRÜFFELO", "2026-05-10T18:00:00", "Fundus Theater"),
            sample_event("Hoffest", "2026-05-12T14:00:00", "Zinnschmelze"),
        ];
        let mut seen = HashSet::new();

        let outcome = split(events, &mut seen, None);

        assert_eq!(outcome.new_events.len(), 2);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.new_events[0].date_start.format("%H:%M").to_string(), "16:00");
        assert!(outcome.new_events.iter().all(|event| event.id.is_some()));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_split_is_idempotent_across_runs() {
        let mut seen = HashSet::new();
        let first = split(
            vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")],
            &mut seen,
            None,
        );
        assert_eq!(first.new_events.len(), 1);

        let second = split(
            vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")],
            &mut seen,
            None,
        );
        assert!(second.new_events.is_empty());
        assert_eq!(second.duplicates.len(), 1);
    }

    #[test]
    fn test_split_assigns_source_id() {
        let source_id = Uuid::new_v4();
        let mut seen = HashSet::new();
        let outcome = split(
            vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")],
            &mut seen,
            Some(source_id),
        );
        assert_eq!(outcome.new_events[0].source_id, Some(source_id));
    }

    proptest! {
        #[test]
        fn test_fingerprint_case_and_spacing_invariant(title in "[a-zA-Z0-9 ]{1,40}") {
            let base = sample_event(&title, "2026-05-10T16:00:00", "Fundus Theater");
            let shouty = sample_event(&title.to_uppercase(), "2026-05-10T16:00:00", "Fundus Theater");
            let spaced = sample_event(
                &format!("  {}  ", title.replace(' ', "   ")),
                "2026-05-10T16:00:00",
                "Fundus Theater",
            );
            prop_assert_eq!(fingerprint(&base), fingerprint(&shouty));
            prop_assert_eq!(fingerprint(&base), fingerprint(&spaced));
        }
    }
}
