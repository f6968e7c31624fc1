//! Over-attribution guard for session speakers.
//!
//! Models asked for speakers per session tend to attach the one name they
//! are sure of to most sessions. When a single name appears in at least
//! `threshold` of all sessions (and at least `min_occurrences` times), each
//! session citing it has its speaker field reset to the unknown sentinel.

use super::session_entries_mut;
use crate::record::DocumentRecord;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Split a speaker field into normalized individual names.
pub fn speaker_names(field: &str) -> BTreeSet<String> {
    field
        .split([',', ';', '،', '\n', '&', '/'])
        .flat_map(|part| part.split(" and "))
        .map(|name| name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Reset over-attributed session speakers. Returns how many sessions were reset.
pub fn suppress_repeated_speakers(
    record: &mut DocumentRecord,
    threshold: f64,
    min_occurrences: usize,
    unknown: &str,
) -> usize {
    let mut sessions = session_entries_mut(record);
    let total = sessions.len();
    if total == 0 {
        return 0;
    }

    let unknown_key = unknown.to_lowercase();
    let per_session: Vec<BTreeSet<String>> = sessions
        .iter()
        .map(|s| {
            let mut names = s
                .get("speakers")
                .and_then(Value::as_str)
                .map(speaker_names)
                .unwrap_or_default();
            names.remove(&unknown_key);
            names
        })
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for names in &per_session {
        for name in names {
            *counts.entry(name.as_str()).or_default() += 1;
        }
    }

    let repeated: BTreeSet<&str> = counts
        .iter()
        .filter(|&(_, &count)| {
            count >= min_occurrences && count as f64 / total as f64 >= threshold
        })
        .map(|(&name, _)| name)
        .collect();
    if repeated.is_empty() {
        return 0;
    }

    let mut reset = 0;
    for (session, names) in sessions.iter_mut().zip(&per_session) {
        if names.iter().any(|n| repeated.contains(n.as_str())) {
            session.insert("speakers".to_string(), Value::String(unknown.to_string()));
            reset += 1;
        }
    }
    info!(
        names = ?repeated,
        sessions = total,
        reset,
        "Reset over-attributed session speakers"
    );
    reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(sessions: Value) -> DocumentRecord {
        let mut record = DocumentRecord::new();
        record.insert("sessions", sessions);
        record
    }

    #[test]
    fn test_three_of_five_is_reset() {
        let mut rec = record(json!([
            {"title": "S1", "speakers": "Jane Fraser"},
            {"title": "S2", "speakers": "Jane Fraser, Larry Fink"},
            {"title": "S3", "speakers": "Ray Dalio"},
            {"title": "S4", "speakers": "jane  fraser"},
            {"title": "S5", "speakers": "Kristalina Georgieva"}
        ]));
        let reset = suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown");
        assert_eq!(reset, 3);
        assert_eq!(rec.get_path("sessions.0.speakers"), Some(&json!("Unknown")));
        assert_eq!(rec.get_path("sessions.1.speakers"), Some(&json!("Unknown")));
        assert_eq!(rec.get_path("sessions.3.speakers"), Some(&json!("Unknown")));
        assert_eq!(rec.get_path("sessions.2.speakers"), Some(&json!("Ray Dalio")));
        assert_eq!(
            rec.get_path("sessions.4.speakers"),
            Some(&json!("Kristalina Georgieva"))
        );
    }

    #[test]
    fn test_below_threshold_untouched() {
        let mut rec = record(json!([
            {"speakers": "A"}, {"speakers": "A"}, {"speakers": "B"},
            {"speakers": "C"}, {"speakers": "D"}
        ]));
        assert_eq!(suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown"), 0);
    }

    #[test]
    fn test_single_session_needs_minimum_occurrences() {
        let mut rec = record(json!([{"speakers": "A"}]));
        assert_eq!(suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown"), 0);
        assert_eq!(rec.get_path("sessions.0.speakers"), Some(&json!("A")));
    }

    #[test]
    fn test_unknown_sentinel_is_not_counted() {
        let mut rec = record(json!([
            {"speakers": "Unknown"}, {"speakers": "Unknown"}, {"speakers": "Unknown"},
            {"speakers": "B"}
        ]));
        assert_eq!(suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown"), 0);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let mut rec = record(json!([
            {"speakers": "A"}, {"speakers": "A"}, {"speakers": "A"},
            {"speakers": "B"}, {"speakers": "B"}
        ]));
        assert_eq!(suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown"), 3);
        let once = rec.clone();
        assert_eq!(suppress_repeated_speakers(&mut rec, 0.6, 2, "Unknown"), 0);
        assert_eq!(rec, once);
    }

    #[test]
    fn test_speaker_names_split() {
        let names = speaker_names("Jane Fraser and Vis Raghavan; Richard Ditizio");
        assert_eq!(names.len(), 3);
        assert!(names.contains("vis raghavan"));
    }
}
