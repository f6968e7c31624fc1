//! Placeholder sanitation.
//!
//! Template text that leaks into the output (angle-bracket markers, stock
//! dummy names, research NOT FOUND markers, empty strings) is rewritten to
//! the matching sentinel. Values at override paths are never touched.

use crate::config::NormalizeConfig;
use crate::knowledge::OverrideVariables;
use crate::record::DocumentRecord;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TEMPLATE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>\n]{1,200}>").expect("valid regex"));

/// Field names whose values are people.
const PERSON_FIELDS: &[&str] = &["counterpart", "speakers", "consul_name", "ambassador_name"];

/// Lists whose entries are people; only there does a bare `name` hold a person.
const PERSON_LISTS: &[&str] = &["speakers", "key_ambassadors", "delegation"];

/// Bare dash-like fillers models emit for "nothing known".
const FILLERS: &[&str] = &["-", "--", "—", "–", "...", "…", "?"];

/// Classifies strings as leaked template text.
pub struct PlaceholderDetector {
    names: Vec<String>,
    not_found: String,
}

impl PlaceholderDetector {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            names: config
                .placeholder_names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            not_found: config.sentinels.not_found.to_lowercase(),
        }
    }

    pub fn is_placeholder(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || FILLERS.contains(&trimmed) {
            return true;
        }
        let lower = trimmed.to_lowercase();
        lower == self.not_found
            || lower.starts_with(&self.not_found)
            || lower.starts_with("placeholder")
            || self.names.iter().any(|n| *n == lower)
            || TEMPLATE_MARKER.is_match(trimmed)
    }
}

/// Whether the leaf at a record path holds a person's name.
///
/// Index segments are skipped, so list elements take the kind of their list
/// field, and a bare `name` counts only inside a person list.
pub fn is_person_path<S: AsRef<str>>(path: &[S]) -> bool {
    let mut keys = path
        .iter()
        .map(AsRef::as_ref)
        .filter(|segment| segment.parse::<usize>().is_err())
        .rev();
    match keys.next() {
        Some("name") => keys.next().is_some_and(|parent| PERSON_LISTS.contains(&parent)),
        Some(key) => key.ends_with("_name") || PERSON_FIELDS.contains(&key),
        None => false,
    }
}

/// Drop speaker roster entries whose name is a placeholder. Returns how many were dropped.
pub fn drop_placeholder_speakers(
    record: &mut DocumentRecord,
    detector: &PlaceholderDetector,
    overrides: &OverrideVariables,
) -> usize {
    if overrides.slice(&["speakers"]).next().is_some() {
        return 0;
    }
    let Some(Value::Array(speakers)) = record.get_path_mut("speakers") else {
        return 0;
    };
    let before = speakers.len();
    speakers.retain(|entry| {
        entry
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !detector.is_placeholder(name))
    });
    before - speakers.len()
}

/// Rewrite every placeholder string or null leaf. Returns how many were rewritten.
pub fn sanitize(
    record: &mut DocumentRecord,
    config: &NormalizeConfig,
    overrides: &OverrideVariables,
) -> usize {
    let detector = PlaceholderDetector::new(config);
    let mut replaced = drop_placeholder_speakers(record, &detector, overrides);

    let sentinels = &config.sentinels;
    let mut path = Vec::new();
    for (key, value) in record.as_map_mut().iter_mut() {
        path.push(key.clone());
        replaced += sanitize_value(value, &mut path, &detector, overrides, |person| {
            if person {
                &sentinels.unknown_person
            } else {
                &sentinels.tbd
            }
        });
        path.pop();
    }
    replaced
}

fn sanitize_value<'s>(
    value: &mut Value,
    path: &mut Vec<String>,
    detector: &PlaceholderDetector,
    overrides: &OverrideVariables,
    sentinel: impl Fn(bool) -> &'s String + Copy,
) -> usize {
    match value {
        Value::Object(map) => {
            let mut replaced = 0;
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                replaced += sanitize_value(child, path, detector, overrides, sentinel);
                path.pop();
            }
            replaced
        }
        Value::Array(items) => {
            let mut replaced = 0;
            for (index, child) in items.iter_mut().enumerate() {
                path.push(index.to_string());
                replaced += sanitize_value(child, path, detector, overrides, sentinel);
                path.pop();
            }
            replaced
        }
        Value::String(text) => {
            if !detector.is_placeholder(text) || overrides.contains(&path.join(".")) {
                return 0;
            }
            *value = Value::String(sentinel(is_person_path(path.as_slice())).clone());
            1
        }
        Value::Null => {
            if overrides.contains(&path.join(".")) {
                return 0;
            }
            *value = Value::String(sentinel(is_person_path(path.as_slice())).clone());
            1
        }
        Value::Bool(_) | Value::Number(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> DocumentRecord {
        DocumentRecord::from_map(value.as_object().cloned().unwrap_or_default())
    }

    fn detector() -> PlaceholderDetector {
        PlaceholderDetector::new(&NormalizeConfig::default())
    }

    #[test]
    fn test_detects_placeholders() {
        let d = detector();
        assert!(d.is_placeholder(""));
        assert!(d.is_placeholder("  "));
        assert!(d.is_placeholder("<REAL speaker name>"));
        assert!(d.is_placeholder("John Smith"));
        assert!(d.is_placeholder("jane doe"));
        assert!(d.is_placeholder("NOT FOUND"));
        assert!(d.is_placeholder("Not found in research"));
        assert!(d.is_placeholder("—"));
        assert!(d.is_placeholder("TBD"));
        assert!(!d.is_placeholder("To be determined"));
        assert!(!d.is_placeholder("Unknown"));
        assert!(!d.is_placeholder("Jane Fraser"));
        assert!(!d.is_placeholder("GDP > $1 trillion"));
    }

    #[test]
    fn test_person_paths() {
        assert!(is_person_path(&["embassy", "ambassador_name"]));
        assert!(is_person_path(&["speakers", "0", "name"]));
        assert!(is_person_path(&["key_ambassadors", "1", "name"]));
        assert!(is_person_path(&["sessions", "2", "speakers"]));
        assert!(is_person_path(&["speakers", "3"]));
        assert!(is_person_path(&["bilateral_meetings", "0", "counterpart"]));
        assert!(!is_person_path(&["embassy", "name"]));
        assert!(!is_person_path(&["consulate", "name"]));
        assert!(!is_person_path(&["conference_tracks", "0", "name"]));
        assert!(!is_person_path(&["speakers", "0", "title"]));
        assert!(!is_person_path(&["embassy", "address"]));
        assert!(!is_person_path(&["bilateral_meetings", "0", "counterpart_title"]));
        assert!(!is_person_path::<&str>(&[]));
    }

    #[test]
    fn test_non_person_names_get_tbd() {
        let mut rec = record(json!({
            "embassy": {"name": "<official name of the embassy>"},
            "conference_tracks": [{"name": "", "explanation": "x"}],
            "key_ambassadors": [{"name": "John Doe", "title": "Ambassador"}]
        }));
        sanitize(&mut rec, &NormalizeConfig::default(), &OverrideVariables::new());
        assert_eq!(rec.get_path("embassy.name"), Some(&json!("To be determined")));
        assert_eq!(
            rec.get_path("conference_tracks.0.name"),
            Some(&json!("To be determined"))
        );
        assert_eq!(rec.get_path("key_ambassadors.0.name"), Some(&json!("Unknown")));
    }

    #[test]
    fn test_sanitize_rewrites_by_field_kind() {
        let mut rec = record(json!({
            "embassy": {"ambassador_name": "<EXACT name>", "phone": "NOT FOUND", "address": "601 NH Ave"},
            "bilateral_meetings": [{"counterpart": "", "entity": "FDA"}],
            "visit_objectives": ["<Objective 1>", "Real objective"],
            "executive_summary": null
        }));
        let replaced = sanitize(&mut rec, &NormalizeConfig::default(), &OverrideVariables::new());
        assert_eq!(replaced, 5);
        assert_eq!(rec.get_path("embassy.ambassador_name"), Some(&json!("Unknown")));
        assert_eq!(rec.get_path("embassy.phone"), Some(&json!("To be determined")));
        assert_eq!(rec.get_path("embassy.address"), Some(&json!("601 NH Ave")));
        assert_eq!(
            rec.get_path("bilateral_meetings.0.counterpart"),
            Some(&json!("Unknown"))
        );
        assert_eq!(
            rec.get("visit_objectives"),
            Some(&json!(["To be determined", "Real objective"]))
        );
        assert_eq!(rec.get("executive_summary"), Some(&json!("To be determined")));
    }

    #[test]
    fn test_placeholder_speakers_dropped() {
        let mut rec = record(json!({"speakers": [
            {"name": "John Smith", "title": "CEO"},
            {"name": "<REAL speaker 2>"},
            {"title": "no name"},
            {"name": "Jane Fraser", "title": "CEO"}
        ]}));
        sanitize(&mut rec, &NormalizeConfig::default(), &OverrideVariables::new());
        assert_eq!(
            rec.get("speakers"),
            Some(&json!([{"name": "Jane Fraser", "title": "CEO"}]))
        );
    }

    #[test]
    fn test_override_paths_untouched() {
        let mut rec = record(json!({"embassy": {"phone": "—"}}));
        let mut overrides = OverrideVariables::new();
        overrides.insert("embassy.phone", Some("—"));
        assert_eq!(sanitize(&mut rec, &NormalizeConfig::default(), &overrides), 0);
        assert_eq!(rec.get_path("embassy.phone"), Some(&json!("—")));
    }
}
