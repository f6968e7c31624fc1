//! Fields every finished record must carry.
//!
//! The renderer reads these paths unconditionally, so backfill writes a
//! sentinel wherever one is missing or null.

use crate::config::Sentinels;
use crate::record::DocumentRecord;
use serde_json::{Map, Value};

/// What a missing required field is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// The "to be determined" sentinel.
    Text,
    /// The unknown-person sentinel.
    Person,
    /// A one-element list holding the "to be determined" sentinel.
    TextList,
    /// An empty list.
    EmptyList,
}

impl FieldDefault {
    pub fn value(self, sentinels: &Sentinels) -> Value {
        match self {
            FieldDefault::Text => Value::String(sentinels.tbd.clone()),
            FieldDefault::Person => Value::String(sentinels.unknown_person.clone()),
            FieldDefault::TextList => Value::Array(vec![Value::String(sentinels.tbd.clone())]),
            FieldDefault::EmptyList => Value::Array(Vec::new()),
        }
    }
}

use FieldDefault::{EmptyList, Person, Text, TextList};

/// Required top-level and nested fields, in document order.
pub const REQUIRED_FIELDS: &[(&str, FieldDefault)] = &[
    ("document_control.reference_id", Text),
    ("document_control.title", Text),
    ("document_control.classification", Text),
    ("document_control.issue_date", Text),
    ("report_subtitle", Text),
    ("visit_objectives", TextList),
    ("executive_summary", Text),
    ("geopolitical_summary", Text),
    ("intel_global_significance", TextList),
    ("intel_regulatory_impact", TextList),
    ("intel_long_term_value", TextList),
    ("conference_summary", Text),
    ("conference_history", Text),
    ("participation_history", Text),
    ("strategy_alignment", Text),
    ("regulatory_relevance", Text),
    ("investment_implications", Text),
    ("institutional_positioning", Text),
    ("organization_relevance", Text),
    ("bilateral_relations", Text),
    ("bilateral_fields.trade_volume", Text),
    ("bilateral_fields.cooperation_areas", Text),
    ("bilateral_fields.strategic_agreements", Text),
    ("bilateral_fields.health_regulatory", Text),
    ("entry_requirements", Text),
    ("leadership_brief", Text),
    ("political_economic_orientation", Text),
    ("political_strategic_priorities", Text),
    ("trade_exchange", Text),
    ("talking_points", TextList),
    ("country_info.capital", Text),
    ("country_info.head_of_state_title", Text),
    ("country_info.head_of_state", Person),
    ("country_info.population", Text),
    ("country_info.area", Text),
    ("country_info.gdp", Text),
    ("country_info.gdp_per_capita", Text),
    ("country_info.currency", Text),
    ("country_info.official_language", Text),
    ("country_info.religion", Text),
    ("country_info.timezone", Text),
    ("country_info.government", Text),
    ("country_info.key_sectors", Text),
    ("country_info.overview", Text),
    ("embassy.name", Text),
    ("embassy.mission", Text),
    ("embassy.ambassador_name", Person),
    ("embassy.ambassador_title", Text),
    ("embassy.address", Text),
    ("embassy.phone", Text),
    ("embassy.email", Text),
    ("embassy.website", Text),
    ("consulate.name", Text),
    ("consulate.address", Text),
    ("consulate.phone", Text),
    ("consulate.email", Text),
    ("consulate.emergency_phone", Text),
    ("consulate.working_hours", Text),
    ("consulate.consul_name", Person),
    ("consulate.consul_title", Text),
    ("delegation", EmptyList),
    ("schedule_days", EmptyList),
    ("conference_data.organizer", Text),
    ("conference_data.overview", Text),
    ("conference_data.slogan", Text),
    ("conference_data.dates", Text),
    ("conference_data.location", Text),
    ("conference_data.founded", Text),
    ("conference_data.edition", Text),
    ("conference_data.expected_participants", Text),
    ("conference_data.participant_profile", Text),
    ("conference_data.core_themes", Text),
    ("conference_data.participation", Text),
    ("conference_tracks", EmptyList),
    ("previous_outcomes", EmptyList),
    ("sessions", EmptyList),
    ("speakers", EmptyList),
    ("bilateral_meetings", EmptyList),
    ("suggested_meetings", EmptyList),
    ("weather", EmptyList),
    ("prayer_times", EmptyList),
    ("key_ambassadors.0.name", Person),
    ("key_ambassadors.0.title", Text),
    ("key_ambassadors.0.country", Text),
    ("key_ambassadors.0.relevance", Text),
    ("attachments", EmptyList),
];

/// Sub-fields of each per-day list entry.
pub const SCHEDULE_DAY_FIELDS: &[(&str, FieldDefault)] = &[
    ("day_label", Text),
    ("date", Text),
    ("items", EmptyList),
];

pub const WEATHER_FIELDS: &[(&str, FieldDefault)] = &[
    ("day", Text),
    ("date", Text),
    ("condition", Text),
    ("high", Text),
    ("low", Text),
    ("humidity", Text),
    ("wind", Text),
];

pub const PRAYER_FIELDS: &[(&str, FieldDefault)] = &[
    ("date", Text),
    ("day", Text),
    ("fajr", Text),
    ("dhuhr", Text),
    ("asr", Text),
    ("maghrib", Text),
    ("isha", Text),
];

/// The per-day lists and the sub-fields each of their entries needs.
pub const PER_DAY_LISTS: &[(&str, &[(&str, FieldDefault)])] = &[
    ("schedule_days", SCHEDULE_DAY_FIELDS),
    ("weather", WEATHER_FIELDS),
    ("prayer_times", PRAYER_FIELDS),
];

/// Every fixed required path, as owned strings.
pub fn required_paths() -> impl Iterator<Item = String> {
    REQUIRED_FIELDS.iter().map(|(path, _)| path.to_string())
}

/// Required top-level keys.
pub fn required_top_level_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = Vec::new();
    for &(path, _) in REQUIRED_FIELDS {
        let top = path.split('.').next().unwrap_or_default();
        if !keys.contains(&top) {
            keys.push(top);
        }
    }
    keys
}

fn is_absent(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

/// Fill every missing or null required field. Returns the paths filled.
pub fn backfill(record: &mut DocumentRecord, sentinels: &Sentinels) -> Vec<String> {
    let mut filled = Vec::new();

    for (path, default) in REQUIRED_FIELDS {
        if is_absent(record.get_path(path)) {
            record.set_path(path, default.value(sentinels));
            filled.push(path.to_string());
        }
    }

    for (list, fields) in PER_DAY_LISTS {
        let Some(Value::Array(entries)) = record.get_path_mut(list) else {
            continue;
        };
        for (index, entry) in entries.iter_mut().enumerate() {
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(map) = entry {
                for (field, default) in *fields {
                    if is_absent(map.get(*field)) {
                        map.insert(field.to_string(), default.value(sentinels));
                        filled.push(format!("{}.{}.{}", list, index, field));
                    }
                }
            }
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backfill_empty_record() {
        let mut record = DocumentRecord::new();
        let sentinels = Sentinels::default();
        let filled = backfill(&mut record, &sentinels);
        assert_eq!(filled.len(), REQUIRED_FIELDS.len());
        assert!(record.missing_required().is_empty());
        assert_eq!(
            record.get_path("embassy.ambassador_name"),
            Some(&json!("Unknown"))
        );
        assert_eq!(
            record.get_path("visit_objectives"),
            Some(&json!(["To be determined"]))
        );
        assert_eq!(record.get_path("speakers"), Some(&json!([])));
        for key in required_top_level_keys() {
            assert!(record.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_backfill_keeps_present_values() {
        let mut record = DocumentRecord::new();
        record.set_path("embassy.ambassador_name", json!("Real Name"));
        record.set_path("executive_summary", Value::Null);
        let filled = backfill(&mut record, &Sentinels::default());
        assert!(!filled.contains(&"embassy.ambassador_name".to_string()));
        assert!(filled.contains(&"executive_summary".to_string()));
        assert_eq!(
            record.get_path("embassy.ambassador_name"),
            Some(&json!("Real Name"))
        );
    }

    #[test]
    fn test_backfill_per_day_entries() {
        let mut record = DocumentRecord::new();
        record.insert("weather", json!([{"day": "Sunday", "high": 27}, "junk"]));
        backfill(&mut record, &Sentinels::default());
        let weather = record.get("weather").unwrap();
        assert_eq!(weather[0]["high"], json!(27));
        assert_eq!(weather[0]["wind"], json!("To be determined"));
        assert_eq!(weather[1]["day"], json!("To be determined"));
    }

    #[test]
    fn test_top_level_keys_unique() {
        let keys = required_top_level_keys();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), keys.len());
        assert!(keys.contains(&"schedule_days"));
    }
}
