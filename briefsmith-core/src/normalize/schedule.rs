//! Per-day list expansion.
//!
//! `schedule_days`, `weather` and `prayer_times` must hold exactly one entry
//! per requested day. Short lists are extended by cloning day 1 and stepping
//! the date; long lists are cut. Dates are always rewritten from the request.

use super::placeholders::PlaceholderDetector;
use crate::config::{NormalizeConfig, Sentinels};
use crate::record::DocumentRecord;
use crate::request::SynthesisRequest;
use serde_json::{Map, Value, json};

/// How a per-day list was changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expansion {
    pub synthesized: usize,
    pub truncated: usize,
}

impl Expansion {
    fn add(&mut self, other: Expansion) {
        self.synthesized += other.synthesized;
        self.truncated += other.truncated;
    }
}

pub const CLOSING_ACTIVITY: &str = "Closing ceremony";

/// Bring every per-day list to the request's day count.
pub fn expand(
    record: &mut DocumentRecord,
    request: &SynthesisRequest,
    config: &NormalizeConfig,
) -> Expansion {
    let location = item_location(request, config);
    let mut total = Expansion::default();
    total.add(expand_schedule(record, request, &location, &config.sentinels));
    total.add(expand_daily(record, "weather", request));
    total.add(expand_daily(record, "prayer_times", request));
    total
}

/// Location for synthesized items. Runs after placeholder sanitation, so a
/// placeholder venue or city must not be written back into the record.
fn item_location(request: &SynthesisRequest, config: &NormalizeConfig) -> String {
    let detector = PlaceholderDetector::new(config);
    [request.venue(), Some(request.city())]
        .into_iter()
        .flatten()
        .find(|candidate| !detector.is_placeholder(candidate))
        .map(str::to_string)
        .unwrap_or_else(|| config.sentinels.tbd.clone())
}

fn take_list(record: &mut DocumentRecord, key: &str) -> Vec<Value> {
    match record.as_map_mut().remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn weekday(request: &SynthesisRequest, index: usize) -> String {
    request
        .dates()
        .get(index)
        .map(|d| d.format("%A").to_string())
        .unwrap_or_default()
}

fn expand_schedule(
    record: &mut DocumentRecord,
    request: &SynthesisRequest,
    location: &str,
    sentinels: &Sentinels,
) -> Expansion {
    let days = request.number_of_days();
    let mut entries = take_list(record, "schedule_days");
    let mut change = Expansion::default();

    if entries.len() > days {
        change.truncated = entries.len() - days;
        entries.truncate(days);
    }

    for (index, entry) in entries.iter_mut().enumerate() {
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert("date".into(), Value::String(request.date_string(index)));
            if !map.get("day_label").is_some_and(Value::is_string) {
                map.insert(
                    "day_label".into(),
                    Value::String(SynthesisRequest::day_label(index)),
                );
            }
        }
    }

    let template_items = entries
        .first()
        .and_then(|day| day.get("items"))
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .map(|items| generic_items(items, sentinels))
        .unwrap_or_else(|| {
            vec![json!({
                "time": sentinels.tbd,
                "activity": sentinels.tbd,
                "location": location,
                "type": "session",
                "strategic_relevance": sentinels.tbd,
            })]
        });

    while entries.len() < days {
        let index = entries.len();
        let mut items = template_items.clone();
        if index + 1 == days {
            items.push(json!({
                "time": "17:00",
                "activity": CLOSING_ACTIVITY,
                "location": location,
                "type": "ceremony",
                "strategic_relevance": sentinels.tbd,
            }));
        }
        entries.push(json!({
            "day_label": SynthesisRequest::day_label(index),
            "date": request.date_string(index),
            "items": items,
        }));
        change.synthesized += 1;
    }

    record.insert("schedule_days", Value::Array(entries));
    change
}

/// Day-1 items with their descriptive text replaced by the sentinel.
fn generic_items(items: &[Value], sentinels: &Sentinels) -> Vec<Value> {
    items
        .iter()
        .filter(|item| item.get("activity").and_then(Value::as_str) != Some(CLOSING_ACTIVITY))
        .map(|item| {
            let mut generic = Map::new();
            for key in ["time", "location", "type"] {
                if let Some(v) = item.get(key) {
                    generic.insert(key.to_string(), v.clone());
                }
            }
            generic.insert("activity".into(), Value::String(sentinels.tbd.clone()));
            generic.insert(
                "strategic_relevance".into(),
                Value::String(sentinels.tbd.clone()),
            );
            Value::Object(generic)
        })
        .collect()
}

fn expand_daily(record: &mut DocumentRecord, key: &str, request: &SynthesisRequest) -> Expansion {
    let days = request.number_of_days();
    let mut entries = take_list(record, key);
    let mut change = Expansion::default();

    if entries.len() > days {
        change.truncated = entries.len() - days;
        entries.truncate(days);
    }

    let template = entries
        .first()
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    while entries.len() < days {
        entries.push(template.clone());
        change.synthesized += 1;
    }

    for (index, entry) in entries.iter_mut().enumerate() {
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert("date".into(), Value::String(request.date_string(index)));
            map.insert("day".into(), Value::String(weekday(request, index)));
        }
    }

    record.insert(key, Value::Array(entries));
    change
}
