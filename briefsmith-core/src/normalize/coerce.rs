//! Shape coercions for fields models commonly return in the wrong form.

use super::session_entries_mut;
use crate::knowledge::OverrideVariables;
use crate::record::DocumentRecord;
use serde_json::{Value, json};

/// Run every coercion. Returns the number of values rewritten.
pub fn coerce(record: &mut DocumentRecord, overrides: &OverrideVariables, tbd: &str) -> usize {
    let mut changed = 0;
    if !overrides.contains("conference_tracks") {
        changed += coerce_tracks(record, tbd);
    }
    changed += coerce_session_speakers(record, overrides);
    changed += coerce_temperatures(record, overrides);
    changed
}

/// Tracks become `{name, explanation}` objects; nameless entries are dropped.
fn coerce_tracks(record: &mut DocumentRecord, tbd: &str) -> usize {
    let Some(Value::Array(tracks)) = record.get_path_mut("conference_tracks") else {
        return 0;
    };
    let mut changed = 0;
    let mut normalized = Vec::with_capacity(tracks.len());
    for track in tracks.drain(..) {
        match track {
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str).map(str::trim);
                let Some(name) = name.filter(|n| !n.is_empty()) else {
                    changed += 1;
                    continue;
                };
                let explanation = map
                    .get("explanation")
                    .or_else(|| map.get("description"))
                    .and_then(Value::as_str)
                    .unwrap_or(tbd);
                let rebuilt = json!({"name": name, "explanation": explanation});
                if rebuilt != Value::Object(map) {
                    changed += 1;
                }
                normalized.push(rebuilt);
            }
            Value::String(name) if !name.trim().is_empty() => {
                normalized.push(json!({"name": name.trim(), "explanation": tbd}));
                changed += 1;
            }
            _ => changed += 1,
        }
    }
    *tracks = normalized;
    changed
}

/// Speaker lists are joined into a single comma-separated string.
fn coerce_session_speakers(record: &mut DocumentRecord, overrides: &OverrideVariables) -> usize {
    let mut changed = 0;
    for (index, session) in session_entries_mut(record).into_iter().enumerate() {
        if overrides.contains(&format!("sessions.{}.speakers", index)) {
            continue;
        }
        if let Some(Value::Array(names)) = session.get("speakers") {
            let joined = names
                .iter()
                .filter_map(|n| match n {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(", ");
            session.insert("speakers".to_string(), Value::String(joined));
            changed += 1;
        }
    }
    changed
}

/// Weather highs and lows such as "27°C" become integers.
fn coerce_temperatures(record: &mut DocumentRecord, overrides: &OverrideVariables) -> usize {
    let Some(Value::Array(days)) = record.get_path_mut("weather") else {
        return 0;
    };
    let mut changed = 0;
    for (index, day) in days.iter_mut().enumerate() {
        let Some(map) = day.as_object_mut() else {
            continue;
        };
        for key in ["high", "low"] {
            if overrides.contains(&format!("weather.{}.{}", index, key)) {
                continue;
            }
            if let Some(celsius) = map.get(key).and_then(parse_celsius) {
                let value = Value::from(celsius);
                if map.get(key) != Some(&value) {
                    map.insert(key.to_string(), value);
                    changed += 1;
                }
            }
        }
    }
    changed
}

/// Readings outside this range (in either unit) are left as the model wrote them.
const PLAUSIBLE_DEGREES: f64 = 150.0;

fn parse_celsius(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.is_i64() => n.as_i64(),
        Value::Number(n) => n.as_f64().and_then(round_degrees),
        Value::String(s) => {
            let cleaned = s
                .trim()
                .trim_end_matches(['C', 'c'])
                .trim_end_matches('°')
                .trim();
            cleaned.parse::<f64>().ok().and_then(round_degrees)
        }
        _ => None,
    }
}

fn round_degrees(degrees: f64) -> Option<i64> {
    (degrees.is_finite() && degrees.abs() <= PLAUSIBLE_DEGREES).then(|| degrees.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(value: Value) -> DocumentRecord {
        DocumentRecord::from_map(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_tracks_strings_become_objects() {
        let mut rec = record(json!({"conference_tracks": [
            "Capital Markets",
            {"name": "Health", "description": "Public health"},
            {"explanation": "no name"},
            ""
        ]}));
        let changed = coerce(&mut rec, &OverrideVariables::new(), "TBD");
        assert_eq!(changed, 4);
        assert_eq!(
            rec.get("conference_tracks").unwrap(),
            &json!([
                {"name": "Capital Markets", "explanation": "TBD"},
                {"name": "Health", "explanation": "Public health"}
            ])
        );
    }

    #[test]
    fn test_session_speaker_lists_joined() {
        let mut rec = record(json!({"sessions": [
            {"title": "A", "speakers": ["Jane Fraser", "Vis Raghavan"]},
            {"title": "B", "speakers": "Already a string"}
        ]}));
        coerce(&mut rec, &OverrideVariables::new(), "TBD");
        assert_eq!(
            rec.get_path("sessions.0.speakers"),
            Some(&json!("Jane Fraser, Vis Raghavan"))
        );
        assert_eq!(
            rec.get_path("sessions.1.speakers"),
            Some(&json!("Already a string"))
        );
    }

    #[test]
    fn test_sessions_keyed_by_day() {
        let mut rec = record(json!({"sessions": {"day1": [{"speakers": ["X", "Y"]}]}}));
        coerce(&mut rec, &OverrideVariables::new(), "TBD");
        assert_eq!(rec.get_path("sessions.day1.0.speakers"), Some(&json!("X, Y")));
    }

    #[test]
    fn test_temperatures_become_integers() {
        let mut rec = record(json!({"weather": [
            {"high": "27°C", "low": "16 °C"},
            {"high": 28.6, "low": "cool"}
        ]}));
        coerce(&mut rec, &OverrideVariables::new(), "TBD");
        assert_eq!(rec.get_path("weather.0.high"), Some(&json!(27)));
        assert_eq!(rec.get_path("weather.0.low"), Some(&json!(16)));
        assert_eq!(rec.get_path("weather.1.high"), Some(&json!(29)));
        assert_eq!(rec.get_path("weather.1.low"), Some(&json!("cool")));
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let mut rec = record(json!({
            "conference_tracks": ["A"],
            "sessions": [{"speakers": ["X"]}],
            "weather": [{"high": "20C"}]
        }));
        coerce(&mut rec, &OverrideVariables::new(), "TBD");
        let once = rec.clone();
        assert_eq!(coerce(&mut rec, &OverrideVariables::new(), "TBD"), 0);
        assert_eq!(rec, once);
    }

    #[test]
    fn test_non_finite_temperatures_left_alone() {
        let mut rec = record(json!({"weather": [
            {"high": "inf", "low": "NaN"},
            {"high": "-infinity°C", "low": "1e300"},
            {"high": 31.6, "low": "-4°C"}
        ]}));
        assert_eq!(coerce(&mut rec, &OverrideVariables::new(), "TBD"), 2);
        assert_eq!(
            rec.get("weather"),
            Some(&json!([
                {"high": "inf", "low": "NaN"},
                {"high": "-infinity°C", "low": "1e300"},
                {"high": 32, "low": -4}
            ]))
        );
    }
}
