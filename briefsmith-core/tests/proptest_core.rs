//! Property tests for repair, corpus truncation and normalization.

use briefsmith_core::config::NormalizeConfig;
use briefsmith_core::corpus::truncate_middle;
use briefsmith_core::{DocumentRecord, Normalizer, OverrideVariables, SynthesisRequest, repair};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 {}\\[\\],:]{0,12}".prop_map(Value::String),
    ];
    let inner = prop::collection::btree_map("[a-z]{1,6}", leaf.clone(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect()));
    prop::collection::btree_map("[a-z]{1,8}", prop_oneof![leaf, inner], 1..6)
        .prop_map(|m| m.into_iter().collect())
}

fn request(days: u32) -> SynthesisRequest {
    let start = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let end = start + chrono::Duration::days(i64::from(days) - 1);
    SynthesisRequest::builder("Expo", "Riyadh", "Saudi Arabia", "2026-03-01")
        .end_date(end.format("%Y-%m-%d").to_string())
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn repair_closes_a_missing_final_brace(object in object_strategy()) {
        let text = Value::Object(object.clone()).to_string();
        let cut = &text[..text.len() - 1];
        prop_assert_eq!(repair(cut), object);
    }

    #[test]
    fn repair_strips_fences(object in object_strategy()) {
        let text = Value::Object(object.clone()).to_string();
        let fenced = format!("```json\n{}\n```", text);
        prop_assert_eq!(repair(&fenced), object);
    }

    #[test]
    fn truncation_respects_the_budget(text in "\\PC{0,400}", max in 0usize..300) {
        let cut = truncate_middle(&text, max);
        prop_assert!(cut.chars().count() <= max);
        if text.chars().count() <= max {
            prop_assert_eq!(cut, text);
        }
    }

    #[test]
    fn normalizing_twice_equals_normalizing_once(
        speakers in prop::collection::vec(
            prop::sample::select(vec!["Jane Fraser", "Larry Fink", "John Smith", "", "Unknown"]),
            0..8,
        ),
        weather_days in 0usize..6,
        days in 1u32..6,
    ) {
        let sessions: Vec<Value> = speakers
            .iter()
            .enumerate()
            .map(|(i, s)| json!({"title": format!("Session {}", i), "speakers": s}))
            .collect();
        let weather: Vec<Value> = (0..weather_days)
            .map(|_| json!({"condition": "Sunny", "high": "31°C"}))
            .collect();
        let mut record = DocumentRecord::new();
        record.insert("sessions", Value::Array(sessions));
        record.insert("weather", Value::Array(weather));
        record.insert("conference_tracks", json!(["Health", "Investment"]));

        let request = request(days);
        let normalizer = Normalizer::new(NormalizeConfig::default());
        let overrides = OverrideVariables::new();
        let (once, _) = normalizer.normalize(record, &request, &overrides);
        let (twice, report) = normalizer.normalize(once.clone(), &request, &overrides);

        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(report.edits(), 0);
        prop_assert_eq!(
            once.get("schedule_days").and_then(Value::as_array).map(Vec::len),
            Some(days as usize)
        );
    }
}
