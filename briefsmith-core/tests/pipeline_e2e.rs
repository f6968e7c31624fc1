//! End-to-end runs of the synthesis pipeline against a scripted provider.

use briefsmith_core::config::{BriefConfig, RetryConfig};
use briefsmith_core::normalize::required::required_top_level_keys;
use briefsmith_core::{
    LlmError, MockLlmProvider, Normalizer, StageOutcome, Stage, SynthesisPipeline,
    SynthesisRequest,
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn config() -> BriefConfig {
    BriefConfig {
        retry: RetryConfig::immediate(),
        ..Default::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn random_expo() -> SynthesisRequest {
    SynthesisRequest::builder("Random Expo", "Nairobi", "Kenya", "2025-09-02")
        .end_date("2025-09-04")
        .build()
        .unwrap()
}

fn milken() -> SynthesisRequest {
    SynthesisRequest::builder(
        "Milken Institute Global Conference 2025",
        "Los Angeles",
        "United States",
        "2025-05-04",
    )
    .end_date("2025-05-07")
    .build()
    .unwrap()
}

#[tokio::test]
async fn total_provider_failure_still_yields_complete_record() {
    let mock = Arc::new(MockLlmProvider::failing(LlmError::Overloaded {
        provider: "mock".into(),
    }));
    let pipeline = SynthesisPipeline::with_provider(config(), mock)
        .unwrap()
        .with_today(today());

    let outcome = pipeline.run(&random_expo()).await.unwrap();
    let record = &outcome.record;

    for key in ["schedule_days", "weather", "prayer_times"] {
        assert_eq!(record.get(key).unwrap().as_array().unwrap().len(), 3, "{}", key);
    }
    for key in required_top_level_keys() {
        assert!(record.contains_key(key), "missing {}", key);
    }
    assert!(record.missing_required().is_empty());

    let days = record.get("schedule_days").unwrap().as_array().unwrap();
    assert_eq!(days[0]["date"], json!("2025-09-02"));
    assert_eq!(days[2]["date"], json!("2025-09-04"));
    assert_eq!(days[0]["items"][0]["activity"], json!("To be determined"));
    let last_items = days[2]["items"].as_array().unwrap();
    assert_eq!(
        last_items.last().unwrap()["activity"],
        json!("Closing ceremony")
    );

    assert_eq!(record.get_path("embassy.ambassador_name").unwrap(), "Unknown");
    assert_eq!(record.get_path("country_info.capital").unwrap(), "To be determined");
    assert!(outcome.overrides.is_empty());
    assert_eq!(
        outcome.stage(Stage::Sections).unwrap().outcome,
        StageOutcome::Failed
    );
}

#[tokio::test]
async fn overlay_ambassador_beats_generated_name() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.on_prompt_containing(
        "Fill in the facts section",
        r#"```json
{
  "embassy": {"name": "Saudi Embassy", "ambassador_name": "Sheikh Invented Person"},
  "key_ambassadors": [{"name": "Sheikh Invented Person", "title": "Ambassador"}],
  "country_info": {"head_of_state": "Someone Else", "capital": "Washington"}
}
```"#,
    );
    let pipeline = SynthesisPipeline::with_provider(config(), mock)
        .unwrap()
        .with_today(today());

    let outcome = pipeline.run(&milken()).await.unwrap();
    let record = &outcome.record;

    assert_eq!(
        record.get_path("embassy.ambassador_name").unwrap(),
        "HRH Princess Reema bint Bandar"
    );
    assert_eq!(
        record.get_path("key_ambassadors.0.name").unwrap(),
        "HRH Princess Reema bint Bandar"
    );
    assert_eq!(
        record.get_path("country_info.head_of_state").unwrap(),
        "Donald J. Trump"
    );
    assert_eq!(
        record.get_path("conference_data.slogan").unwrap(),
        "Toward a Flourishing Future"
    );
    assert_eq!(record.get_path("prayer_times.3.fajr").unwrap(), "05:18");
    assert_eq!(record.get("schedule_days").unwrap().as_array().unwrap().len(), 4);

    for (path, value) in outcome.overrides.iter() {
        assert_eq!(record.get_path(path), Some(&Value::String(value.to_string())), "{}", path);
    }
}

#[tokio::test]
async fn repeated_session_speaker_is_reset() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.on_prompt_containing(
        "Fill in the people section",
        r#"{"sessions": [
            {"title": "Opening", "speakers": "Dr. Amina Okafor"},
            {"title": "Panel A", "speakers": "Dr. Amina Okafor"},
            {"title": "Panel B", "speakers": "Dr. Amina Okafor, Li Wei"},
            {"title": "Panel C", "speakers": "Maria Santos"},
            {"title": "Closing", "speakers": "Kwame Mensah"}
        ]}"#,
    );
    let pipeline = SynthesisPipeline::with_provider(config(), mock)
        .unwrap()
        .with_today(today());

    let outcome = pipeline.run(&random_expo()).await.unwrap();
    let sessions = outcome.record.get("sessions").unwrap().as_array().unwrap();
    let speakers: Vec<&str> = sessions
        .iter()
        .map(|s| s["speakers"].as_str().unwrap())
        .collect();
    assert_eq!(
        speakers,
        vec!["Unknown", "Unknown", "Unknown", "Maria Santos", "Kwame Mensah"]
    );
    assert_eq!(outcome.normalize.speakers_reset, 3);
}

#[tokio::test]
async fn normalizing_a_finished_record_changes_nothing() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.on_prompt_containing(
        "Fill in the schedule section",
        r#"{"schedule_days": [{"day_label": "Day 1", "items": [{"time": "09:00", "activity": "Keynote"}]}],
            "weather": [{"condition": "Sunny", "high": "27°C", "low": "14°C"}]}"#,
    );
    let config = config();
    let pipeline = SynthesisPipeline::with_provider(config.clone(), mock)
        .unwrap()
        .with_today(today());
    let request = milken();
    let outcome = pipeline.run(&request).await.unwrap();

    let weather = outcome.record.get("weather").unwrap().as_array().unwrap();
    assert_eq!(weather.len(), 4);
    assert_eq!(weather[0]["high"], json!(27));

    let normalizer = Normalizer::new(config.normalize);
    let (again, report) =
        normalizer.normalize(outcome.record.clone(), &request, &outcome.overrides);
    assert_eq!(again, outcome.record);
    assert_eq!(report.edits(), 0);
}

#[tokio::test]
async fn research_and_consolidation_feed_the_sections() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.on_prompt_containing(
        "extract exactly one line per field",
        "EXACT THEME: Resilient Futures\nATTENDANCE: 2,000 delegates",
    );
    mock.on_prompt_containing(
        "Fill in the narrative section",
        r#"{"report_subtitle": "Resilient Futures", "executive_summary": "Summary."}"#,
    );
    let pipeline = SynthesisPipeline::with_provider(config(), mock.clone())
        .unwrap()
        .with_today(today());

    let outcome = pipeline.run(&random_expo()).await.unwrap();
    assert_eq!(
        outcome.stage(Stage::Research).unwrap().outcome,
        StageOutcome::Success
    );
    assert_eq!(
        outcome.stage(Stage::Consolidate).unwrap().outcome,
        StageOutcome::Success
    );
    assert_eq!(
        outcome.record.get("report_subtitle").unwrap(),
        "Resilient Futures"
    );

    let section_prompt = mock
        .calls()
        .into_iter()
        .map(|c| c.messages.last().unwrap().content.clone())
        .find(|p| p.contains("Fill in the narrative section"))
        .unwrap();
    assert!(section_prompt.contains("EXACT THEME: Resilient Futures"));
    assert!(outcome.queries.iter().all(|q| q.succeeded()));
}
