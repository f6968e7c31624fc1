//! Input translation for research.
//!
//! Requests may be written in Arabic; web research works far better in
//! English. The translated view is a separate request value used only for
//! research and consolidation. The caller's request is never modified.

use crate::brain::Brain;
use crate::repair::repair;
use crate::request::SynthesisRequest;
use crate::types::OutputMode;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Whether `text` contains any Arabic-script character.
pub fn has_arabic(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}

/// Outcome of translating a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// No field needed translating.
    Unchanged,
    /// `fields` fields were replaced by their English form.
    Translated { fields: usize },
    /// The call failed or returned nothing usable; the original text is kept.
    Failed(String),
}

pub struct Translator<'a> {
    brain: &'a Brain,
}

impl<'a> Translator<'a> {
    pub fn new(brain: &'a Brain) -> Self {
        Self { brain }
    }

    /// Return an English view of `request` for research.
    pub async fn translate(&self, request: &SynthesisRequest) -> (SynthesisRequest, Translation) {
        let mut fields = request.text_fields();
        let mut pending = Map::new();
        let candidates = [
            ("event_name", Some(&fields.event_name)),
            ("city", Some(&fields.city)),
            ("country", Some(&fields.country)),
            ("venue", fields.venue.as_ref()),
            ("context", fields.context.as_ref()),
        ];
        for (key, value) in candidates {
            if let Some(text) = value.filter(|t| has_arabic(t)) {
                pending.insert(key.to_string(), Value::String(text.clone()));
            }
        }
        if pending.is_empty() {
            return (request.clone(), Translation::Unchanged);
        }

        let prompt = format!(
            "Translate every value of this JSON object to English. Return only a JSON object \
             with exactly the same keys. Transliterate proper names; translate nothing else.\n\n{}",
            Value::Object(pending.clone())
        );
        let raw = match self
            .brain
            .generate(&prompt, OutputMode::ConstrainedJson, 400, None)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Input translation failed, researching with original text");
                return (request.clone(), Translation::Failed(e.to_string()));
            }
        };

        let translated = repair(&raw);
        let mut replaced = 0;
        for key in pending.keys() {
            let Some(english) = translated
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty() && !has_arabic(t))
            else {
                continue;
            };
            let english = english.to_string();
            match key.as_str() {
                "event_name" => fields.event_name = english,
                "city" => fields.city = english,
                "country" => fields.country = english,
                "venue" => fields.venue = Some(english),
                "context" => fields.context = Some(english),
                _ => continue,
            }
            replaced += 1;
        }

        if replaced == 0 {
            warn!("Translation returned no usable fields");
            return (
                request.clone(),
                Translation::Failed("no usable fields in translation".to_string()),
            );
        }
        info!(fields = replaced, "Translated request fields for research");
        (
            request.with_text_fields(fields),
            Translation::Translated { fields: replaced },
        )
    }
}
