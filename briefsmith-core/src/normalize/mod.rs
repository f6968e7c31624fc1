//! Deterministic override and normalization.
//!
//! Runs once over the merged record, in this order:
//! 1. force-write overlay overrides
//! 2. coerce common shape mistakes
//! 3. reset over-attributed session speakers
//! 4. rewrite leaked placeholders to sentinels
//! 5. expand per-day lists to the requested day count
//! 6. backfill required fields
//!
//! The pass is a pure function of its inputs and running it on its own
//! output changes nothing.

pub mod coerce;
pub mod overrides;
pub mod placeholders;
pub mod repetition;
pub mod required;
pub mod schedule;

use crate::config::NormalizeConfig;
use crate::knowledge::OverrideVariables;
use crate::record::DocumentRecord;
use crate::request::SynthesisRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// What the normalizer changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub overrides_applied: usize,
    pub values_coerced: usize,
    pub speakers_reset: usize,
    pub placeholders_replaced: usize,
    pub days_synthesized: usize,
    pub days_truncated: usize,
    pub fields_backfilled: usize,
}

impl NormalizeReport {
    /// Number of edits other than override writes.
    pub fn edits(&self) -> usize {
        self.values_coerced
            + self.speakers_reset
            + self.placeholders_replaced
            + self.days_synthesized
            + self.days_truncated
            + self.fields_backfilled
    }
}

/// Post-generation normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalize `record` in place.
    pub fn run(
        &self,
        record: &mut DocumentRecord,
        request: &SynthesisRequest,
        overrides: &OverrideVariables,
    ) -> NormalizeReport {
        let sentinels = &self.config.sentinels;
        let mut report = NormalizeReport {
            overrides_applied: overrides::apply(record, overrides),
            ..Default::default()
        };
        report.values_coerced = coerce::coerce(record, overrides, &sentinels.tbd);
        report.speakers_reset = repetition::suppress_repeated_speakers(
            record,
            self.config.repetition_threshold,
            self.config.repetition_min_occurrences,
            &sentinels.unknown_person,
        );
        report.placeholders_replaced = placeholders::sanitize(record, &self.config, overrides);
        let expansion = schedule::expand(record, request, &self.config);
        report.days_synthesized = expansion.synthesized;
        report.days_truncated = expansion.truncated;
        report.fields_backfilled = required::backfill(record, sentinels).len();

        info!(
            overrides = report.overrides_applied,
            coerced = report.values_coerced,
            speakers_reset = report.speakers_reset,
            placeholders = report.placeholders_replaced,
            days_synthesized = report.days_synthesized,
            backfilled = report.fields_backfilled,
            "Normalized record"
        );
        report
    }

    /// Normalize an owned record and return it.
    pub fn normalize(
        &self,
        mut record: DocumentRecord,
        request: &SynthesisRequest,
        overrides: &OverrideVariables,
    ) -> (DocumentRecord, NormalizeReport) {
        let report = self.run(&mut record, request, overrides);
        (record, report)
    }
}

/// Every session object, whether `sessions` is a flat list or keyed by day.
pub(crate) fn session_entries_mut(record: &mut DocumentRecord) -> Vec<&mut Map<String, Value>> {
    match record.get_path_mut("sessions") {
        Some(Value::Array(items)) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
        Some(Value::Object(days)) => days
            .values_mut()
            .filter_map(Value::as_array_mut)
            .flat_map(|items| items.iter_mut())
            .filter_map(Value::as_object_mut)
            .collect(),
        _ => Vec::new(),
    }
}
