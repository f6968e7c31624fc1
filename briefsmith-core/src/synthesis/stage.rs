//! Pipeline stages, their reports, and the progress callback.

use super::sections::Section;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a synthesis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Translate,
    Overlay,
    Research,
    Consolidate,
    Sections,
    Normalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Overlay => "overlay",
            Stage::Research => "research",
            Stage::Consolidate => "consolidate",
            Stage::Sections => "sections",
            Stage::Normalize => "normalize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended. No stage outcome aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    /// Some units of work failed and were skipped.
    Partial,
    /// The stage had nothing to do.
    Skipped,
    /// The stage produced nothing; later stages ran on what was left.
    Failed,
}

/// Account of one finished stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub detail: String,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl StageReport {
    pub fn new(stage: Stage, outcome: StageOutcome, detail: impl Into<String>) -> Self {
        Self {
            stage,
            outcome,
            detail: detail.into(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, StageOutcome::Partial | StageOutcome::Failed)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Callback trait for progress updates during a synthesis run.
pub trait SynthesisCallback: Send + Sync {
    /// Called before a stage begins.
    fn on_stage_start(&self, stage: Stage);
    /// Called when a stage finishes, whatever its outcome.
    fn on_stage_complete(&self, report: &StageReport);
    /// Called after each research query; `chars` is zero when abandoned.
    fn on_query_complete(&self, label: &str, chars: usize);
    /// Called after each generated section; `fields` is zero when it failed.
    fn on_section_complete(&self, section: Section, fields: usize);
}

/// No-op callback for library callers and tests.
pub struct NoOpCallback;

impl SynthesisCallback for NoOpCallback {
    fn on_stage_start(&self, _stage: Stage) {}
    fn on_stage_complete(&self, _report: &StageReport) {}
    fn on_query_complete(&self, _label: &str, _chars: usize) {}
    fn on_section_complete(&self, _section: Section, _fields: usize) {}
}
