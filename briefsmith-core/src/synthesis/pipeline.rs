//! The synthesis pipeline: named stages from request to normalized record.

use super::document_control;
use super::sections::Section;
use super::stage::{NoOpCallback, Stage, StageOutcome, StageReport, SynthesisCallback};
use super::synthesizer::SectionSynthesizer;
use crate::brain::{Brain, LlmProvider};
use crate::config::BriefConfig;
use crate::consolidate::{Consolidation, FactConsolidator};
use crate::error::ConfigError;
use crate::knowledge::{KnowledgeOverlay, OverrideVariables};
use crate::normalize::{NormalizeReport, Normalizer};
use crate::providers::ProviderChain;
use crate::record::DocumentRecord;
use crate::request::SynthesisRequest;
use crate::research::{QueryOutcome, QueryPlanner, ResearchAggregator};
use crate::translate::{Translation, Translator};
use crate::types::TokenUsage;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutcome {
    /// The complete, normalized document.
    pub record: DocumentRecord,
    pub stages: Vec<StageReport>,
    pub queries: Vec<QueryOutcome>,
    /// Overlay values force-written into the record.
    pub overrides: OverrideVariables,
    pub normalize: NormalizeReport,
    pub usage: TokenUsage,
}

impl SynthesisOutcome {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Whether any stage ended partial or failed.
    pub fn is_degraded(&self) -> bool {
        self.stages.iter().any(StageReport::is_degraded)
    }
}

/// Runs `translate → overlay → research → consolidate → sections → normalize`.
///
/// Each run owns its corpus, record, generation client and circuit
/// breakers; the pipeline itself holds only configuration and the provider
/// chain, so one instance can serve many requests.
pub struct SynthesisPipeline {
    config: BriefConfig,
    providers: ProviderChain,
    overlay: KnowledgeOverlay,
    normalizer: Normalizer,
    callback: Arc<dyn SynthesisCallback>,
    today: Option<NaiveDate>,
}

impl SynthesisPipeline {
    /// Build a pipeline with the providers named in `config.llm`.
    pub fn new(config: BriefConfig) -> Result<Self, ConfigError> {
        let providers = ProviderChain::from_config(&config.llm)?;
        Self::with_providers(config, providers)
    }

    /// Build a pipeline around an explicit provider.
    ///
    /// The provider is shared by every run, so any state it keeps (such as
    /// the breakers of a caller-built `FailoverProvider`) is shared too.
    pub fn with_provider(
        config: BriefConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ConfigError> {
        Self::with_providers(config, ProviderChain::new(vec![provider]))
    }

    /// Build a pipeline around an ordered provider chain.
    pub fn with_providers(
        config: BriefConfig,
        providers: ProviderChain,
    ) -> Result<Self, ConfigError> {
        if !providers.is_available() {
            return Err(ConfigError::NoProvider);
        }
        let overlay = KnowledgeOverlay::from_config(&config.knowledge)?;
        let normalizer = Normalizer::new(config.normalize.clone());
        Ok(Self {
            config,
            providers,
            overlay,
            normalizer,
            callback: Arc::new(NoOpCallback),
            today: None,
        })
    }

    /// Replace the knowledge overlay loaded from config.
    pub fn with_overlay(mut self, overlay: KnowledgeOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn SynthesisCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Fix the date used for the past-event check and the issue date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &BriefConfig {
        &self.config
    }

    pub fn overlay(&self) -> &KnowledgeOverlay {
        &self.overlay
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// A fresh generation client for one run.
    fn run_brain(&self) -> Brain {
        Brain::new(self.providers.for_run(), self.config.retry.client_policy())
            .with_temperatures(self.config.llm.temperature, self.config.llm.json_temperature)
    }

    /// Synthesize the document for `request`.
    ///
    /// The only error is a missing provider, checked before any stage runs.
    /// Every other failure degrades a stage and the run still returns a
    /// complete record.
    pub async fn run(&self, request: &SynthesisRequest) -> Result<SynthesisOutcome, ConfigError> {
        if !self.providers.is_available() {
            return Err(ConfigError::NoProvider);
        }
        let brain = self.run_brain();
        let today = self
            .today
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let callback = &*self.callback;
        let org = &self.config.organization;
        let sentinels = &self.config.normalize.sentinels;
        let mut stages = Vec::new();

        info!(
            event = request.event_name(),
            city = request.city(),
            country = request.country(),
            days = request.number_of_days(),
            model = brain.model_name(),
            "Starting synthesis"
        );

        // Research runs on an English view; the record keeps the caller's text.
        let started = self.begin(Stage::Translate);
        let (view, translation) = if self.config.synthesis.translate_inputs {
            Translator::new(&brain).translate(request).await
        } else {
            (request.clone(), Translation::Unchanged)
        };
        let report = match translation {
            Translation::Unchanged => StageReport::new(
                Stage::Translate,
                StageOutcome::Skipped,
                "no fields needed translation",
            ),
            Translation::Translated { fields } => StageReport::new(
                Stage::Translate,
                StageOutcome::Success,
                format!("{} fields translated", fields),
            ),
            Translation::Failed(e) => StageReport::new(Stage::Translate, StageOutcome::Failed, e),
        };
        self.finish(&mut stages, report, started);

        let started = self.begin(Stage::Overlay);
        let overrides = self.overlay.override_variables(&view, &org.home_country);
        let overlay_block = self.overlay.render_block(&view, &org.home_country);
        let report = if overlay_block.is_none() && overrides.is_empty() {
            StageReport::new(Stage::Overlay, StageOutcome::Skipped, "no overlay entry matched")
        } else {
            StageReport::new(
                Stage::Overlay,
                StageOutcome::Success,
                format!("{} override values", overrides.len()),
            )
        };
        self.finish(&mut stages, report, started);

        let started = self.begin(Stage::Research);
        let queries = QueryPlanner::new(
            &self.config.research,
            &org.home_country,
            &sentinels.not_found,
        )
        .plan(&view, today);
        let research = ResearchAggregator::new(
            &brain,
            &self.config.research,
            self.config.retry.research_policy(),
        )
        .run(&queries, overlay_block.as_deref(), callback)
        .await;
        let succeeded = research.succeeded();
        let outcome = if succeeded == queries.len() {
            StageOutcome::Success
        } else if succeeded == 0 {
            StageOutcome::Failed
        } else {
            StageOutcome::Partial
        };
        let detail = format!(
            "{}/{} queries, {} chars",
            succeeded,
            queries.len(),
            research.corpus.total_chars()
        );
        self.finish(
            &mut stages,
            StageReport::new(Stage::Research, outcome, detail),
            started,
        );

        let cooldown = Duration::from_millis(self.config.retry.phase_cooldown_ms);
        if !cooldown.is_zero() {
            info!(cooldown_ms = cooldown.as_millis() as u64, "Cooling down before generation");
            tokio::time::sleep(cooldown).await;
        }

        let started = self.begin(Stage::Consolidate);
        let mut corpus = research.corpus;
        let consolidation = FactConsolidator::new(
            &brain,
            self.config.synthesis.corpus_max_chars,
            self.config.synthesis.consolidation_max_tokens,
            &sentinels.not_found,
        )
        .consolidate_into(&mut corpus)
        .await;
        let report = match consolidation {
            Consolidation::Prepended { resolved } => StageReport::new(
                Stage::Consolidate,
                StageOutcome::Success,
                format!("{} facts resolved", resolved),
            ),
            Consolidation::Skipped => {
                StageReport::new(Stage::Consolidate, StageOutcome::Skipped, "empty corpus")
            }
            Consolidation::Failed(e) => {
                StageReport::new(Stage::Consolidate, StageOutcome::Failed, e)
            }
        };
        self.finish(&mut stages, report, started);

        let started = self.begin(Stage::Sections);
        let mut record = DocumentRecord::new();
        record.merge_section(
            Section::DocumentControl.owned_keys(),
            document_control::build(request, org, Uuid::new_v4(), today),
        );
        let outcomes = SectionSynthesizer::new(
            &brain,
            &self.config.synthesis,
            org,
            sentinels,
            self.config.retry.section_policy(),
        )
        .run(&Section::GENERATED, request, &overrides, &corpus, callback)
        .await;
        let generated = outcomes.iter().filter(|o| o.succeeded()).count();
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.section.name())
            .collect();
        for outcome in outcomes {
            record.merge_section(outcome.section.owned_keys(), outcome.fields);
        }
        let outcome = if failed.is_empty() {
            StageOutcome::Success
        } else if generated == 0 {
            StageOutcome::Failed
        } else {
            StageOutcome::Partial
        };
        let mut detail = format!("{}/{} sections", generated, Section::GENERATED.len());
        if !failed.is_empty() {
            detail.push_str(&format!(", failed: {}", failed.join(", ")));
        }
        self.finish(
            &mut stages,
            StageReport::new(Stage::Sections, outcome, detail),
            started,
        );

        let started = self.begin(Stage::Normalize);
        let normalize = self.normalizer.run(&mut record, request, &overrides);
        let report = StageReport::new(
            Stage::Normalize,
            StageOutcome::Success,
            format!(
                "{} overrides, {} edits",
                normalize.overrides_applied,
                normalize.edits()
            ),
        );
        self.finish(&mut stages, report, started);

        let usage = brain.total_usage();
        info!(
            degraded = stages.iter().any(StageReport::is_degraded),
            fields = record.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Synthesis complete"
        );

        Ok(SynthesisOutcome {
            record,
            stages,
            queries: research.queries,
            overrides,
            normalize,
            usage,
        })
    }

    fn begin(&self, stage: Stage) -> Instant {
        info!(stage = %stage, "Stage started");
        self.callback.on_stage_start(stage);
        Instant::now()
    }

    fn finish(&self, stages: &mut Vec<StageReport>, report: StageReport, started: Instant) {
        let report = report.with_elapsed(started.elapsed());
        if report.is_degraded() {
            warn!(
                stage = %report.stage,
                outcome = ?report.outcome,
                detail = report.detail.as_str(),
                "Stage degraded"
            );
        } else {
            info!(
                stage = %report.stage,
                outcome = ?report.outcome,
                detail = report.detail.as_str(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Stage finished"
            );
        }
        self.callback.on_stage_complete(&report);
        stages.push(report);
    }
}
