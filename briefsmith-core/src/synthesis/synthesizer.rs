//! Sectioned generation: one constrained-JSON call per section.

use super::prompts::{section_prompt, system_protocol};
use super::sections::{SchemaContext, Section};
use super::stage::SynthesisCallback;
use crate::brain::Brain;
use crate::config::{OrganizationConfig, Sentinels, SynthesisConfig};
use crate::corpus::ResearchCorpus;
use crate::error::SectionError;
use crate::knowledge::OverrideVariables;
use crate::providers::{RetryPolicy, with_attempts};
use crate::repair::repair;
use crate::request::SynthesisRequest;
use crate::types::OutputMode;
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// What one generated section contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    pub section: Section,
    /// Owned keys with their generated values; empty when the section failed.
    pub fields: Map<String, Value>,
    pub error: Option<String>,
}

impl SectionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.fields.is_empty()
    }
}

/// Generates the research-backed sections of the document.
pub struct SectionSynthesizer<'a> {
    brain: &'a Brain,
    config: &'a SynthesisConfig,
    organization: &'a OrganizationConfig,
    sentinels: &'a Sentinels,
    policy: RetryPolicy,
}

impl<'a> SectionSynthesizer<'a> {
    pub fn new(
        brain: &'a Brain,
        config: &'a SynthesisConfig,
        organization: &'a OrganizationConfig,
        sentinels: &'a Sentinels,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            brain,
            config,
            organization,
            sentinels,
            policy,
        }
    }

    /// Generate every section in `sections`, in order unless parallel dispatch
    /// is enabled. A failed section yields an empty outcome, never an error.
    pub async fn run(
        &self,
        sections: &[Section],
        request: &SynthesisRequest,
        overrides: &OverrideVariables,
        corpus: &ResearchCorpus,
        callback: &dyn SynthesisCallback,
    ) -> Vec<SectionOutcome> {
        let corpus_text = corpus.truncated(self.config.corpus_max_chars);
        let corpus_text = corpus_text.as_str();
        let generated = sections.iter().filter(|s| s.is_generated());

        if self.config.parallel {
            join_all(generated.map(|&section| {
                self.run_section(section, request, overrides, corpus_text, callback)
            }))
            .await
        } else {
            let mut outcomes = Vec::new();
            for &section in generated {
                outcomes.push(
                    self.run_section(section, request, overrides, corpus_text, callback)
                        .await,
                );
            }
            outcomes
        }
    }

    async fn run_section(
        &self,
        section: Section,
        request: &SynthesisRequest,
        overrides: &OverrideVariables,
        corpus: &str,
        callback: &dyn SynthesisCallback,
    ) -> SectionOutcome {
        let outcome = match self.generate(section, request, overrides, corpus).await {
            Ok(fields) => {
                info!(section = %section, fields = fields.len(), "Section generated");
                SectionOutcome {
                    section,
                    fields,
                    error: None,
                }
            }
            Err(e) => {
                warn!(section = %section, error = %e, "Section abandoned");
                SectionOutcome {
                    section,
                    fields: Map::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        callback.on_section_complete(section, outcome.fields.len());
        outcome
    }

    /// Generate one section, retrying per the section policy.
    ///
    /// An attempt succeeds when the repaired output carries at least one
    /// owned key with real content. Foreign keys are dropped.
    pub async fn generate(
        &self,
        section: Section,
        request: &SynthesisRequest,
        overrides: &OverrideVariables,
        corpus: &str,
    ) -> Result<Map<String, Value>, SectionError> {
        let ctx = SchemaContext {
            request,
            organization: self.organization,
        };
        let prompt = section_prompt(section, &ctx, overrides, corpus);
        let system = system_protocol(&self.config.language, self.sentinels);
        let (prompt, system) = (prompt.as_str(), system.as_str());
        let max_output = self.config.section_max_tokens;
        let brain = self.brain;

        with_attempts(&self.policy, section.name(), move |attempt| async move {
            debug!(section = %section, attempt, "Generating section");
            let raw = brain
                .generate(prompt, OutputMode::ConstrainedJson, max_output, Some(system))
                .await?;
            let object = section.retain_owned(repair(&raw));
            if section.accepts(&object) {
                Ok(object)
            } else {
                Err(SectionError::Unusable {
                    section: section.name().to_string(),
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::corpus::{BlockKind, CorpusBlock};
    use crate::error::LlmError;
    use crate::synthesis::NoOpCallback;
    use std::sync::Arc;

    struct Fixture {
        config: SynthesisConfig,
        organization: OrganizationConfig,
        sentinels: Sentinels,
        request: SynthesisRequest,
        corpus: ResearchCorpus,
    }

    impl Fixture {
        fn new() -> Self {
            let mut corpus = ResearchCorpus::new();
            corpus.push(CorpusBlock::new(BlockKind::PrimaryResearch, "research body"));
            Self {
                config: SynthesisConfig::default(),
                organization: OrganizationConfig::default(),
                sentinels: Sentinels::default(),
                request: SynthesisRequest::builder("Expo", "Riyadh", "Saudi Arabia", "2026-03-01")
                    .build()
                    .unwrap(),
                corpus,
            }
        }

        fn synthesizer<'a>(&'a self, brain: &'a Brain) -> SectionSynthesizer<'a> {
            SectionSynthesizer::new(
                brain,
                &self.config,
                &self.organization,
                &self.sentinels,
                RetryPolicy::linear(2, std::time::Duration::ZERO),
            )
        }
    }

    #[tokio::test]
    async fn test_section_keeps_only_owned_keys() {
        let mock = Arc::new(MockLlmProvider::with_response(
            r#"{"trade_exchange": "USD 2.1bn (2024)", "speakers": [{"name": "X"}]}"#,
        ));
        let brain = Brain::new(mock.clone(), RetryPolicy::once());
        let fx = Fixture::new();
        let outcomes = fx
            .synthesizer(&brain)
            .run(
                &[Section::Intelligence],
                &fx.request,
                &OverrideVariables::new(),
                &fx.corpus,
                &NoOpCallback,
            )
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded());
        assert!(outcomes[0].fields.contains_key("trade_exchange"));
        assert!(!outcomes[0].fields.contains_key("speakers"));
        let call = &mock.calls()[0];
        assert_eq!(call.mode, OutputMode::ConstrainedJson);
        assert!(call.messages[0].content.contains("ANTI-HALLUCINATION"));
    }

    #[tokio::test]
    async fn test_unusable_output_is_retried_then_abandoned() {
        let mock = Arc::new(MockLlmProvider::with_response("I cannot help with that."));
        let brain = Brain::new(mock.clone(), RetryPolicy::once());
        let fx = Fixture::new();
        let outcomes = fx
            .synthesizer(&brain)
            .run(
                &[Section::Narrative],
                &fx.request,
                &OverrideVariables::new(),
                &fx.corpus,
                &NoOpCallback,
            )
            .await;

        assert!(!outcomes[0].succeeded());
        assert!(outcomes[0].fields.is_empty());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_attempt_recovers() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_error(LlmError::AuthFailed {
            provider: "mock".into(),
        });
        mock.queue_response(MockLlmProvider::text_response(
            "```json\n{\"talking_points\": [\"Mutual recognition of approvals\"]}\n```",
        ));
        let brain = Brain::new(mock.clone(), RetryPolicy::once());
        let fx = Fixture::new();
        let fields = fx
            .synthesizer(&brain)
            .generate(Section::Annexes, &fx.request, &OverrideVariables::new(), "corpus")
            .await
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_document_control_is_never_generated() {
        let mock = Arc::new(MockLlmProvider::new());
        let brain = Brain::new(mock.clone(), RetryPolicy::once());
        let fx = Fixture::new();
        let outcomes = fx
            .synthesizer(&brain)
            .run(
                &Section::ALL,
                &fx.request,
                &OverrideVariables::new(),
                &fx.corpus,
                &NoOpCallback,
            )
            .await;
        assert_eq!(outcomes.len(), Section::GENERATED.len());
        assert!(outcomes.iter().all(|o| o.section != Section::DocumentControl));
    }

    #[tokio::test]
    async fn test_parallel_preserves_section_order() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.on_prompt_containing("Fill in the facts section", r#"{"embassy": {"name": "E"}}"#);
        mock.on_prompt_containing("Fill in the schedule section", r#"{"weather": [{"high": 30}]}"#);
        let brain = Brain::new(mock, RetryPolicy::once());
        let mut fx = Fixture::new();
        fx.config.parallel = true;
        let outcomes = fx
            .synthesizer(&brain)
            .run(
                &[Section::Facts, Section::Schedule],
                &fx.request,
                &OverrideVariables::new(),
                &fx.corpus,
                &NoOpCallback,
            )
            .await;
        assert_eq!(outcomes[0].section, Section::Facts);
        assert_eq!(outcomes[1].section, Section::Schedule);
        assert!(outcomes.iter().all(SectionOutcome::succeeded));
    }
}
