//! Research aggregator. Runs the query plan and assembles the corpus.

use super::queries::{ResearchQuery, ResearchQueryKind};
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::corpus::{BlockKind, CorpusBlock, ResearchCorpus};
use crate::error::LlmError;
use crate::providers::{RetryPolicy, with_retry};
use crate::synthesis::SynthesisCallback;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What one research query contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub kind: ResearchQueryKind,
    pub label: String,
    /// Characters of text kept; zero when the query was abandoned.
    pub chars: usize,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.chars > 0
    }
}

/// The assembled corpus and a per-query account.
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    pub corpus: ResearchCorpus,
    pub queries: Vec<QueryOutcome>,
}

impl ResearchOutcome {
    pub fn succeeded(&self) -> usize {
        self.queries.iter().filter(|q| q.succeeded()).count()
    }

    pub fn abandoned(&self) -> usize {
        self.queries.len() - self.succeeded()
    }
}

/// Runs research queries against the generation client.
///
/// A failing query is retried per the research policy and then abandoned;
/// it never aborts the run.
pub struct ResearchAggregator<'a> {
    brain: &'a Brain,
    config: &'a ResearchConfig,
    policy: RetryPolicy,
}

impl<'a> ResearchAggregator<'a> {
    pub fn new(brain: &'a Brain, config: &'a ResearchConfig, policy: RetryPolicy) -> Self {
        Self {
            brain,
            config,
            policy,
        }
    }

    /// Run every query and assemble the corpus.
    ///
    /// Blocks land in priority order: website, recap, the overlay block,
    /// primary, supplemental, verification. Concurrent dispatch does not
    /// change that order.
    pub async fn run(
        &self,
        queries: &[ResearchQuery],
        overlay_block: Option<&str>,
        callback: &dyn SynthesisCallback,
    ) -> ResearchOutcome {
        let results = if self.config.parallel {
            join_all(queries.iter().map(|q| self.run_query(q, callback))).await
        } else {
            let mut results = Vec::with_capacity(queries.len());
            for query in queries {
                results.push(self.run_query(query, callback).await);
            }
            results
        };

        let mut outcome = ResearchOutcome::default();
        let mut overlay = overlay_block.filter(|b| !b.trim().is_empty());
        for (query, (report, text)) in queries.iter().zip(results) {
            if query.kind >= ResearchQueryKind::Primary
                && let Some(block) = overlay.take()
            {
                outcome
                    .corpus
                    .push(CorpusBlock::new(BlockKind::KnowledgeOverlay, block));
            }
            if let Some(text) = text {
                outcome.corpus.push(
                    CorpusBlock::new(query.kind.block_kind(), text).with_label(query.block_label()),
                );
            }
            outcome.queries.push(report);
        }
        if let Some(block) = overlay {
            outcome
                .corpus
                .push(CorpusBlock::new(BlockKind::KnowledgeOverlay, block));
        }

        info!(
            queries = outcome.queries.len(),
            succeeded = outcome.succeeded(),
            blocks = outcome.corpus.len(),
            chars = outcome.corpus.total_chars(),
            "Research corpus assembled"
        );
        outcome
    }

    async fn run_query(
        &self,
        query: &ResearchQuery,
        callback: &dyn SynthesisCallback,
    ) -> (QueryOutcome, Option<String>) {
        let label = query.label();
        let brain = self.brain;
        let prompt = query.prompt.as_str();
        let system = query.system.as_str();
        let max_output = self.config.max_output_tokens;
        let min_chars = self.config.min_block_chars;

        let result = with_retry(&self.policy, move || async move {
            let text = brain.generate_grounded(prompt, max_output, Some(system)).await?;
            let text = text.trim().to_string();
            if text.chars().count() < min_chars {
                return Err(LlmError::EmptyResponse {
                    model: brain.model_name().to_string(),
                });
            }
            Ok(text)
        })
        .await;

        let (report, text) = match result {
            Ok(text) => {
                let chars = text.chars().count();
                info!(query = label.as_str(), chars, "Research query complete");
                (
                    QueryOutcome {
                        kind: query.kind,
                        label,
                        chars,
                        error: None,
                    },
                    Some(text),
                )
            }
            Err(e) => {
                warn!(query = label.as_str(), error = %e, "Research query abandoned");
                (
                    QueryOutcome {
                        kind: query.kind,
                        label,
                        chars: 0,
                        error: Some(e.to_string()),
                    },
                    None,
                )
            }
        };
        callback.on_query_complete(&report.label, report.chars);
        (report, text)
    }
}
