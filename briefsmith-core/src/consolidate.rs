//! Fact consolidation.
//!
//! One generation call distills the high-risk facts from the whole corpus
//! into a short block that is prepended to the corpus, so every section sees
//! one agreed answer instead of several conflicting ones.

use crate::brain::Brain;
use crate::corpus::{BlockKind, CorpusBlock, ResearchCorpus};
use crate::error::LlmError;
use crate::types::OutputMode;
use tracing::{info, warn};

/// The facts the consolidator extracts, one line each.
pub const CONSOLIDATED_FIELDS: &[&str] = &[
    "EXACT THEME",
    "ATTENDANCE",
    "KEYNOTE SPEAKER",
    "SPEAKER ROSTER",
    "HEAD OF STATE",
    "AMBASSADOR",
    "CONSUL GENERAL",
    "BILATERAL TRADE",
];

/// Result of one consolidation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consolidation {
    /// A block was prepended; `resolved` fields carried a value.
    Prepended { resolved: usize },
    /// Nothing to consolidate.
    Skipped,
    /// The call failed; the corpus is unchanged.
    Failed(String),
}

/// Distills a research corpus into a verified-facts block.
pub struct FactConsolidator<'a> {
    brain: &'a Brain,
    corpus_max_chars: usize,
    max_output: usize,
    not_found: &'a str,
}

impl<'a> FactConsolidator<'a> {
    pub fn new(
        brain: &'a Brain,
        corpus_max_chars: usize,
        max_output: usize,
        not_found: &'a str,
    ) -> Self {
        Self {
            brain,
            corpus_max_chars,
            max_output,
            not_found,
        }
    }

    /// Generate the consolidated block text.
    pub async fn consolidate(&self, corpus: &ResearchCorpus) -> Result<String, LlmError> {
        let prompt = build_consolidation_prompt(
            &corpus.truncated(self.corpus_max_chars),
            self.not_found,
        );
        let text = self
            .brain
            .generate(&prompt, OutputMode::FreeText, self.max_output, Some(SYSTEM))
            .await?;
        Ok(text.trim().to_string())
    }

    /// Consolidate and prepend the result. Never fails the caller.
    pub async fn consolidate_into(&self, corpus: &mut ResearchCorpus) -> Consolidation {
        if corpus.is_empty() {
            info!("Empty corpus, skipping consolidation");
            return Consolidation::Skipped;
        }
        match self.consolidate(corpus).await {
            Ok(text) => {
                let resolved = count_resolved(&text, self.not_found);
                info!(chars = text.len(), resolved, "Consolidated verified facts");
                corpus.prepend(CorpusBlock::new(BlockKind::ConsolidatedFacts, text));
                Consolidation::Prepended { resolved }
            }
            Err(e) => {
                warn!(error = %e, "Fact consolidation failed, continuing with raw corpus");
                Consolidation::Failed(e.to_string())
            }
        }
    }
}

const SYSTEM: &str = "Fact consolidation analyst. Resolve conflicts between sources by \
authority: official event website first, then official press releases, then general news. \
Never introduce a fact that is not in the research.";

fn build_consolidation_prompt(corpus: &str, not_found: &str) -> String {
    let mut prompt = String::from(
        "From the research below, extract exactly one line per field in the form \
         `FIELD: value`. When sources disagree, take the value from the most authoritative \
         source (official website > press release > general news).\n\n",
    );
    for field in CONSOLIDATED_FIELDS {
        prompt.push_str(&format!("{}: \n", field));
    }
    prompt.push_str(&format!(
        "\nWrite \"{}\" for any field the research does not establish. The SPEAKER ROSTER \
         line lists every confirmed speaker as `Name (Title, Organization)` separated by \
         semicolons.\n\nRESEARCH:\n{}",
        not_found, corpus
    ));
    prompt
}

/// Number of field lines that carry a value other than the not-found marker.
fn count_resolved(text: &str, not_found: &str) -> usize {
    let marker = not_found.to_lowercase();
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(field, _)| {
            let field = field.trim().trim_start_matches(['-', '*', ' ']).to_uppercase();
            CONSOLIDATED_FIELDS.contains(&field.as_str())
        })
        .filter(|(_, value)| {
            let value = value.trim().to_lowercase();
            !value.is_empty() && !value.starts_with(&marker)
        })
        .count()
}
