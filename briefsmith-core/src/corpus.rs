//! The research corpus: an ordered list of labelled text blocks.
//!
//! Order encodes priority. Earlier blocks are more trustworthy and every
//! prompt that embeds the corpus tells the model so.

use serde::{Deserialize, Serialize};

/// Where a corpus block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    OfficialWebsite,
    PostEventRecap,
    KnowledgeOverlay,
    PrimaryResearch,
    SupplementalResearch,
    Verification,
    ConsolidatedFacts,
}

impl BlockKind {
    /// Separator label used when rendering.
    pub fn default_label(&self) -> &'static str {
        match self {
            BlockKind::OfficialWebsite => "OFFICIAL WEBSITE DATA",
            BlockKind::PostEventRecap => "POST-EVENT RECAP",
            BlockKind::KnowledgeOverlay => "VERIFIED KNOWLEDGE BASE",
            BlockKind::PrimaryResearch => "PRIMARY RESEARCH",
            BlockKind::SupplementalResearch => "SUPPLEMENTAL RESEARCH",
            BlockKind::Verification => "FACT VERIFICATION",
            BlockKind::ConsolidatedFacts => "CONSOLIDATED VERIFIED FACTS",
        }
    }
}

/// One labelled block of research text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusBlock {
    pub kind: BlockKind,
    pub label: String,
    pub text: String,
}

impl CorpusBlock {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            label: kind.default_label().to_string(),
            text: text.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn render(&self) -> String {
        format!("=== {} ===\n{}", self.label, self.text.trim())
    }
}

const ELISION: &str = "\n\n[... middle of research corpus omitted for length ...]\n\n";

const EMPTY_NOTE: &str = "No research could be retrieved. Use best-effort general knowledge, \
and write NOT FOUND for any specific name, figure, or address you cannot verify.";

/// Request-scoped research corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchCorpus {
    blocks: Vec<CorpusBlock>,
}

impl ResearchCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: CorpusBlock) {
        self.blocks.push(block);
    }

    pub fn prepend(&mut self, block: CorpusBlock) {
        self.blocks.insert(0, block);
    }

    pub fn blocks(&self) -> &[CorpusBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, kind: BlockKind) -> bool {
        self.blocks.iter().any(|b| b.kind == kind)
    }

    pub fn total_chars(&self) -> usize {
        self.blocks.iter().map(|b| b.text.chars().count()).sum()
    }

    /// Full text with `=== LABEL ===` separators, in priority order.
    pub fn render(&self) -> String {
        if self.blocks.is_empty() {
            return EMPTY_NOTE.to_string();
        }
        self.blocks
            .iter()
            .map(CorpusBlock::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Rendered text cut to at most `max_chars` characters.
    ///
    /// Keeps the head and tail halves and replaces the middle with an
    /// elision marker, so both the highest-priority blocks and the
    /// latest verification survive.
    pub fn truncated(&self, max_chars: usize) -> String {
        truncate_middle(&self.render(), max_chars)
    }
}

/// Cut `text` to at most `max_chars` characters, eliding the middle.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let marker_len = ELISION.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }
    let budget = max_chars - marker_len;
    let head_len = budget / 2;
    let tail_len = budget - head_len;

    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(total - tail_len).collect();
    format!("{}{}{}", head, ELISION, tail)
}
