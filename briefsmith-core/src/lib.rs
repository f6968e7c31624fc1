//! # Briefsmith Core
//!
//! Core library for Briefsmith, which turns a handful of event facts into a
//! research-grounded delegation briefing.
//! Provides the generation client (brain), research aggregation, the static
//! knowledge overlay, fact consolidation, sectioned synthesis, structured
//! output repair, and the deterministic normalizer.

pub mod brain;
pub mod config;
pub mod consolidate;
pub mod corpus;
pub mod error;
pub mod knowledge;
pub mod normalize;
pub mod providers;
pub mod record;
pub mod repair;
pub mod request;
pub mod research;
pub mod synthesis;
pub mod translate;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use config::{BriefConfig, NormalizeConfig, OrganizationConfig, RetryConfig, Sentinels};
pub use corpus::{BlockKind, CorpusBlock, ResearchCorpus};
pub use error::{BriefError, ConfigError, LlmError, RequestError, Result};
pub use knowledge::{KnowledgeOverlay, OverrideVariables};
pub use normalize::{NormalizeReport, Normalizer};
pub use providers::{ProviderChain, RetryPolicy};
pub use record::DocumentRecord;
pub use repair::repair;
pub use request::SynthesisRequest;
pub use synthesis::{
    NoOpCallback, Section, Stage, StageOutcome, StageReport, SynthesisCallback, SynthesisOutcome,
    SynthesisPipeline,
};
pub use types::{CompletionRequest, CompletionResponse, Message, OutputMode, Role, TokenUsage};
