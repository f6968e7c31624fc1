//! Sectioned synthesis and the end-to-end pipeline.
//!
//! The document schema is split into disjoint sections. Document control is
//! built deterministically; every other section is one constrained-JSON call
//! against the consolidated corpus, retried on its own and merged only into
//! the keys it owns.

pub mod document_control;
pub mod pipeline;
pub mod prompts;
pub mod sections;
pub mod stage;
pub mod synthesizer;

pub use pipeline::{SynthesisOutcome, SynthesisPipeline};
pub use sections::{SchemaContext, Section, is_substantive};
pub use stage::{NoOpCallback, Stage, StageOutcome, StageReport, SynthesisCallback};
pub use synthesizer::{SectionOutcome, SectionSynthesizer};
