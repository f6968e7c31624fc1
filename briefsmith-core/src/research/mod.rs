//! Research aggregation.
//!
//! Plans the research queries for a request, runs each through the
//! generation client with web grounding, and assembles the results into a
//! [`ResearchCorpus`](crate::corpus::ResearchCorpus) ordered by how much each
//! source can be trusted.

pub mod aggregator;
pub mod queries;

pub use aggregator::{QueryOutcome, ResearchAggregator, ResearchOutcome};
pub use queries::{QueryPlanner, ResearchQuery, ResearchQueryKind};
