use super::KnowledgeOverlay;
use tracing::warn;

const BUILTIN_TOML: &str = include_str!("builtin.toml");

/// The overlay table compiled into the binary.
pub fn builtin() -> KnowledgeOverlay {
    KnowledgeOverlay::from_toml_str(BUILTIN_TOML).unwrap_or_else(|e| {
        warn!(error = %e, "Built-in knowledge overlay failed to parse; continuing without it");
        KnowledgeOverlay::default()
    })
}
