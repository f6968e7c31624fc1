//! Configuration system for Briefsmith.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> environment -> explicit overrides. Configuration is loaded from
//! `~/.config/briefsmith/config.toml` and/or `.briefsmith/config.toml` in the
//! workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::RetryPolicy;

/// Top-level configuration for the synthesis pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefConfig {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub research: ResearchConfig,
    pub synthesis: SynthesisConfig,
    pub normalize: NormalizeConfig,
    pub organization: OrganizationConfig,
    pub knowledge: KnowledgeConfig,
}

/// Generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "anthropic", "openai", or any OpenAI-compatible endpoint name.
    pub provider: String,
    /// Model identifier used for structured generation.
    pub model: String,
    /// Model used for web-grounded research calls. Falls back to `model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_model: Option<String>,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Temperature for free-text research calls.
    pub temperature: f32,
    /// Temperature for constrained-JSON calls.
    pub json_temperature: f32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Upper bound on server-side web searches per grounded call.
    pub max_search_uses: u32,
    /// How many times a paused grounded turn may be continued.
    pub max_continuations: usize,
    /// Fallback providers tried in order when the primary fails.
    #[serde(default)]
    pub fallback_providers: Vec<FallbackProviderConfig>,
}

/// Configuration for a fallback generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackProviderConfig {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_model: Option<String>,
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            search_model: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 8000,
            temperature: 0.3,
            json_temperature: 0.15,
            timeout_secs: 300,
            max_search_uses: 8,
            max_continuations: 6,
            fallback_providers: vec![FallbackProviderConfig {
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                search_model: Some("gpt-4o-search-preview".to_string()),
                api_key_env: "OPENAI_API_KEY".to_string(),
                base_url: None,
            }],
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Warnings never block loading.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.json_temperature > 0.5 {
            warnings.push(format!(
                "json_temperature ({}) is high; structured sections may drift from the schema",
                self.json_temperature
            ));
        }
        if self.max_tokens < 1024 {
            warnings.push(format!(
                "max_tokens ({}) is small; research answers will be cut short",
                self.max_tokens
            ));
        }
        warnings
    }

    /// Build the config for a fallback entry, inheriting shared knobs from the primary.
    pub fn for_fallback(&self, fallback: &FallbackProviderConfig) -> LlmConfig {
        LlmConfig {
            provider: fallback.provider.clone(),
            model: fallback.model.clone(),
            search_model: fallback.search_model.clone(),
            api_key_env: fallback.api_key_env.clone(),
            api_key: None,
            base_url: fallback.base_url.clone(),
            fallback_providers: Vec::new(),
            ..self.clone()
        }
    }
}

/// Retry and backoff settings for each layer of the pipeline.
///
/// All backoff is linear: the wait before attempt `n + 1` is `base × n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt ceiling for a single generation call.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Attempts per research query.
    pub research_attempts: u32,
    pub research_base_delay_ms: u64,
    /// Attempts per generated section.
    pub section_attempts: u32,
    pub section_base_delay_ms: u64,
    /// Pause between research assembly and structured generation.
    pub phase_cooldown_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 20_000,
            research_attempts: 2,
            research_base_delay_ms: 30_000,
            section_attempts: 2,
            section_base_delay_ms: 5_000,
            phase_cooldown_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn client_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn research_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.research_attempts,
            Duration::from_millis(self.research_base_delay_ms),
        )
    }

    pub fn section_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.section_attempts,
            Duration::from_millis(self.section_base_delay_ms),
        )
    }

    /// A configuration with every delay set to zero, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            base_delay_ms: 0,
            research_base_delay_ms: 0,
            section_base_delay_ms: 0,
            phase_cooldown_ms: 0,
            ..Self::default()
        }
    }
}

/// Research aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Output budget for each research call.
    pub max_output_tokens: usize,
    /// Extract the official website when the request carries one.
    pub website_enabled: bool,
    /// Run the post-event recap query for events that already started.
    pub recap_enabled: bool,
    /// Run the narrow verification queries.
    pub verification_enabled: bool,
    /// Dispatch independent queries concurrently.
    pub parallel: bool,
    /// Blocks shorter than this are treated as empty.
    pub min_block_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 8000,
            website_enabled: true,
            recap_enabled: true,
            verification_enabled: true,
            parallel: false,
            min_block_chars: 40,
        }
    }
}

/// Consolidation and sectioned generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Character budget for the corpus embedded in any prompt.
    pub corpus_max_chars: usize,
    pub section_max_tokens: usize,
    pub consolidation_max_tokens: usize,
    /// Language for narrative fields; names and organizations stay verbatim.
    pub language: String,
    /// Dispatch independent sections concurrently.
    pub parallel: bool,
    /// Translate non-Latin inputs to English before research.
    pub translate_inputs: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            corpus_max_chars: 14_000,
            section_max_tokens: 6000,
            consolidation_max_tokens: 2000,
            language: "English".to_string(),
            parallel: false,
            translate_inputs: true,
        }
    }
}

/// Sentinel strings written in place of unknown facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
    /// Generic "to be determined" value.
    pub tbd: String,
    /// Value for person-name fields that could not be confirmed.
    pub unknown_person: String,
    /// Marker research prompts use for unverifiable facts.
    pub not_found: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            tbd: "To be determined".to_string(),
            unknown_person: "Unknown".to_string(),
            not_found: "NOT FOUND".to_string(),
        }
    }
}

/// Post-generation normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Share of sessions a single speaker may appear in before it is treated
    /// as over-attribution.
    pub repetition_threshold: f64,
    /// Minimum occurrences before the repetition guard can trigger.
    pub repetition_min_occurrences: usize,
    pub sentinels: Sentinels,
    /// Stock dummy names that leak out of templates.
    pub placeholder_names: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            repetition_threshold: 0.6,
            repetition_min_occurrences: 2,
            sentinels: Sentinels::default(),
            placeholder_names: [
                "John Smith",
                "Jane Doe",
                "John Doe",
                "Samandal",
                "placeholder",
                "name here",
                "speaker name",
                "lorem ipsum",
                "tbd",
                "n/a",
                "null",
                "xxx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// A standing member of the travelling delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationMember {
    pub name: String,
    pub title: String,
    pub department: String,
    pub strategic_role: String,
}

/// Fixed organizational data used for the document-control section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
    pub acronym: String,
    /// Country the delegation travels from; diplomatic missions are this
    /// country's missions abroad.
    pub home_country: String,
    pub principal_name: String,
    pub principal_title: String,
    pub issuing_office: String,
    pub classification: String,
    /// National strategy the briefing aligns against.
    pub national_strategy: String,
    #[serde(default)]
    pub delegation: Vec<DelegationMember>,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        let member = |name: &str, title: &str, department: &str, role: &str| DelegationMember {
            name: name.to_string(),
            title: title.to_string(),
            department: department.to_string(),
            strategic_role: role.to_string(),
        };
        Self {
            name: "Saudi Food and Drug Authority".to_string(),
            acronym: "SFDA".to_string(),
            home_country: "Saudi Arabia".to_string(),
            principal_name: "Dr. Hisham Al Jadhey".to_string(),
            principal_title: "Chief Executive Officer".to_string(),
            issuing_office: "International Affairs".to_string(),
            classification: "RESTRICTED - Official Use Only".to_string(),
            national_strategy: "Vision 2030".to_string(),
            delegation: vec![
                member(
                    "Dr. Hisham Al Jadhey",
                    "Chief Executive Officer",
                    "Executive Office",
                    "Heads the official delegation and represents the authority at the highest executive level",
                ),
                member(
                    "Dr. Mohammed Al Farraj",
                    "Assistant CEO for International Affairs",
                    "International Affairs",
                    "Runs bilateral meetings and coordinates international cooperation agreements",
                ),
                member(
                    "Eng. Sarah Al Omari",
                    "Director of International Regulatory Affairs",
                    "Regulatory Affairs",
                    "Follows regulatory harmonization files and mutual recognition negotiations",
                ),
                member(
                    "Dr. Khalid Al Mutairi",
                    "Advisor to the CEO for Pharmaceutical Policy",
                    "Pharmaceutical Policy",
                    "Provides technical advice and represents the authority in specialist sessions",
                ),
            ],
        }
    }
}

/// Static knowledge overlay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Include the built-in overlay table.
    pub use_builtin: bool,
    /// Optional TOML overlay merged over the built-in table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            overlay_path: None,
        }
    }
}

/// Load configuration by merging layers.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `BRIEFSMITH_`)
/// 3. Workspace-local config (`.briefsmith/config.toml`)
/// 4. User config (`~/.config/briefsmith/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&BriefConfig>,
) -> Result<BriefConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(BriefConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // BRIEFSMITH_LLM__MODEL, BRIEFSMITH_SYNTHESIS__LANGUAGE, ...
    figment = figment.merge(Env::prefixed("BRIEFSMITH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "briefsmith", "briefsmith")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".briefsmith").join("config.toml")
}

/// Check whether any Briefsmith configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
