//! Generation provider implementations.
//!
//! Provides concrete implementations of the `LlmProvider` trait for:
//! - Anthropic Messages API, with server-side web search for grounded research
//! - OpenAI-compatible chat completions (OpenAI, Azure, Ollama, vLLM), with
//!   search-preview models for grounded research
//!
//! Use `ProviderChain::from_config()` to build the ordered failover chain from config.

pub mod anthropic;
pub mod failover;
pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::{ConfigError, LlmError};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicProvider;
pub use failover::{CircuitBreaker, CircuitState, FailoverProvider};
pub use openai_compat::OpenAiCompatibleProvider;

/// An attempt ceiling with linear backoff.
///
/// Attempt numbers are 1-based. The wait before attempt `n` is
/// `base_delay × (n - 1)`, so the first attempt never waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn linear(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Exactly one attempt, no waiting.
    pub fn once() -> Self {
        Self::linear(1, Duration::ZERO)
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(20))
    }
}

/// Execute a provider call with linear backoff on transient errors.
///
/// Retries on rate limits (respecting the server's `retry_after_secs` when it
/// is longer than the computed wait), overload, timeouts and connection
/// failures. Permanent errors return immediately.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt >= policy.attempts {
                    return Err(e);
                }
                attempt += 1;
                let wait = compute_backoff(policy, attempt, &e);
                tracing::warn!(
                    attempt,
                    max = policy.attempts,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Run an operation up to `policy.attempts` times, retrying on any error.
///
/// Used by pipeline stages whose failure modes include unusable output, not
/// only transport errors. `label` identifies the unit of work in logs.
pub async fn with_attempts<F, Fut, T, E>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(val) => return Ok(val),
            Err(e) if attempt >= policy.attempts => return Err(e),
            Err(e) => {
                attempt += 1;
                let wait = policy.delay_before(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max = policy.attempts,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

fn compute_backoff(policy: &RetryPolicy, attempt: u32, err: &LlmError) -> Duration {
    let computed = policy.delay_before(attempt);
    if let LlmError::RateLimited { retry_after_secs } = err {
        return computed.max(Duration::from_secs(*retry_after_secs));
    }
    computed
}

/// Resolve the API key for a provider config.
///
/// An inline key wins over the environment variable. Empty keys and
/// template placeholders (anything containing "YOUR") count as absent.
pub fn resolve_api_key(config: &LlmConfig) -> Option<String> {
    let key = match &config.api_key {
        Some(key) => key.clone(),
        None => std::env::var(&config.api_key_env).ok()?,
    };
    let key = key.trim().to_string();
    if key.is_empty() || key.to_uppercase().contains("YOUR") {
        None
    } else {
        Some(key)
    }
}

/// Create a single provider with an already resolved key.
fn create_single_provider(
    config: &LlmConfig,
    api_key: String,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new_with_key(config, api_key)?)),
        _ => Ok(Arc::new(OpenAiCompatibleProvider::new_with_key(
            config, api_key,
        )?)),
    }
}

/// Build every usable provider in priority order: the primary, then each fallback.
///
/// Providers without a usable key, or whose HTTP client fails to build, are
/// skipped with a warning.
pub fn create_providers(config: &LlmConfig) -> Vec<Arc<dyn LlmProvider>> {
    let candidates = std::iter::once(config.clone()).chain(
        config
            .fallback_providers
            .iter()
            .map(|fallback| config.for_fallback(fallback)),
    );

    let mut providers = Vec::new();
    for candidate in candidates {
        let Some(api_key) = resolve_api_key(&candidate) else {
            tracing::warn!(
                provider = %candidate.provider,
                env_var = %candidate.api_key_env,
                "Skipping provider without a usable API key"
            );
            continue;
        };
        match create_single_provider(&candidate, api_key) {
            Ok(p) => providers.push(p),
            Err(e) => {
                tracing::warn!(
                    provider = %candidate.provider,
                    model = %candidate.model,
                    error = %e,
                    "Skipping provider that failed to initialize"
                );
            }
        }
    }
    providers
}

/// Consecutive failures before a provider's circuit opens.
const BREAKER_THRESHOLD: usize = 5;
/// How long an open circuit stays open before a probe call.
const BREAKER_RECOVERY: Duration = Duration::from_secs(60);

/// The ordered providers a pipeline draws from.
///
/// The chain holds only the provider clients. Circuit-breaker state lives in
/// the failover wrapper returned by [`ProviderChain::for_run`], so one run's
/// failures never cause another run to skip a provider.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Build the chain from config. No usable provider is a `NoProvider` error.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let providers = create_providers(config);
        if providers.is_empty() {
            return Err(ConfigError::NoProvider);
        }
        Ok(Self::new(providers))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn is_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    /// The provider one run calls through.
    ///
    /// A single provider is returned as-is; several are wrapped in a new
    /// `FailoverProvider` whose breakers start closed.
    pub fn for_run(&self) -> Arc<dyn LlmProvider> {
        match self.providers.as_slice() {
            [single] => single.clone(),
            providers => Arc::new(FailoverProvider::new(
                providers.to_vec(),
                BREAKER_THRESHOLD,
                BREAKER_RECOVERY,
            )),
        }
    }
}

/// Create the generation provider for a single run.
///
/// A single usable provider is returned as-is; several are wrapped in a
/// `FailoverProvider` with circuit breaker protection. No usable provider
/// at all is the one configuration error that aborts a run.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    Ok(ProviderChain::from_config(config)?.for_run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config_with_key(provider: &str, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_key_env: "BRIEFSMITH_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            api_key: key.map(str::to_string),
            fallback_providers: Vec::new(),
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(20));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(20));
        assert_eq!(policy.delay_before(3), Duration::from_secs(40));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::linear(0, Duration::ZERO).attempts, 1);
    }

    #[test]
    fn test_rate_limit_backoff_respects_server() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(1));
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(compute_backoff(&policy, 2, &err), Duration::from_secs(30));
        let err = LlmError::Timeout { timeout_secs: 1 };
        assert_eq!(compute_backoff(&policy, 3, &err), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::linear(3, Duration::ZERO), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(LlmError::Connection {
                    message: "reset".into(),
                })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_permanent_error_is_immediate() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::linear(5, Duration::ZERO), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::ResponseParse {
                message: "bad".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_attempts_retries_any_error() {
        let seen = std::sync::Mutex::new(Vec::new());
        let result: Result<(), String> =
            with_attempts(&RetryPolicy::linear(2, Duration::ZERO), "test", |attempt| {
                seen.lock().unwrap().push(attempt);
                async { Err("unusable".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "unusable");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_resolve_api_key_rejects_placeholders() {
        assert!(resolve_api_key(&config_with_key("anthropic", Some("YOUR_KEY_HERE"))).is_none());
        assert!(resolve_api_key(&config_with_key("anthropic", Some("  "))).is_none());
        assert!(resolve_api_key(&config_with_key("anthropic", None)).is_none());
        assert_eq!(
            resolve_api_key(&config_with_key("anthropic", Some(" sk-real "))).as_deref(),
            Some("sk-real")
        );
    }

    #[test]
    fn test_create_provider_without_keys_is_no_provider() {
        let err = create_provider(&config_with_key("anthropic", None)).err();
        assert!(matches!(err, Some(ConfigError::NoProvider)));
    }

    #[test]
    fn test_create_provider_single() {
        let provider = create_provider(&config_with_key("anthropic", Some("sk-test"))).unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
    }

    #[test]
    fn test_create_providers_skips_keyless_fallback() {
        let mut config = config_with_key("openai", Some("sk-test"));
        config.model = "gpt-4o".into();
        config.fallback_providers = vec![crate::config::FallbackProviderConfig {
            provider: "anthropic".into(),
            model: "claude".into(),
            search_model: None,
            api_key_env: "BRIEFSMITH_TEST_KEY_THAT_IS_NEVER_SET".into(),
            base_url: None,
        }];
        let providers = create_providers(&config);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].model_name(), "gpt-4o");
    }

    #[tokio::test]
    async fn test_chain_breakers_are_per_run() {
        use crate::brain::MockLlmProvider;
        use crate::types::CompletionRequest;

        let down = Arc::new(MockLlmProvider::failing(LlmError::Connection {
            message: "down".into(),
        }));
        let up: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::with_response("ok"));
        let chain = ProviderChain::new(vec![down.clone() as Arc<dyn LlmProvider>, up]);

        let first = chain.for_run();
        for _ in 0..BREAKER_THRESHOLD + 2 {
            first.complete(CompletionRequest::default()).await.unwrap();
        }
        assert_eq!(down.call_count(), BREAKER_THRESHOLD);

        let second = chain.for_run();
        second.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(down.call_count(), BREAKER_THRESHOLD + 1);
    }

    #[test]
    fn test_single_provider_chain_is_unwrapped() {
        let chain = ProviderChain::from_config(&config_with_key("anthropic", Some("sk-test"))).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.for_run().provider_name(), "anthropic");
        assert!(!ProviderChain::new(Vec::new()).for_run().is_available());
    }
}
