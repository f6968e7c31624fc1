//! Multi-provider failover with circuit breaker.
//!
//! Provides resilient generation access by:
//! - Trying providers in priority order
//! - Skipping providers with open circuit breakers
//! - Routing grounded requests to providers that can search the web
//! - Automatic recovery via half-open circuit state

use crate::brain::LlmProvider;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Circuit Breaker
// ---------------------------------------------------------------------------

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    /// Normal operation, calls are permitted.
    Closed,
    /// Too many failures, calls are blocked.
    Open { since: Instant },
    /// Recovery probe, one call is permitted to test the provider.
    HalfOpen,
}

/// A circuit breaker that trips after consecutive failures and recovers
/// after a timeout.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: usize,
    failure_threshold: usize,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, recovery_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Whether a call is currently permitted.
    pub fn is_call_permitted(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open { since } if since.elapsed() >= self.recovery_timeout => {
                debug!("Circuit breaker transitioning to half-open");
                self.state = CircuitState::HalfOpen;
                true
            }
            CircuitState::Open { .. } => false,
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        if self.state == CircuitState::HalfOpen || self.failure_count >= self.failure_threshold {
            warn!(
                failures = self.failure_count,
                threshold = self.failure_threshold,
                "Circuit breaker opening"
            );
            self.state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }
}

// ---------------------------------------------------------------------------
// FailoverProvider
// ---------------------------------------------------------------------------

struct ProviderEntry {
    provider: Arc<dyn LlmProvider>,
    circuit_breaker: Mutex<CircuitBreaker>,
}

/// A provider that tries multiple backends in priority order.
///
/// Grounded requests skip providers that cannot search the web, unless no
/// provider in the chain can, in which case every provider is eligible and
/// answers from model knowledge.
pub struct FailoverProvider {
    providers: Vec<ProviderEntry>,
}

impl FailoverProvider {
    /// Providers are tried in the order given. The first provider is the primary.
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        failure_threshold: usize,
        recovery_timeout: Duration,
    ) -> Self {
        let entries = providers
            .into_iter()
            .map(|provider| ProviderEntry {
                provider,
                circuit_breaker: Mutex::new(CircuitBreaker::new(
                    failure_threshold,
                    recovery_timeout,
                )),
            })
            .collect();

        Self { providers: entries }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn primary(&self) -> Option<&dyn LlmProvider> {
        self.providers.first().map(|e| &*e.provider)
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let needs_search = request.web_search
            && self
                .providers
                .iter()
                .any(|e| e.provider.supports_web_search());
        let mut last_error = None;

        for (i, entry) in self.providers.iter().enumerate() {
            if needs_search && !entry.provider.supports_web_search() {
                debug!(provider_index = i, "Skipping provider without web search");
                continue;
            }

            let mut cb = entry.circuit_breaker.lock().await;
            if !cb.is_call_permitted() {
                debug!(provider_index = i, "Skipping provider, circuit open");
                continue;
            }
            drop(cb);

            match entry.provider.complete(request.clone()).await {
                Ok(response) => {
                    entry.circuit_breaker.lock().await.record_success();
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        provider_index = i,
                        provider = entry.provider.provider_name(),
                        model = entry.provider.model_name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    entry.circuit_breaker.lock().await.record_failure();
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::Connection {
            message: "All providers failed or circuits open".into(),
        }))
    }

    fn model_name(&self) -> &str {
        self.primary().map(|p| p.model_name()).unwrap_or("none")
    }

    fn provider_name(&self) -> &str {
        "failover"
    }

    fn supports_web_search(&self) -> bool {
        self.providers.iter().any(|e| e.provider.supports_web_search())
    }

    fn supports_json_mode(&self) -> bool {
        self.primary().is_some_and(|p| p.supports_json_mode())
    }

    fn is_available(&self) -> bool {
        self.providers.iter().any(|e| e.provider.is_available())
    }
}
