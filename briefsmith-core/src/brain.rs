//! Generation provider abstraction and the generation client.
//!
//! Defines the `LlmProvider` trait for provider-agnostic completions, the
//! `Brain` wrapper that every pipeline stage calls through (system prompt,
//! output mode, output budget, retry with linear backoff), and a
//! `MockLlmProvider` for tests.

use crate::error::LlmError;
use crate::providers::{RetryPolicy, with_retry};
use crate::types::{CompletionRequest, CompletionResponse, Message, OutputMode, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Trait for generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Short provider identifier used in logs.
    fn provider_name(&self) -> &str;

    /// Whether this provider can ground answers with live web search.
    fn supports_web_search(&self) -> bool {
        false
    }

    /// Whether this provider honours a native JSON output mode.
    fn supports_json_mode(&self) -> bool {
        false
    }

    /// Whether at least one backend stands behind this provider.
    fn is_available(&self) -> bool {
        true
    }
}

/// The generation client every pipeline stage calls through.
///
/// Wraps a provider (usually a failover chain) and adds prompt assembly,
/// temperature selection per output mode, retry on transient errors, and
/// usage accounting. Usage accumulates over the client's lifetime, so the
/// pipeline builds one client per run.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    temperature: f32,
    json_temperature: f32,
    usage: Mutex<TokenUsage>,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            temperature: 0.3,
            json_temperature: 0.15,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Override the sampling temperatures for free-text and JSON calls.
    pub fn with_temperatures(mut self, free_text: f32, json: f32) -> Self {
        self.temperature = free_text;
        self.json_temperature = json;
        self
    }

    /// Generate text for a prompt.
    ///
    /// `ConstrainedJson` asks the provider for JSON output; callers must still
    /// run the result through [`crate::repair::repair`]. Transient errors are
    /// retried per the configured policy; the last error is returned when the
    /// attempt ceiling is reached.
    pub async fn generate(
        &self,
        prompt: &str,
        mode: OutputMode,
        max_output: usize,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let request = self.build_request(prompt, mode, max_output, system, false);
        self.run(request).await
    }

    /// Generate free text with live web search enabled where the provider supports it.
    pub async fn generate_grounded(
        &self,
        prompt: &str,
        max_output: usize,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let request = self.build_request(prompt, OutputMode::FreeText, max_output, system, true);
        self.run(request).await
    }

    fn build_request(
        &self,
        prompt: &str,
        mode: OutputMode,
        max_output: usize,
        system: Option<&str>,
        web_search: bool,
    ) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        CompletionRequest {
            messages,
            mode,
            web_search,
            temperature: match mode {
                OutputMode::FreeText => self.temperature,
                OutputMode::ConstrainedJson => self.json_temperature,
            },
            max_tokens: Some(max_output),
            model: None,
        }
    }

    async fn run(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(
            model = self.provider.model_name(),
            mode = ?request.mode,
            web_search = request.web_search,
            prompt_chars = request.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Sending generation request"
        );

        let provider = &self.provider;
        let response = with_retry(&self.policy, || provider.complete(request.clone())).await?;

        if let Ok(mut usage) = self.usage.lock() {
            usage.accumulate(&response.usage);
        }

        if response.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                model: response.model,
            });
        }

        info!(
            model = response.model.as_str(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            truncated = response.was_truncated(),
            "Generation received"
        );
        Ok(response.text)
    }

    /// Token usage across every call made through this client.
    pub fn total_usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }
}

/// A scripted provider for tests.
///
/// Resolution order per call: the first prompt rule whose needle appears in
/// the request, then the FIFO queue, then the fallback (a canned text unless
/// [`MockLlmProvider::failing`] was used). Every request is logged.
pub struct MockLlmProvider {
    model: String,
    rules: Mutex<Vec<(String, Result<CompletionResponse, LlmError>)>>,
    responses: Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    fallback: Result<CompletionResponse, LlmError>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            rules: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            fallback: Ok(Self::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers every call with the same text.
    pub fn with_response(text: &str) -> Self {
        Self {
            fallback: Ok(Self::text_response(text)),
            ..Self::new()
        }
    }

    /// A provider whose every call fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next unmatched call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push(Ok(response));
    }

    /// Queue an error to be returned by the next unmatched call.
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push(Err(error));
    }

    /// Answer any request whose messages contain `needle` with `text`.
    pub fn on_prompt_containing(&self, needle: &str, text: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Ok(Self::text_response(text))));
    }

    /// Fail any request whose messages contain `needle` with `error`.
    pub fn fail_prompt_containing(&self, needle: &str, error: LlmError) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Err(error)));
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let haystack: String = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().unwrap().push(request);

        if let Some((_, outcome)) = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))
        {
            return outcome.clone();
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.fallback.clone()
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn supports_web_search(&self) -> bool {
        true
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
