//! Anthropic Messages API provider implementation.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - System message is a top-level `system` field, not in the messages array
//! - Grounded calls attach the server-side `web_search` tool; a long search
//!   turn may come back with `stop_reason: "pause_turn"` and must be resent
//!   with the partial assistant content appended
//! - No native JSON mode; constrained output is requested in the system prompt

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, OutputMode, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Server-side web search tool identifier.
const WEB_SEARCH_TOOL: &str = "web_search_20250305";

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single valid JSON object only. No prose, no markdown fences.";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
    max_search_uses: u32,
    max_continuations: usize,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            max_search_uses: config.max_search_uses,
            max_continuations: config.max_continuations,
        })
    }

    /// Build the JSON request body for the Messages API.
    ///
    /// `continuation` holds assistant content blocks from earlier paused turns.
    fn build_request_body(&self, request: &CompletionRequest, continuation: &[Value]) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);

        let mut messages: Vec<Value> = request
            .conversation()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                };
                serde_json::json!({
                    "role": role,
                    "content": [{ "type": "text", "text": msg.content }],
                })
            })
            .collect();

        if !continuation.is_empty() {
            messages.push(serde_json::json!({
                "role": "assistant",
                "content": continuation,
            }));
        }

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        let system = match (request.system_text(), request.mode) {
            (Some(text), OutputMode::ConstrainedJson) => {
                Some(format!("{}\n\n{}", text, JSON_ONLY_INSTRUCTION))
            }
            (None, OutputMode::ConstrainedJson) => Some(JSON_ONLY_INSTRUCTION.to_string()),
            (text, OutputMode::FreeText) => text,
        };
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }

        if request.web_search {
            body["tools"] = serde_json::json!([{
                "type": WEB_SEARCH_TOOL,
                "name": "web_search",
                "max_uses": self.max_search_uses,
            }]);
        }

        body
    }

    /// Concatenate the text blocks of a response, ignoring tool and search blocks.
    fn extract_text(blocks: &[Value]) -> String {
        blocks
            .iter()
            .filter(|b| b["type"].as_str() == Some("text"))
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_usage(body: &Value) -> TokenUsage {
        TokenUsage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        }
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Anthropic".to_string(),
            },
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                LlmError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            503 | 529 => LlmError::Overloaded {
                provider: "Anthropic".to_string(),
            },
            408 | 504 => LlmError::Timeout { timeout_secs: 0 },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Anthropic API: {}", status, body_text),
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            LlmError::Connection {
                message: e.to_string(),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request to Anthropic API failed: {}", e),
            }
        }
    }

    async fn send_once(&self, body: &Value) -> Result<Value, LlmError> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON in response: {}", e),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut continuation: Vec<Value> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut text = String::new();
        let mut turns = 0;

        loop {
            let body = self.build_request_body(&request, &continuation);
            debug!(
                model = self.model.as_str(),
                web_search = request.web_search,
                turn = turns,
                "Sending Anthropic completion request"
            );

            let response = self.send_once(&body).await?;
            usage.accumulate(&Self::parse_usage(&response));

            let blocks = response["content"]
                .as_array()
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "Missing 'content' array in response".to_string(),
                })?;
            text.push_str(&Self::extract_text(blocks));

            let stop_reason = response["stop_reason"].as_str().map(str::to_string);
            if stop_reason.as_deref() == Some("pause_turn") && turns < self.max_continuations {
                turns += 1;
                continuation.extend(blocks.iter().cloned());
                continue;
            }

            return Ok(CompletionResponse {
                text,
                usage,
                model: response["model"].as_str().unwrap_or(&self.model).to_string(),
                finish_reason: stop_reason,
            });
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn supports_web_search(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn make_provider() -> AnthropicProvider {
        let config = LlmConfig {
            max_search_uses: 5,
            ..Default::default()
        };
        AnthropicProvider::new_with_key(&config, "sk-ant-test".to_string()).unwrap()
    }

    fn request(mode: OutputMode, web_search: bool) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("Analyst."), Message::user("Find facts.")],
            mode,
            web_search,
            temperature: 0.3,
            max_tokens: Some(1000),
            model: None,
        }
    }

    #[test]
    fn test_new_with_key_defaults() {
        let provider = make_provider();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_body_places_system_at_top_level() {
        let body = make_provider().build_request_body(&request(OutputMode::FreeText, false), &[]);
        assert_eq!(body["system"], "Analyst.");
        assert_eq!(body["max_tokens"], 1000);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_body_attaches_web_search_tool() {
        let body = make_provider().build_request_body(&request(OutputMode::FreeText, true), &[]);
        assert_eq!(body["tools"][0]["type"], WEB_SEARCH_TOOL);
        assert_eq!(body["tools"][0]["max_uses"], 5);
    }

    #[test]
    fn test_body_json_mode_appends_instruction() {
        let body =
            make_provider().build_request_body(&request(OutputMode::ConstrainedJson, false), &[]);
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("Analyst."));
        assert!(system.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_body_continuation_appends_assistant_turn() {
        let partial = vec![serde_json::json!({"type": "text", "text": "partial"})];
        let body =
            make_provider().build_request_body(&request(OutputMode::FreeText, true), &partial);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["text"], "partial");
    }

    #[test]
    fn test_extract_text_skips_tool_blocks() {
        let blocks = vec![
            serde_json::json!({"type": "server_tool_use", "name": "web_search"}),
            serde_json::json!({"type": "web_search_tool_result", "content": []}),
            serde_json::json!({"type": "text", "text": "Founded "}),
            serde_json::json!({"type": "text", "text": "1998."}),
        ];
        assert_eq!(AnthropicProvider::extract_text(&blocks), "Founded 1998.");
    }

    #[test]
    fn test_map_http_errors() {
        use reqwest::StatusCode;
        assert!(matches!(
            AnthropicProvider::map_http_error(StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            AnthropicProvider::map_http_error(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"retry_after_secs":12}}"#
            ),
            LlmError::RateLimited {
                retry_after_secs: 12
            }
        ));
        let overloaded = StatusCode::from_u16(529).unwrap();
        assert!(AnthropicProvider::map_http_error(overloaded, "").is_transient());
        assert!(
            !AnthropicProvider::map_http_error(StatusCode::BAD_REQUEST, "bad").is_transient()
        );
    }
}
