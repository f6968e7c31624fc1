//! OpenAI-compatible generation provider.
//!
//! Supports OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.
//! Grounded calls switch to the configured search model (for OpenAI, a
//! `*-search-preview` model) and send `web_search_options`.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, OutputMode, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    search_model: Option<String>,
    max_tokens: usize,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
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
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            search_model: config.search_model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let grounded = request.web_search && self.search_model.is_some();
        let model = match (&request.model, grounded) {
            (Some(model), _) => model.as_str(),
            (None, true) => self.search_model.as_deref().unwrap_or(&self.model),
            (None, false) => self.model.as_str(),
        };

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
        });

        if grounded {
            // Search models reject sampling parameters.
            body["web_search_options"] = json!({});
        } else {
            body["temperature"] = json!(request.temperature);
        }

        if request.mode == OutputMode::ConstrainedJson && !grounded {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let usage = TokenUsage {
            input_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            output_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        };

        Ok(CompletionResponse {
            text,
            usage,
            model: body["model"].as_str().unwrap_or(model).to_string(),
            finish_reason,
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "Authentication failed");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => {
                // "Rate limit reached ... Please try again in 7s."
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .map(|s| s.trim_end_matches('.').trim_end_matches('s').to_string())
                            .and_then(|s| s.parse::<f64>().ok())
                    })
                    .map(|secs| secs.ceil() as u64)
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            408 | 504 => LlmError::Timeout { timeout_secs: 0 },
            status if status >= 500 => LlmError::Overloaded {
                provider: format!("OpenAI-compatible (HTTP {})", status),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/chat/completions", self.base_url);
        let model = body["model"].as_str().unwrap_or(&self.model).to_string();

        debug!(
            model = model.as_str(),
            url = url.as_str(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LlmError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON in response: {}", e),
        })?;
        Self::parse_response(&json, &model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn supports_web_search(&self) -> bool {
        self.search_model.is_some()
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn make_provider(search_model: Option<&str>) -> OpenAiCompatibleProvider {
        let config = LlmConfig {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            search_model: search_model.map(str::to_string),
            ..Default::default()
        };
        OpenAiCompatibleProvider::new_with_key(&config, "sk-test".into()).unwrap()
    }

    fn request(mode: OutputMode, web_search: bool) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("sys"), Message::user("hello")],
            mode,
            web_search,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_body() {
        let body = make_provider(None).build_request_body(&request(OutputMode::FreeText, false));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let body =
            make_provider(None).build_request_body(&request(OutputMode::ConstrainedJson, false));
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_grounded_uses_search_model() {
        let provider = make_provider(Some("gpt-4o-search-preview"));
        assert!(provider.supports_web_search());
        let body = provider.build_request_body(&request(OutputMode::FreeText, true));
        assert_eq!(body["model"], "gpt-4o-search-preview");
        assert!(body.get("web_search_options").is_some());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_grounded_without_search_model_is_plain() {
        let provider = make_provider(None);
        assert!(!provider.supports_web_search());
        let body = provider.build_request_body(&request(OutputMode::FreeText, true));
        assert_eq!(body["model"], "gpt-4o");
        assert!(body.get("web_search_options").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"content": "{\"a\":1}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o").unwrap();
        assert_eq!(response.text, "{\"a\":1}");
        assert_eq!(response.usage.total(), 15);
        assert_eq!(response.model, "gpt-4o-2024-08-06");
    }

    #[test]
    fn test_parse_response_without_choices() {
        assert!(OpenAiCompatibleProvider::parse_response(&json!({}), "m").is_err());
    }

    #[test]
    fn test_rate_limit_message_parsing() {
        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 7s."}}"#;
        assert!(matches!(
            OpenAiCompatibleProvider::map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body),
            LlmError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }
}
