//! HTTP client for the OpenAI-compatible reasoning endpoint.
//!
//! Configuration (.env file):
//! - REASONING_API_KEY: API key; when unset the reasoning layer is off
//! - REASONING_API_URL: endpoint URL (defaults to OpenAI chat completions)
//! - REASONING_MODEL: model name (default: "gpt-4o-mini")
//! - REASONING_TIMEOUT_MS: request timeout in ms (default: 3000)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use shared_types::{AdvisorError, Result};

use crate::settings::ReasoningSettings;

/// A reasoning backend for forecast commentary and explanations.
///
/// Unconfigured backends report it via `is_configured`; stages then take
/// their fallback path without burning a circuit breaker failure.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    /// One chat completion round trip. Returns the raw assistant text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

pub struct OpenAiCompatClient {
    client: Client,
    settings: ReasoningSettings,
}

impl OpenAiCompatClient {
    /// Fails when the HTTP client cannot be built, rather than falling
    /// back to a client without the configured request timeout.
    pub fn new(settings: ReasoningSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| AdvisorError::Internal(format!("http client: {}", err)))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl ReasoningService for OpenAiCompatClient {
    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            AdvisorError::DependencyUnavailable {
                dependency: "reasoning".into(),
                reason: "REASONING_API_KEY is not set".into(),
            }
        })?;

        let request_body = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(0.2),
            max_tokens: Some(600),
        };

        log::debug!(
            "Reasoning request to {} (model: {})",
            self.settings.api_url,
            self.settings.model
        );

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AdvisorError::DependencyTimeout {
                        dependency: "reasoning".into(),
                        waited_ms: self.settings.timeout.as_millis() as u64,
                    }
                } else {
                    AdvisorError::DependencyUnavailable {
                        dependency: "reasoning".into(),
                        reason: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdvisorError::DependencyUnavailable {
                dependency: "reasoning".into(),
                reason: format!("status {}: {}", status, text),
            });
        }

        let data: ChatCompletionResponse = response.json().await.map_err(|err| {
            AdvisorError::DependencyUnavailable {
                dependency: "reasoning".into(),
                reason: format!("unparsable response: {}", err),
            }
        })?;

        if let Some(usage) = &data.usage {
            log::debug!("Reasoning request used {} tokens", usage.total_tokens);
        }

        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AdvisorError::DependencyUnavailable {
                dependency: "reasoning".into(),
                reason: "no choices in response".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_reports_and_errors() {
        let client = OpenAiCompatClient::new(ReasoningSettings::default()).unwrap();
        assert!(!client.is_configured());
        let err = client.complete("sys", "hello").await.unwrap_err();
        assert!(matches!(err, AdvisorError::DependencyUnavailable { .. }));
    }

    #[test]
    fn test_client_builds_with_configured_timeout() {
        let settings = ReasoningSettings {
            timeout: std::time::Duration::from_millis(250),
            ..ReasoningSettings::default()
        };
        assert!(OpenAiCompatClient::new(settings).is_ok());
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let req = ChatCompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }
}
