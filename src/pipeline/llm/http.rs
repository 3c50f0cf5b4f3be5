use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ModelClient, ModelError, ModelRequest, ModelResponse};
use crate::config::TierConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// One client per tier. The per-call timeout is enforced by the gateway,
/// the client only bounds connection setup.
pub struct HttpModelClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(tier: &TierConfig) -> Result<Self, ModelError> {
        let api_key = match &tier.api_key_env {
            Some(var) => Some(
                std::env::var(var).map_err(|_| ModelError::MissingApiKey(var.clone()))?,
            ),
            None => None,
        };
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: tier.endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&ChatRequest::from(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                ModelError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ModelError::Timeout(CONNECT_TIMEOUT_SECS)
            } else {
                ModelError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        parse_chat_response(&body)
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u64,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ModelRequest> for ChatRequest<'a> {
    fn from(request: &'a ModelRequest) -> Self {
        Self {
            model: &request.model_id,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

fn parse_chat_response(body: &str) -> Result<ModelResponse, ModelError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::MalformedResponse(format!("chat response: {e}")))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ModelError::MalformedResponse("no completion choice".into()))?;

    Ok(ModelResponse {
        content,
        input_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
        output_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskType;

    fn tier(api_key_env: Option<&str>) -> TierConfig {
        TierConfig {
            model_id: "m".into(),
            endpoint: "http://localhost:9/v1/".into(),
            api_key_env: api_key_env.map(str::to_string),
            input_price_per_1k: 0.001,
            output_price_per_1k: 0.002,
            timeout_secs: 5,
            max_concurrent_calls: 1,
        }
    }

    #[test]
    fn request_body_has_system_and_user_messages() {
        let request = ModelRequest {
            task: TaskType::Classification,
            model_id: "gpt-4o-mini".into(),
            system: "classify".into(),
            prompt: "text".into(),
            max_tokens: 300,
        };
        let json = serde_json::to_value(ChatRequest::from(&request)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "text");
        assert_eq!(json["max_tokens"], 300);
    }

    #[test]
    fn parses_content_and_usage() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}],
            "usage":{"prompt_tokens":12,"completion_tokens":5}}"#;
        let response = parse_chat_response(body).unwrap();
        assert_eq!(response.content, r#"{"a":1}"#);
        assert_eq!(response.input_tokens, Some(12));
        assert_eq!(response.output_tokens, Some(5));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_chat_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ModelError::MalformedResponse(_)));
        assert!(matches!(
            parse_chat_response("<html>"),
            Err(ModelError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_api_key_variable_fails_construction() {
        let err = HttpModelClient::new(&tier(Some("DOCMERIT_TEST_KEY_THAT_IS_NEVER_SET"))).err();
        assert!(matches!(err, Some(ModelError::MissingApiKey(_))));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let client = HttpModelClient::new(&tier(None)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9/v1");
    }
}
