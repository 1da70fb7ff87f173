use crate::error::ScoringError;
use crate::models::{ContentSegment, RawResponse, ScoringRequest};
use crate::traits::ScoringService;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicScoringClient {
    endpoint: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentSegment>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl AnthropicScoringClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ScoringService for AnthropicScoringClient {
    async fn score(&self, request: &ScoringRequest) -> Result<RawResponse, ScoringError> {
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: MessagesResponse = response.json().await?;
        debug!(
            segments = parsed.content.len(),
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("none"),
            "scoring response received"
        );

        if parsed.stop_reason.as_deref() == Some("refusal") {
            return Err(ScoringError::ContentPolicy(
                "model declined to analyze the document".to_string(),
            ));
        }

        Ok(RawResponse::Segments(parsed.content))
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ScoringError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        ScoringError::RateLimited(message)
    } else if status.is_server_error() {
        ScoringError::ServerError {
            status: status.as_u16(),
            message,
        }
    } else if message.to_lowercase().contains("policy") {
        ScoringError::ContentPolicy(message)
    } else {
        ScoringError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_overload_are_transient() {
        let limited = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert!(matches!(&limited, ScoringError::RateLimited(message) if message == "slow down"));
        assert!(limited.is_transient());

        let overloaded = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(overloaded.is_transient());
    }

    #[test]
    fn policy_refusal_is_terminal() {
        let refused = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Output blocked by content filtering policy"}}"#,
        );
        assert!(matches!(refused, ScoringError::ContentPolicy(_)));
        assert!(!refused.is_transient());
    }

    #[test]
    fn other_client_errors_keep_status() {
        let unauthorized = classify_failure(StatusCode::UNAUTHORIZED, "invalid x-api-key");
        assert!(matches!(
            unauthorized,
            ScoringError::Api { status: 401, .. }
        ));
    }

    #[test]
    fn messages_response_deserializes_into_segments() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{}"}],"stop_reason":"end_turn","usage":{}}"#,
        )
        .expect("response should parse");

        assert_eq!(parsed.content, vec![ContentSegment::text("{}")]);
        assert_eq!(parsed.stop_reason.as_deref(), Some("end_turn"));
    }
}
