//! Bedrock Converse client for the AI chat fallback
//!
//! Multi-turn, role-tagged message exchange against a hosted model.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::GatewayError;
use crate::models::{ChatRole, ChatTurn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Reusable Bedrock runtime client (connection-pooled)
pub struct BedrockClient {
    client: Client,
    bearer_token: String,
    model_id: String,
    base_url: String,
}

impl BedrockClient {
    pub fn new(bearer_token: String, model_id: String, region: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .unwrap_or_default();

        Self {
            client,
            bearer_token,
            base_url: format!("https://bedrock-runtime.{}.amazonaws.com", region),
            model_id,
        }
    }

    /// Run one converse exchange over the accumulated history and return the
    /// assistant's reply text.
    pub async fn converse(&self, history: &[ChatTurn]) -> crate::Result<String> {
        if self.bearer_token.is_empty() {
            return Err(GatewayError::LlmError(
                "AWS_BEARER_TOKEN_BEDROCK not configured".to_string(),
            ));
        }

        let url = format!("{}/model/{}/converse", self.base_url, self.model_id);

        let request = ConverseRequest {
            messages: history.iter().map(wire_message).collect(),
            inference_config: InferenceConfig {
                temperature: 0.7,
                top_p: 0.9,
                max_tokens: 300,
            },
        };

        info!("Calling Bedrock Converse API ({} turns)", history.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Bedrock request failed: {}", e);
                GatewayError::LlmError(format!("Bedrock request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Bedrock error response: {}", error_text);
            return Err(GatewayError::LlmError(format!(
                "Bedrock error: {}",
                error_text
            )));
        }

        let converse: ConverseResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Bedrock response: {}", e);
            GatewayError::LlmError(format!("Bedrock parse error: {}", e))
        })?;

        let reply = converse
            .output
            .message
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| GatewayError::LlmError("Empty response from Bedrock".to_string()))?;

        Ok(reply)
    }
}

fn wire_message(turn: &ChatTurn) -> WireMessage {
    WireMessage {
        role: match turn.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        },
        content: vec![ContentBlock {
            text: turn.text.clone(),
        }],
    }
}

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<WireMessage>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Serialize)]
struct InferenceConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: OutputMessage,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    content: Vec<ContentBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let request = ConverseRequest {
            messages: vec![WireMessage {
                role: "user",
                content: vec![ContentBlock {
                    text: "What is the price of Safaricom stock?".to_string(),
                }],
            }],
            inference_config: InferenceConfig {
                temperature: 0.7,
                top_p: 0.9,
                max_tokens: 300,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Safaricom"));
        assert!(json.contains("\"inferenceConfig\""));
        assert!(json.contains("\"topP\":0.9"));
        assert!(json.contains("\"maxTokens\":300"));
    }

    #[tokio::test]
    async fn missing_token_is_an_error() {
        let client = BedrockClient::new(
            String::new(),
            "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            "us-east-1",
        );
        let result = client.converse(&[ChatTurn::user("hi")]).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not configured"));
    }
}
