//! HTTP client for OpenAI-compatible chat completion APIs. Compatible
//! with OpenAI, Azure OpenAI, DeepSeek, and other OpenAI-style endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use super::models::LLMError;

pub struct LLMClient {
    http_client: Client,
}

impl Default for LLMClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LLMClient {
    pub fn new() -> Self {
        let http_client =
            Client::builder().timeout(Duration::from_secs(120)).build().expect("build http client");
        Self { http_client }
    }

    /// Issue one chat completion call and parse the response as `Resp`.
    /// Returns the parsed value plus (prompt_tokens, completion_tokens).
    pub async fn chat_completion<Resp>(
        &self,
        endpoint: &str,
        credential: &str,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
    ) -> Result<(Resp, i32, i32), LLMError>
    where
        Resp: DeserializeOwned,
    {
        let chat_request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            max_tokens: Some(4096),
            temperature: Some(0.1),
            response_format: Some(ResponseFormat { r#type: "json_object".to_string() }),
        };

        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        tracing::debug!("calling LLM endpoint {} with model {}", url, model);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", credential))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout(timeout.as_secs())
                } else {
                    LLMError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LLMError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LLMError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse =
            response.json().await.map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| LLMError::ParseError("empty response from LLM".to_string()))?;

        let result: Resp = serde_json::from_str(content).map_err(|e| {
            LLMError::ParseError(format!("failed to parse LLM response: {}. content: {}", e, content))
        })?;

        let input_tokens = chat_response.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0);
        let output_tokens = chat_response.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0);

        Ok((result, input_tokens, output_tokens))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
}
