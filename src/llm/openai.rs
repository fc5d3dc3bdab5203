//! OpenAI-compatible API client.
//!
//! Thin HTTP wrapper for `GET /models` and streaming
//! `POST /chat/completions`. Response parsing for the model list is a pure
//! function for testability; stream bodies are handed back undecoded.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{ByteStream, ChatMessage, LlmError, LlmTransport};
use crate::config::LlmConfig;

// =============================================================================
// CLIENT
// =============================================================================

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAiClient {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl LlmTransport for OpenAiClient {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http
            .get(self.url("/models"))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::ApiResponse { status: status.as_u16(), body: text });
        }
        parse_model_list(&text)
    }

    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ByteStream, LlmError> {
        let body = CcStreamRequest { model, messages, stream: true };
        let response = self
            .http
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%model, status = status.as_u16(), error = %e, "openai: failed to read error body");
                    String::new()
                }
            };
            return Err(LlmError::ApiResponse { status: status.as_u16(), body });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| LlmError::StreamRead(e.to_string()))
        });
        Ok(stream.boxed())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcStreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

pub(crate) fn parse_model_list(json_text: &str) -> Result<Vec<String>, LlmError> {
    let list: ModelList = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    Ok(list.data.into_iter().map(|entry| entry.id).collect())
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
