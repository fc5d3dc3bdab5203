//! LLM types — wire messages, the transport trait, and errors.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by upstream LLM calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request to the upstream failed before a response arrived.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The upstream returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The upstream response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// Reading the streamed body failed mid-exchange.
    #[error("stream read failed: {0}")]
    StreamRead(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::frame::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::StreamRead(_) => "E_STREAM_READ",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Author of a turn, and the `role` field of an upstream chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single `{role, content}` entry of the upstream `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Raw body chunks of a streaming exchange, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, LlmError>>;

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Provider-neutral async seam over the upstream. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LlmTransport: Send + Sync {
    /// List the model identifiers the upstream serves.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the body is malformed.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Open a streaming chat completion for `model` over `messages`.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the upstream answers
    /// with a non-success status.
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ByteStream, LlmError>;
}
