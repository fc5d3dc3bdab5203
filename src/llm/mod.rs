//! LLM — OpenAI-compatible upstream adapter for the fan-out engine.
//!
//! DESIGN
//! ======
//! The engine only needs two upstream calls: list the available models and
//! open one streaming chat completion. Both sit behind the [`LlmTransport`]
//! trait so services can be exercised against scripted transports in tests.
//! Decoding of the streamed `data: ` lines is pure and lives in [`delta`].

pub mod delta;
pub mod openai;
pub mod types;

pub use openai::OpenAiClient;
pub use types::{ByteStream, ChatMessage, LlmError, LlmTransport, Role};
