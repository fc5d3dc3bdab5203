//! Stream decoding — `data: ` lines to text deltas.
//!
//! DESIGN
//! ======
//! Each body chunk is decoded on its own: split on line boundaries, keep only
//! `data: ` lines, stop at the `[DONE]` sentinel, and parse every other
//! payload as a chat-completion chunk. Malformed payloads are discarded.
//!
//! TRADE-OFFS
//! ==========
//! Lines are never carried across chunk boundaries. A payload split between
//! two reads fails to parse on both halves and its delta is dropped. The
//! `[DONE]` sentinel only ends the current chunk; the caller keeps reading
//! until the transport closes.

use serde::Deserialize;
use tracing::trace;

/// Prefix marking a meaningful stream line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One parsed stream event. `content` is `None` when the event carries no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeltaParseError {
    #[error("malformed stream payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse one `data: ` payload (prefix already stripped).
///
/// # Errors
///
/// Returns [`DeltaParseError`] if the payload is not valid chunk JSON.
pub fn parse_delta(raw: &str) -> Result<Delta, DeltaParseError> {
    let payload: ChunkPayload = serde_json::from_str(raw)?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    Ok(Delta { content })
}

/// Result of decoding one body chunk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DecodedChunk {
    /// Non-empty text fragments, in line order.
    pub fragments: Vec<String>,
    /// `true` when the `[DONE]` sentinel cut the chunk short.
    pub saw_done: bool,
    /// Number of `data: ` payloads that failed to parse.
    pub discarded: usize,
}

/// Decode one chunk of streamed text into text fragments.
#[must_use]
pub fn decode_chunk(text: &str) -> DecodedChunk {
    let mut out = DecodedChunk::default();
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        if payload == DONE_SENTINEL {
            out.saw_done = true;
            break;
        }
        match parse_delta(payload) {
            Ok(Delta { content: Some(fragment) }) if !fragment.is_empty() => out.fragments.push(fragment),
            Ok(_) => {}
            Err(e) => {
                trace!(error = %e, payload_len = payload.len(), "delta: discarding payload");
                out.discarded += 1;
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "delta_test.rs"]
mod tests;
