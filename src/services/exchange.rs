//! Stream consumer — one streaming exchange for one assistant turn.
//!
//! DESIGN
//! ======
//! `Pending → Streaming → {Complete, Failed}`. The request history is built
//! by [`prepare`] while the dispatcher still holds the session lock; [`run`]
//! then opens the upstream stream, decodes each chunk, and applies fragments
//! to its own turn only. Failures land on that turn and nowhere else.
//!
//! Whatever way `run` exits (return, panic, or task abort), a drop guard
//! releases the exchange's in-flight count and recomputes the busy flag.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::conversation::{ConversationStore, TurnId};
use super::session::Session;
use crate::llm::delta::decode_chunk;
use crate::llm::{ChatMessage, LlmTransport};

/// Lifecycle of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Pending,
    Streaming,
    Complete,
    Failed,
}

/// Everything an exchange needs once it leaves the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub model: String,
    /// The assistant placeholder this exchange fills.
    pub turn_id: TurnId,
    /// Upstream history, oldest first, ending with the new user message.
    pub messages: Vec<ChatMessage>,
}

/// Build the upstream request for `turn_id` from `model`'s projection.
///
/// The placeholder itself is excluded. The user turn that triggered the
/// exchange is appended when the projection does not already contain it.
#[must_use]
pub fn prepare(store: &ConversationStore, model: &str, turn_id: TurnId, user_turn_id: TurnId) -> ExchangeRequest {
    let mut includes_user_turn = false;
    let mut messages: Vec<ChatMessage> = store
        .history_for(model, turn_id)
        .inspect(|turn| includes_user_turn |= turn.id == user_turn_id)
        .map(|turn| ChatMessage::new(turn.role, turn.content.clone()))
        .collect();

    if !includes_user_turn {
        if let Some(user_turn) = store.find_by_id(user_turn_id) {
            messages.push(ChatMessage::new(user_turn.role, user_turn.content.clone()));
        }
    }

    ExchangeRequest { model: model.to_string(), turn_id, messages }
}

/// Releases the exchange's hold on the model's busy flag when dropped.
struct BusyGuard {
    session: Arc<Session>,
    model: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.session.end_exchange(&self.model);
    }
}

/// Drive one exchange to a terminal state.
///
/// The busy guard is taken when `run` is called, not on first poll, so a task
/// aborted before it starts still releases its in-flight count.
pub fn run(
    session: Arc<Session>,
    llm: Arc<dyn LlmTransport>,
    request: ExchangeRequest,
) -> impl Future<Output = ExchangeState> + Send + 'static {
    let busy = BusyGuard { session: Arc::clone(&session), model: request.model.clone() };
    async move {
        let _busy = busy;
        drive(session, llm, request).await
    }
}

async fn drive(session: Arc<Session>, llm: Arc<dyn LlmTransport>, request: ExchangeRequest) -> ExchangeState {
    let ExchangeRequest { model, turn_id, messages } = request;

    let mut state = ExchangeState::Pending;
    info!(%model, %turn_id, history = messages.len(), ?state, "exchange: opening stream");

    let mut stream = match llm.stream_chat(&model, &messages).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(%model, %turn_id, error = %e, "exchange: failed to open stream");
            session.fail_turn(turn_id, &e.to_string());
            return ExchangeState::Failed;
        }
    };

    state = ExchangeState::Streaming;
    debug!(%model, %turn_id, ?state, "exchange: streaming");

    let mut fragments = 0usize;
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%model, %turn_id, fragments, error = %e, "exchange: stream read failed");
                session.fail_turn(turn_id, &e.to_string());
                return ExchangeState::Failed;
            }
        };

        let decoded = decode_chunk(&String::from_utf8_lossy(&bytes));
        for fragment in &decoded.fragments {
            if session.append_content(turn_id, fragment) {
                fragments += 1;
            }
        }
        if decoded.discarded > 0 {
            debug!(%model, %turn_id, discarded = decoded.discarded, "exchange: discarded malformed payloads");
        }
        if decoded.saw_done {
            // Sentinel only ends this chunk; keep reading until the transport closes.
            debug!(%model, %turn_id, "exchange: [DONE] received");
        }
    }

    session.finish_turn(turn_id);
    state = ExchangeState::Complete;
    info!(%model, %turn_id, fragments, ?state, "exchange: complete");
    state
}

#[cfg(test)]
#[path = "exchange_test.rs"]
mod tests;
