//! Conversation store — append-only turn log with per-model projection.
//!
//! DESIGN
//! ======
//! Turns are only ever appended; their position in the log is their order.
//! Streaming mutations (append text, fail, finish) address a turn by id and
//! edit it in place. Each model's private thread is a projection of the log,
//! re-derived on every call, so display and upstream history always agree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::frame::now_ms;
use crate::llm::Role;

pub type TurnId = Uuid;

// =============================================================================
// TURN
// =============================================================================

/// One user or assistant message in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    /// Milliseconds since Unix epoch at creation.
    pub created_at: i64,
    pub role: Role,
    pub content: String,
    /// Author of an assistant turn, or the single addressee of a per-model reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Models a broadcast user turn was sent to, snapshotted at dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_models: Option<Vec<String>>,
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Turn {
    /// A user turn broadcast to every model in `targets`.
    #[must_use]
    pub fn broadcast(content: impl Into<String>, targets: Vec<String>) -> Self {
        Self::new(Role::User, content.into(), None, Some(targets), false)
    }

    /// A user turn addressed to one model's private thread.
    #[must_use]
    pub fn reply_to(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Some(model.into()), None, false)
    }

    /// A user turn with no addressee; visible to every model.
    #[must_use]
    pub fn unscoped(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None, None, false)
    }

    /// An empty assistant turn awaiting its stream.
    #[must_use]
    pub fn placeholder(model: impl Into<String>) -> Self {
        Self::new(Role::Assistant, String::new(), Some(model.into()), None, true)
    }

    fn new(
        role: Role,
        content: String,
        model: Option<String>,
        target_models: Option<Vec<String>>,
        loading: bool,
    ) -> Self {
        Self { id: Uuid::new_v4(), created_at: now_ms(), role, content, model, target_models, loading, error: None }
    }

    /// Whether this turn belongs to `model`'s private thread.
    #[must_use]
    pub fn is_visible_to(&self, model: &str) -> bool {
        match self.role {
            Role::Assistant => self.model.as_deref() == Some(model),
            Role::User => match (&self.model, &self.target_models) {
                (Some(own), _) if own == model => true,
                (_, Some(targets)) if targets.iter().any(|t| t == model) => true,
                (None, None) => true,
                _ => false,
            },
        }
    }

    /// Append streamed text. Returns `false` when the turn is frozen.
    pub fn append(&mut self, fragment: &str) -> bool {
        if self.role != Role::Assistant || self.error.is_some() {
            return false;
        }
        self.content.push_str(fragment);
        self.loading = false;
        true
    }

    /// Record a terminal failure. The first recorded error wins.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
        self.loading = false;
    }

    /// Mark the exchange complete.
    pub fn finish(&mut self) {
        self.loading = false;
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Ordered, append-only log of turns with id lookup.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    index: HashMap<TurnId, usize>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the end of the log.
    pub fn append(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.index.insert(id, self.turns.len());
        self.turns.push(turn);
        id
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn find_by_id(&self, id: TurnId) -> Option<&Turn> {
        self.index.get(&id).and_then(|&i| self.turns.get(i))
    }

    pub fn find_by_id_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.index.get(&id).and_then(|&i| self.turns.get_mut(i))
    }

    /// Turns visible in `model`'s private thread, in log order.
    pub fn project_for<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a Turn> + 'a {
        self.turns.iter().filter(move |turn| turn.is_visible_to(model))
    }

    /// The projection for `model` minus the in-flight turn `exclude`.
    pub fn history_for<'a>(&'a self, model: &'a str, exclude: TurnId) -> impl Iterator<Item = &'a Turn> + 'a {
        self.project_for(model)
            .filter(move |turn| turn.id != exclude)
    }

    /// Append streamed text to a turn. Unknown ids and frozen turns are a
    /// no-op returning `false`.
    pub fn append_content(&mut self, id: TurnId, fragment: &str) -> bool {
        let Some(turn) = self.find_by_id_mut(id) else {
            debug!(%id, "conversation: append to unknown turn ignored");
            return false;
        };
        turn.append(fragment)
    }

    /// Record a failure on a turn. Returns `false` for unknown ids.
    pub fn fail(&mut self, id: TurnId, message: &str) -> bool {
        let Some(turn) = self.find_by_id_mut(id) else {
            debug!(%id, "conversation: failure for unknown turn ignored");
            return false;
        };
        turn.fail(message);
        true
    }

    /// Clear the loading flag on a turn. Returns `false` for unknown ids.
    pub fn finish(&mut self, id: TurnId) -> bool {
        let Some(turn) = self.find_by_id_mut(id) else {
            debug!(%id, "conversation: completion for unknown turn ignored");
            return false;
        };
        turn.finish();
        true
    }

    /// Whether any assistant turn authored by `model` is still loading.
    #[must_use]
    pub fn is_model_loading(&self, model: &str) -> bool {
        self.turns
            .iter()
            .any(|t| t.role == Role::Assistant && t.loading && t.model.as_deref() == Some(model))
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
