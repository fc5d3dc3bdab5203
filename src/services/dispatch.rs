//! Fan-out dispatcher — one submission, N independent exchanges.
//!
//! DESIGN
//! ======
//! `dispatch` does all bookkeeping under one session lock: append the user
//! turn, clear the originating draft, append one placeholder per target,
//! mark every target busy, and capture each target's upstream history. Only
//! then does it spawn one task per placeholder and return without joining.
//! Every panel therefore enters its loading state before any request hits
//! the network, and a fast response can never settle a busy flag before a
//! sibling exchange exists.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use super::conversation::{Turn, TurnId};
use super::exchange::{self, ExchangeState};
use super::session::Session;
use crate::llm::LlmTransport;

// =============================================================================
// TYPES
// =============================================================================

/// Whether a submission goes to the selected models or one model's thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    PerModel(String),
}

impl Scope {
    /// The draft a submission in this scope clears.
    #[must_use]
    pub fn draft_key(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::PerModel(model) => Some(model),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("no target models")]
    NoTargets,
    #[error("a reply to {model} can only target {model}")]
    ScopeMismatch { model: String },
}

impl crate::frame::ErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "E_EMPTY_PROMPT",
            Self::NoTargets => "E_NO_TARGETS",
            Self::ScopeMismatch { .. } => "E_SCOPE_MISMATCH",
        }
    }
}

/// A launched exchange. Dropping the handle detaches the task.
#[derive(Debug)]
pub struct ExchangeHandle {
    pub model: String,
    pub turn_id: TurnId,
    pub handle: JoinHandle<ExchangeState>,
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub struct Dispatched {
    pub user_turn_id: TurnId,
    pub exchanges: Vec<ExchangeHandle>,
}

/// Serializable summary of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub user_turn_id: TurnId,
    pub exchanges: Vec<ExchangeReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeReceipt {
    pub model: String,
    pub turn_id: TurnId,
}

impl Dispatched {
    #[must_use]
    pub fn receipt(&self) -> DispatchReceipt {
        DispatchReceipt {
            user_turn_id: self.user_turn_id,
            exchanges: self
                .exchanges
                .iter()
                .map(|ex| ExchangeReceipt { model: ex.model.clone(), turn_id: ex.turn_id })
                .collect(),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Default targets for a scope: the current selection, or the single model.
#[must_use]
pub fn targets_for(session: &Session, scope: &Scope) -> Vec<String> {
    match scope {
        Scope::Global => session.selection(),
        Scope::PerModel(model) => vec![model.clone()],
    }
}

/// Send `prompt` to every model in `targets`.
///
/// A global-scope user turn records the target list as its addressees, so
/// later selection changes never move it between threads. A per-model reply
/// targets exactly its own model. Duplicate targets are collapsed. Must be
/// called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`DispatchError`] without touching any state when the prompt is
/// blank, no targets remain, or a per-model reply names any other target.
pub fn dispatch(
    session: &Arc<Session>,
    llm: &Arc<dyn LlmTransport>,
    prompt: &str,
    targets: &[String],
    scope: Scope,
) -> Result<Dispatched, DispatchError> {
    if prompt.trim().is_empty() {
        return Err(DispatchError::EmptyPrompt);
    }
    let mut unique: Vec<String> = Vec::with_capacity(targets.len());
    for target in targets {
        if !unique.contains(target) {
            unique.push(target.clone());
        }
    }
    if unique.is_empty() {
        return Err(DispatchError::NoTargets);
    }
    if let Scope::PerModel(model) = &scope {
        if unique.len() != 1 || unique[0] != *model {
            return Err(DispatchError::ScopeMismatch { model: model.clone() });
        }
    }

    let (user_turn_id, requests) = {
        let mut state = session.lock();

        let user_turn = match &scope {
            Scope::Global => Turn::broadcast(prompt, unique.clone()),
            Scope::PerModel(model) => Turn::reply_to(prompt, model.clone()),
        };
        state.clear_draft(scope.draft_key());
        session.publish_turn_created(&user_turn);
        let user_turn_id = state.conversation.append(user_turn);

        let mut placeholders = Vec::with_capacity(unique.len());
        for model in &unique {
            let placeholder = Turn::placeholder(model.clone());
            session.publish_turn_created(&placeholder);
            placeholders.push((model.as_str(), state.conversation.append(placeholder)));
        }
        for model in &unique {
            if state.begin_exchange(model) {
                session.publish_busy(model, true);
            }
        }

        let requests: Vec<_> = placeholders
            .into_iter()
            .map(|(model, turn_id)| exchange::prepare(&state.conversation, model, turn_id, user_turn_id))
            .collect();
        (user_turn_id, requests)
    };

    info!(%user_turn_id, targets = unique.len(), ?scope, "dispatch: fanning out");

    let exchanges = requests
        .into_iter()
        .map(|request| ExchangeHandle {
            model: request.model.clone(),
            turn_id: request.turn_id,
            handle: tokio::spawn(exchange::run(Arc::clone(session), Arc::clone(llm), request)),
        })
        .collect();

    Ok(Dispatched { user_turn_id, exchanges })
}

/// Dispatch from a client submission. An absent prompt falls back to the
/// scope's draft; absent targets fall back to [`targets_for`].
///
/// # Errors
///
/// See [`dispatch`].
pub fn submit(
    session: &Arc<Session>,
    llm: &Arc<dyn LlmTransport>,
    prompt: Option<&str>,
    scope: Scope,
    targets: Option<Vec<String>>,
) -> Result<Dispatched, DispatchError> {
    let prompt = match prompt {
        Some(p) => p.to_string(),
        None => session.draft(scope.draft_key()),
    };
    let targets = targets.unwrap_or_else(|| targets_for(session, &scope));
    dispatch(session, llm, &prompt, &targets, scope)
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
