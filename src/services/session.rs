//! Session context — the single owner of all mutable chat state.
//!
//! DESIGN
//! ======
//! One `Session` lives for the lifetime of the server. It owns the
//! conversation log, the model selection, the catalog cache, input drafts,
//! and the per-model busy set, all behind one mutex. Exchanges run on the
//! multi-threaded runtime, so every mutation takes the lock, edits, publishes
//! its event, and releases the lock before the caller awaits anything.
//!
//! Every state change is published on a broadcast channel as a [`Frame`] so
//! websocket clients can mirror the session without polling.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tokio::sync::broadcast;

use super::conversation::{ConversationStore, Turn, TurnId};
use crate::frame::{Data, Frame};

// =============================================================================
// EVENT NAMES
// =============================================================================

pub const EVENT_TURN_CREATED: &str = "turn:created";
pub const EVENT_TURN_DELTA: &str = "turn:delta";
pub const EVENT_TURN_DONE: &str = "turn:done";
pub const EVENT_TURN_ERROR: &str = "turn:error";
pub const EVENT_MODEL_BUSY: &str = "model:busy";
pub const EVENT_SELECTION_CHANGED: &str = "selection:changed";
pub const EVENT_MODELS_LOADED: &str = "models:loaded";

// =============================================================================
// STATE
// =============================================================================

/// Mutable session state. Only reachable through [`Session::lock`].
#[derive(Debug, Default)]
pub struct SessionState {
    pub conversation: ConversationStore,
    /// Selected model ids. Membership only; ordered for stable snapshots.
    pub selection: BTreeSet<String>,
    /// Cached model ids from the last catalog fetch.
    pub models: Vec<String>,
    /// Set once a catalog fetch returned at least one model.
    pub catalog_loaded: bool,
    /// Models shown as busy to clients.
    pub busy: BTreeSet<String>,
    /// Exchanges started per model whose cleanup has not run yet.
    pub in_flight: HashMap<String, usize>,
    /// Draft text of the global prompt box.
    pub prompt_draft: String,
    /// Draft text of each model's reply box.
    pub reply_drafts: HashMap<String, String>,
}

impl SessionState {
    /// Draft for the global prompt (`None`) or one model's reply box.
    #[must_use]
    pub fn draft(&self, model: Option<&str>) -> &str {
        match model {
            None => &self.prompt_draft,
            Some(m) => self
                .reply_drafts
                .get(m)
                .map_or("", String::as_str),
        }
    }

    /// Count a new exchange for `model`. Returns `true` when the model was
    /// not busy before.
    pub fn begin_exchange(&mut self, model: &str) -> bool {
        *self.in_flight.entry(model.to_string()).or_insert(0) += 1;
        self.busy.insert(model.to_string())
    }

    /// Clear the draft for the global prompt (`None`) or one model's reply box.
    pub fn clear_draft(&mut self, model: Option<&str>) {
        match model {
            None => self.prompt_draft.clear(),
            Some(m) => {
                self.reply_drafts.remove(m);
            }
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    state: Mutex<SessionState>,
    events: broadcast::Sender<Frame>,
}

impl Session {
    /// Create an empty session whose event channel buffers `event_buffer`
    /// frames per subscriber.
    #[must_use]
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self { state: Mutex::new(SessionState::default()), events }
    }

    /// Lock the session state. A poisoned lock is recovered; the state is
    /// only ever edited in small, self-contained steps.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.events.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, syscall: &str, data: Data) {
        let _ = self.events.send(Frame::request(syscall, data));
    }

    pub(crate) fn publish_turn_created(&self, turn: &Turn) {
        let mut data = Data::new();
        data.insert("turn".into(), serde_json::to_value(turn).unwrap_or_default());
        self.publish(EVENT_TURN_CREATED, data);
    }

    pub(crate) fn publish_busy(&self, model: &str, busy: bool) {
        let mut data = Data::new();
        data.insert("model".into(), json!(model));
        data.insert("busy".into(), json!(busy));
        self.publish(EVENT_MODEL_BUSY, data);
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Full conversation log.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().conversation.turns().to_vec()
    }

    /// Turns in `model`'s private thread.
    #[must_use]
    pub fn project(&self, model: &str) -> Vec<Turn> {
        self.lock()
            .conversation
            .project_for(model)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn turn(&self, id: TurnId) -> Option<Turn> {
        self.lock().conversation.find_by_id(id).cloned()
    }

    #[must_use]
    pub fn selection(&self) -> Vec<String> {
        self.lock().selection.iter().cloned().collect()
    }

    #[must_use]
    pub fn models(&self) -> Vec<String> {
        self.lock().models.clone()
    }

    #[must_use]
    pub fn busy_models(&self) -> Vec<String> {
        self.lock().busy.iter().cloned().collect()
    }

    #[must_use]
    pub fn is_busy(&self, model: &str) -> bool {
        self.lock().busy.contains(model)
    }

    #[must_use]
    pub fn draft(&self, model: Option<&str>) -> String {
        self.lock().draft(model).to_string()
    }

    // =========================================================================
    // SELECTION, CATALOG, DRAFTS
    // =========================================================================

    /// Flip membership of `model` in the selection. Returns the new membership.
    pub fn toggle_selection(&self, model: &str) -> bool {
        let mut state = self.lock();
        let selected = if state.selection.remove(model) {
            false
        } else {
            state.selection.insert(model.to_string());
            true
        };
        self.publish_selection(&state.selection);
        selected
    }

    /// Replace the selection.
    pub fn set_selection(&self, models: impl IntoIterator<Item = String>) {
        let mut state = self.lock();
        state.selection = models.into_iter().collect();
        self.publish_selection(&state.selection);
    }

    fn publish_selection(&self, selection: &BTreeSet<String>) {
        let mut data = Data::new();
        data.insert("models".into(), json!(selection));
        self.publish(EVENT_SELECTION_CHANGED, data);
    }

    /// Store a fetched catalog. When this is the first non-empty catalog and
    /// nothing is selected, every model becomes selected; returns whether that
    /// happened.
    pub fn load_catalog(&self, models: Vec<String>) -> bool {
        let mut state = self.lock();
        let select_all = !models.is_empty() && !state.catalog_loaded && state.selection.is_empty();
        if !models.is_empty() {
            state.catalog_loaded = true;
        }
        if select_all {
            state.selection = models.iter().cloned().collect();
        }
        state.models = models;

        let mut data = Data::new();
        data.insert("models".into(), json!(state.models));
        self.publish(EVENT_MODELS_LOADED, data);
        if select_all {
            self.publish_selection(&state.selection);
        }
        select_all
    }

    /// Store draft text for the global prompt (`None`) or one model's reply box.
    pub fn set_draft(&self, model: Option<&str>, text: impl Into<String>) {
        let mut state = self.lock();
        let text = text.into();
        match model {
            None => state.prompt_draft = text,
            Some(m) => {
                state.reply_drafts.insert(m.to_string(), text);
            }
        }
    }

    // =========================================================================
    // STREAMING MUTATIONS
    // =========================================================================

    /// Append a streamed fragment to a turn and publish the delta.
    pub fn append_content(&self, id: TurnId, fragment: &str) -> bool {
        let mut state = self.lock();
        if !state.conversation.append_content(id, fragment) {
            return false;
        }
        let model = state
            .conversation
            .find_by_id(id)
            .and_then(|t| t.model.clone());
        let mut data = Data::new();
        data.insert("id".into(), json!(id));
        data.insert("model".into(), json!(model));
        data.insert("delta".into(), json!(fragment));
        self.publish(EVENT_TURN_DELTA, data);
        true
    }

    /// Record a terminal failure on a turn and publish it.
    pub fn fail_turn(&self, id: TurnId, message: &str) {
        let mut state = self.lock();
        if !state.conversation.fail(id, message) {
            return;
        }
        let turn = state.conversation.find_by_id(id);
        let mut data = Data::new();
        data.insert("id".into(), json!(id));
        data.insert("model".into(), json!(turn.and_then(|t| t.model.clone())));
        data.insert("message".into(), json!(turn.and_then(|t| t.error.clone())));
        self.publish(EVENT_TURN_ERROR, data);
    }

    /// Mark a turn's exchange complete and publish it.
    pub fn finish_turn(&self, id: TurnId) {
        let mut state = self.lock();
        if !state.conversation.finish(id) {
            return;
        }
        let turn = state.conversation.find_by_id(id);
        let mut data = Data::new();
        data.insert("id".into(), json!(id));
        data.insert("model".into(), json!(turn.and_then(|t| t.model.clone())));
        data.insert("content".into(), json!(turn.map(|t| t.content.clone())));
        self.publish(EVENT_TURN_DONE, data);
    }

    /// Release one exchange for `model` and recompute its busy flag. The
    /// model stays busy while a sibling exchange is in flight or one of its
    /// turns is still loading. Returns the new flag.
    pub fn end_exchange(&self, model: &str) -> bool {
        let mut state = self.lock();
        let remaining = state
            .in_flight
            .get(model)
            .map_or(0, |n| n.saturating_sub(1));
        if remaining == 0 {
            state.in_flight.remove(model);
        } else {
            state.in_flight.insert(model.to_string(), remaining);
        }

        let busy = remaining > 0 || state.conversation.is_model_loading(model);
        let changed = if busy {
            state.busy.insert(model.to_string())
        } else {
            state.busy.remove(model)
        };
        if changed {
            self.publish_busy(model, busy);
        }
        busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_membership_and_publishes() {
        let session = Session::new(16);
        let mut rx = session.subscribe();

        assert!(session.toggle_selection("gpt-4"));
        assert_eq!(session.selection(), vec!["gpt-4".to_string()]);
        assert!(!session.toggle_selection("gpt-4"));
        assert!(session.selection().is_empty());

        let first = rx.try_recv().unwrap();
        assert_eq!(first.syscall, EVENT_SELECTION_CHANGED);
        assert_eq!(first.data["models"], json!(["gpt-4"]));
    }

    #[test]
    fn first_catalog_selects_everything() {
        let session = Session::new(16);
        assert!(session.load_catalog(vec!["a".into(), "b".into()]));
        assert_eq!(session.selection(), vec!["a".to_string(), "b".to_string()]);

        session.set_selection(vec!["a".to_string()]);
        assert!(!session.load_catalog(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(session.selection(), vec!["a".to_string()]);
        assert_eq!(session.models().len(), 3);
    }

    #[test]
    fn empty_catalog_does_not_count_as_loaded() {
        let session = Session::new(16);
        assert!(!session.load_catalog(Vec::new()));
        assert!(session.models().is_empty());
        assert!(session.load_catalog(vec!["a".into()]));
    }

    #[test]
    fn catalog_respects_existing_selection() {
        let session = Session::new(16);
        session.toggle_selection("b");
        assert!(!session.load_catalog(vec!["a".into(), "b".into()]));
        assert_eq!(session.selection(), vec!["b".to_string()]);
    }

    #[test]
    fn drafts_are_scoped() {
        let session = Session::new(16);
        session.set_draft(None, "global");
        session.set_draft(Some("gpt-4"), "reply");
        assert_eq!(session.draft(None), "global");
        assert_eq!(session.draft(Some("gpt-4")), "reply");
        assert_eq!(session.draft(Some("other")), "");

        session.lock().clear_draft(Some("gpt-4"));
        assert_eq!(session.draft(Some("gpt-4")), "");
        assert_eq!(session.draft(None), "global");
    }

    #[test]
    fn mutations_on_unknown_turns_publish_nothing() {
        let session = Session::new(16);
        let mut rx = session.subscribe();
        let missing = uuid::Uuid::new_v4();

        assert!(!session.append_content(missing, "x"));
        session.fail_turn(missing, "x");
        session.finish_turn(missing);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn busy_holds_until_last_exchange_ends() {
        let session = Session::new(16);
        {
            let mut state = session.lock();
            assert!(state.begin_exchange("gpt-4"));
            assert!(!state.begin_exchange("gpt-4"));
        }

        assert!(session.end_exchange("gpt-4"));
        assert!(session.is_busy("gpt-4"));
        assert!(!session.end_exchange("gpt-4"));
        assert!(session.busy_models().is_empty());
        assert!(session.lock().in_flight.is_empty());
    }

    #[test]
    fn loading_turn_keeps_model_busy_after_release() {
        let session = Session::new(16);
        let id = {
            let mut state = session.lock();
            state.begin_exchange("gpt-4");
            state.conversation.append(Turn::placeholder("gpt-4"))
        };

        assert!(session.end_exchange("gpt-4"));
        session.finish_turn(id);
        assert!(!session.end_exchange("gpt-4"));
    }
}
