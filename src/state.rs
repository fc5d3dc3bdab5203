//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the one chat session and the upstream transport. Both are
//! Arc-wrapped so spawned exchanges can outlive the request that started them.

use std::sync::Arc;

use crate::llm::LlmTransport;
use crate::services::session::Session;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub llm: Arc<dyn LlmTransport>,
}

impl AppState {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmTransport>, event_buffer: usize) -> Self {
        Self { session: Arc::new(Session::new(event_buffer)), llm }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
