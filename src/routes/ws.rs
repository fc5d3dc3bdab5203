//! WebSocket handler — session event relay plus request frames.
//!
//! DESIGN
//! ======
//! On upgrade, subscribes to session events and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Session events (turn deltas, busy flags, selection) → forward to client
//!
//! Handler functions validate, call into services, and return an `Outcome`.
//! Any state change they cause reaches every client, the sender included,
//! through the session event stream rather than through the reply.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and a snapshot
//! 2. Client sends frames → dispatch → handler returns Outcome → reply
//! 3. Session events are forwarded as they are published
//! 4. Close → unsubscribe

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services::catalog::{self, ModelInfo};
use crate::services::dispatch::{self, Scope};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions.
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Subscribe before the snapshot so no event between the two is lost.
    let mut events = state.session.subscribe();

    let welcome = Frame::request("session:connected", snapshot(&state)).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, client_id, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = events.recv() => match event {
                Ok(frame) => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%client_id, skipped, "ws: client lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    info!(%client_id, "ws: client disconnected");
}

/// Current selection, catalog, busy flags, and log for a fresh client.
fn snapshot(state: &AppState) -> Data {
    let models: Vec<ModelInfo> = state
        .session
        .models()
        .iter()
        .map(|id| ModelInfo::from_id(id))
        .collect();
    let mut data = Data::new();
    data.insert("models".into(), json!(models));
    data.insert("selection".into(), json!(state.session.selection()));
    data.insert("busy".into(), json!(state.session.busy_models()));
    data.insert("turns".into(), json!(state.session.turns()));
    data
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch without a socket.
async fn process_inbound_text(state: &AppState, client_id: Uuid, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let prefix = req.prefix();
    let result = match prefix {
        "chat" => handle_chat(state, &req),
        "selection" => handle_selection(state, &req),
        "models" => handle_models(state, &req).await,
        "conversation" => handle_conversation(state, &req),
        "draft" => handle_draft(state, &req),
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn handle_chat(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "send" => {
            let scope = req
                .str_field("model")
                .map_or(Scope::Global, |m| Scope::PerModel(m.to_string()));
            let targets = string_list(req.data.get("targets"));
            let dispatched = dispatch::submit(&state.session, &state.llm, req.str_field("prompt"), scope, targets)
                .map_err(|e| req.error_from(&e))?;

            let receipt = serde_json::to_value(dispatched.receipt()).unwrap_or_default();
            let mut data = Data::new();
            if let Value::Object(map) = receipt {
                data.extend(map);
            }
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

fn handle_selection(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "toggle" => {
            let Some(model) = req.str_field("model") else {
                return Err(req.error("model required"));
            };
            let selected = state.session.toggle_selection(model);
            let mut data = Data::new();
            data.insert("model".into(), json!(model));
            data.insert("selected".into(), json!(selected));
            Ok(Outcome::Reply(data))
        }
        "set" => {
            let Some(models) = string_list(req.data.get("models")) else {
                return Err(req.error("models required"));
            };
            state.session.set_selection(models);
            Ok(Outcome::Done)
        }
        "get" => {
            let mut data = Data::new();
            data.insert("models".into(), json!(state.session.selection()));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown selection op: {op}"))),
    }
}

async fn handle_models(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    let models: Vec<ModelInfo> = match req.op() {
        "list" => state
            .session
            .models()
            .iter()
            .map(|id| ModelInfo::from_id(id))
            .collect(),
        "refresh" => catalog::refresh(&state.session, state.llm.as_ref()).await,
        op => return Err(req.error(format!("unknown models op: {op}"))),
    };
    let mut data = Data::new();
    data.insert("models".into(), json!(models));
    Ok(Outcome::Reply(data))
}

fn handle_conversation(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "get" => {
            let turns = match req.str_field("model") {
                Some(model) => state.session.project(model),
                None => state.session.turns(),
            };
            let mut data = Data::new();
            data.insert("turns".into(), json!(turns));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown conversation op: {op}"))),
    }
}

fn handle_draft(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "set" => {
            let Some(text) = req.str_field("text") else {
                return Err(req.error("text required"));
            };
            state.session.set_draft(req.str_field("model"), text);
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown draft op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Read an array of strings. Non-string entries are skipped.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    let is_delta = frame.syscall == crate::services::session::EVENT_TURN_DELTA;
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else if frame.status == Status::Done {
        info!(id = %frame.id, syscall = %frame.syscall, "ws: send reply");
    } else if !is_delta {
        debug!(id = %frame.id, syscall = %frame.syscall, "ws: send event");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
