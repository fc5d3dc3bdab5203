use super::*;
use crate::llm::Role;
use crate::services::conversation::Turn;
use crate::state::test_helpers::{Script, ScriptedTransport, sse};

const GPT: &str = "openai/gpt-4";
const CLAUDE: &str = "anthropic/claude-3";

/// Seed a broadcast user turn plus one placeholder for `model`.
fn seed(session: &Session, model: &str) -> ExchangeRequest {
    let mut state = session.lock();
    let user = state
        .conversation
        .append(Turn::broadcast("Hi", vec![model.to_string()]));
    let placeholder = state.conversation.append(Turn::placeholder(model));
    state.begin_exchange(model);
    prepare(&state.conversation, model, placeholder, user)
}

fn scripted(model: &str, script: Script) -> (Arc<ScriptedTransport>, Arc<dyn LlmTransport>) {
    let transport = Arc::new(ScriptedTransport::new().with_script(model, script));
    let llm: Arc<dyn LlmTransport> = transport.clone();
    (transport, llm)
}

// =========================================================================
// prepare
// =========================================================================

#[test]
fn prepare_excludes_placeholder_and_other_models() {
    let mut store = ConversationStore::new();
    store.append(Turn::broadcast("Hi", vec![GPT.into(), CLAUDE.into()]));
    let old_gpt = store.append(Turn::placeholder(GPT));
    store.append_content(old_gpt, "Hello from gpt");
    let old_claude = store.append(Turn::placeholder(CLAUDE));
    store.append_content(old_claude, "Hello from claude");
    let reply = store.append(Turn::reply_to("Only you", GPT));
    let placeholder = store.append(Turn::placeholder(GPT));

    let request = prepare(&store, GPT, placeholder, reply);

    assert_eq!(request.model, GPT);
    assert_eq!(request.turn_id, placeholder);
    assert_eq!(
        request.messages,
        vec![
            ChatMessage::new(Role::User, "Hi"),
            ChatMessage::new(Role::Assistant, "Hello from gpt"),
            ChatMessage::new(Role::User, "Only you"),
        ]
    );
}

#[test]
fn prepare_appends_user_turn_missing_from_projection() {
    let mut store = ConversationStore::new();
    let user = store.append(Turn::reply_to("Ping", CLAUDE));
    let placeholder = store.append(Turn::placeholder(GPT));

    let request = prepare(&store, GPT, placeholder, user);

    assert_eq!(request.messages, vec![ChatMessage::new(Role::User, "Ping")]);
}

// =========================================================================
// run
// =========================================================================

#[tokio::test]
async fn run_accumulates_deltas_and_completes() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let (transport, llm) = scripted(GPT, Script::Chunks(vec![sse("Hel"), sse("lo"), "data: [DONE]\n".into()]));

    let state = run(Arc::clone(&session), llm, request).await;

    assert_eq!(state, ExchangeState::Complete);
    let turn = session.turn(turn_id).unwrap();
    assert_eq!(turn.content, "Hello");
    assert!(!turn.loading);
    assert!(turn.error.is_none());
    assert!(!session.is_busy(GPT));
    assert_eq!(transport.last_messages(GPT), Some(vec![ChatMessage::new(Role::User, "Hi")]));
}

#[tokio::test]
async fn run_records_http_failure_on_turn() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let (_transport, llm) = scripted(GPT, Script::Status(500));

    let state = run(Arc::clone(&session), llm, request).await;

    assert_eq!(state, ExchangeState::Failed);
    let turn = session.turn(turn_id).unwrap();
    assert_eq!(turn.error.as_deref(), Some("API response error: status 500"));
    assert!(turn.content.is_empty());
    assert!(!turn.loading);
    assert!(!session.is_busy(GPT));
}

#[tokio::test]
async fn run_keeps_partial_content_on_read_failure() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let (_transport, llm) = scripted(GPT, Script::FailAfter(vec![sse("partial")], "connection reset".into()));

    let state = run(Arc::clone(&session), llm, request).await;

    assert_eq!(state, ExchangeState::Failed);
    let turn = session.turn(turn_id).unwrap();
    assert_eq!(turn.content, "partial");
    assert_eq!(turn.error.as_deref(), Some("stream read failed: connection reset"));
    assert!(!session.is_busy(GPT));
}

#[tokio::test]
async fn run_with_zero_deltas_completes_empty() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let (_transport, llm) = scripted(GPT, Script::Chunks(vec!["data: [DONE]\n".into()]));

    assert_eq!(run(Arc::clone(&session), llm, request).await, ExchangeState::Complete);

    let turn = session.turn(turn_id).unwrap();
    assert!(turn.content.is_empty());
    assert!(!turn.loading);
    assert!(turn.error.is_none());
}

#[tokio::test]
async fn run_reads_past_done_until_transport_closes() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let first = format!("{}data: [DONE]\n{}", sse("a"), sse("ignored"));
    let (_transport, llm) = scripted(GPT, Script::Chunks(vec![first, sse("b")]));

    run(Arc::clone(&session), llm, request).await;

    assert_eq!(session.turn(turn_id).unwrap().content, "ab");
}

#[tokio::test]
async fn run_publishes_delta_then_done() {
    let session = Arc::new(Session::new(64));
    let request = seed(&session, GPT);
    let turn_id = request.turn_id;
    let mut rx = session.subscribe();
    let (_transport, llm) = scripted(GPT, Script::Chunks(vec![sse("Hi")]));

    run(Arc::clone(&session), llm, request).await;

    let delta = rx.try_recv().unwrap();
    assert_eq!(delta.syscall, "turn:delta");
    assert_eq!(delta.data["id"], serde_json::json!(turn_id));
    assert_eq!(delta.data["delta"], "Hi");
    let done = rx.try_recv().unwrap();
    assert_eq!(done.syscall, "turn:done");
    assert_eq!(done.data["content"], "Hi");
    let busy = rx.try_recv().unwrap();
    assert_eq!(busy.syscall, "model:busy");
    assert_eq!(busy.data["busy"], false);
}
