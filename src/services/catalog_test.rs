use super::*;
use crate::state::test_helpers::ScriptedTransport;

// =========================================================================
// provider / display_name
// =========================================================================

#[test]
fn provider_prefers_path_prefix() {
    assert_eq!(provider("openai/gpt-4"), "openai");
    assert_eq!(provider("anthropic/claude-3"), "anthropic");
    assert_eq!(provider("ollama/llama3:8b"), "ollama");
}

#[test]
fn provider_falls_back_to_known_name_prefixes() {
    assert_eq!(provider("gpt-4o-mini"), "openai");
    assert_eq!(provider("claude-3-opus"), "anthropic");
}

#[test]
fn provider_of_bare_id_drops_tag() {
    assert_eq!(provider("llama3:8b"), "llama3");
    assert_eq!(provider("mistral"), "mistral");
}

#[test]
fn display_name_is_last_segment() {
    assert_eq!(display_name("ollama/llama3:8b"), "llama3:8b");
    assert_eq!(display_name("openrouter/meta/llama-3"), "llama-3");
    assert_eq!(display_name("gpt-4"), "gpt-4");
}

#[test]
fn model_info_serializes_all_fields() {
    let info = ModelInfo::from_id("openai/gpt-4");
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json, serde_json::json!({ "id": "openai/gpt-4", "provider": "openai", "display_name": "gpt-4" }));
}

// =========================================================================
// fetch / refresh
// =========================================================================

#[tokio::test]
async fn fetch_failure_yields_empty_catalog() {
    let transport = ScriptedTransport::new().with_models_error("connection refused");
    assert!(fetch_models(&transport).await.is_empty());
}

#[tokio::test]
async fn first_refresh_selects_every_model() {
    let session = Session::new(16);
    let transport = ScriptedTransport::new().with_models(&["openai/gpt-4", "anthropic/claude-3"]);

    let models = refresh(&session, &transport).await;

    assert_eq!(models.len(), 2);
    assert_eq!(models[1].provider, "anthropic");
    assert_eq!(session.selection(), vec!["anthropic/claude-3".to_string(), "openai/gpt-4".to_string()]);
    assert_eq!(session.models(), vec!["openai/gpt-4".to_string(), "anthropic/claude-3".to_string()]);
}

#[tokio::test]
async fn failed_refresh_keeps_selection_empty() {
    let session = Session::new(16);
    let transport = ScriptedTransport::new().with_models_error("boom");

    assert!(refresh(&session, &transport).await.is_empty());
    assert!(session.selection().is_empty());
    assert!(session.models().is_empty());
}
