use std::sync::Arc;

use super::*;
use crate::state::test_helpers::{ScriptedTransport, test_app_state};

#[tokio::test]
async fn refresh_then_list_returns_metadata() {
    let state = test_app_state(Arc::new(ScriptedTransport::new().with_models(&["ollama/llama3:8b", "gpt-4"])));

    let Json(refreshed) = refresh_models(State(state.clone())).await;
    assert_eq!(refreshed.len(), 2);

    let Json(listed) = list_models(State(state)).await;
    assert_eq!(listed, refreshed);
    assert_eq!(listed[0].provider, "ollama");
    assert_eq!(listed[0].display_name, "llama3:8b");
    assert_eq!(listed[1].provider, "openai");
}

#[tokio::test]
async fn toggle_reports_new_membership() {
    let state = test_app_state(Arc::new(ScriptedTransport::new()));

    let Json(on) = toggle_selection(State(state.clone()), Json(ToggleBody { model: "gpt-4".into() })).await;
    assert_eq!(on, ToggleResponse { model: "gpt-4".into(), selected: true });

    let Json(off) = toggle_selection(State(state.clone()), Json(ToggleBody { model: "gpt-4".into() })).await;
    assert!(!off.selected);

    let Json(selection) = get_selection(State(state)).await;
    assert!(selection.is_empty());
}

#[tokio::test]
async fn put_selection_replaces_and_dedupes() {
    let state = test_app_state(Arc::new(ScriptedTransport::new()));
    state.session.toggle_selection("old");

    let body = SelectionBody { models: vec!["b".into(), "a".into(), "b".into()] };
    let Json(selection) = put_selection(State(state), Json(body)).await;

    assert_eq!(selection, vec!["a".to_string(), "b".to_string()]);
}
