use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_when_environment_is_empty() {
    let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.llm.api_base, DEFAULT_API_BASE);
    assert_eq!(cfg.llm.api_key, DEFAULT_API_KEY);
    assert_eq!(
        cfg.llm.timeouts,
        LlmTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.event_buffer, DEFAULT_EVENT_BUFFER);
    assert!(cfg.static_dir.is_none());
}

#[test]
fn overrides_are_parsed() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("LLM_API_BASE", "https://proxy.example.test/v1/"),
        ("LLM_API_KEY", "sk-live"),
        ("LLM_REQUEST_TIMEOUT_SECS", "42"),
        ("LLM_CONNECT_TIMEOUT_SECS", "7"),
        ("PORT", "8080"),
        ("STATIC_DIR", "/srv/ui"),
        ("EVENT_BUFFER", "64"),
    ]))
    .unwrap();

    assert_eq!(cfg.llm.api_base, "https://proxy.example.test/v1");
    assert_eq!(cfg.llm.api_key, "sk-live");
    assert_eq!(cfg.llm.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.static_dir, Some(PathBuf::from("/srv/ui")));
    assert_eq!(cfg.event_buffer, 64);
}

#[test]
fn empty_values_fall_back_to_defaults() {
    let cfg = AppConfig::from_lookup(lookup(&[("LLM_API_BASE", ""), ("LLM_API_KEY", "  ")])).unwrap();
    assert_eq!(cfg.llm.api_base, DEFAULT_API_BASE);
    assert_eq!(cfg.llm.api_key, DEFAULT_API_KEY);
}

#[test]
fn unparseable_timeouts_fall_back_to_defaults() {
    let cfg = AppConfig::from_lookup(lookup(&[("LLM_REQUEST_TIMEOUT_SECS", "soon")])).unwrap();
    assert_eq!(cfg.llm.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn invalid_port_errors() {
    let err = AppConfig::from_lookup(lookup(&[("PORT", "99999")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("invalid PORT"));
}

#[test]
fn zero_event_buffer_errors() {
    let err = AppConfig::from_lookup(lookup(&[("EVENT_BUFFER", "0")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("EVENT_BUFFER"));
}
