//! Model catalog — upstream model ids and the metadata derived from them.
//!
//! Failures to list models are logged and degrade to an empty catalog; the
//! next explicit refresh is the only recovery path.

use serde::Serialize;
use tracing::{error, info};

use super::session::Session;
use crate::llm::LlmTransport;

/// A model id together with its derived display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub display_name: String,
}

impl ModelInfo {
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        Self { id: id.to_string(), provider: provider(id), display_name: display_name(id).to_string() }
    }
}

/// Provider of a model id.
///
/// `"openai/gpt-4"` → `"openai"`, `"gpt-4"` → `"openai"`,
/// `"claude-3-opus"` → `"anthropic"`, `"llama3:8b"` → `"llama3"`.
#[must_use]
pub fn provider(id: &str) -> String {
    if let Some((prefix, _)) = id.split_once('/') {
        return prefix.to_string();
    }
    if id.starts_with("gpt-") {
        return "openai".to_string();
    }
    if id.starts_with("claude-") {
        return "anthropic".to_string();
    }
    id.split_once(':')
        .map_or(id, |(base, _)| base)
        .to_string()
}

/// Last path segment of a model id. Tags are kept.
#[must_use]
pub fn display_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Fetch model ids from the upstream. Returns an empty list on failure.
pub async fn fetch_models(llm: &dyn LlmTransport) -> Vec<String> {
    match llm.list_models().await {
        Ok(models) => models,
        Err(e) => {
            error!(error = %e, "catalog: model fetch failed");
            Vec::new()
        }
    }
}

/// Fetch the catalog and store it in the session. The first non-empty fetch
/// selects every model when nothing is selected yet.
pub async fn refresh(session: &Session, llm: &dyn LlmTransport) -> Vec<ModelInfo> {
    let models = fetch_models(llm).await;
    let selected_all = session.load_catalog(models.clone());
    info!(count = models.len(), selected_all, "catalog: refreshed");
    models.iter().map(|id| ModelInfo::from_id(id)).collect()
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
