use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::config::LlmConfig;
use crate::types::{LlmError, LlmRequest};

/// One completion call against a generative backend. Implementations return
/// the raw text of the first choice.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

/// Resolve the configured provider once at startup. Returns `None` when no
/// API key is set, which disables fallback, enrichment and questions.
pub fn resolve_backend(config: &LlmConfig) -> Option<Arc<dyn GenerativeBackend>> {
    let api_key = config.active_api_key()?;
    match config.provider.as_str() {
        "openai" => Some(Arc::new(crate::llm::openai::OpenAiAdapter::new(
            &api_key,
            config.base_url.as_deref(),
        ))),
        other => {
            // Any OpenAI-compatible gateway works through the same adapter
            // when OPENAI_BASE_URL points at it.
            warn!(provider = other, "unknown provider, using the openai-compatible adapter");
            Some(Arc::new(crate::llm::openai::OpenAiAdapter::new(
                &api_key,
                config.base_url.as_deref(),
            )))
        }
    }
}
