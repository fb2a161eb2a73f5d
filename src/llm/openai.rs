// OpenAI chat completions adapter
// API reference: https://platform.openai.com/docs/api-reference/chat
//
// The base URL can be pointed at any OpenAI-compatible gateway.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::GenerativeBackend;
use crate::types::{LlmError, LlmRequest};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(OPENAI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_messages(request: &LlmRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for message in &request.messages {
            messages.push(ChatMessage {
                role: message.role.clone(),
                content: message.content.clone(),
            });
        }
        messages
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiAdapter {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: request.model.clone(),
            messages: Self::build_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|parsed| parsed.error.message)
                .unwrap_or(text);
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(detail),
                429 => LlmError::RateLimited(detail),
                _ => LlmError::Api(format!("status {}: {}", status, detail)),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("failed to parse completion response: {}", e)))?;

        parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::Api("completion returned no content".to_string()))
    }
}
