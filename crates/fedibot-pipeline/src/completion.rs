use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fedibot_ai::{AiError, ChatRequest, ContentBlock, LlmClient, Message};
use thiserror::Error;

use crate::prompt::PromptSegment;

#[derive(Debug, Error)]
/// Enumerates supported `CompletionError` values.
pub enum CompletionError {
    #[error("completion provider failed: {0}")]
    Provider(#[from] AiError),
    #[error("completion returned no text")]
    EmptyResponse,
    #[error("completion timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Turns an ordered list of prompt segments into reply text.
#[async_trait]
pub trait TextAndImageCompletion: Send + Sync {
    async fn complete(&self, segments: Vec<PromptSegment>) -> Result<String, CompletionError>;
}

/// Completion backed by any `LlmClient`, configured for Gemini-style sampling.
#[derive(Clone)]
pub struct GeminiCompletion {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    top_k: u32,
}

impl GeminiCompletion {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.7,
            top_k: 1,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, segments: Vec<PromptSegment>) -> ChatRequest {
        let blocks = segments.into_iter().map(segment_to_block).collect();
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user_blocks(blocks)],
            temperature: Some(self.temperature),
            top_k: Some(self.top_k),
        }
    }
}

fn segment_to_block(segment: PromptSegment) -> ContentBlock {
    match segment {
        PromptSegment::Text(text) => ContentBlock::text(text),
        PromptSegment::Image { format, bytes } => {
            ContentBlock::inline_image(format.mime_type(), STANDARD.encode(bytes))
        }
    }
}

#[async_trait]
impl TextAndImageCompletion for GeminiCompletion {
    async fn complete(&self, segments: Vec<PromptSegment>) -> Result<String, CompletionError> {
        let request = self.build_request(segments);
        let response = self.client.complete(request).await?;
        if let Some(reason) = response.finish_reason.as_deref() {
            tracing::debug!(finish_reason = reason, "completion finished");
        }

        let text = response.message.text_content();
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }
}
