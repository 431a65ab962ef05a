use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, MediaSource, Message,
    MessageRole,
};

pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Content categories the Gemini safety filter can be tuned for.
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Harassment => "HARM_CATEGORY_HARASSMENT",
            Self::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            Self::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            Self::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A category whose blocking is switched off (`BLOCK_NONE`).
pub struct SafetySetting {
    pub category: HarmCategory,
}

impl SafetySetting {
    const THRESHOLD: &'static str = "BLOCK_NONE";

    /// Disables blocking for every category the bot is configured with.
    pub fn permissive() -> Vec<Self> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| Self { category })
        .collect()
    }
}

#[derive(Debug, Clone)]
/// Public struct `GoogleConfig` used across fedibot components.
pub struct GoogleConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone)]
/// Public struct `GoogleClient` used across fedibot components.
pub struct GoogleClient {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Result<Self, AiError> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn generate_content_url(&self, model: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", model);
        }

        format!("{base}/models/{model}:generateContent")
    }
}

#[async_trait]
impl LlmClient for GoogleClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
        let body = build_generate_content_body(&request, &self.config.safety_settings);
        let url = self.generate_content_url(&request.model);
        tracing::debug!(model = %request.model, "sending gemini generateContent request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AiError::HttpStatus {
                status: status.as_u16(),
                body: truncate_for_error(&raw, ERROR_BODY_LIMIT),
            });
        }

        let parsed = parse_generate_content_response(&raw)?;
        tracing::debug!(
            finish_reason = parsed.finish_reason.as_deref().unwrap_or("unknown"),
            total_tokens = parsed.usage.total_tokens,
            "gemini generateContent completed"
        );
        Ok(parsed)
    }
}

fn build_generate_content_body(request: &ChatRequest, safety: &[SafetySetting]) -> Value {
    let mut body = json!({
        "contents": to_google_contents(&request.messages),
    });

    if !safety.is_empty() {
        body["safetySettings"] = Value::Array(
            safety
                .iter()
                .map(|setting| {
                    json!({
                        "category": setting.category.as_str(),
                        "threshold": SafetySetting::THRESHOLD,
                    })
                })
                .collect(),
        );
    }

    if request.temperature.is_some() || request.top_k.is_some() {
        let mut generation_config = json!({});
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(top_k) = request.top_k {
            generation_config["topK"] = json!(top_k);
        }
        body["generationConfig"] = generation_config;
    }

    body
}

fn to_google_contents(messages: &[Message]) -> Value {
    Value::Array(
        messages
            .iter()
            .filter_map(|message| {
                let role = match message.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                };
                let parts = to_google_parts(message);
                if parts.is_empty() {
                    None
                } else {
                    Some(json!({
                        "role": role,
                        "parts": parts,
                    }))
                }
            })
            .collect(),
    )
}

fn to_google_parts(message: &Message) -> Vec<Value> {
    let mut parts = Vec::new();
    for block in &message.content {
        match block {
            ContentBlock::Text { text } => {
                if !text.trim().is_empty() {
                    parts.push(json!({ "text": text }));
                }
            }
            ContentBlock::Image {
                source: MediaSource::Base64 { mime_type, data },
            } => parts.push(json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": data,
                }
            })),
        }
    }
    parts
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let Some((clip_idx, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    format!("{}...", &text[..clip_idx])
}

fn parse_generate_content_response(raw: &str) -> Result<ChatResponse, AiError> {
    let parsed: GeminiReply = serde_json::from_str(raw)?;
    if parsed.candidates.is_empty() {
        let detail = match parsed.prompt_feedback.and_then(|feedback| feedback.block_reason) {
            Some(reason) => format!("gemini returned no candidates (blocked: {reason})"),
            None => "gemini returned no candidates".to_string(),
        };
        return Err(AiError::InvalidResponse(detail));
    }

    let finish_reason = parsed
        .candidates
        .iter()
        .find_map(|candidate| candidate.finish_reason.clone());
    // Every candidate contributes its text parts, in order.
    let text = parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect::<String>();

    let usage = parsed.usage_metadata.unwrap_or_default();
    let content = if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::text(text)]
    };

    Ok(ChatResponse {
        message: Message::assistant_blocks(content),
        finish_reason,
        usage: ChatUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReply {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GeminiUsage {
    prompt_token_count: u64,
    candidates_token_count: u64,
    total_token_count: u64,
}
