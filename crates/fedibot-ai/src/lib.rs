//! Provider-neutral chat types and the Gemini client used for reply generation.
mod google;
mod types;

pub use google::{
    GoogleClient, GoogleConfig, HarmCategory, SafetySetting, DEFAULT_GOOGLE_API_BASE,
};
pub use types::{
    AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, MediaSource, Message,
    MessageRole,
};
