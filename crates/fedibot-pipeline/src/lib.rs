//! Mention-handling pipeline for the fedibot reply bot.
//!
//! A mention notification flows through filtering, thread reconstruction,
//! multimodal prompt assembly, completion, response cleanup and mention
//! prefixing before the reply is posted. Every network-facing step goes
//! through a capability trait so the pipeline can run against fakes.

pub mod completion;
pub mod handler;
pub mod html_text;
pub mod mastodon_adapters;
pub mod mentions;
pub mod prompt;
pub mod runtime;
pub mod sanitize;
pub mod thread;

pub use completion::{CompletionError, GeminiCompletion, TextAndImageCompletion};
pub use handler::{
    IgnoreReason, MentionHandler, MentionHandlerConfig, MentionOutcome, StatusPoster,
    DEFAULT_FALLBACK_REPLY, DEFAULT_PERSONA_NAME, DEFAULT_SYSTEM_PROMPT, DEFAULT_THREAD_DEPTH,
};
pub use html_text::extract_text_from_html;
pub use mentions::{build_mention_prefix, extract_mentions, MentionSet};
pub use prompt::{
    assemble_prompt, ImageFetchError, ImageFetcher, ImageFormat, Persona, PromptError,
    PromptSegment,
};
pub use runtime::{run_event_loop, EventLoopReport, NotificationStream};
pub use sanitize::clean_response;
pub use thread::{walk_thread, ContextLine, ConversationContext, StatusLookup};
