//! Orchestration of a single mention: filter, gather context, complete, post.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fedibot_mastodon::{NewStatus, Notification, NotificationKind, Status, StatusId, Visibility};

use crate::completion::{CompletionError, TextAndImageCompletion};
use crate::html_text::extract_text_from_html;
use crate::mentions::{build_mention_prefix, extract_mentions, qualify_handle};
use crate::prompt::{assemble_prompt, ImageFetcher, Persona};
use crate::sanitize::clean_response;
use crate::thread::{walk_thread, StatusLookup};

pub const DEFAULT_THREAD_DEPTH: usize = 20;
pub const DEFAULT_PERSONA_NAME: &str = "Macr0";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are, Macr0 an AI bot on fuzzies.wtf a Mastodon instance about linux, tech, and random fun. You are a little bit edgy and speak in all lowercase. dont be too mean to people tho, its okay to make jokes but dont go too far. feel free to swear when you want. keep your responses short and entertaining. like on twitter. you do not have the ability to use emojis or images. you can only generate text. ";
pub const DEFAULT_FALLBACK_REPLY: &str = "ugh.. something went wrong on my end. try again later?";

/// Publishes a reply; returns the id the server assigned to it.
#[async_trait]
pub trait StatusPoster: Send + Sync {
    async fn post_status(&self, status: &NewStatus) -> anyhow::Result<StatusId>;
}

#[derive(Debug, Clone)]
pub struct MentionHandlerConfig {
    /// The bot's own handle, bare (`macr0`) or qualified (`macr0@host`).
    pub bot_handle: String,
    /// Domain used to qualify bare handles.
    pub local_domain: String,
    /// Accounts allowed to reach the bot through direct messages.
    pub dm_allowlist: Vec<String>,
    pub persona: Persona,
    pub fallback_reply: String,
    /// Mention the thread participants in the fallback reply too. Off by
    /// default: the fallback is posted exactly as configured.
    pub prefix_fallback: bool,
    pub thread_depth: usize,
    pub request_timeout: Duration,
    pub completion_timeout: Duration,
}

impl MentionHandlerConfig {
    pub fn new(bot_handle: impl Into<String>, local_domain: impl Into<String>) -> Self {
        Self {
            bot_handle: bot_handle.into(),
            local_domain: local_domain.into(),
            dm_allowlist: Vec::new(),
            persona: Persona {
                name: DEFAULT_PERSONA_NAME.to_string(),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            prefix_fallback: false,
            thread_depth: DEFAULT_THREAD_DEPTH,
            request_timeout: Duration::from_millis(15_000),
            completion_timeout: Duration::from_millis(60_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `IgnoreReason` values.
pub enum IgnoreReason {
    NotAMention,
    MissingStatus,
    SelfAuthored,
    DirectNotAllowlisted,
    Private,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAMention => "not_a_mention",
            Self::MissingStatus => "missing_status",
            Self::SelfAuthored => "self_authored",
            Self::DirectNotAllowlisted => "direct_not_allowlisted",
            Self::Private => "private",
        }
    }
}

/// What happened to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    Ignored(IgnoreReason),
    Replied {
        in_reply_to: StatusId,
        reply_id: StatusId,
        text: String,
        used_fallback: bool,
    },
    PostFailed {
        in_reply_to: StatusId,
        error: String,
    },
}

pub struct MentionHandler {
    config: MentionHandlerConfig,
    lookup: Arc<dyn StatusLookup>,
    poster: Arc<dyn StatusPoster>,
    fetcher: Arc<dyn ImageFetcher>,
    completion: Arc<dyn TextAndImageCompletion>,
}

impl MentionHandler {
    pub fn new(
        config: MentionHandlerConfig,
        lookup: Arc<dyn StatusLookup>,
        poster: Arc<dyn StatusPoster>,
        fetcher: Arc<dyn ImageFetcher>,
        completion: Arc<dyn TextAndImageCompletion>,
    ) -> Self {
        Self {
            config,
            lookup,
            poster,
            fetcher,
            completion,
        }
    }

    pub async fn handle_notification(&self, notification: &Notification) -> MentionOutcome {
        if notification.kind != NotificationKind::Mention {
            tracing::debug!(
                notification_id = %notification.id,
                kind = ?notification.kind,
                "ignoring non-mention notification"
            );
            return MentionOutcome::Ignored(IgnoreReason::NotAMention);
        }
        let Some(status) = notification.status.as_ref() else {
            tracing::debug!(
                notification_id = %notification.id,
                "ignoring mention notification without a status"
            );
            return MentionOutcome::Ignored(IgnoreReason::MissingStatus);
        };

        if let Some(reason) = self.ignore_reason(status) {
            tracing::debug!(
                status_id = %status.id,
                author = %status.account.acct,
                reason = reason.as_str(),
                "ignoring mention"
            );
            return MentionOutcome::Ignored(reason);
        }

        self.reply_to(status).await
    }

    fn ignore_reason(&self, status: &Status) -> Option<IgnoreReason> {
        let domain = self.config.local_domain.as_str();
        let author = &status.account.acct;
        if same_handle(author, &self.config.bot_handle, domain) {
            return Some(IgnoreReason::SelfAuthored);
        }
        match status.visibility {
            Visibility::Direct
                if !self
                    .config
                    .dm_allowlist
                    .iter()
                    .any(|allowed| same_handle(author, allowed, domain)) =>
            {
                Some(IgnoreReason::DirectNotAllowlisted)
            }
            Visibility::Private => Some(IgnoreReason::Private),
            _ => None,
        }
    }

    async fn reply_to(&self, status: &Status) -> MentionOutcome {
        let text = extract_text_from_html(&status.content);
        tracing::info!(
            status_id = %status.id,
            author = %status.account.acct,
            visibility = status.visibility.as_str(),
            "received mention"
        );

        let declared_mentions = status
            .mentions
            .iter()
            .map(|mention| mention.acct.as_str())
            .collect::<Vec<_>>();

        let (reply, used_fallback) = match self.generate_reply(status, &text).await {
            Ok(reply) => (reply, false),
            Err(error) => {
                tracing::error!(
                    status_id = %status.id,
                    error = %format!("{error:#}"),
                    "completion failed; replying with fallback"
                );
                (self.config.fallback_reply.clone(), true)
            }
        };

        let body = if used_fallback && !self.config.prefix_fallback {
            reply
        } else {
            build_mention_prefix(
                declared_mentions,
                &status.account.acct,
                &self.config.bot_handle,
                &self.config.local_domain,
            )
            .prepend_to(&reply)
        };

        let new_status = NewStatus {
            status: body.clone(),
            in_reply_to_id: Some(status.id.clone()),
            visibility: reply_visibility(status.visibility),
            spoiler_text: (!status.spoiler_text.is_empty()).then(|| status.spoiler_text.clone()),
        };

        match self.poster.post_status(&new_status).await {
            Ok(reply_id) => {
                tracing::info!(
                    status_id = %status.id,
                    reply_id = %reply_id,
                    used_fallback,
                    "posted reply"
                );
                MentionOutcome::Replied {
                    in_reply_to: status.id.clone(),
                    reply_id,
                    text: body,
                    used_fallback,
                }
            }
            Err(error) => {
                let error = format!("{error:#}");
                tracing::error!(status_id = %status.id, error = %error, "failed to post reply");
                MentionOutcome::PostFailed {
                    in_reply_to: status.id.clone(),
                    error,
                }
            }
        }
    }

    async fn generate_reply(&self, status: &Status, text: &str) -> anyhow::Result<String> {
        let context = walk_thread(
            self.lookup.as_ref(),
            status,
            self.config.thread_depth,
            self.config.request_timeout,
        )
        .await;
        tracing::debug!(
            status_id = %status.id,
            lines = context.lines.len(),
            attachments = context.attachments.len(),
            "collected thread context"
        );

        let segments = assemble_prompt(
            &self.config.persona,
            &context,
            &status.account.username,
            text,
            &context.attachments,
            self.fetcher.as_ref(),
            self.config.request_timeout,
        )
        .await?;

        let timeout = self.config.completion_timeout;
        let raw = tokio::time::timeout(timeout, self.completion.complete(segments))
            .await
            .unwrap_or(Err(CompletionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }))?;

        let (_, without_mentions) = extract_mentions(&raw);
        let cleaned = clean_response(&without_mentions);
        if cleaned.is_empty() {
            anyhow::bail!("completion was empty after cleanup");
        }
        Ok(cleaned)
    }
}

/// Public replies are posted unlisted to keep the bot off public timelines.
fn reply_visibility(original: Visibility) -> Visibility {
    match original {
        Visibility::Public => Visibility::Unlisted,
        other => other,
    }
}

fn same_handle(left: &str, right: &str, local_domain: &str) -> bool {
    match (
        qualify_handle(left, local_domain),
        qualify_handle(right, local_domain),
    ) {
        (Some(left), Some(right)) => left.eq_ignore_ascii_case(&right),
        _ => false,
    }
}
