//! Depth-bounded reconstruction of the thread above a mention.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use fedibot_mastodon::{MediaAttachment, Status, StatusId};

use crate::html_text::extract_text_from_html;

/// Fetches a single status by id; used to follow reply-parent links.
#[async_trait]
pub trait StatusLookup: Send + Sync {
    async fn get_status(&self, id: &StatusId) -> anyhow::Result<Status>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine {
    pub speaker: String,
    pub text: String,
}

impl ContextLine {
    pub fn render(&self) -> String {
        format!("{}: {}", self.speaker, self.text)
    }
}

/// Transcript of a thread, oldest line first, plus every attachment seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    pub lines: Vec<ContextLine>,
    /// Attachments in walk order: the leaf status first, then its ancestors.
    pub attachments: Vec<MediaAttachment>,
}

/// Walks `in_reply_to_id` links upward from `leaf`, visiting at most
/// `max_depth` statuses.
///
/// A failed or timed-out parent lookup ends the walk early and the partial
/// context is returned.
pub async fn walk_thread(
    lookup: &dyn StatusLookup,
    leaf: &Status,
    max_depth: usize,
    lookup_timeout: Duration,
) -> ConversationContext {
    let mut lines = VecDeque::new();
    let mut attachments = Vec::new();
    let mut current = leaf.clone();

    for depth in 1..=max_depth {
        lines.push_front(ContextLine {
            speaker: current.account.username.clone(),
            text: extract_text_from_html(&current.content),
        });
        attachments.extend(current.media_attachments.iter().cloned());

        let Some(parent_id) = current.in_reply_to_id.clone() else {
            break;
        };
        if depth == max_depth {
            tracing::debug!(
                status_id = %current.id,
                max_depth,
                "thread walk reached depth bound"
            );
            break;
        }

        match tokio::time::timeout(lookup_timeout, lookup.get_status(&parent_id)).await {
            Ok(Ok(parent)) => current = parent,
            Ok(Err(error)) => {
                tracing::warn!(
                    parent_id = %parent_id,
                    error = %format!("{error:#}"),
                    "failed to fetch parent status; using partial thread context"
                );
                break;
            }
            Err(_) => {
                tracing::warn!(
                    parent_id = %parent_id,
                    timeout_ms = lookup_timeout.as_millis() as u64,
                    "parent status lookup timed out; using partial thread context"
                );
                break;
            }
        }
    }

    ConversationContext {
        lines: lines.into(),
        attachments,
    }
}
