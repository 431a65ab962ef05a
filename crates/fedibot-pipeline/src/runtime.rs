use std::future::Future;

use async_trait::async_trait;
use fedibot_mastodon::StreamEvent;

use crate::handler::{MentionHandler, MentionOutcome};

/// Source of decoded streaming events; `None` means the stream has ended.
#[async_trait]
pub trait NotificationStream: Send {
    async fn next_event(&mut self) -> Option<StreamEvent>;
}

/// Counters describing one run of the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoopReport {
    pub events: usize,
    pub notifications: usize,
    pub replies: usize,
    pub fallback_replies: usize,
    pub ignored: usize,
    pub post_failures: usize,
    pub stream_errors: usize,
    pub shutdown_requested: bool,
}

/// Consumes `stream` one event at a time until it ends or `shutdown`
/// resolves.
///
/// Each mention is fully handled before the next event is read. Shutdown is
/// only observed between events, so a reply in flight is always finished.
pub async fn run_event_loop<S, F>(
    stream: &mut S,
    handler: &MentionHandler,
    shutdown: F,
) -> EventLoopReport
where
    S: NotificationStream + ?Sized,
    F: Future<Output = ()>,
{
    let mut report = EventLoopReport::default();
    tokio::pin!(shutdown);

    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown requested; leaving event loop");
                report.shutdown_requested = true;
                break;
            }
            event = stream.next_event() => event,
        };
        let Some(event) = event else {
            tracing::info!("notification stream ended");
            break;
        };
        report.events += 1;

        match event {
            StreamEvent::Notification(notification) => {
                report.notifications += 1;
                match handler.handle_notification(&notification).await {
                    MentionOutcome::Ignored(_) => report.ignored += 1,
                    MentionOutcome::Replied { used_fallback, .. } => {
                        report.replies += 1;
                        if used_fallback {
                            report.fallback_replies += 1;
                        }
                    }
                    MentionOutcome::PostFailed { .. } => report.post_failures += 1,
                }
            }
            StreamEvent::Update(status) | StreamEvent::StatusEdited(status) => {
                tracing::debug!(status_id = %status.id, "ignoring timeline status event");
            }
            StreamEvent::Delete(status_id) => {
                tracing::debug!(status_id = %status_id, "ignoring delete event");
            }
            StreamEvent::Error(message) => {
                report.stream_errors += 1;
                tracing::warn!(error = %message, "notification stream reported an error");
            }
            StreamEvent::Other { event } => {
                tracing::debug!(event = %event, "ignoring unsupported stream event");
            }
        }
    }

    tracing::info!(
        events = report.events,
        replies = report.replies,
        ignored = report.ignored,
        post_failures = report.post_failures,
        "event loop finished"
    );
    report
}
