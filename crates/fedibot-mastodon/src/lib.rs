//! Mastodon REST and streaming client used by the fedibot mention pipeline.
//!
//! Only the slice of the API the bot needs is modelled: looking up statuses
//! while walking a thread, posting replies, downloading media, and the user
//! notification stream.

mod client;
mod entities;
mod error;
mod streaming;

pub use client::{MastodonClient, MastodonClientConfig};
pub use entities::{
    Account, MediaAttachment, Mention, NewStatus, Notification, NotificationKind, Status,
    StatusId, Visibility,
};
pub use error::MastodonError;
pub use streaming::{parse_stream_frame, MastodonStream, StreamEvent};
