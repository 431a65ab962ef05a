//! Capability implementations backed by the Mastodon client.

use anyhow::Context;
use async_trait::async_trait;
use fedibot_mastodon::{
    MastodonClient, MastodonError, MastodonStream, NewStatus, Status, StatusId, StreamEvent,
};

use crate::handler::StatusPoster;
use crate::prompt::{ImageFetchError, ImageFetcher};
use crate::runtime::NotificationStream;
use crate::thread::StatusLookup;

#[async_trait]
impl StatusLookup for MastodonClient {
    async fn get_status(&self, id: &StatusId) -> anyhow::Result<Status> {
        MastodonClient::get_status(self, id)
            .await
            .with_context(|| format!("failed to fetch status {id}"))
    }
}

#[async_trait]
impl StatusPoster for MastodonClient {
    async fn post_status(&self, status: &NewStatus) -> anyhow::Result<StatusId> {
        let posted = MastodonClient::post_status(self, status)
            .await
            .context("failed to post reply status")?;
        Ok(posted.id)
    }
}

#[async_trait]
impl ImageFetcher for MastodonClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        self.download_media(url).await.map_err(image_fetch_error)
    }
}

fn image_fetch_error(error: MastodonError) -> ImageFetchError {
    match error.status() {
        Some(status) => ImageFetchError::Unavailable { status },
        None => ImageFetchError::Transport(error.to_string()),
    }
}

#[async_trait]
impl NotificationStream for MastodonStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        MastodonStream::next_event(self).await
    }
}
