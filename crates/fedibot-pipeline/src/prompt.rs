//! Multimodal prompt assembly for a mention reply.

use std::time::Duration;

use async_trait::async_trait;
use fedibot_mastodon::MediaAttachment;
use thiserror::Error;

use crate::thread::ConversationContext;

const SUPPORTED_IMAGE_KINDS: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Guesses the format from the URL suffix; anything unrecognised is JPEG.
    pub fn from_url(url: &str) -> Self {
        let url = url.trim().to_ascii_lowercase();
        if url.ends_with(".png") {
            Self::Png
        } else if url.ends_with(".webp") {
            Self::Webp
        } else {
            Self::Jpeg
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// One ordered unit of the prompt sent to the completion capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSegment {
    Text(String),
    Image { format: ImageFormat, bytes: Vec<u8> },
}

impl PromptSegment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Who the bot is when it talks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub system_prompt: String,
}

#[derive(Debug, Error)]
pub enum ImageFetchError {
    /// The server answered but would not hand over the file.
    #[error("image request refused with status {status}")]
    Unavailable { status: u16 },
    #[error("image transfer failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ImageFetchError>;
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to download attachment {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ImageFetchError,
    },
}

/// Builds the prompt for one mention.
///
/// Segment order: persona, image count (only when there are attachments),
/// transcript header, one line per context entry, the attachments, the
/// current user's turn and finally a `"{persona}:"` cue.
pub async fn assemble_prompt(
    persona: &Persona,
    context: &ConversationContext,
    current_user: &str,
    current_text: &str,
    images: &[MediaAttachment],
    fetcher: &dyn ImageFetcher,
    fetch_timeout: Duration,
) -> Result<Vec<PromptSegment>, PromptError> {
    let mut segments = vec![PromptSegment::text(persona.system_prompt.clone())];

    if !images.is_empty() {
        segments.push(PromptSegment::text(format!(
            "There are {} images in this conversation. Refer to them as needed. ",
            images.len()
        )));
    }

    segments.push(PromptSegment::text("Here is the conversation:"));
    segments.extend(
        context
            .lines
            .iter()
            .map(|line| PromptSegment::text(line.render())),
    );

    for (index, attachment) in images.iter().enumerate() {
        let number = index + 1;
        match fetch_viewable_image(attachment, fetcher, fetch_timeout).await? {
            Some(image) => {
                segments.push(image);
                segments.push(PromptSegment::text(format!("Image {number}: ")));
                if let Some(alt) = attachment.alt_text() {
                    segments.push(PromptSegment::text(format!("Image alt text: {alt}")));
                }
            }
            None => {
                let mut description = media_description(&attachment.kind()).to_string();
                if let Some(alt) = attachment.alt_text() {
                    description.push_str(" with alt text: ");
                    description.push_str(alt);
                }
                segments.push(PromptSegment::text(format!(
                    "Image {number}: [User uploaded {description} that cannot be viewed]"
                )));
            }
        }
    }

    segments.push(PromptSegment::text(format!("{current_user}: {current_text}")));
    segments.push(PromptSegment::text(format!("{}:", persona.name)));
    Ok(segments)
}

/// Downloads an attachment the model can look at.
///
/// `Ok(None)` means the attachment should be described instead of shown.
async fn fetch_viewable_image(
    attachment: &MediaAttachment,
    fetcher: &dyn ImageFetcher,
    fetch_timeout: Duration,
) -> Result<Option<PromptSegment>, PromptError> {
    let kind = attachment.kind();
    let url = attachment.url();
    if !is_supported_image_kind(&kind) || url.trim().is_empty() {
        return Ok(None);
    }

    let fetched = tokio::time::timeout(fetch_timeout, fetcher.fetch_image(url))
        .await
        .unwrap_or_else(|_| {
            Err(ImageFetchError::Transport(format!(
                "timed out after {}ms",
                fetch_timeout.as_millis()
            )))
        });

    match fetched {
        Ok(bytes) if bytes.is_empty() => {
            tracing::warn!(url, "attachment download returned no data; describing instead");
            Ok(None)
        }
        Ok(bytes) => Ok(Some(PromptSegment::Image {
            format: ImageFormat::from_url(url),
            bytes,
        })),
        Err(ImageFetchError::Unavailable { status }) => {
            tracing::warn!(url, status, "attachment is not downloadable; describing instead");
            Ok(None)
        }
        Err(source) => Err(PromptError::Fetch {
            url: url.to_string(),
            source,
        }),
    }
}

pub fn is_supported_image_kind(kind: &str) -> bool {
    SUPPORTED_IMAGE_KINDS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(kind.trim()))
}

/// Human wording for a media kind, used in placeholder segments.
pub fn media_description(kind: &str) -> &'static str {
    let kind = kind.trim().to_ascii_lowercase();
    if kind.starts_with("image/") {
        "image"
    } else if kind.starts_with("video/") {
        "video"
    } else if kind.starts_with("audio/") {
        "audio file"
    } else {
        "file"
    }
}
