//! Mastodon API entities, trimmed to the fields the bot reads or writes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical status identifier.
///
/// Servers and older client libraries disagree on whether ids are JSON
/// strings or numbers; both decode into the same textual id here so nothing
/// past the serde boundary has to care.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawStatusId", into = "String")]
pub struct StatusId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStatusId {
    Text(String),
    Number(u64),
}

impl From<RawStatusId> for StatusId {
    fn from(raw: RawStatusId) -> Self {
        match raw {
            RawStatusId::Text(text) => Self(text.trim().to_string()),
            RawStatusId::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<StatusId> for String {
    fn from(id: StatusId) -> Self {
        id.0
    }
}

impl StatusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Enumerates supported `Visibility` values.
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// `user` for local accounts, `user@domain` for remote ones.
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(default)]
    pub id: String,
    /// Coarse Mastodon media type: `image`, `gifv`, `video`, `audio` or `unknown`.
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl MediaAttachment {
    /// MIME-like kind for this attachment.
    ///
    /// Mastodon only reports a coarse type, so images get their subtype from
    /// the URL extension, falling back to JPEG.
    pub fn kind(&self) -> String {
        let media_type = self.media_type.trim().to_ascii_lowercase();
        if media_type.contains('/') {
            return media_type;
        }
        match media_type.as_str() {
            "image" => {
                let url = self.url().to_ascii_lowercase();
                if url.ends_with(".png") {
                    "image/png".to_string()
                } else if url.ends_with(".webp") {
                    "image/webp".to_string()
                } else {
                    "image/jpeg".to_string()
                }
            }
            "gifv" | "video" => "video/mp4".to_string(),
            "audio" => "audio/mpeg".to_string(),
            _ => "application/octet-stream".to_string(),
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    /// Alt text, if the author wrote any.
    pub fn alt_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub account: Account,
    /// Raw HTML body.
    #[serde(default)]
    pub content: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub in_reply_to_id: Option<StatusId>,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Status,
    Reblog,
    Follow,
    FollowRequest,
    Favourite,
    Poll,
    Update,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub account: Account,
    #[serde(default)]
    pub status: Option<Status>,
}

/// Body of `POST /api/v1/statuses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<StatusId>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MediaAttachment, Notification, NotificationKind, Status, StatusId, Visibility};

    #[test]
    fn status_id_accepts_string_and_number() {
        let from_text: StatusId = serde_json::from_value(json!("109876")).expect("text id");
        let from_number: StatusId = serde_json::from_value(json!(109876)).expect("numeric id");
        assert_eq!(from_text, from_number);
        assert_eq!(from_number.as_str(), "109876");
        assert_eq!(
            serde_json::to_value(&from_number).expect("id serializes"),
            json!("109876")
        );
    }

    #[test]
    fn decodes_status_with_numeric_reply_parent() {
        let status: Status = serde_json::from_value(json!({
            "id": "2",
            "account": {"id": "7", "username": "alice", "acct": "alice"},
            "content": "<p>hi</p>",
            "visibility": "unlisted",
            "in_reply_to_id": 1,
            "media_attachments": [],
            "mentions": [{"username": "bot", "acct": "bot"}],
            "spoiler_text": ""
        }))
        .expect("status should decode");

        assert_eq!(status.in_reply_to_id, Some(StatusId::new("1")));
        assert_eq!(status.visibility, Visibility::Unlisted);
        assert_eq!(status.mentions[0].acct, "bot");
    }

    #[test]
    fn unknown_notification_types_decode_as_other() {
        let notification: Notification = serde_json::from_value(json!({
            "id": "5",
            "type": "admin.sign_up",
            "account": {"id": "7", "username": "alice", "acct": "alice"}
        }))
        .expect("notification should decode");
        assert_eq!(notification.kind, NotificationKind::Other);
        assert!(notification.status.is_none());
    }

    #[test]
    fn attachment_kind_uses_url_extension_for_images() {
        let attachment = |media_type: &str, url: &str| MediaAttachment {
            id: "1".to_string(),
            media_type: media_type.to_string(),
            url: Some(url.to_string()),
            description: None,
        };

        assert_eq!(attachment("image", "https://x/a.PNG").kind(), "image/png");
        assert_eq!(attachment("image", "https://x/a.webp").kind(), "image/webp");
        assert_eq!(attachment("image", "https://x/a").kind(), "image/jpeg");
        assert_eq!(attachment("gifv", "https://x/a.mp4").kind(), "video/mp4");
        assert_eq!(attachment("audio", "https://x/a.mp3").kind(), "audio/mpeg");
        assert_eq!(
            attachment("unknown", "https://x/a.bin").kind(),
            "application/octet-stream"
        );
        assert_eq!(attachment("image/gif", "https://x/a.gif").kind(), "image/gif");
    }

    #[test]
    fn blank_alt_text_is_treated_as_missing() {
        let attachment = MediaAttachment {
            id: "1".to_string(),
            media_type: "image".to_string(),
            url: None,
            description: Some("   ".to_string()),
        };
        assert_eq!(attachment.alt_text(), None);
        assert_eq!(attachment.url(), "");
    }
}
