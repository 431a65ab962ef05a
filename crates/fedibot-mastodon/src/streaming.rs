//! User notification stream over the Mastodon streaming WebSocket.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};

use crate::{MastodonClient, MastodonError, Notification, Status, StatusId};

/// One decoded event from the user stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Notification(Notification),
    Update(Status),
    StatusEdited(Status),
    Delete(StatusId),
    /// A frame that could not be decoded, or a transport failure.
    Error(String),
    Other { event: String },
}

#[derive(Debug, Deserialize)]
struct StreamingFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decodes one text frame of the streaming API.
///
/// Frames look like `{"stream": ["user"], "event": "notification", "payload": "{...}"}`
/// where `payload` is itself JSON encoded as a string.
pub fn parse_stream_frame(text: &str) -> Result<StreamEvent, MastodonError> {
    let frame: StreamingFrame = serde_json::from_str(text)?;
    if let Some(error) = frame.error {
        return Ok(StreamEvent::Error(error));
    }
    let event = frame.event.unwrap_or_default();
    let payload = frame.payload.unwrap_or_default();
    let parsed = match event.as_str() {
        "notification" => StreamEvent::Notification(serde_json::from_str(&payload)?),
        "update" => StreamEvent::Update(serde_json::from_str(&payload)?),
        "status.update" => StreamEvent::StatusEdited(serde_json::from_str(&payload)?),
        "delete" => StreamEvent::Delete(StatusId::new(payload)),
        _ => StreamEvent::Other { event },
    };
    Ok(parsed)
}

/// Live subscription to `stream=user`.
pub struct MastodonStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl MastodonStream {
    pub async fn connect(client: &MastodonClient) -> Result<Self, MastodonError> {
        let url = streaming_url(client.origin());
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|error| MastodonError::WebSocket(Box::new(error)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", client.access_token()))
            .map_err(|_| MastodonError::MissingAccessToken)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _response) = connect_async(request)
            .await
            .map_err(|error| MastodonError::WebSocket(Box::new(error)))?;
        tracing::info!(url = %url, "connected to mastodon streaming api");
        Ok(Self {
            socket,
            closed: false,
        })
    }

    /// Next event, or `None` once the server closed the stream.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }
        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => {
                    self.closed = true;
                    return Some(StreamEvent::Error(format!(
                        "streaming connection failed: {error}"
                    )));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            };
            let text = match message {
                WsMessage::Text(text) => text.as_str().to_string(),
                WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(error) => {
                        return Some(StreamEvent::Error(format!(
                            "invalid utf-8 streaming payload: {error}"
                        )))
                    }
                },
                WsMessage::Close(_) => {
                    self.closed = true;
                    return None;
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(match parse_stream_frame(&text) {
                Ok(event) => event,
                Err(error) => StreamEvent::Error(format!("undecodable streaming frame: {error}")),
            });
        }
    }
}

fn streaming_url(origin: &reqwest::Url) -> String {
    let scheme = if origin.scheme() == "http" { "ws" } else { "wss" };
    let host = origin.host_str().unwrap_or_default();
    let port = origin
        .port()
        .map(|port| format!(":{port}"))
        .unwrap_or_default();
    format!("{scheme}://{host}{port}/api/v1/streaming?stream=user")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_stream_frame, streaming_url, StreamEvent};
    use crate::{NotificationKind, StatusId};

    fn status_payload() -> serde_json::Value {
        json!({
            "id": "100",
            "account": {"id": "1", "username": "alice", "acct": "alice"},
            "content": "<p>@bot hi</p>",
            "visibility": "public",
            "in_reply_to_id": null,
            "media_attachments": [],
            "mentions": [{"username": "bot", "acct": "bot"}],
            "spoiler_text": ""
        })
    }

    fn frame(event: &str, payload: String) -> String {
        json!({"stream": ["user"], "event": event, "payload": payload}).to_string()
    }

    #[test]
    fn decodes_mention_notification_frames() {
        let payload = json!({
            "id": "9",
            "type": "mention",
            "account": {"id": "1", "username": "alice", "acct": "alice"},
            "status": status_payload()
        })
        .to_string();

        let event = parse_stream_frame(&frame("notification", payload)).expect("frame decodes");
        let StreamEvent::Notification(notification) = event else {
            panic!("expected notification event");
        };
        assert_eq!(notification.kind, NotificationKind::Mention);
        assert_eq!(
            notification.status.map(|status| status.id),
            Some(StatusId::new("100"))
        );
    }

    #[test]
    fn decodes_update_edit_and_delete_frames() {
        let update = parse_stream_frame(&frame("update", status_payload().to_string()))
            .expect("update decodes");
        assert!(matches!(update, StreamEvent::Update(status) if status.id.as_str() == "100"));

        let edited = parse_stream_frame(&frame("status.update", status_payload().to_string()))
            .expect("edit decodes");
        assert!(matches!(edited, StreamEvent::StatusEdited(_)));

        let deleted =
            parse_stream_frame(&frame("delete", "100".to_string())).expect("delete decodes");
        assert_eq!(deleted, StreamEvent::Delete(StatusId::new("100")));
    }

    #[test]
    fn unknown_events_and_error_frames_are_preserved() {
        let other = parse_stream_frame(&frame("filters_changed", String::new()))
            .expect("unknown event decodes");
        assert_eq!(
            other,
            StreamEvent::Other {
                event: "filters_changed".to_string()
            }
        );

        let error = parse_stream_frame(r#"{"error":"Invalid access token"}"#)
            .expect("error frame decodes");
        assert_eq!(error, StreamEvent::Error("Invalid access token".to_string()));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_stream_frame(&frame("notification", "{not json".to_string())).is_err());
        assert!(parse_stream_frame("not a frame").is_err());
    }

    #[test]
    fn streaming_url_follows_origin_scheme() {
        let https = reqwest::Url::parse("https://fuzzies.wtf").expect("url parses");
        assert_eq!(
            streaming_url(&https),
            "wss://fuzzies.wtf/api/v1/streaming?stream=user"
        );
        let http = reqwest::Url::parse("http://127.0.0.1:3000").expect("url parses");
        assert_eq!(
            streaming_url(&http),
            "ws://127.0.0.1:3000/api/v1/streaming?stream=user"
        );
    }
}
