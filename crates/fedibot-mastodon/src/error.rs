use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `MastodonError` values.
pub enum MastodonError {
    #[error("invalid server origin '{0}'")]
    InvalidServer(String),
    #[error("missing access token")]
    MissingAccessToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mastodon api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("streaming connection error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

impl MastodonError {
    /// HTTP status code for errors where the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
