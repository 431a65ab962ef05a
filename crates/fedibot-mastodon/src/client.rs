//! Mastodon REST client helpers used by thread walking and reply posting.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{Account, MastodonError, NewStatus, Status, StatusId};

const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Clone)]
pub struct MastodonClientConfig {
    /// Server origin such as `https://fuzzies.wtf`.
    pub server: String,
    pub access_token: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MastodonClient {
    http: reqwest::Client,
    origin: reqwest::Url,
    access_token: String,
}

impl MastodonClient {
    pub fn new(config: MastodonClientConfig) -> Result<Self, MastodonError> {
        let origin = parse_origin(&config.server)?;
        let access_token = config.access_token.trim().to_string();
        if access_token.is_empty() {
            return Err(MastodonError::MissingAccessToken);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("fedibot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            origin,
            access_token,
        })
    }

    pub fn origin(&self) -> &reqwest::Url {
        &self.origin
    }

    /// Host part of the server origin, used to qualify local handles.
    pub fn local_domain(&self) -> &str {
        self.origin.host_str().unwrap_or_default()
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/{}",
            self.origin.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn verify_credentials(&self) -> Result<Account, MastodonError> {
        let request = self
            .http
            .get(self.api_url("accounts/verify_credentials"))
            .bearer_auth(&self.access_token);
        self.request_json("accounts.verify_credentials", request)
            .await
    }

    pub async fn get_status(&self, id: &StatusId) -> Result<Status, MastodonError> {
        let request = self
            .http
            .get(self.api_url(&format!("statuses/{id}")))
            .bearer_auth(&self.access_token);
        self.request_json("statuses.get", request).await
    }

    pub async fn post_status(&self, status: &NewStatus) -> Result<Status, MastodonError> {
        let request = self
            .http
            .post(self.api_url("statuses"))
            .bearer_auth(&self.access_token)
            .json(status);
        self.request_json("statuses.post", request).await
    }

    /// Downloads a media file without credentials; attachment URLs are public.
    pub async fn download_media(&self, url: &str) -> Result<Vec<u8>, MastodonError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MastodonError::HttpStatus {
                operation: "media.download",
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn request_json<T>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, MastodonError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MastodonError::HttpStatus {
                operation,
                status: status.as_u16(),
                body: truncate_for_error(&body, ERROR_BODY_LIMIT),
            });
        }
        tracing::debug!(operation, status = status.as_u16(), "mastodon api call");
        Ok(serde_json::from_str(&body)?)
    }
}

fn parse_origin(server: &str) -> Result<reqwest::Url, MastodonError> {
    let trimmed = server.trim();
    let origin = reqwest::Url::parse(trimmed)
        .map_err(|_| MastodonError::InvalidServer(trimmed.to_string()))?;
    if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
        return Err(MastodonError::InvalidServer(trimmed.to_string()));
    }
    Ok(origin)
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let Some((clip_idx, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    format!("{}...", &text[..clip_idx])
}
