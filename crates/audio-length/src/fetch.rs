//! Downloads the resource a task points at.

use crate::config::AudioLengthConfig;
use crate::error::{FetchError, FetchErrorKind};
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Fetch limits taken from [`AudioLengthConfig`]
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl From<&AudioLengthConfig> for FetchConfig {
    fn from(config: &AudioLengthConfig) -> Self {
        FetchConfig {
            timeout: config.fetch_timeout(),
            max_bytes: config.max_download_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// HTTP(S) and `file://` downloader. Built once and shared by every task.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: Client,
    max_bytes: u64,
}

impl AudioFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::with_source(FetchErrorKind::Request, &e))?;

        Ok(AudioFetcher {
            client,
            max_bytes: config.max_bytes,
        })
    }

    /// Download the full body at `url`
    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let parsed =
            Url::parse(url).map_err(|e| FetchError::with_source(FetchErrorKind::InvalidUrl, &e))?;

        match parsed.scheme() {
            "http" | "https" => self.fetch_http(parsed).await,
            "file" => self.fetch_file(&parsed).await,
            other => Err(FetchError::new(
                FetchErrorKind::UnsupportedScheme,
                format!("unsupported URL scheme '{}' in {}", other, url),
            )),
        }
    }

    async fn fetch_http(&self, url: Url) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::Status,
                format!("HTTP status {} for url ({})", status, url),
            ));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(reqwest_error)? {
            self.check_size((body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), "Downloaded audio");
        Ok(body.freeze())
    }

    async fn fetch_file(&self, url: &Url) -> Result<Bytes, FetchError> {
        let path = url.to_file_path().map_err(|_| {
            FetchError::new(
                FetchErrorKind::InvalidUrl,
                format!("not a local file path: {}", url),
            )
        })?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FetchError::with_source(FetchErrorKind::File, &e))?;
        self.check_size(metadata.len())?;

        let contents = tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::with_source(FetchErrorKind::File, &e))?;

        debug!(path = %path.display(), bytes = contents.len(), "Read local audio");
        Ok(Bytes::from(contents))
    }

    fn check_size(&self, size: u64) -> Result<(), FetchError> {
        if size > self.max_bytes {
            return Err(FetchError::new(
                FetchErrorKind::TooLarge,
                format!(
                    "response body of {} bytes exceeds the limit of {} bytes",
                    size, self.max_bytes
                ),
            ));
        }
        Ok(())
    }
}

fn reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_builder() {
        FetchErrorKind::InvalidUrl
    } else if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if err.is_connect() {
        FetchErrorKind::Connect
    } else if err.is_status() {
        FetchErrorKind::Status
    } else if err.is_body() || err.is_decode() {
        FetchErrorKind::Body
    } else {
        FetchErrorKind::Request
    };
    FetchError::with_source(kind, &err)
}
