use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::config::BackendSection;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("invalid backend url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Completion callbacks for one invocation.
#[async_trait::async_trait]
pub trait PlayoutHooks: Send + Sync {
    async fn on_success(&self);
    async fn on_error(&self, message: &str);
}

#[derive(Debug, Default)]
pub struct LogHooks;

#[async_trait::async_trait]
impl PlayoutHooks for LogHooks {
    async fn on_success(&self) {
        info!("playout finished cleanly");
    }

    async fn on_error(&self, message: &str) {
        error!(%message, "playout failed");
    }
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
    message: &'a str,
    token: &'a str,
}

/// Pushes status to the operator backend. Transport failures are logged and
/// dropped.
#[derive(Clone)]
pub struct BackendHooks {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl fmt::Debug for BackendHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHooks")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl BackendHooks {
    pub fn new(backend: &BackendSection) -> Result<Self, StatusError> {
        let raw = format!(
            "{}/streamer/update-live-stream",
            backend.url.trim_end_matches('/')
        );
        let endpoint = Url::parse(&raw).map_err(|source| StatusError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            token: backend.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn push(&self, status: &str, message: &str) {
        let body = StatusUpdate {
            status,
            message,
            token: &self.token,
        };
        match self
            .client
            .put(self.endpoint.clone())
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(status, "status pushed to backend");
            }
            Ok(response) => {
                warn!(status, http_status = %response.status(), "backend rejected status update");
            }
            Err(error) => {
                warn!(status, %error, "failed to push status to backend");
            }
        }
    }
}

#[async_trait::async_trait]
impl PlayoutHooks for BackendHooks {
    async fn on_success(&self) {
        self.push("SUCCESS", "playout completed").await;
    }

    async fn on_error(&self, message: &str) {
        self.push("FAILED", message).await;
    }
}
