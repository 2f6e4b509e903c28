//! Client side of the same-origin relay.
//!
//! The controller never talks to the upstream vendor directly; every call goes
//! through one of the three relay contracts below.

use crate::relay::schemas::RelayRequest;
use async_trait::async_trait;
use fx_core::ModelDescriptor;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("relay unreachable: {0}")]
    Transport(String),

    #[error("relay returned an unreadable body: {0}")]
    InvalidBody(String),
}

impl RelayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidBody(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// The three relay contracts. Each returns the upstream JSON unmodified.
#[async_trait]
pub trait GenerationRelay: Send + Sync {
    async fn create(
        &self,
        api_key: &str,
        model_endpoint: &str,
        body: Value,
    ) -> Result<Value, RelayError>;

    async fn status(&self, api_key: &str, status_url: &str) -> Result<Value, RelayError>;

    async fn cancel(&self, api_key: &str, cancel_url: &str) -> Result<Value, RelayError>;
}

pub struct HttpRelay {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpRelay {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: RelayRequest) -> Result<Value, RelayError> {
        let url = format!("{}/api/replicate", self.relay_url);
        tracing::debug!(
            kind = request.kind(),
            target = request.target(),
            "Relay call"
        );

        let response = self.client.post(&url).json(&request).send().await?;
        json_or_error(response).await
    }

    /// Fetches the model catalog served next to the relay.
    pub async fn models(&self, api_key: &str) -> Result<Vec<ModelDescriptor>, RelayError> {
        let url = format!("{}/api/replicate/models", self.relay_url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .send()
            .await?;
        let body = json_or_error(response).await?;
        serde_json::from_value(body).map_err(|e| RelayError::InvalidBody(e.to_string()))
    }
}

#[async_trait]
impl GenerationRelay for HttpRelay {
    async fn create(
        &self,
        api_key: &str,
        model_endpoint: &str,
        body: Value,
    ) -> Result<Value, RelayError> {
        self.send(RelayRequest::Submit {
            api_key: api_key.to_string(),
            body,
            model_endpoint: model_endpoint.to_string(),
        })
        .await
    }

    async fn status(&self, api_key: &str, status_url: &str) -> Result<Value, RelayError> {
        self.send(RelayRequest::Status {
            api_key: api_key.to_string(),
            get_url: status_url.to_string(),
        })
        .await
    }

    async fn cancel(&self, api_key: &str, cancel_url: &str) -> Result<Value, RelayError> {
        self.send(RelayRequest::Cancel {
            api_key: api_key.to_string(),
            cancel_url: cancel_url.to_string(),
        })
        .await
    }
}

/// Success bodies are parsed as JSON; anything else keeps its status and a
/// truncated copy of the body.
pub(crate) async fn json_or_error(response: reqwest::Response) -> Result<Value, RelayError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(RelayError::Status {
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }

    serde_json::from_str(&body).map_err(|e| RelayError::InvalidBody(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
