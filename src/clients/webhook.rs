use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::WebhookConfig;
use crate::constants::webhook::{EPISODE_NAME_FIELD, PDF_FILE_FIELD, PDF_MIME};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook URL is not configured")]
    NotConfigured,

    #[error("Webhook request failed: {0}")]
    Transport(String),

    #[error("Webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A validated PDF ready to be forwarded.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Advisory reply from the workflow. Authoritative state always comes from the
/// store; this is only logged.
#[derive(Debug, Clone, Default)]
pub struct WebhookReply {
    pub status: u16,
    /// First element of the JSON array body, when there is one.
    pub first_row: Option<Value>,
}

impl WebhookReply {
    fn from_body(status: u16, body: &str) -> Self {
        let first_row = serde_json::from_str::<Vec<Value>>(body)
            .ok()
            .and_then(|rows| rows.into_iter().next());
        Self { status, first_row }
    }

    /// Whether the reply already carries the summary script reference.
    #[must_use]
    pub fn mentions_summary(&self) -> bool {
        self.first_row
            .as_ref()
            .and_then(|row| row.get("interview_script_4"))
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Starts script generation for an episode.
#[async_trait::async_trait]
pub trait ScriptWorkflow: Send + Sync {
    async fn trigger(
        &self,
        episode_name: &str,
        pdf: &PdfUpload,
    ) -> Result<WebhookReply, WebhookError>;
}

#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    url: Option<String>,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("podcast-console/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: Some(config.url.clone()).filter(|u| !u.is_empty()),
        })
    }
}

#[async_trait::async_trait]
impl ScriptWorkflow for WebhookClient {
    async fn trigger(
        &self,
        episode_name: &str,
        pdf: &PdfUpload,
    ) -> Result<WebhookReply, WebhookError> {
        let url = self.url.as_deref().ok_or(WebhookError::NotConfigured)?;

        let file = Part::bytes(pdf.bytes.clone())
            .file_name(pdf.file_name.clone())
            .mime_str(PDF_MIME)?;
        let form = Form::new()
            .text(EPISODE_NAME_FIELD, episode_name.to_string())
            .part(PDF_FILE_FIELD, file);

        debug!(
            episode = episode_name,
            bytes = pdf.bytes.len(),
            "Posting PDF to workflow webhook"
        );

        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(WebhookError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(episode = episode_name, status = status.as_u16(), "Webhook accepted submission");
        Ok(WebhookReply::from_body(status.as_u16(), &body))
    }
}
