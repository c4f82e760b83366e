use reqwest::{Client, RequestBuilder, Response, header};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

use super::{EpisodeStore, RecordChange, StoreError};
use crate::config::StoreConfig;
use crate::domain::RecordId;
use crate::models::episode::EpisodeRecord;

/// PostgREST client for the hosted episode table.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    table_url: Url,
    api_key: Option<String>,
    changes: broadcast::Sender<RecordChange>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("podcast-console/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Self::with_client(client, config)
    }

    /// Builds the store on top of a shared HTTP client.
    pub fn with_client(client: Client, config: &StoreConfig) -> Result<Self, StoreError> {
        let base = config.url.trim_end_matches('/');
        let table_url = Url::parse(&format!("{base}/rest/v1/{}", config.table))
            .map_err(|e| StoreError::Transport(format!("Invalid store URL '{base}': {e}")))?;

        let (changes, _) = broadcast::channel(256);

        Ok(Self {
            client,
            table_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            changes,
        })
    }

    /// Sender used by the change feed poller.
    #[must_use]
    pub fn change_sender(&self) -> broadcast::Sender<RecordChange> {
        self.changes.clone()
    }

    fn url_with(&self, filters: &[(&str, String)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for (column, filter) in filters {
                query.append_pair(column, filter);
            }
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header(header::AUTHORIZATION, format!("Bearer {key}")),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch(&self, url: Url) -> Result<Vec<EpisodeRecord>, StoreError> {
        debug!(url = %url, "Store select");
        let response = self.send(self.client.get(url)).await?;
        let rows = response.json::<Vec<EpisodeRecord>>().await?;
        Ok(rows)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait::async_trait]
impl EpisodeStore for RestStore {
    async fn select_all(&self) -> Result<Vec<EpisodeRecord>, StoreError> {
        self.fetch(self.url_with(&[])).await
    }

    async fn select_by_name(&self, episode_name: &str) -> Result<Vec<EpisodeRecord>, StoreError> {
        self.fetch(self.url_with(&[("episode_name", eq(episode_name))]))
            .await
    }

    async fn update(&self, record: &EpisodeRecord) -> Result<EpisodeRecord, StoreError> {
        let url = self.url_with(&[("id", eq(record.id.as_str()))]);
        debug!(id = %record.id, "Store update");

        let response = self
            .send(
                self.client
                    .patch(url)
                    .header("Prefer", "return=representation")
                    .json(&record.update_body()),
            )
            .await?;

        response
            .json::<Vec<EpisodeRecord>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(record.id.clone()))
    }

    async fn patch(&self, id: &RecordId, fields: Map<String, Value>) -> Result<(), StoreError> {
        let url = self.url_with(&[("id", eq(id.as_str()))]);
        debug!(id = %id, columns = fields.len(), "Store patch");

        self.send(
            self.client
                .patch(url)
                .header("Prefer", "return=minimal")
                .json(&fields),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let url = self.url_with(&[("id", eq(id.as_str()))]);
        debug!(id = %id, "Store delete");

        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}
