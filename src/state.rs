use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::info;

use crate::clients::webhook::{ScriptWorkflow, WebhookClient};
use crate::config::{Config, StoreBackend};
use crate::db::{EpisodeStore, MemoryStore, RecordChange, RestStore, change_feed};
use crate::domain::events::ConsoleEvent;
use crate::services::{Console, ConsoleSettings};

/// Build a shared HTTP client for the store.
/// Reused by every store request to keep connections pooled.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("podcast-console/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Arc<dyn EpisodeStore>,

    pub console: Arc<Console>,

    pub event_bus: broadcast::Sender<ConsoleEvent>,

    /// Present when the store has no push notifications and needs the
    /// snapshot-diff poller.
    change_feed: Option<broadcast::Sender<RecordChange>>,
}

impl SharedState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let (store, change_feed): (Arc<dyn EpisodeStore>, _) = match config.store.backend {
            StoreBackend::Rest => {
                let client = build_shared_http_client(config.store.request_timeout_seconds)?;
                let rest = RestStore::with_client(client, &config.store)?;
                let sender = rest.change_sender();
                info!(url = %config.store.url, table = %config.store.table, "Using REST store");
                (Arc::new(rest), Some(sender))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store");
                (Arc::new(MemoryStore::new()), None)
            }
        };

        let workflow: Arc<dyn ScriptWorkflow> = Arc::new(WebhookClient::new(&config.webhook)?);

        let mut shared = Self::with_components(config, store, workflow);
        shared.change_feed = change_feed;
        Ok(shared)
    }

    /// Assembles the state around an existing store and workflow.
    pub fn with_components(
        config: Config,
        store: Arc<dyn EpisodeStore>,
        workflow: Arc<dyn ScriptWorkflow>,
    ) -> Self {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));
        let console = Arc::new(Console::new(
            store.clone(),
            workflow,
            event_bus.clone(),
            ConsoleSettings::from_config(&config),
        ));

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            console,
            event_bus,
            change_feed: None,
        }
    }

    /// Starts the change-feed poller (if the store needs one) and the list
    /// sync task.
    pub async fn start_background(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(sender) = &self.change_feed {
            let every = Duration::from_millis(self.config.read().await.store.change_feed_interval_ms);
            handles.push(change_feed::spawn(self.store.clone(), sender.clone(), every));
        }

        handles.push(self.console.spawn_list_sync());
        handles
    }
}
