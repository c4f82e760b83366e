//! Access to the external episode table.
//!
//! The console never owns the canonical copy of a record. Everything goes through
//! the [`EpisodeStore`] trait, which has a PostgREST implementation for the hosted
//! table and an in-process implementation for tests and local demos.

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::RecordId;
use crate::domain::events::ChangeKind;
use crate::models::episode::EpisodeRecord;

pub mod change_feed;
pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Errors reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {0} not found")]
    NotFound(RecordId),

    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected store payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// One row-level change from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub kind: ChangeKind,
    pub id: RecordId,
    /// New row contents; `None` for deletes.
    pub record: Option<EpisodeRecord>,
}

impl RecordChange {
    #[must_use]
    pub fn inserted(record: EpisodeRecord) -> Self {
        Self {
            kind: ChangeKind::Insert,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    #[must_use]
    pub fn updated(record: EpisodeRecord) -> Self {
        Self {
            kind: ChangeKind::Update,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    #[must_use]
    pub const fn deleted(id: RecordId) -> Self {
        Self {
            kind: ChangeKind::Delete,
            id,
            record: None,
        }
    }
}

/// Contract of the external table.
#[async_trait::async_trait]
pub trait EpisodeStore: Send + Sync {
    async fn select_all(&self) -> Result<Vec<EpisodeRecord>, StoreError>;

    /// Rows whose episode name equals `episode_name` exactly.
    async fn select_by_name(&self, episode_name: &str) -> Result<Vec<EpisodeRecord>, StoreError>;

    /// Writes every mutable column of `record` to the row with the same id and
    /// returns the stored row.
    async fn update(&self, record: &EpisodeRecord) -> Result<EpisodeRecord, StoreError>;

    /// Writes only the given columns.
    async fn patch(&self, id: &RecordId, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Row-level insert/update/delete events for the whole table.
    fn subscribe(&self) -> broadcast::Receiver<RecordChange>;

    fn backend_name(&self) -> &'static str;
}
