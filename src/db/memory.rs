use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

use super::{EpisodeStore, RecordChange, StoreError};
use crate::domain::RecordId;
use crate::models::episode::EpisodeRecord;

/// In-process table with the same contract as the hosted one.
///
/// Rows created by the external workflow are simulated with [`MemoryStore::insert`].
#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<Vec<EpisodeRecord>>>,
    changes: broadcast::Sender<RecordChange>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    name_queries: Arc<AtomicUsize>,
    write_delay_ms: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<EpisodeRecord>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            rows: Arc::new(RwLock::new(rows)),
            changes,
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            name_queries: Arc::new(AtomicUsize::new(0)),
            write_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds or replaces a row the way the external workflow would, emitting the
    /// matching change event.
    pub async fn insert(&self, record: EpisodeRecord) {
        let mut rows = self.rows.write().await;
        let change = if let Some(existing) = rows.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
            RecordChange::updated(record)
        } else {
            rows.push(record.clone());
            RecordChange::inserted(record)
        };
        drop(rows);
        let _ = self.changes.send(change);
    }

    pub async fn get(&self, id: &RecordId) -> Option<EpisodeRecord> {
        self.rows.read().await.iter().find(|r| &r.id == id).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every write wait this long before touching the rows.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of select-by-name queries served so far.
    #[must_use]
    pub fn name_queries(&self) -> usize {
        self.name_queries.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("memory store reads disabled".to_string()));
        }
        Ok(())
    }

    async fn check_writes(&self) -> Result<(), StoreError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("memory store writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EpisodeStore for MemoryStore {
    async fn select_all(&self) -> Result<Vec<EpisodeRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.rows.read().await.clone())
    }

    async fn select_by_name(&self, episode_name: &str) -> Result<Vec<EpisodeRecord>, StoreError> {
        self.name_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.name_matches(episode_name))
            .cloned()
            .collect())
    }

    async fn update(&self, record: &EpisodeRecord) -> Result<EpisodeRecord, StoreError> {
        self.check_writes().await?;
        let mut rows = self.rows.write().await;
        let existing = rows
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.clone()))?;

        let mut stored = record.clone();
        stored.created_at.clone_from(&existing.created_at);
        *existing = stored.clone();
        drop(rows);

        let _ = self.changes.send(RecordChange::updated(stored.clone()));
        Ok(stored)
    }

    async fn patch(&self, id: &RecordId, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check_writes().await?;
        let mut rows = self.rows.write().await;
        let existing = rows
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut row = existing.to_row();
        row.extend(fields);
        let patched: EpisodeRecord = serde_json::from_value(Value::Object(row))?;
        *existing = patched.clone();
        drop(rows);

        let _ = self.changes.send(RecordChange::updated(patched));
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.check_writes().await?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| &r.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        drop(rows);

        let _ = self.changes.send(RecordChange::deleted(id.clone()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ChangeKind;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_update_emits_both_events() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.insert(EpisodeRecord::new("1", "Pilot")).await;
        let mut changed = EpisodeRecord::new("1", "Pilot");
        changed.interview_script_1 = Some("https://files/1".to_string());
        store.insert(changed).await;

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Insert);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn patch_only_touches_given_columns() {
        let mut record = EpisodeRecord::new("1", "Pilot");
        record.interview_script_4 = Some("https://files/4".to_string());
        let store = MemoryStore::with_rows(vec![record]);

        let mut fields = Map::new();
        fields.insert("script_status".to_string(), json!("Approved"));
        store.patch(&RecordId::new("1"), fields).await.unwrap();

        let stored = store.get(&RecordId::new("1")).await.unwrap();
        assert!(stored.script_links().is_approved());
        assert!(stored.script_links().has_summary());
    }

    #[tokio::test]
    async fn delete_of_unknown_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete(&RecordId::new("nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn failing_writes_leave_rows_untouched() {
        let store = MemoryStore::with_rows(vec![EpisodeRecord::new("1", "Pilot")]);
        store.set_fail_writes(true);

        let mut edited = EpisodeRecord::new("1", "Renamed");
        edited.excerpt = Some("x".to_string());
        assert!(store.update(&edited).await.is_err());
        assert_eq!(
            store.get(&RecordId::new("1")).await.unwrap().episode_name.as_deref(),
            Some("Pilot")
        );
    }
}
