//! Change feed for stores without push notifications.
//!
//! The poller re-reads the whole table on an interval and publishes the
//! difference against the previous snapshot as insert/update/delete events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EpisodeStore, RecordChange};
use crate::domain::RecordId;
use crate::models::episode::EpisodeRecord;

pub type Snapshot = HashMap<RecordId, EpisodeRecord>;

/// Differences between two snapshots, inserts and updates in `next` order,
/// then deletes.
#[must_use]
pub fn diff_snapshots(previous: &Snapshot, next: &[EpisodeRecord]) -> Vec<RecordChange> {
    let mut changes = Vec::new();

    for record in next {
        match previous.get(&record.id) {
            None => changes.push(RecordChange::inserted(record.clone())),
            Some(old) if old != record => changes.push(RecordChange::updated(record.clone())),
            Some(_) => {}
        }
    }

    let mut removed: Vec<&RecordId> = previous
        .keys()
        .filter(|id| !next.iter().any(|r| &r.id == *id))
        .collect();
    removed.sort();
    changes.extend(removed.into_iter().cloned().map(RecordChange::deleted));

    changes
}

fn to_snapshot(rows: Vec<EpisodeRecord>) -> Snapshot {
    rows.into_iter().map(|r| (r.id.clone(), r)).collect()
}

/// Spawns the poller. The first successful read only seeds the snapshot.
pub fn spawn(
    store: Arc<dyn EpisodeStore>,
    sink: broadcast::Sender<RecordChange>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut snapshot: Option<Snapshot> = None;

        info!(interval_ms = every.as_millis(), "Change feed poller started");

        loop {
            interval.tick().await;

            let rows = match store.select_all().await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Change feed poll failed: {}", e);
                    continue;
                }
            };

            if let Some(previous) = &snapshot {
                let changes = diff_snapshots(previous, &rows);
                if !changes.is_empty() {
                    debug!(count = changes.len(), "Change feed detected changes");
                }
                for change in changes {
                    // No receivers is fine; the next subscriber starts from the
                    // current snapshot anyway.
                    let _ = sink.send(change);
                }
            }

            snapshot = Some(to_snapshot(rows));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::domain::events::ChangeKind;

    fn record(id: &str, name: &str) -> EpisodeRecord {
        EpisodeRecord::new(id, name)
    }

    #[test]
    fn diff_reports_inserts_updates_and_deletes() {
        let previous = to_snapshot(vec![record("1", "Pilot"), record("2", "Second")]);

        let mut changed = record("1", "Pilot");
        changed.interview_script_1 = Some("https://files/1".to_string());
        let next = vec![changed, record("3", "Third")];

        let changes = diff_snapshots(&previous, &next);
        let kinds: Vec<_> = changes.iter().map(|c| (c.kind, c.id.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Update, "1"),
                (ChangeKind::Insert, "3"),
                (ChangeKind::Delete, "2"),
            ]
        );
    }

    #[test]
    fn identical_snapshots_produce_nothing() {
        let rows = vec![record("1", "Pilot")];
        assert!(diff_snapshots(&to_snapshot(rows.clone()), &rows).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_publishes_rows_added_after_the_seed() {
        let store = MemoryStore::with_rows(vec![record("1", "Pilot")]);
        let (sink, mut rx) = broadcast::channel(16);
        let handle = spawn(Arc::new(store.clone()), sink, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        store.insert(record("2", "Second")).await;

        let change = rx.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.id.as_str(), "2");
        handle.abort();
    }
}
