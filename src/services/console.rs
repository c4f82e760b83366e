//! The console container.
//!
//! Holds the one piece of shared state (which record is selected) and fans it
//! out to the record list and the submission form. Every HTTP handler and CLI
//! command goes through here.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::approval::{ApprovalDialog, ApprovalError, DialogChoice, approval_patch, check_approvable};
use super::records::{RecordListSnapshot, RecordTable, RecordsError, SelectionChange};
use super::submission::{FormState, SubmissionError, validate_submission};
use super::tracker::{self, TrackerContext, TrackerHandle};
use crate::clients::webhook::ScriptWorkflow;
use crate::config::Config;
use crate::db::{EpisodeStore, RecordChange};
use crate::domain::events::{ChangeKind, ConsoleEvent, NotificationLevel};
use crate::domain::{RecordId, ScriptStatus};
use crate::models::column::ColumnSchema;
use crate::models::episode::EpisodeRecord;

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub poll_interval: Duration,
    pub submission_timeout: Duration,
    /// Periodic full reload of the list; `None` relies on the change feed alone.
    pub auto_refresh: Option<Duration>,
    pub schema: ColumnSchema,
    pub preferred_order: Vec<String>,
}

impl ConsoleSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            submission_timeout: config.submission_timeout(),
            auto_refresh: (config.list.auto_refresh_seconds > 0)
                .then(|| Duration::from_secs(config.list.auto_refresh_seconds)),
            schema: ColumnSchema::with_overrides(&config.columns.kinds),
            preferred_order: config.columns.preferred_order.clone(),
        }
    }
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of resolving the approval dialog.
#[derive(Debug, Clone)]
pub struct ApprovalResult {
    pub form: FormState,
    pub confirmed: bool,
    /// Whether the status write reached the store. The local status flips
    /// either way.
    pub persisted: bool,
}

pub struct Console {
    store: Arc<dyn EpisodeStore>,
    workflow: Arc<dyn ScriptWorkflow>,
    events: broadcast::Sender<ConsoleEvent>,
    table: RwLock<RecordTable>,
    form: Arc<Mutex<FormState>>,
    tracker: Mutex<Option<TrackerHandle>>,
    nudge: Arc<Notify>,
    settings: ConsoleSettings,
}

impl Console {
    pub fn new(
        store: Arc<dyn EpisodeStore>,
        workflow: Arc<dyn ScriptWorkflow>,
        events: broadcast::Sender<ConsoleEvent>,
        settings: ConsoleSettings,
    ) -> Self {
        let table = RecordTable::new(settings.schema.clone(), settings.preferred_order.clone());
        Self {
            store,
            workflow,
            events,
            table: RwLock::new(table),
            form: Arc::new(Mutex::new(FormState::default())),
            tracker: Mutex::new(None),
            nudge: Arc::new(Notify::new()),
            settings,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn EpisodeStore> {
        &self.store
    }

    #[must_use]
    pub const fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    fn emit(&self, event: ConsoleEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(ConsoleEvent::notify(level, message));
    }

    // Record list

    /// Full reload. On failure the previous rows stay and the error is kept
    /// until the next successful load.
    pub async fn load_records(&self) -> Result<usize, RecordsError> {
        match self.store.select_all().await {
            Ok(rows) => {
                let count = rows.len();
                let selection = self.table.write().await.replace_rows(rows);
                debug!(count, "Record list loaded");
                if let Some(selection) = selection {
                    self.refresh_selection(selection).await;
                }
                self.emit(ConsoleEvent::ListRefreshed { count });
                self.nudge.notify_waiters();
                Ok(count)
            }
            Err(e) => {
                counter!("store_errors_total", "op" => "select_all").increment(1);
                error!(error = %e, "Failed to load records");
                self.table.write().await.set_load_error(e.to_string());
                self.emit(ConsoleEvent::ListLoadFailed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    pub async fn list(&self) -> RecordListSnapshot {
        self.table.read().await.snapshot()
    }

    pub async fn sort(&self, column: &str) -> RecordListSnapshot {
        let mut table = self.table.write().await;
        table.click_sort(column);
        table.snapshot()
    }

    pub async fn edit(&self, id: &RecordId) -> Result<EpisodeRecord, RecordsError> {
        self.table.write().await.begin_edit(id).cloned()
    }

    pub async fn cancel_edit(&self) {
        self.table.write().await.cancel_edit();
    }

    /// Pushes the whole edited row. On failure the row stays in edit mode.
    pub async fn save(&self, record: EpisodeRecord) -> Result<EpisodeRecord, RecordsError> {
        self.table.read().await.ensure_editing(&record.id)?;

        match self.store.update(&record).await {
            Ok(stored) => {
                let selection = self.table.write().await.apply_saved(stored.clone());
                if let Some(selection) = selection {
                    self.refresh_selection(selection).await;
                }
                info!(id = %stored.id, "Record saved");
                self.emit(ConsoleEvent::RecordChanged {
                    change: ChangeKind::Update,
                    id: stored.id.clone(),
                });
                self.notify(NotificationLevel::Success, "Record saved");
                Ok(stored)
            }
            Err(e) => {
                counter!("store_errors_total", "op" => "update").increment(1);
                warn!(id = %record.id, error = %e, "Failed to save record");
                self.notify(
                    NotificationLevel::Error,
                    format!("Failed to save record {}: {e}", record.id),
                );
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, id: &RecordId, confirmed: bool) -> Result<(), RecordsError> {
        if !confirmed {
            return Err(RecordsError::ConfirmationRequired(id.clone()));
        }

        if let Err(e) = self.store.delete(id).await {
            counter!("store_errors_total", "op" => "delete").increment(1);
            warn!(%id, error = %e, "Failed to delete record");
            self.notify(
                NotificationLevel::Error,
                format!("Failed to delete record {id}: {e}"),
            );
            return Err(e.into());
        }

        let selection = self.table.write().await.remove(id);
        info!(%id, "Record deleted");
        self.emit(ConsoleEvent::RecordChanged {
            change: ChangeKind::Delete,
            id: id.clone(),
        });
        if let Some(selection) = selection {
            self.refresh_selection(selection).await;
        }
        Ok(())
    }

    /// Toggles the selection and pushes the result into the form.
    pub async fn select(&self, id: &RecordId) -> Result<FormState, RecordsError> {
        let selection = self.table.write().await.toggle_select(id)?;
        Ok(self.apply_selection(selection).await)
    }

    /// Applies one change-feed event to the list (and to the form, when the
    /// selected record is affected).
    pub async fn apply_change(&self, change: &RecordChange) {
        let selection = self.table.write().await.apply_change(change);
        self.emit(ConsoleEvent::RecordChanged {
            change: change.kind,
            id: change.id.clone(),
        });
        if let Some(selection) = selection {
            self.refresh_selection(selection).await;
        }
    }

    async fn apply_selection(&self, selection: SelectionChange) -> FormState {
        self.cancel_tracker().await;

        let (links, episode_name) = match selection {
            SelectionChange::Selected {
                links,
                episode_name,
            } => (Some(links), episode_name),
            SelectionChange::Cleared => (None, None),
        };

        let mut form = self.form.lock().await;
        *form = std::mem::take(&mut *form).view_selection(links.clone(), episode_name.clone());
        let snapshot = form.clone();
        drop(form);

        self.emit(ConsoleEvent::SelectionChanged {
            links,
            episode_name,
        });
        snapshot
    }

    /// Same as [`Self::apply_selection`] for a record that stays selected, but
    /// keeps the dialog state.
    async fn refresh_selection(&self, selection: SelectionChange) {
        match selection {
            SelectionChange::Selected {
                links,
                episode_name,
            } => {
                let mut form = self.form.lock().await;
                *form = std::mem::take(&mut *form).refresh_viewed(links.clone());
                drop(form);
                self.emit(ConsoleEvent::SelectionChanged {
                    links: Some(links),
                    episode_name,
                });
            }
            SelectionChange::Cleared => {
                self.apply_selection(SelectionChange::Cleared).await;
            }
        }
    }

    // Submission form

    pub async fn form(&self) -> FormState {
        self.form.lock().await.clone()
    }

    /// Validates, moves the form to Submitted and starts the tracking task.
    pub async fn submit(
        &self,
        episode_name: &str,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<FormState, SubmissionError> {
        let (episode_name, pdf) = validate_submission(episode_name, file_name, content_type, bytes)?;

        let session_id = Uuid::new_v4();
        let mut form = self.form.lock().await;
        form.ensure_can_submit()?;
        *form = std::mem::take(&mut *form).submit(session_id, episode_name.clone(), Utc::now());
        let snapshot = form.clone();
        drop(form);

        counter!("submissions_started_total").increment(1);
        info!(
            event = "submission_started",
            episode = %episode_name,
            bytes = pdf.bytes.len(),
            "Submission started"
        );
        self.emit(ConsoleEvent::SubmissionStarted {
            episode_name: episode_name.clone(),
        });

        let handle = tracker::spawn(self.tracker_context(), session_id, episode_name, pdf);
        if let Some(previous) = self.tracker.lock().await.replace(handle) {
            previous.cancel();
        }

        Ok(snapshot)
    }

    /// Waits until the running submission (if any) resolves.
    pub async fn wait_for_submission(&self) -> FormState {
        let handle = self.tracker.lock().await.take();
        if let Some(handle) = handle {
            handle.join().await;
        }
        self.form().await
    }

    fn tracker_context(&self) -> TrackerContext {
        TrackerContext {
            store: self.store.clone(),
            workflow: self.workflow.clone(),
            form: self.form.clone(),
            events: self.events.clone(),
            nudge: self.nudge.clone(),
            poll_interval: self.settings.poll_interval,
            timeout: self.settings.submission_timeout,
        }
    }

    async fn cancel_tracker(&self) {
        let handle = self.tracker.lock().await.take();
        if let Some(handle) = handle
            && !handle.is_finished()
        {
            debug!(session = %handle.session_id(), "Superseding running submission");
            handle.cancel();
        }
    }

    // Approval

    /// Opens the confirmation dialog if the shown record may be approved.
    pub async fn request_approval(&self) -> Result<FormState, ApprovalError> {
        let mut form = self.form.lock().await;
        check_approvable(form.links.as_ref())?;
        form.dialog = ApprovalDialog::opened();
        Ok(form.clone())
    }

    /// Confirms or dismisses the open dialog. Confirming writes the approval
    /// statuses; a failed write is reported but not rolled back locally.
    pub async fn resolve_approval(&self, choice: DialogChoice) -> Result<ApprovalResult, ApprovalError> {
        let mut form = self.form.lock().await;
        let confirmed = form
            .dialog
            .resolve(choice, || true, || false)
            .ok_or(ApprovalError::NotRequested)?;

        if !confirmed {
            return Ok(ApprovalResult {
                form: form.clone(),
                confirmed: false,
                persisted: false,
            });
        }

        check_approvable(form.links.as_ref())?;
        let id = form
            .links
            .as_ref()
            .map(|links| links.id.clone())
            .ok_or(ApprovalError::NoRecord)?;
        drop(form);

        let persisted = match self.store.patch(&id, approval_patch()).await {
            Ok(()) => {
                info!(%id, "Scripts approved");
                self.notify(NotificationLevel::Success, "Scripts approved, audio generation can start");
                true
            }
            Err(e) => {
                counter!("store_errors_total", "op" => "patch").increment(1);
                warn!(%id, error = %e, "Failed to persist approval");
                self.notify(
                    NotificationLevel::Error,
                    format!("Failed to save approval for record {id}: {e}"),
                );
                false
            }
        };

        let mut form = self.form.lock().await;
        // The user may have moved on to another record during the write.
        if form.links.as_ref().is_some_and(|links| links.id == id) {
            *form = std::mem::take(&mut *form).mark_approved();
        } else {
            debug!(%id, "Form moved on before the approval write finished");
        }
        let snapshot = form.clone();
        drop(form);

        self.emit(ConsoleEvent::ApprovalChanged {
            id,
            script_status: ScriptStatus::Approved,
        });

        Ok(ApprovalResult {
            form: snapshot,
            confirmed: true,
            persisted,
        })
    }

    // Lifecycle

    /// Keeps the list in sync with the store change feed, plus an optional
    /// periodic full reload.
    pub fn spawn_list_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let console = Arc::clone(self);
        let mut changes = self.store.subscribe();
        let mut refresh = self
            .settings
            .auto_refresh
            .map(|every| tokio::time::interval_at(Instant::now() + every, every));

        tokio::spawn(async move {
            info!(
                backend = console.store.backend_name(),
                auto_refresh = refresh.is_some(),
                "List sync started"
            );

            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Ok(change) => console.apply_change(&change).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "List sync lagged behind the change feed, reloading");
                            let _ = console.load_records().await;
                        }
                        Err(RecvError::Closed) => {
                            info!("Change feed closed, list sync stopped");
                            break;
                        }
                    },
                    () = next_refresh(&mut refresh) => {
                        if let Err(e) = console.load_records().await {
                            debug!(error = %e, "Periodic list refresh failed");
                        }
                    }
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        self.cancel_tracker().await;
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
