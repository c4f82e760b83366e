//! Background task that follows one submission until it resolves.
//!
//! The task owns every signal that can move the session forward: the poll
//! interval, the store change feed, list-refresh nudges, the webhook reply,
//! the deadline and the cancel channel. Each observed record goes through
//! [`apply_record_snapshot`], so the first match wins and later ones are no-ops.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::submission::{FormState, apply_record_snapshot};
use crate::clients::webhook::{PdfUpload, ScriptWorkflow, WebhookError};
use crate::db::{EpisodeStore, RecordChange};
use crate::domain::events::{ChangeKind, ConsoleEvent, NotificationLevel, SubmissionOutcome};
use crate::models::episode::ScriptLinks;

/// Everything a tracking task needs, shared with the console.
#[derive(Clone)]
pub struct TrackerContext {
    pub store: Arc<dyn EpisodeStore>,
    pub workflow: Arc<dyn ScriptWorkflow>,
    pub form: Arc<Mutex<FormState>>,
    pub events: broadcast::Sender<ConsoleEvent>,
    pub nudge: Arc<Notify>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Dropping the handle cancels the task.
pub struct TrackerHandle {
    session_id: Uuid,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Waits for the session to resolve on its own.
    pub async fn join(self) {
        let Self { cancel, task, .. } = self;
        if let Err(e) = task.await {
            warn!("Submission tracker ended abnormally: {}", e);
        }
        drop(cancel);
    }
}

pub fn spawn(
    ctx: TrackerContext,
    session_id: Uuid,
    episode_name: String,
    pdf: PdfUpload,
) -> TrackerHandle {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let tracker = Tracker {
        ctx,
        session_id,
        episode_name,
    };
    let task = tokio::spawn(tracker.run(pdf, cancel_rx));

    TrackerHandle {
        session_id,
        cancel: Some(cancel_tx),
        task,
    }
}

struct Tracker {
    ctx: TrackerContext,
    session_id: Uuid,
    episode_name: String,
}

impl Tracker {
    async fn run(self, pdf: PdfUpload, mut cancel: oneshot::Receiver<()>) {
        let started = Instant::now();
        let deadline = started + self.ctx.timeout;
        // Subscribe before the first lookup so no insert slips between the two.
        let changes = self.ctx.store.subscribe();

        info!(
            event = "submission_tracking_started",
            episode = %self.episode_name,
            session = %self.session_id,
            "Tracking submission"
        );

        tokio::select! {
            biased;
            _ = &mut cancel => {
                debug!(episode = %self.episode_name, "Submission tracking cancelled");
            }
            () = tokio::time::sleep_until(deadline) => {
                self.apply(FormState::apply_timeout).await;
            }
            () = self.track(pdf, changes) => {}
        }

        debug!(
            event = "submission_tracking_finished",
            episode = %self.episode_name,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Submission tracker stopped"
        );
    }

    async fn track(&self, pdf: PdfUpload, mut changes: broadcast::Receiver<RecordChange>) {
        if self.check_store().await {
            return;
        }

        // Polling starts as the request goes out; the reply is only advisory.
        if self.apply(FormState::webhook_dispatched).await {
            return;
        }
        // Detached so a resolved or timed-out session does not abort the workflow call.
        let mut webhook = tokio::spawn(dispatch_webhook(
            self.ctx.workflow.clone(),
            self.episode_name.clone(),
            pdf,
        ));
        let mut webhook_pending = true;

        let every = self.ctx.poll_interval;
        let mut poll = tokio::time::interval_at(Instant::now() + every, every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut feed_open = true;

        loop {
            let finished = tokio::select! {
                joined = &mut webhook, if webhook_pending => {
                    webhook_pending = false;
                    if let Err(e) = joined {
                        warn!(episode = %self.episode_name, error = %e, "Webhook task ended abnormally");
                    }
                    // The workflow may already have written the row while we waited on it.
                    self.check_store().await
                }
                _ = poll.tick() => self.check_store().await,
                () = self.ctx.nudge.notified() => {
                    debug!(episode = %self.episode_name, "List refreshed, re-checking store");
                    self.check_store().await
                }
                change = changes.recv(), if feed_open => match change {
                    Ok(change) => self.apply_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Submission tracker lagged behind the change feed");
                        self.check_store().await
                    }
                    Err(RecvError::Closed) => {
                        feed_open = false;
                        false
                    }
                },
            };

            if finished {
                return;
            }
        }
    }

    /// Returns true once tracking should stop.
    async fn check_store(&self) -> bool {
        match self.ctx.store.select_by_name(&self.episode_name).await {
            Ok(rows) => match rows.first() {
                Some(record) => self.apply(|s| apply_record_snapshot(s, record)).await,
                None => self.apply(|s| s).await,
            },
            Err(e) => {
                counter!("store_errors_total", "op" => "select_by_name").increment(1);
                warn!(episode = %self.episode_name, error = %e, "Submission poll failed");
                self.apply(|s| s).await
            }
        }
    }

    async fn apply_change(&self, change: RecordChange) -> bool {
        match (change.kind, change.record) {
            (ChangeKind::Insert | ChangeKind::Update, Some(record))
                if record.name_matches(&self.episode_name) =>
            {
                self.apply(|s| apply_record_snapshot(s, &record)).await
            }
            _ => false,
        }
    }

    /// Runs one transition if this session still owns the form and publishes
    /// what changed. Returns true once the session is resolved or superseded.
    async fn apply(&self, transition: impl FnOnce(FormState) -> FormState) -> bool {
        let mut form = self.ctx.form.lock().await;
        if !form.owns(self.session_id) {
            return true;
        }

        let previous_progress = form.progress.clone();
        let was_resolved = form.phase.outcome().is_some();
        *form = transition(std::mem::take(&mut *form));

        if form.progress != previous_progress
            && let Some(message) = &form.progress
        {
            let _ = self.ctx.events.send(ConsoleEvent::SubmissionProgress {
                episode_name: self.episode_name.clone(),
                message: message.clone(),
            });
        }

        let outcome = form.phase.outcome();
        match outcome {
            Some(outcome) if !was_resolved => {
                let links = form.links.clone();
                drop(form);
                self.finish(outcome, links);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    fn finish(&self, outcome: SubmissionOutcome, links: Option<ScriptLinks>) {
        counter!("submissions_resolved_total", "outcome" => outcome.as_str()).increment(1);
        info!(
            event = "submission_resolved",
            episode = %self.episode_name,
            outcome = outcome.as_str(),
            "Submission resolved"
        );

        let name = &self.episode_name;
        let (level, message) = match outcome {
            SubmissionOutcome::AlreadyExisted => (
                NotificationLevel::Info,
                format!("'{name}' already exists, showing its scripts"),
            ),
            SubmissionOutcome::Completed => (
                NotificationLevel::Success,
                format!("Scripts for '{name}' are ready"),
            ),
            SubmissionOutcome::TimedOut => (
                NotificationLevel::Warning,
                format!("Script generation for '{name}' is taking longer than expected"),
            ),
        };

        let _ = self.ctx.events.send(ConsoleEvent::SubmissionResolved {
            episode_name: name.clone(),
            outcome,
            links,
        });
        let _ = self.ctx.events.send(ConsoleEvent::notify(level, message));
    }
}

async fn dispatch_webhook(workflow: Arc<dyn ScriptWorkflow>, episode_name: String, pdf: PdfUpload) {
    match workflow.trigger(&episode_name, &pdf).await {
        Ok(reply) => {
            counter!("webhook_requests_total", "outcome" => "success").increment(1);
            debug!(
                episode = %episode_name,
                status = reply.status,
                summary_in_reply = reply.mentions_summary(),
                "Workflow webhook replied"
            );
        }
        Err(WebhookError::NotConfigured) => {
            counter!("webhook_requests_total", "outcome" => "skipped").increment(1);
            info!("No webhook URL configured, waiting on the store only");
        }
        Err(e) => {
            counter!("webhook_requests_total", "outcome" => "error").increment(1);
            warn!(episode = %episode_name, error = %e, "Workflow webhook failed, polling anyway");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::episode::EpisodeRecord;
    use crate::services::submission::SubmissionPhase;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingWorkflow {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ScriptWorkflow for CountingWorkflow {
        async fn trigger(
            &self,
            _episode_name: &str,
            _pdf: &PdfUpload,
        ) -> Result<crate::clients::webhook::WebhookReply, WebhookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(WebhookError::Transport("connection refused".to_string()))
        }
    }

    fn pdf() -> PdfUpload {
        PdfUpload {
            file_name: "pilot.pdf".to_string(),
            bytes: b"%PDF-1.7".to_vec(),
        }
    }

    async fn start(
        store: &MemoryStore,
        workflow: Arc<CountingWorkflow>,
        name: &str,
    ) -> (TrackerHandle, Arc<Mutex<FormState>>) {
        let (events, _) = broadcast::channel(64);
        let session_id = Uuid::new_v4();
        let form = Arc::new(Mutex::new(FormState::default().submit(
            session_id,
            name.to_string(),
            Utc::now(),
        )));
        let ctx = TrackerContext {
            store: Arc::new(store.clone()),
            workflow,
            form: form.clone(),
            events,
            nudge: Arc::new(Notify::new()),
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        };
        (spawn(ctx, session_id, name.to_string(), pdf()), form)
    }

    #[tokio::test(start_paused = true)]
    async fn webhook_failure_still_polls_to_completion() {
        let store = MemoryStore::new();
        let workflow = Arc::new(CountingWorkflow::default());
        let (handle, form) = start(&store, workflow.clone(), "Pilot").await;

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(form.lock().await.phase, SubmissionPhase::Polling);

        let mut record = EpisodeRecord::new("1", "Pilot");
        record.interview_script_4 = Some("https://files/4".to_string());
        store.insert(record).await;

        handle.join().await;
        assert_eq!(
            form.lock().await.phase,
            SubmissionPhase::Resolved(SubmissionOutcome::Completed)
        );
        assert_eq!(workflow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_leaves_the_form_untouched() {
        let store = MemoryStore::new();
        let (handle, form) = start(&store, Arc::new(CountingWorkflow::default()), "Pilot").await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(form.lock().await.phase, SubmissionPhase::Polling);
    }
}
