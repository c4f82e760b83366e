//! Submission form state machine: Idle → Submitted → Polling → Resolved.
//!
//! Every transition is a pure function from the current [`FormState`] to the
//! next one. The tracking task in [`super::tracker`] only decides *when* to call
//! them; whichever signal arrives first resolves the session and every later
//! call is a no-op because the phase no longer matches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::approval::ApprovalDialog;
use crate::clients::webhook::PdfUpload;
use crate::constants::limits::{MAX_EPISODE_NAME_LEN, MAX_UPLOAD_BYTES};
use crate::constants::webhook::PDF_MIME;
use crate::domain::events::SubmissionOutcome;
use crate::models::episode::{EpisodeRecord, ScriptLinks};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Episode name is required")]
    EmptyName,

    #[error("Episode name must be at most {MAX_EPISODE_NAME_LEN} characters")]
    NameTooLong,

    #[error("A PDF file is required")]
    MissingFile,

    #[error("The uploaded file is empty")]
    EmptyFile,

    #[error("The uploaded file exceeds the size limit")]
    FileTooLarge,

    #[error("Only PDF files are accepted (got {0})")]
    NotPdf(String),

    #[error("The form is showing a selected record; deselect it to submit")]
    ReadOnly,

    #[error("A submission for '{0}' is still in progress")]
    InProgress(String),
}

impl SubmissionError {
    /// Form field the message belongs to, `None` for form-level errors.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        use crate::constants::webhook::{EPISODE_NAME_FIELD, PDF_FILE_FIELD};

        match self {
            Self::EmptyName | Self::NameTooLong => Some(EPISODE_NAME_FIELD),
            Self::MissingFile | Self::EmptyFile | Self::FileTooLarge | Self::NotPdf(_) => {
                Some(PDF_FILE_FIELD)
            }
            Self::ReadOnly | Self::InProgress(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitted,
    Polling,
    Resolved(SubmissionOutcome),
}

impl SubmissionPhase {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Polling)
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<SubmissionOutcome> {
        match self {
            Self::Resolved(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

/// Transient bookkeeping for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSession {
    pub id: Uuid,
    pub episode_name: String,
    pub submitted_at: DateTime<Utc>,
    pub record_found: bool,
    pub links: Option<ScriptLinks>,
    pub clear_file_on_resolve: bool,
}

impl SubmissionSession {
    fn new(id: Uuid, episode_name: String, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            episode_name,
            submitted_at,
            record_found: false,
            links: None,
            clear_file_on_resolve: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub phase: SubmissionPhase,
    pub session: Option<SubmissionSession>,
    /// Links currently rendered, either from the session or the selected record.
    pub links: Option<ScriptLinks>,
    /// Episode name of the selected record while in read-only viewing mode.
    pub viewing: Option<String>,
    pub progress: Option<String>,
    pub file_attached: bool,
    pub dialog: ApprovalDialog,
}

impl FormState {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    #[must_use]
    pub const fn is_viewing(&self) -> bool {
        self.viewing.is_some()
    }

    #[must_use]
    pub const fn inputs_enabled(&self) -> bool {
        !self.is_viewing() && !self.is_active()
    }

    /// Whether `session_id` still owns this form.
    #[must_use]
    pub fn owns(&self, session_id: Uuid) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    #[must_use]
    pub fn episode_name(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|s| s.episode_name.as_str())
            .or(self.viewing.as_deref())
    }

    pub fn ensure_can_submit(&self) -> Result<(), SubmissionError> {
        if self.is_viewing() {
            return Err(SubmissionError::ReadOnly);
        }
        if self.is_active() {
            let name = self.episode_name().unwrap_or_default().to_string();
            return Err(SubmissionError::InProgress(name));
        }
        Ok(())
    }

    /// Idle/Resolved → Submitted with a fresh session.
    #[must_use]
    pub fn submit(self, session_id: Uuid, episode_name: String, now: DateTime<Utc>) -> Self {
        Self {
            phase: SubmissionPhase::Submitted,
            session: Some(SubmissionSession::new(session_id, episode_name, now)),
            links: None,
            viewing: None,
            progress: Some("Checking for an existing episode".to_string()),
            file_attached: true,
            dialog: ApprovalDialog::default(),
        }
    }

    /// Submitted → Polling as soon as the webhook request is sent. Its outcome
    /// never changes the phase.
    #[must_use]
    pub fn webhook_dispatched(mut self) -> Self {
        if self.phase == SubmissionPhase::Submitted {
            self.phase = SubmissionPhase::Polling;
            self.progress = Some(progress_message(self.links.as_ref()));
        }
        self
    }

    /// Active → Resolved(TimedOut). Links keep their last known values.
    #[must_use]
    pub fn apply_timeout(self) -> Self {
        if self.is_active() {
            self.resolve(SubmissionOutcome::TimedOut)
        } else {
            self
        }
    }

    /// Selecting a record supersedes any session and shows its links read-only;
    /// clearing the selection resets the form.
    #[must_use]
    pub fn view_selection(self, links: Option<ScriptLinks>, episode_name: Option<String>) -> Self {
        match links {
            Some(links) => Self {
                phase: SubmissionPhase::Idle,
                session: None,
                viewing: Some(episode_name.unwrap_or_default()),
                links: Some(links),
                progress: None,
                file_attached: false,
                dialog: ApprovalDialog::default(),
            },
            None => Self::default(),
        }
    }

    /// Refreshes the rendered links of the record being viewed.
    #[must_use]
    pub fn refresh_viewed(mut self, links: ScriptLinks) -> Self {
        if self.is_viewing() {
            self.links = Some(links);
        }
        self
    }

    /// Local status flip after an approval, regardless of whether the write
    /// went through.
    #[must_use]
    pub fn mark_approved(mut self) -> Self {
        if let Some(links) = self.links.take() {
            self.links = Some(super::approval::approve_locally(links));
        }
        if let Some(session) = self.session.as_mut()
            && let Some(links) = session.links.take()
        {
            session.links = Some(super::approval::approve_locally(links));
        }
        self
    }

    fn resolve(mut self, outcome: SubmissionOutcome) -> Self {
        self.phase = SubmissionPhase::Resolved(outcome);
        self.progress = None;
        if self.session.as_ref().is_none_or(|s| s.clear_file_on_resolve) {
            self.file_attached = false;
        }
        self
    }
}

/// Feeds one observed record into the state machine.
///
/// - Submitted + match: the record existed before the webhook; resolve at once.
/// - Polling + match with the summary script: resolve as completed.
/// - Polling + match without it: update links and the progress message.
/// - Anything else (idle, resolved, other names): unchanged.
#[must_use]
pub fn apply_record_snapshot(state: FormState, record: &EpisodeRecord) -> FormState {
    let matches = state
        .session
        .as_ref()
        .is_some_and(|s| record.name_matches(&s.episode_name));
    if !matches {
        return state;
    }

    let mut state = state;
    let links = record.script_links();

    match state.phase {
        SubmissionPhase::Submitted => {
            state.observe(links);
            state.resolve(SubmissionOutcome::AlreadyExisted)
        }
        SubmissionPhase::Polling => {
            let complete = links.has_summary();
            state.progress = Some(progress_message(Some(&links)));
            state.observe(links);
            if complete {
                state.resolve(SubmissionOutcome::Completed)
            } else {
                state
            }
        }
        SubmissionPhase::Idle | SubmissionPhase::Resolved(_) => state,
    }
}

impl FormState {
    fn observe(&mut self, links: ScriptLinks) {
        if let Some(session) = self.session.as_mut() {
            session.record_found = true;
            session.links = Some(links.clone());
        }
        self.links = Some(links);
    }
}

/// Human readable progress line for a polling session.
#[must_use]
pub fn progress_message(links: Option<&ScriptLinks>) -> String {
    match links {
        None => "Waiting for the workflow to create the episode record".to_string(),
        Some(links) => format!(
            "Generating scripts: {} of 4 ready",
            links.ready_count()
        ),
    }
}

/// Checks a name and an uploaded file before anything touches the network.
///
/// The content type comes from the upload when given, otherwise from the file
/// extension.
pub fn validate_submission(
    episode_name: &str,
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<(String, PdfUpload), SubmissionError> {
    let name = episode_name.trim();
    if name.is_empty() {
        return Err(SubmissionError::EmptyName);
    }
    if name.chars().count() > MAX_EPISODE_NAME_LEN {
        return Err(SubmissionError::NameTooLong);
    }

    let file_name = file_name
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or(SubmissionError::MissingFile)?;
    if bytes.is_empty() {
        return Err(SubmissionError::EmptyFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(SubmissionError::FileTooLarge);
    }

    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
    if mime != PDF_MIME {
        return Err(SubmissionError::NotPdf(mime));
    }

    Ok((
        name.to_string(),
        PdfUpload {
            file_name: file_name.to_string(),
            bytes,
        },
    ))
}
