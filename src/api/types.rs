use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{RecordId, ScriptStatus, SortDirection, StatusBadge, status_badge};
use crate::models::episode::{ChecklistItem, EpisodeRecord, ScriptLinks};
use crate::services::approval::can_approve;
use crate::services::{ApprovalResult, FormState, RecordListSnapshot, SubmissionPhase};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Form field an error refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            field: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SortDto {
    pub column: Option<String>,
    pub direction: SortDirection,
}

#[derive(Debug, Serialize)]
pub struct RecordListDto {
    pub columns: Vec<String>,
    /// Rows in display order, every observed column included.
    pub rows: Vec<Map<String, Value>>,
    pub sort: SortDto,
    pub editing: Option<EpisodeRecord>,
    pub selected: Option<RecordId>,
    pub error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl From<RecordListSnapshot> for RecordListDto {
    fn from(snapshot: RecordListSnapshot) -> Self {
        Self {
            columns: snapshot.columns,
            rows: snapshot.rows.iter().map(EpisodeRecord::to_row).collect(),
            sort: SortDto {
                column: snapshot.sort.column,
                direction: snapshot.sort.direction,
            },
            editing: snapshot.editing,
            selected: snapshot.selected,
            error: snapshot.last_error,
            loaded_at: snapshot.loaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormDto {
    pub phase: SubmissionPhase,
    pub episode_name: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub record_found: bool,
    /// Showing a selected record read-only.
    pub viewing: bool,
    pub inputs_enabled: bool,
    pub file_attached: bool,
    pub progress: Option<String>,
    pub links: Option<ScriptLinks>,
    pub checklist: Vec<ChecklistItem>,
    pub script_status: Option<ScriptStatus>,
    pub text_files_badge: Option<StatusBadge>,
    pub podcast_badge: Option<StatusBadge>,
    pub can_approve: bool,
    pub dialog_open: bool,
}

impl From<&FormState> for FormDto {
    fn from(form: &FormState) -> Self {
        let links = form.links.as_ref();
        let session = form.session.as_ref();

        Self {
            phase: form.phase,
            episode_name: form.episode_name().map(str::to_string),
            submitted_at: session.map(|s| s.submitted_at),
            record_found: session.is_some_and(|s| s.record_found),
            viewing: form.is_viewing(),
            inputs_enabled: form.inputs_enabled(),
            file_attached: form.file_attached,
            progress: form.progress.clone(),
            links: form.links.clone(),
            checklist: links.map(ScriptLinks::checklist).unwrap_or_default(),
            script_status: links.and_then(|l| l.script_status),
            text_files_badge: status_badge(links.and_then(|l| l.text_files_status)),
            podcast_badge: status_badge(links.and_then(|l| l.podcast_status)),
            can_approve: can_approve(links),
            dialog_open: form.dialog.open,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApprovalDto {
    pub confirmed: bool,
    pub persisted: bool,
    pub form: FormDto,
}

impl From<&ApprovalResult> for ApprovalDto {
    fn from(result: &ApprovalResult) -> Self {
        Self {
            confirmed: result.confirmed,
            persisted: result.persisted,
            form: FormDto::from(&result.form),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub store_backend: String,
    pub records_loaded: usize,
    pub list_error: Option<String>,
    pub webhook_configured: bool,
    pub submission_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub column: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}
