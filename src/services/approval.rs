//! Approval gating and the confirmation dialog.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{ProcessingStatus, ScriptStatus};
use crate::models::episode::ScriptLinks;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("No episode is loaded in the form")]
    NoRecord,

    #[error("Scripts are already approved")]
    AlreadyApproved,

    #[error("No scripts have been generated yet")]
    NoScripts,

    #[error("The summary script is not ready yet")]
    SummaryMissing,

    #[error("No approval is awaiting confirmation")]
    NotRequested,
}

/// Approval is offered only for unapproved records with at least one script and
/// the summary script present.
pub fn check_approvable(links: Option<&ScriptLinks>) -> Result<(), ApprovalError> {
    let links = links.ok_or(ApprovalError::NoRecord)?;
    if links.is_approved() {
        return Err(ApprovalError::AlreadyApproved);
    }
    if !links.has_any_script() {
        return Err(ApprovalError::NoScripts);
    }
    if !links.has_summary() {
        return Err(ApprovalError::SummaryMissing);
    }
    Ok(())
}

#[must_use]
pub fn can_approve(links: Option<&ScriptLinks>) -> bool {
    check_approvable(links).is_ok()
}

/// Columns written when scripts are approved.
#[must_use]
pub fn approval_patch() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "script_status".to_string(),
        Value::from(ScriptStatus::Approved.as_str()),
    );
    fields.insert(
        "text_files_status".to_string(),
        Value::from(ProcessingStatus::Pending.as_str()),
    );
    fields.insert(
        "podcast_status".to_string(),
        Value::from(ProcessingStatus::Pending.as_str()),
    );
    fields
}

#[must_use]
pub fn approve_locally(mut links: ScriptLinks) -> ScriptLinks {
    links.script_status = Some(ScriptStatus::Approved);
    links.text_files_status = Some(ProcessingStatus::Pending);
    links.podcast_status = Some(ProcessingStatus::Pending);
    links
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Confirm,
    Cancel,
}

/// Confirmation modal. Holds only the open flag; what confirming or cancelling
/// does is supplied by the caller at resolution time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApprovalDialog {
    pub open: bool,
}

impl ApprovalDialog {
    #[must_use]
    pub const fn opened() -> Self {
        Self { open: true }
    }

    /// Runs exactly one callback and closes. A closed dialog runs nothing.
    pub fn resolve<R>(
        &mut self,
        choice: DialogChoice,
        on_confirm: impl FnOnce() -> R,
        on_cancel: impl FnOnce() -> R,
    ) -> Option<R> {
        if !self.open {
            return None;
        }
        self.open = false;
        Some(match choice {
            DialogChoice::Confirm => on_confirm(),
            DialogChoice::Cancel => on_cancel(),
        })
    }
}
