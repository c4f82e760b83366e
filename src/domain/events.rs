//! Domain events for the console.
//!
//! These events replace ad hoc window-level notifications: every producer sends
//! a typed [`ConsoleEvent`] on the broadcast bus and every consumer (SSE clients,
//! the CLI, the submission tracker) matches on it.

use serde::Serialize;

use super::{RecordId, ScriptStatus};
use crate::models::episode::ScriptLinks;

/// Kind of row-level change reported by the store change feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// How a submission session reached its terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// A record with the same name existed before the webhook was called.
    AlreadyExisted,
    /// The summary script showed up on the matching record.
    Completed,
    /// The ceiling elapsed before the summary script appeared.
    TimedOut,
}

impl SubmissionOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyExisted => "already_existed",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Events sent to connected clients via SSE (Server-Sent Events).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ConsoleEvent {
    ListRefreshed {
        count: usize,
    },
    ListLoadFailed {
        message: String,
    },
    RecordChanged {
        change: ChangeKind,
        id: RecordId,
    },

    SelectionChanged {
        links: Option<ScriptLinks>,
        episode_name: Option<String>,
    },

    SubmissionStarted {
        episode_name: String,
    },
    SubmissionProgress {
        episode_name: String,
        message: String,
    },
    SubmissionResolved {
        episode_name: String,
        outcome: SubmissionOutcome,
        links: Option<ScriptLinks>,
    },

    ApprovalChanged {
        id: RecordId,
        script_status: ScriptStatus,
    },

    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl ConsoleEvent {
    pub fn notify(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self::Notification {
            level,
            message: message.into(),
        }
    }

    /// Selection-cleared event: links null and no episode name.
    #[must_use]
    pub const fn selection_cleared() -> Self {
        Self::SelectionChanged {
            links: None,
            episode_name: None,
        }
    }
}
