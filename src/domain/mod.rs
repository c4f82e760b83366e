//! Domain types for the episode production pipeline with strong typing.
//!
//! This module provides the identifier newtype and the status enumerations
//! carried by every episode record, so handlers and services never pass
//! bare strings around for ids or pipeline states.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of an episode record in the external store.
///
/// The store may hand out integer keys or UUIDs; both are carried as text so
/// the console never has to know which.
///
/// # Examples
///
/// ```rust
/// use podcast_console::domain::RecordId;
///
/// let id = RecordId::new("42");
/// assert_eq!(id.as_str(), "42");
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Self::from(id),
            RawId::Text(id) => Self(id),
        })
    }
}

/// Review state of the generated scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScriptStatus {
    #[default]
    Pending,
    Approved,
}

impl ScriptStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a downstream job (text files, podcast audio).
///
/// A missing value on the record means the job has not started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Visual treatment of the status badge.
    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge {
                label: "Pending",
                tone: BadgeTone::Neutral,
            },
            Self::Processing => StatusBadge {
                label: "Processing",
                tone: BadgeTone::Info,
            },
            Self::Completed => StatusBadge {
                label: "Completed",
                tone: BadgeTone::Success,
            },
            Self::Failed => StatusBadge {
                label: "Failed",
                tone: BadgeTone::Danger,
            },
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown processing status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Neutral,
    Info,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

/// Renders an optional status; absence renders nothing.
#[must_use]
pub fn status_badge(status: Option<ProcessingStatus>) -> Option<StatusBadge> {
    status.map(|s| s.badge())
}

/// Sort direction of the record table. `None` keeps the store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortDirection {
    /// Next direction when the same column header is clicked again.
    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            Self::None => Self::Ascending,
            Self::Ascending => Self::Descending,
            Self::Descending => Self::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_accepts_numbers_and_strings() {
        let from_int: RecordId = serde_json::from_str("17").unwrap();
        let from_text: RecordId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(from_int, from_text);
        assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"17\"");
    }

    #[test]
    fn sort_direction_cycles_back_to_none() {
        let dir = SortDirection::None.cycle().cycle().cycle();
        assert_eq!(dir, SortDirection::None);
        assert_eq!(SortDirection::None.cycle(), SortDirection::Ascending);
    }

    #[test]
    fn badges_have_distinct_tones() {
        let tones: Vec<_> = [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ]
        .iter()
        .map(|s| s.badge().tone)
        .collect();

        for (i, a) in tones.iter().enumerate() {
            for b in &tones[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(status_badge(None).is_none());
    }

    #[test]
    fn processing_status_parses_case_insensitively() {
        assert_eq!(
            "completed".parse::<ProcessingStatus>(),
            Ok(ProcessingStatus::Completed)
        );
        assert!("done".parse::<ProcessingStatus>().is_err());
    }
}
