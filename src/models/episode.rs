use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{ProcessingStatus, RecordId, ScriptStatus};

/// One row of the external production-tracking table.
///
/// Serializes only the columns the row actually carries: those it was read
/// with (nulls included) plus any known column set since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(remote = "Self")]
pub struct EpisodeRecord {
    pub id: RecordId,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub episode_name: Option<String>,

    #[serde(default)]
    pub source_pdf: Option<String>,

    #[serde(default)]
    pub interview_script_1: Option<String>,
    #[serde(default)]
    pub interview_script_2: Option<String>,
    #[serde(default)]
    pub interview_script_3: Option<String>,
    /// The "Summary" script; its presence marks generation as complete.
    #[serde(default)]
    pub interview_script_4: Option<String>,
    #[serde(default)]
    pub full_script: Option<String>,
    #[serde(default)]
    pub interview_file: Option<String>,

    #[serde(default)]
    pub episode_title: Option<String>,
    #[serde(default)]
    pub alt_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub intro_transcript: Option<String>,
    #[serde(default)]
    pub social_post: Option<String>,
    #[serde(default)]
    pub show_notes: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,

    #[serde(default)]
    pub intro_audio: Option<String>,
    #[serde(default)]
    pub master_audio: Option<String>,
    #[serde(default)]
    pub cover_art: Option<String>,

    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub unix_timestamp: Option<i64>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,

    #[serde(default, deserialize_with = "lenient_script_status")]
    pub script_status: Option<ScriptStatus>,
    #[serde(default, deserialize_with = "lenient_processing_status")]
    pub text_files_status: Option<ProcessingStatus>,
    #[serde(default, deserialize_with = "lenient_processing_status")]
    pub podcast_status: Option<ProcessingStatus>,

    /// Columns the console does not know about yet.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,

    #[serde(skip)]
    present: BTreeSet<String>,
}

impl Serialize for EpisodeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_row().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EpisodeRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let row = Map::<String, Value>::deserialize(deserializer)?;
        let present = row.keys().cloned().collect();
        let mut record = Self::deserialize(Value::Object(row)).map_err(D::Error::custom)?;
        record.present = present;
        Ok(record)
    }
}

impl EpisodeRecord {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, episode_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            episode_name: Some(episode_name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name_matches(&self, episode_name: &str) -> bool {
        self.episode_name.as_deref() == Some(episode_name)
    }

    #[must_use]
    pub fn script_links(&self) -> ScriptLinks {
        ScriptLinks {
            id: self.id.clone(),
            episode_name: self.episode_name.clone(),
            scripts: [
                self.interview_script_1.clone(),
                self.interview_script_2.clone(),
                self.interview_script_3.clone(),
                self.interview_script_4.clone(),
            ],
            full_script: self.full_script.clone(),
            interview_file: self.interview_file.clone(),
            script_status: self.script_status,
            text_files_status: self.text_files_status,
            podcast_status: self.podcast_status,
        }
    }

    /// The row as a flat JSON object. Known columns the row never carried and
    /// that are still unset are left out.
    #[must_use]
    pub fn to_row(&self) -> Map<String, Value> {
        let Ok(Value::Object(mut row)) = Self::serialize(self, serde_json::value::Serializer)
        else {
            return Map::new();
        };
        row.retain(|column, value| {
            !value.is_null()
                || column == "id"
                || self.present.contains(column)
                || self.extra.contains_key(column)
        });
        row
    }

    /// Body for an id-keyed update: the carried columns minus the immutable ones.
    #[must_use]
    pub fn update_body(&self) -> Map<String, Value> {
        let mut row = self.to_row();
        row.remove("id");
        row.remove("created_at");
        row
    }
}

/// The script-related subset of a record shown by the submission form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScriptLinks {
    pub id: RecordId,
    pub episode_name: Option<String>,
    pub scripts: [Option<String>; 4],
    pub full_script: Option<String>,
    pub interview_file: Option<String>,
    pub script_status: Option<ScriptStatus>,
    pub text_files_status: Option<ProcessingStatus>,
    pub podcast_status: Option<ProcessingStatus>,
}

impl ScriptLinks {
    /// Number of interview scripts that have a non-empty reference.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.scripts.iter().filter(|s| is_present(s.as_deref())).count()
    }

    #[must_use]
    pub fn has_any_script(&self) -> bool {
        self.ready_count() > 0
    }

    #[must_use]
    pub fn has_summary(&self) -> bool {
        is_present(self.scripts[3].as_deref())
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.script_status == Some(ScriptStatus::Approved)
    }

    /// Labels and references for the checklist, in display order.
    #[must_use]
    pub fn checklist(&self) -> Vec<ChecklistItem> {
        const LABELS: [&str; 4] = ["Interview 1", "Interview 2", "Interview 3", "Summary"];

        let mut items: Vec<ChecklistItem> = LABELS
            .iter()
            .zip(&self.scripts)
            .map(|(label, link)| ChecklistItem::new(label, link.as_deref()))
            .collect();
        items.push(ChecklistItem::new(
            "Full script",
            self.full_script.as_deref(),
        ));
        items.push(ChecklistItem::new(
            "Interview file",
            self.interview_file.as_deref(),
        ));
        items
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub label: String,
    pub link: Option<String>,
    pub ready: bool,
}

impl ChecklistItem {
    fn new(label: &str, link: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            link: link.filter(|l| is_present(Some(l))).map(str::to_string),
            ready: is_present(link),
        }
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn lenient_script_status<'de, D>(deserializer: D) -> Result<Option<ScriptStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "approved" => Some(ScriptStatus::Approved),
        "pending" => Some(ScriptStatus::Pending),
        _ => None,
    }))
}

fn lenient_processing_status<'de, D>(
    deserializer: D,
) -> Result<Option<ProcessingStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_store_row_with_unknown_columns() {
        let row = json!({
            "id": 7,
            "created_at": "2024-05-01T10:00:00+00:00",
            "episode_name": "Pilot",
            "interview_script_1": "https://files/1.docx",
            "interview_script_4": null,
            "script_status": "Pending",
            "podcast_status": "Processing",
            "guest_handle": "@someone"
        });

        let record: EpisodeRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.id.as_str(), "7");
        assert_eq!(record.script_status, Some(ScriptStatus::Pending));
        assert_eq!(record.podcast_status, Some(ProcessingStatus::Processing));
        assert_eq!(record.extra.get("guest_handle"), Some(&json!("@someone")));
    }

    #[test]
    fn unknown_status_text_reads_as_absent() {
        let record: EpisodeRecord =
            serde_json::from_value(json!({"id": "a", "text_files_status": "queued"})).unwrap();
        assert_eq!(record.text_files_status, None);
    }

    #[test]
    fn summary_presence_ignores_blank_strings() {
        let mut record = EpisodeRecord::new("1", "Pilot");
        record.interview_script_4 = Some("   ".to_string());
        assert!(!record.script_links().has_summary());

        record.interview_script_4 = Some("https://files/4.docx".to_string());
        let links = record.script_links();
        assert!(links.has_summary());
        assert_eq!(links.ready_count(), 1);
    }

    #[test]
    fn update_body_drops_immutable_columns() {
        let mut record = EpisodeRecord::new("1", "Pilot");
        record.created_at = Some("2024-01-01".to_string());
        let body = record.update_body();
        assert!(!body.contains_key("id"));
        assert!(!body.contains_key("created_at"));
        assert_eq!(body.get("episode_name"), Some(&json!("Pilot")));
    }

    #[test]
    fn row_keeps_only_the_columns_it_was_read_with() {
        let record: EpisodeRecord =
            serde_json::from_value(json!({"id": 1, "episode_name": "Pilot", "guest": null}))
                .unwrap();

        let row = record.to_row();
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["episode_name", "guest", "id"]);

        let body = record.update_body();
        assert_eq!(body.len(), 2);
        assert_eq!(body.get("episode_name"), Some(&json!("Pilot")));
        assert!(!body.contains_key("interview_script_4"));
    }

    #[test]
    fn explicit_null_columns_survive_a_round_trip() {
        let mut record: EpisodeRecord =
            serde_json::from_value(json!({"id": 2, "interview_script_4": null})).unwrap();
        record.script_status = Some(ScriptStatus::Approved);

        let row = serde_json::to_value(&record).unwrap();
        assert_eq!(row["interview_script_4"], Value::Null);
        assert_eq!(row["script_status"], json!("Approved"));
        assert!(row.get("podcast_status").is_none());
    }

    #[test]
    fn checklist_lists_scripts_then_full_script_and_file() {
        let mut record = EpisodeRecord::new("1", "Pilot");
        record.full_script = Some("https://files/full.docx".to_string());
        let items = record.script_links().checklist();
        assert_eq!(items.len(), 6);
        assert_eq!(items[3].label, "Summary");
        assert!(!items[3].ready);
        assert!(items[4].ready);
    }
}
