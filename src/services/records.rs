//! Record list state: fetch-ordered rows, column layout, sorting, the single-row
//! edit buffer and the current selection.
//!
//! Everything here is synchronous; the [`Console`](super::console::Console)
//! performs the store round-trips and feeds the results in.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::db::{RecordChange, StoreError};
use crate::domain::events::ChangeKind;
use crate::domain::{RecordId, SortDirection};
use crate::models::column::{ColumnKind, ColumnSchema, SortKey};
use crate::models::episode::{EpisodeRecord, ScriptLinks};

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("Record {0} not found")]
    NotFound(RecordId),

    #[error("Record {0} is not being edited")]
    NotEditing(RecordId),

    #[error("Deleting record {0} requires confirmation")]
    ConfirmationRequired(RecordId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the container has to push to the form after a selection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Selected {
        links: ScriptLinks,
        episode_name: Option<String>,
    },
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    /// Same column cycles None → Ascending → Descending → None; a different
    /// column starts at Ascending.
    pub fn click(&mut self, column: &str) {
        if self.column.as_deref() == Some(column) {
            self.direction = self.direction.cycle();
        } else {
            self.column = Some(column.to_string());
            self.direction = SortDirection::Ascending;
        }
    }
}

/// Read-only copy of the list handed to views.
#[derive(Debug, Clone)]
pub struct RecordListSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<EpisodeRecord>,
    pub sort: SortState,
    pub editing: Option<EpisodeRecord>,
    pub selected: Option<RecordId>,
    pub last_error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub struct RecordTable {
    rows: Vec<EpisodeRecord>,
    columns: Vec<String>,
    sort: SortState,
    editing: Option<EpisodeRecord>,
    selected: Option<RecordId>,
    last_error: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
    schema: ColumnSchema,
    preferred: Vec<String>,
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new(ColumnSchema::default(), Vec::new())
    }
}

impl RecordTable {
    /// `preferred` empty means the built-in preferred order.
    #[must_use]
    pub fn new(schema: ColumnSchema, preferred: Vec<String>) -> Self {
        let preferred = if preferred.is_empty() {
            crate::constants::PREFERRED_COLUMN_ORDER
                .iter()
                .map(|c| (*c).to_string())
                .collect()
        } else {
            preferred
        };

        Self {
            rows: Vec::new(),
            columns: Vec::new(),
            sort: SortState::default(),
            editing: None,
            selected: None,
            last_error: None,
            loaded_at: None,
            schema,
            preferred,
        }
    }

    /// Swaps in a fresh result set. Returns the new state of the selected row,
    /// if there is one.
    pub fn replace_rows(&mut self, rows: Vec<EpisodeRecord>) -> Option<SelectionChange> {
        self.rows = rows;
        self.last_error = None;
        self.loaded_at = Some(Utc::now());
        self.recompute_columns();

        if let Some(id) = self.editing_id().cloned()
            && self.get(&id).is_none()
        {
            self.editing = None;
        }

        let id = self.selected.clone()?;
        match self.get(&id) {
            Some(record) => Some(SelectionChange::Selected {
                links: record.script_links(),
                episode_name: record.episode_name.clone(),
            }),
            None => {
                self.selected = None;
                Some(SelectionChange::Cleared)
            }
        }
    }

    /// Keeps the previous rows so the view stays usable while the error is shown.
    pub fn set_load_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&EpisodeRecord> {
        self.rows.iter().find(|r| &r.id == id)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub const fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn click_sort(&mut self, column: &str) {
        self.sort.click(column);
    }

    /// Rows in display order.
    #[must_use]
    pub fn sorted_rows(&self) -> Vec<&EpisodeRecord> {
        let Some(column) = self.sort.column.as_deref() else {
            return self.rows.iter().collect();
        };

        let maps: Vec<Map<String, Value>> = self.rows.iter().map(EpisodeRecord::to_row).collect();
        sort_indices(&maps, column, self.sort.direction, self.schema.kind_of(column))
            .into_iter()
            .map(|i| &self.rows[i])
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> RecordListSnapshot {
        RecordListSnapshot {
            columns: self.columns.clone(),
            rows: self.sorted_rows().into_iter().cloned().collect(),
            sort: self.sort.clone(),
            editing: self.editing.clone(),
            selected: self.selected.clone(),
            last_error: self.last_error.clone(),
            loaded_at: self.loaded_at,
        }
    }

    /// Puts one row in edit mode, replacing any other row's buffer.
    pub fn begin_edit(&mut self, id: &RecordId) -> Result<&EpisodeRecord, RecordsError> {
        let record = self
            .get(id)
            .cloned()
            .ok_or_else(|| RecordsError::NotFound(id.clone()))?;
        Ok(self.editing.insert(record))
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    #[must_use]
    pub fn editing_id(&self) -> Option<&RecordId> {
        self.editing.as_ref().map(|r| &r.id)
    }

    pub fn ensure_editing(&self, id: &RecordId) -> Result<(), RecordsError> {
        if self.editing_id() == Some(id) {
            Ok(())
        } else {
            Err(RecordsError::NotEditing(id.clone()))
        }
    }

    /// Mirrors a successful save and leaves edit mode.
    pub fn apply_saved(&mut self, stored: EpisodeRecord) -> Option<SelectionChange> {
        if self.editing_id() == Some(&stored.id) {
            self.editing = None;
        }
        self.upsert(stored)
    }

    /// Drops a deleted row. Returns `Cleared` when it was the selected one.
    pub fn remove(&mut self, id: &RecordId) -> Option<SelectionChange> {
        self.rows.retain(|r| &r.id != id);
        if self.editing_id() == Some(id) {
            self.editing = None;
        }
        self.recompute_columns();

        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            Some(SelectionChange::Cleared)
        } else {
            None
        }
    }

    /// Selecting the selected row clears the selection.
    pub fn toggle_select(&mut self, id: &RecordId) -> Result<SelectionChange, RecordsError> {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            return Ok(SelectionChange::Cleared);
        }

        let record = self
            .get(id)
            .ok_or_else(|| RecordsError::NotFound(id.clone()))?;
        let change = SelectionChange::Selected {
            links: record.script_links(),
            episode_name: record.episode_name.clone(),
        };
        self.selected = Some(id.clone());
        Ok(change)
    }

    #[must_use]
    pub const fn selected(&self) -> Option<&RecordId> {
        self.selected.as_ref()
    }

    /// Applies a change-feed event. Returns a selection update when the selected
    /// row changed or disappeared.
    pub fn apply_change(&mut self, change: &RecordChange) -> Option<SelectionChange> {
        match (change.kind, &change.record) {
            (ChangeKind::Delete, _) => self.remove(&change.id),
            (_, Some(record)) => self.upsert(record.clone()),
            (_, None) => None,
        }
    }

    fn upsert(&mut self, record: EpisodeRecord) -> Option<SelectionChange> {
        let selected = self.selected.as_ref() == Some(&record.id);
        let update = selected.then(|| SelectionChange::Selected {
            links: record.script_links(),
            episode_name: record.episode_name.clone(),
        });

        if let Some(existing) = self.rows.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
        } else {
            self.rows.push(record);
        }
        self.recompute_columns();
        update
    }

    fn recompute_columns(&mut self) {
        let observed: BTreeSet<String> = self
            .rows
            .iter()
            .flat_map(|r| r.to_row().into_iter().map(|(k, _)| k))
            .collect();
        self.columns = order_columns(observed.iter().map(String::as_str), &self.preferred);
    }
}

/// Preferred columns first (only those observed), then the rest alphabetically.
pub fn order_columns<'a>(observed: impl IntoIterator<Item = &'a str>, preferred: &[String]) -> Vec<String> {
    let observed: BTreeSet<&str> = observed.into_iter().collect();

    let mut ordered: Vec<String> = preferred
        .iter()
        .filter(|c| observed.contains(c.as_str()))
        .cloned()
        .collect();

    ordered.extend(
        observed
            .iter()
            .filter(|c| !preferred.iter().any(|p| p == *c))
            .map(|c| (*c).to_string()),
    );

    ordered
}

static NULL: Value = Value::Null;

/// Stable sort of row indices by one column. `SortDirection::None` keeps fetch
/// order; nulls go first ascending and last descending.
#[must_use]
pub fn sort_indices(
    rows: &[Map<String, Value>],
    column: &str,
    direction: SortDirection,
    kind: ColumnKind,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    if direction == SortDirection::None {
        return order;
    }

    let cells: Vec<&Value> = rows
        .iter()
        .map(|r| r.get(column).unwrap_or(&NULL))
        .collect();
    let kind = kind.resolve(cells.iter().copied());
    let keys: Vec<Option<SortKey>> = cells.iter().map(|v| kind.sort_key(v)).collect();

    order.sort_by(|&a, &b| compare_keys(keys[a].as_ref(), keys[b].as_ref(), direction));
    order
}

fn compare_keys(a: Option<&SortKey>, b: Option<&SortKey>, direction: SortDirection) -> Ordering {
    let ascending = direction == SortDirection::Ascending;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => {
            if ascending {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Some(_), None) => {
            if ascending {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Some(x), Some(y)) => {
            let ord = x.compare(y);
            if ascending { ord } else { ord.reverse() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Map<String, Value>> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => Map::new(),
            })
            .collect()
    }

    fn sample() -> Vec<Map<String, Value>> {
        rows(vec![
            json!({"a": null, "b": "2024-01-01", "c": "Zebra"}),
            json!({"a": 1, "b": "2023-01-01", "c": "apple"}),
        ])
    }

    #[test]
    fn date_column_sorts_chronologically() {
        let order = sort_indices(&sample(), "b", SortDirection::Ascending, ColumnKind::Auto);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn text_column_sorts_case_insensitively() {
        let order = sort_indices(&sample(), "c", SortDirection::Ascending, ColumnKind::Auto);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn nulls_first_ascending_last_descending() {
        let data = sample();
        assert_eq!(
            sort_indices(&data, "a", SortDirection::Ascending, ColumnKind::Auto),
            vec![0, 1]
        );
        assert_eq!(
            sort_indices(&data, "a", SortDirection::Descending, ColumnKind::Auto),
            vec![1, 0]
        );
    }

    #[test]
    fn missing_column_counts_as_null() {
        let data = rows(vec![json!({"n": 3}), json!({}), json!({"n": 1})]);
        assert_eq!(
            sort_indices(&data, "n", SortDirection::Ascending, ColumnKind::Number),
            vec![1, 2, 0]
        );
        assert_eq!(
            sort_indices(&data, "n", SortDirection::Descending, ColumnKind::Number),
            vec![0, 2, 1]
        );
    }

    #[test]
    fn numeric_strings_sort_by_value() {
        let data = rows(vec![json!({"n": "10"}), json!({"n": "9"}), json!({"n": "100"})]);
        assert_eq!(
            sort_indices(&data, "n", SortDirection::Ascending, ColumnKind::Auto),
            vec![1, 0, 2]
        );
    }

    #[test]
    fn equal_keys_keep_fetch_order() {
        let data = rows(vec![
            json!({"s": "b", "i": 0}),
            json!({"s": "a", "i": 1}),
            json!({"s": "B", "i": 2}),
        ]);
        assert_eq!(
            sort_indices(&data, "s", SortDirection::Ascending, ColumnKind::Text),
            vec![1, 0, 2]
        );
    }

    #[test]
    fn three_clicks_restore_fetch_order() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![
            EpisodeRecord::new("2", "Bravo"),
            EpisodeRecord::new("1", "alpha"),
            EpisodeRecord::new("3", "Charlie"),
        ]);
        let fetch_order: Vec<_> = table.sorted_rows().iter().map(|r| r.id.clone()).collect();

        table.click_sort("episode_name");
        let names: Vec<_> = table
            .sorted_rows()
            .iter()
            .map(|r| r.episode_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["alpha", "Bravo", "Charlie"]);

        table.click_sort("episode_name");
        assert_eq!(table.sorted_rows()[0].id.as_str(), "3");

        table.click_sort("episode_name");
        assert_eq!(table.sort_state().direction, SortDirection::None);
        let restored: Vec<_> = table.sorted_rows().iter().map(|r| r.id.clone()).collect();
        assert_eq!(restored, fetch_order);
    }

    #[test]
    fn clicking_another_column_resets_to_ascending() {
        let mut sort = SortState::default();
        sort.click("a");
        sort.click("a");
        assert_eq!(sort.direction, SortDirection::Descending);
        sort.click("b");
        assert_eq!(sort.column.as_deref(), Some("b"));
        assert_eq!(sort.direction, SortDirection::Ascending);
    }

    #[test]
    fn preferred_columns_come_first_then_alphabetical() {
        let preferred = vec!["id".to_string(), "episode_name".to_string(), "missing".to_string()];
        let ordered = order_columns(["zeta", "episode_name", "alpha", "id"], &preferred);
        assert_eq!(ordered, vec!["id", "episode_name", "alpha", "zeta"]);
    }

    #[test]
    fn observed_columns_include_extension_columns() {
        let mut record = EpisodeRecord::new("1", "Pilot");
        record.extra.insert("guest_handle".to_string(), json!("@x"));
        let mut table = RecordTable::default();
        table.replace_rows(vec![record]);

        let columns = table.columns();
        assert_eq!(columns[0], "id");
        assert_eq!(columns.last().map(String::as_str), Some("guest_handle"));
    }

    #[test]
    fn observed_columns_come_from_the_stored_rows() {
        let rows: Vec<EpisodeRecord> = serde_json::from_value(json!([
            {"id": 1, "episode_name": "Pilot"},
            {"id": 2, "episode_name": "Two", "guest": null}
        ]))
        .unwrap();
        let mut table = RecordTable::default();
        table.replace_rows(rows);

        assert_eq!(table.columns(), ["id", "episode_name", "guest"]);
    }

    #[test]
    fn selecting_twice_clears_selection() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot")]);
        let id = RecordId::new("1");

        let first = table.toggle_select(&id).unwrap();
        assert!(matches!(first, SelectionChange::Selected { ref episode_name, .. } if episode_name.as_deref() == Some("Pilot")));
        assert_eq!(table.toggle_select(&id).unwrap(), SelectionChange::Cleared);
        assert!(table.selected().is_none());
    }

    #[test]
    fn removing_selected_row_clears_selection() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot"), EpisodeRecord::new("2", "Two")]);
        table.toggle_select(&RecordId::new("1")).unwrap();

        assert_eq!(table.remove(&RecordId::new("2")), None);
        assert_eq!(
            table.remove(&RecordId::new("1")),
            Some(SelectionChange::Cleared)
        );
    }

    #[test]
    fn only_one_row_is_edited_at_a_time() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot"), EpisodeRecord::new("2", "Two")]);

        table.begin_edit(&RecordId::new("1")).unwrap();
        table.begin_edit(&RecordId::new("2")).unwrap();
        assert_eq!(table.editing_id().map(RecordId::as_str), Some("2"));
        assert!(table.ensure_editing(&RecordId::new("1")).is_err());
    }

    #[test]
    fn change_feed_updates_selected_row_links() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot")]);
        table.toggle_select(&RecordId::new("1")).unwrap();

        let mut updated = EpisodeRecord::new("1", "Pilot");
        updated.interview_script_4 = Some("https://files/4".to_string());
        let change = table.apply_change(&RecordChange::updated(updated));

        match change {
            Some(SelectionChange::Selected { links, .. }) => assert!(links.has_summary()),
            other => panic!("unexpected change: {other:?}"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reload_refreshes_or_drops_the_selection() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot")]);
        table.toggle_select(&RecordId::new("1")).unwrap();

        let mut updated = EpisodeRecord::new("1", "Pilot");
        updated.interview_script_2 = Some("https://files/2".to_string());
        match table.replace_rows(vec![updated]) {
            Some(SelectionChange::Selected { links, .. }) => assert_eq!(links.ready_count(), 1),
            other => panic!("unexpected change: {other:?}"),
        }

        assert_eq!(table.replace_rows(vec![]), Some(SelectionChange::Cleared));
        assert!(table.selected().is_none());
        assert_eq!(table.replace_rows(vec![]), None);
    }

    #[test]
    fn load_error_keeps_previous_rows() {
        let mut table = RecordTable::default();
        table.replace_rows(vec![EpisodeRecord::new("1", "Pilot")]);
        table.set_load_error("boom");

        let snapshot = table.snapshot();
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("boom"));

        table.replace_rows(vec![]);
        assert!(table.snapshot().last_error.is_none());
    }
}
