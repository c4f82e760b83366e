//! Declared column schema for the record table.
//!
//! Each column has a semantic [`ColumnKind`] that decides how its cells are
//! compared. Known columns are declared up front; columns the console has never
//! seen fall back to [`ColumnKind::Auto`], which picks a kind for the whole
//! column from its values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Date,
    /// Number if every value parses as one, else date if every value parses as
    /// one, else text.
    Auto,
}

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    kinds: HashMap<String, ColumnKind>,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        let mut kinds: HashMap<String, ColumnKind> = crate::constants::TEXT_COLUMNS
            .iter()
            .map(|c| ((*c).to_string(), ColumnKind::Text))
            .collect();

        for column in crate::constants::DATE_COLUMNS {
            kinds.insert((*column).to_string(), ColumnKind::Date);
        }
        kinds.insert("unix_timestamp".to_string(), ColumnKind::Number);
        kinds.insert("id".to_string(), ColumnKind::Auto);

        Self { kinds }
    }
}

impl ColumnSchema {
    /// Default schema with configured overrides applied on top.
    #[must_use]
    pub fn with_overrides(overrides: &HashMap<String, ColumnKind>) -> Self {
        let mut schema = Self::default();
        for (column, kind) in overrides {
            schema.kinds.insert(column.clone(), *kind);
        }
        schema
    }

    #[must_use]
    pub fn kind_of(&self, column: &str) -> ColumnKind {
        self.kinds.get(column).copied().unwrap_or(ColumnKind::Auto)
    }
}

impl ColumnKind {
    /// Resolves `Auto` against the non-null values of a column.
    pub fn resolve<'a>(self, values: impl IntoIterator<Item = &'a Value>) -> Self {
        if self != Self::Auto {
            return self;
        }

        let non_null: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        if non_null.is_empty() {
            Self::Text
        } else if non_null.iter().all(|v| as_number(v).is_some()) {
            Self::Number
        } else if non_null.iter().all(|v| as_timestamp(v).is_some()) {
            Self::Date
        } else {
            Self::Text
        }
    }

    /// Sort key for a cell; `None` for null.
    #[must_use]
    pub fn sort_key(self, value: &Value) -> Option<SortKey> {
        if value.is_null() {
            return None;
        }

        let parsed = match self {
            Self::Number => as_number(value).map(SortKey::Number),
            Self::Date => as_timestamp(value).map(SortKey::Date),
            Self::Text | Self::Auto => None,
        };

        Some(parsed.unwrap_or_else(|| SortKey::Text(as_text(value).to_lowercase())))
    }
}

/// Totally ordered key derived from a cell.
///
/// Cells that do not parse as the declared kind sort after the ones that do.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Date(i64),
    Text(String),
}

impl SortKey {
    const fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Date(_) => 1,
            Self::Text(_) => 2,
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Milliseconds since the epoch.
fn as_timestamp(value: &Value) -> Option<i64> {
    let Value::String(s) = value else {
        return None;
    };
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_prefers_number_then_date_then_text() {
        let numbers = [json!("10"), json!(2), Value::Null];
        assert_eq!(ColumnKind::Auto.resolve(numbers.iter()), ColumnKind::Number);

        let dates = [json!("2024-01-01"), json!("2023-06-01T10:00:00Z")];
        assert_eq!(ColumnKind::Auto.resolve(dates.iter()), ColumnKind::Date);

        let mixed = [json!("2024-01-01"), json!("Zebra")];
        assert_eq!(ColumnKind::Auto.resolve(mixed.iter()), ColumnKind::Text);
    }

    #[test]
    fn declared_kind_is_not_sniffed() {
        let values = [json!("12"), json!("9")];
        assert_eq!(ColumnKind::Text.resolve(values.iter()), ColumnKind::Text);

        let a = ColumnKind::Text.sort_key(&values[0]).unwrap();
        let b = ColumnKind::Text.sort_key(&values[1]).unwrap();
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn unparseable_cells_sort_after_parsed_ones() {
        let parsed = ColumnKind::Number.sort_key(&json!("3")).unwrap();
        let junk = ColumnKind::Number.sort_key(&json!("n/a")).unwrap();
        assert_eq!(parsed.compare(&junk), Ordering::Less);
    }

    #[test]
    fn null_has_no_key() {
        assert!(ColumnKind::Date.sort_key(&Value::Null).is_none());
    }

    #[test]
    fn overrides_replace_declared_kinds() {
        let overrides = HashMap::from([("episode_name".to_string(), ColumnKind::Number)]);
        let schema = ColumnSchema::with_overrides(&overrides);
        assert_eq!(schema.kind_of("episode_name"), ColumnKind::Number);
        assert_eq!(schema.kind_of("created_at"), ColumnKind::Date);
        assert_eq!(schema.kind_of("never_seen"), ColumnKind::Auto);
    }
}
