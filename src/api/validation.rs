use super::ApiError;
use crate::domain::RecordId;

const MAX_ID_LEN: usize = 128;
const MAX_COLUMN_LEN: usize = 64;

pub fn validate_record_id(id: &str) -> Result<RecordId, ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Record ID cannot be empty"));
    }

    if trimmed.len() > MAX_ID_LEN {
        return Err(ApiError::validation(format!(
            "Record ID must be {MAX_ID_LEN} characters or less"
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(ApiError::validation(
            "Record ID cannot contain control characters",
        ));
    }

    Ok(RecordId::new(trimmed))
}

pub fn validate_column(column: &str) -> Result<&str, ApiError> {
    let trimmed = column.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Column name cannot be empty"));
    }

    if trimmed.len() > MAX_COLUMN_LEN {
        return Err(ApiError::validation(format!(
            "Column name must be {MAX_COLUMN_LEN} characters or less"
        )));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::validation(
            "Column name can only contain letters, numbers, and underscores",
        ));
    }

    Ok(trimmed)
}
