use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, FormDto};
use crate::constants::webhook::{EPISODE_NAME_FIELD, PDF_FILE_FIELD};

#[derive(Default)]
struct SubmissionForm {
    episode_name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(EPISODE_NAME_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid episode name: {e}")))?;
                form.episode_name = Some(text);
            }
            Some(PDF_FILE_FIELD) => {
                form.file_name = Some(field.file_name().unwrap_or("upload").to_string());
                form.content_type = field.content_type().map(str::to_string);
                form.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?
                    .to_vec();
            }
            _ => {}
        }
    }

    Ok(form)
}

/// `POST /api/submissions`
///
/// Multipart body with `episodeName` and `pdfFile`. Returns 202 once tracking
/// has started; progress arrives over `/api/events`.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FormDto>>), ApiError> {
    let form = read_form(multipart).await?;

    let state_after = state
        .console()
        .submit(
            form.episode_name.as_deref().unwrap_or_default(),
            form.file_name.as_deref(),
            form.content_type.as_deref(),
            form.bytes,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(FormDto::from(&state_after))),
    ))
}

/// `GET /api/submissions/current`
pub async fn current_submission(State(state): State<Arc<AppState>>) -> Json<ApiResponse<FormDto>> {
    let form = state.console().form().await;
    Json(ApiResponse::success(FormDto::from(&form)))
}
