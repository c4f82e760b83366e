use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ApprovalDto, FormDto};
use crate::services::DialogChoice;

/// `POST /api/approval`: opens the confirmation dialog.
pub async fn request_approval(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<FormDto>>, ApiError> {
    let form = state.console().request_approval().await?;
    Ok(Json(ApiResponse::success(FormDto::from(&form))))
}

/// `POST /api/approval/confirm`
pub async fn confirm_approval(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ApprovalDto>>, ApiError> {
    resolve(&state, DialogChoice::Confirm).await
}

/// `POST /api/approval/cancel`
pub async fn cancel_approval(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ApprovalDto>>, ApiError> {
    resolve(&state, DialogChoice::Cancel).await
}

async fn resolve(
    state: &AppState,
    choice: DialogChoice,
) -> Result<Json<ApiResponse<ApprovalDto>>, ApiError> {
    let result = state.console().resolve_approval(choice).await?;
    Ok(Json(ApiResponse::success(ApprovalDto::from(&result))))
}
