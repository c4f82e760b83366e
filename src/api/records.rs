//! Record list endpoints.
//!
//! Thin adapters over [`Console`](crate::services::Console): every handler
//! validates its path input, calls one console operation and wraps the result
//! in the [`ApiResponse`] envelope.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::validation::{validate_column, validate_record_id};
use super::{ApiError, ApiResponse, AppState, DeleteQuery, FormDto, RecordListDto, SortRequest};
use crate::models::episode::EpisodeRecord;

/// `GET /api/records`
pub async fn list_records(State(state): State<Arc<AppState>>) -> Json<ApiResponse<RecordListDto>> {
    let snapshot = state.console().list().await;
    Json(ApiResponse::success(snapshot.into()))
}

/// `POST /api/records`
///
/// Reloads from the store. A failed reload keeps the previous rows and reports
/// the error both here and in the list's `error` field.
pub async fn reload_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RecordListDto>>, ApiError> {
    state.console().load_records().await?;
    let snapshot = state.console().list().await;
    Ok(Json(ApiResponse::success(snapshot.into())))
}

/// `POST /api/records/sort`
pub async fn sort_records(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SortRequest>,
) -> Result<Json<ApiResponse<RecordListDto>>, ApiError> {
    let column = validate_column(&request.column)?;
    let snapshot = state.console().sort(column).await;
    Ok(Json(ApiResponse::success(snapshot.into())))
}

/// `POST /api/records/{id}/edit`
pub async fn edit_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<EpisodeRecord>>, ApiError> {
    let id = validate_record_id(&id)?;
    let record = state.console().edit(&id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// `DELETE /api/records/edit`
pub async fn cancel_edit(State(state): State<Arc<AppState>>) -> Json<ApiResponse<()>> {
    state.console().cancel_edit().await;
    Json(ApiResponse::success(()))
}

/// `PUT /api/records/{id}`
///
/// The path id wins over any id in the body.
pub async fn save_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut record): Json<EpisodeRecord>,
) -> Result<Json<ApiResponse<EpisodeRecord>>, ApiError> {
    record.id = validate_record_id(&id)?;
    let stored = state.console().save(record).await?;
    Ok(Json(ApiResponse::success(stored)))
}

/// `DELETE /api/records/{id}?confirm=true`
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = validate_record_id(&id)?;
    state.console().delete(&id, query.confirm).await?;
    Ok(Json(ApiResponse::success(())))
}

/// `POST /api/records/{id}/select`
///
/// Toggles the selection and returns the form as it now renders.
pub async fn select_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FormDto>>, ApiError> {
    let id = validate_record_id(&id)?;
    let form = state.console().select(&id).await?;
    Ok(Json(ApiResponse::success(FormDto::from(&form))))
}
