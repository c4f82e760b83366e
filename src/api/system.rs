//! System API endpoints.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, SystemStatus};

/// Returns process and pipeline status.
///
/// # Endpoint
/// `GET /api/system/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let console = state.console();
    let list = console.list().await;
    let form = console.form().await;
    let webhook_configured = !state.config().read().await.webhook.url.is_empty();

    Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        store_backend: console.store().backend_name().to_string(),
        records_loaded: list.rows.len(),
        list_error: list.last_error,
        webhook_configured,
        submission_active: form.is_active(),
    }))
}
