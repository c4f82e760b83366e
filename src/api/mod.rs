use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::constants::limits::MAX_UPLOAD_BYTES;
use crate::domain::events::ConsoleEvent;
use crate::services::Console;
use crate::state::SharedState;

mod approval;
mod assets;
mod error;
pub mod events;
mod observability;
mod records;
mod submissions;
mod system;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn console(&self) -> &Arc<Console> {
        &self.shared.console
    }

    #[must_use]
    pub fn event_bus(&self) -> &tokio::sync::broadcast::Sender<ConsoleEvent> {
        &self.shared.event_bus
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config)?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(create_api_router())
        .merge(events::router())
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .fallback(assets::serve_asset)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/records",
            get(records::list_records).post(records::reload_records),
        )
        .route("/records/sort", post(records::sort_records))
        .route("/records/edit", delete(records::cancel_edit))
        .route(
            "/records/{id}",
            put(records::save_record).delete(records::delete_record),
        )
        .route("/records/{id}/edit", post(records::edit_record))
        .route("/records/{id}/select", post(records::select_record))
        .route(
            "/submissions",
            post(submissions::create_submission)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route("/submissions/current", get(submissions::current_submission))
        .route("/approval", post(approval::request_approval))
        .route("/approval/confirm", post(approval::confirm_approval))
        .route("/approval/cancel", post(approval::cancel_approval))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
}
