use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use metrics::counter;
use serde_json::json;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::api::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(sse_handler))
}

/// Streams every [`ConsoleEvent`](crate::domain::events::ConsoleEvent) as one
/// JSON `data:` line. A client that falls behind the bus gets a `resync` frame
/// and has to refetch the list and the form.
async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus().subscribe();
    let console = state.console().clone();

    let stream = stream::unfold((rx, console), |(mut rx, console)| async move {
        let event = match rx.recv().await {
            Ok(event) => Event::default().data(serde_json::to_string(&event).unwrap_or_default()),
            Err(RecvError::Lagged(missed)) => {
                counter!("event_stream_lagged_total").increment(1);
                let records = console.list().await.rows.len();
                let phase = console.form().await.phase;
                warn!(
                    missed,
                    records,
                    phase = ?phase,
                    "Event stream client fell behind the console, asking it to resync"
                );

                Event::default()
                    .event("resync")
                    .data(json!({ "missed": missed, "records": records }).to_string())
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(event), (rx, console)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
