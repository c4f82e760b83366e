use axum::{
    body::Body,
    http::{StatusCode, Uri, header},
    response::IntoResponse,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "ui"]
struct Asset;

/// Serves the embedded console page. Unknown paths fall back to `index.html`.
pub async fn serve_asset(uri: Uri) -> impl IntoResponse {
    let path = match uri.path().trim_start_matches('/') {
        "" => "index.html",
        other => other,
    };

    let (path, content) = match Asset::get(path) {
        Some(content) => (path, content),
        None => match Asset::get("index.html") {
            Some(content) => ("index.html", content),
            None => return (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
        },
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        [(header::CONTENT_TYPE, mime.as_ref())],
        Body::from(content.data),
    )
        .into_response()
}
