//! Static console asset serving using rust-embed

use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embed the console assets at compile time
#[derive(RustEmbed)]
#[folder = "assets"]
struct ConsoleAssets;

/// Serve static files from the embedded assets directory
pub async fn static_handler(uri: Uri) -> impl IntoResponse {
    let path = uri.path().trim_start_matches('/');

    // Default to index.html for root path
    let path = if path.is_empty() { "index.html" } else { path };

    match ConsoleAssets::get(path) {
        Some(content) => {
            let mime_type = mime_guess::from_path(path).first_or_text_plain();
            response(
                StatusCode::OK,
                mime_type.as_ref(),
                Body::from(content.data.into_owned()),
            )
        }
        None => match ConsoleAssets::get("index.html") {
            // Unknown paths fall back to the console page
            Some(content) => response(
                StatusCode::OK,
                "text/html",
                Body::from(content.data.into_owned()),
            ),
            None => response(StatusCode::NOT_FOUND, "text/plain", Body::from("Not Found")),
        },
    }
}

fn response(status: StatusCode, content_type: &str, body: Body) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_page_is_embedded() {
        assert!(ConsoleAssets::get("index.html").is_some());
    }

    #[test]
    fn nonexistent_asset_is_absent() {
        assert!(ConsoleAssets::get("nonexistent.file").is_none());
    }
}
