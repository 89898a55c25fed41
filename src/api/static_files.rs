//! Embedded static assets (`/static/*`)

use axum::{
    body::Body,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Stylesheets and scripts shipped with the binary
#[derive(RustEmbed)]
#[folder = "assets/"]
#[include = "*.css"]
#[include = "*.js"]
struct SiteAssets;

/// Serve an embedded asset
pub async fn serve_static(Path(path): Path<String>) -> Response {
    let asset_path = path.trim_start_matches('/');
    match SiteAssets::get(asset_path) {
        Some(content) => build_response(asset_path, content.data.into_owned()),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Build HTTP response with proper headers
fn build_response(path: &str, data: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, get_content_type(path)),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Body::from(data),
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_assets_present() {
        for name in ["site.css", "live.js", "admin.js"] {
            assert!(SiteAssets::get(name).is_some(), "missing asset {}", name);
        }
    }

    #[test]
    fn test_content_type() {
        assert_eq!(get_content_type("site.css"), "text/css; charset=utf-8");
        assert_eq!(get_content_type("live.js"), "application/javascript; charset=utf-8");
        assert_eq!(get_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_unknown_asset_is_404() {
        let response = serve_static(Path("nope.css".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
